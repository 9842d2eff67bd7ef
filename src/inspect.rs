//! Human-readable rendering of a recorded response

use std::fmt::Write as _;

use crate::storage::CachedArtifact;

/// Render an artifact for the terminal
///
/// JSON object and array bodies are pretty-printed; anything else is shown
/// as text.
#[must_use]
pub fn render_artifact(artifact: &CachedArtifact) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Status: {}", artifact.status);

    out.push_str("Headers:\n");
    for (key, values) in artifact.headers.iter() {
        let _ = writeln!(out, "  {key}: [{}]", values.join(" "));
    }

    out.push_str("Body:\n");
    out.push_str(&render_body(&artifact.body));
    out.push('\n');

    out
}

fn render_body(body: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value) if value.is_object() || value.is_array() => {
            serde_json::to_string_pretty(&value)
                .unwrap_or_else(|_| String::from_utf8_lossy(body).into_owned())
        }
        _ => String::from_utf8_lossy(body).into_owned(),
    }
}
