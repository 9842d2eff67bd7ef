//! Recording engine for capturing one response

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use url::Url;

use crate::identity::{encode, RequestIdentity};
use crate::network::UpstreamClient;
use crate::storage::{write_artifact, CachedArtifact};
use crate::{ApiReplayError, Result};

use super::RECORD_METHOD;

/// What to record and where
#[derive(Debug, Clone)]
pub struct RecordRequest {
    /// Absolute http(s) URL to fetch
    pub url: String,
    /// Storage root the artifact is written under
    pub output_dir: PathBuf,
    /// URL (or bare path) whose path is stripped from the front of the request path
    pub base_url: Option<String>,
    /// Extra request headers
    pub headers: Vec<(String, String)>,
}

/// Result of a successful recording
#[derive(Debug, Clone)]
pub struct RecordOutcome {
    /// Artifact file written
    pub path: PathBuf,
    /// Slash-separated storage path relative to the output directory
    pub relative: String,
    /// Upstream status code
    pub status: u16,
}

/// Recording engine: fetch once, persist once
pub struct RecordingEngine {
    client: UpstreamClient,
}

impl RecordingEngine {
    /// Create a new recording engine
    #[must_use]
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }

    /// Fetch `request.url` and store the response as an artifact
    ///
    /// Nothing is written unless the upstream answers with a 2xx status.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIdentity` for a bad URL, `Upstream`/`UpstreamStatus`
    /// if the fetch fails, or an I/O error if the artifact cannot be written
    pub async fn record(&self, request: &RecordRequest) -> Result<RecordOutcome> {
        let url = parse_url(&request.url)?;
        let relative = encode(
            &RequestIdentity::from_url(&url),
            base_path(request.base_url.as_deref())?.as_deref(),
        )?;

        ensure_output_dir(&request.output_dir)?;

        let response = self
            .client
            .fetch(RECORD_METHOD, &url, &request.headers)
            .await?;

        if !response.is_success() {
            return Err(ApiReplayError::UpstreamStatus {
                status: response.status,
                body: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }

        let artifact = CachedArtifact {
            status: response.status,
            headers: response.headers,
            body: response.body,
        };

        let output_dir = request.output_dir.clone();
        let target = relative.clone();
        let path = tokio::task::spawn_blocking(move || {
            write_artifact(&output_dir, &target, &artifact)
        })
        .await
        .map_err(|e| ApiReplayError::Other(format!("Write task failed: {e}")))??;

        info!("Recorded {} -> {}", url, path.display());

        Ok(RecordOutcome {
            path,
            relative,
            status: response.status,
        })
    }
}

/// Storage path a URL would be recorded under
///
/// # Errors
///
/// Returns `InvalidIdentity` if either URL is malformed
pub fn storage_path_for(url: &str, base_url: Option<&str>) -> Result<String> {
    let url = parse_url(url)?;
    encode(
        &RequestIdentity::from_url(&url),
        base_path(base_url)?.as_deref(),
    )
}

/// Parse a `Key: Value` header argument
///
/// # Errors
///
/// Returns `InvalidHeader` if there is no `:` or the key is empty
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw.split_once(':').ok_or_else(|| {
        ApiReplayError::InvalidHeader(format!(
            "invalid header format, expected 'Key: Value': {raw}"
        ))
    })?;

    let key = key.trim();
    if key.is_empty() {
        return Err(ApiReplayError::InvalidHeader(format!(
            "empty header name: {raw}"
        )));
    }

    Ok((key.to_string(), value.trim().to_string()))
}

fn parse_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| ApiReplayError::InvalidIdentity(format!("invalid URL {raw:?}: {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ApiReplayError::InvalidIdentity(format!(
            "unsupported scheme {scheme:?} in {raw:?}"
        ))),
    }
}

/// Path component of a base URL; a bare path is accepted as-is
fn base_path(base_url: Option<&str>) -> Result<Option<String>> {
    let Some(base) = base_url.filter(|b| !b.is_empty()) else {
        return Ok(None);
    };

    if base.starts_with('/') {
        return Ok(Some(base.to_string()));
    }

    let url = Url::parse(base).map_err(|e| {
        ApiReplayError::InvalidIdentity(format!("invalid base-url {base:?}: {e}"))
    })?;
    Ok(Some(url.path().to_string()))
}

fn ensure_output_dir(dir: &Path) -> Result<()> {
    match std::fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(ApiReplayError::ConfigError(format!(
            "output directory {} exists and is not a directory",
            dir.display()
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Creating output directory {}", dir.display());
            std::fs::create_dir_all(dir)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
