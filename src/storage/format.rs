//! Artifact file format
//!
//! One artifact is one JSON document:
//!
//! ```text
//! { "status": 200, "headers": { "Key": ["v1", "v2"] }, "body": <raw JSON>, "encoding": "text" }
//! ```
//!
//! A body that was a complete JSON document is embedded verbatim so replay is
//! byte-exact. Anything else is stored as a JSON string, either as text or as
//! base64, and tagged with `encoding`.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use hyper::header::{HeaderName, HeaderValue};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

use crate::{ApiReplayError, Result};

/// Ordered header multimap
///
/// Keys keep the case they were received with; each key's values keep their
/// order and multiplicity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMultimap(Vec<(String, Vec<String>)>);

impl HeaderMultimap {
    /// Create an empty multimap
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value, grouping it with earlier values of the same key
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => self.0.push((key, vec![value])),
        }
    }

    /// All values recorded for `key` (exact match)
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
    }

    /// Iterate keys with their values, in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of distinct keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no headers
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderMultimap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (key, value) in iter {
            headers.append(key, value);
        }
        headers
    }
}

impl Serialize for HeaderMultimap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, values) in &self.0 {
            map.serialize_entry(key, values)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for HeaderMultimap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct MultimapVisitor;

        impl<'de> Visitor<'de> for MultimapVisitor {
            type Value = HeaderMultimap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of header names to lists of values")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut headers = HeaderMultimap::new();
                while let Some((key, values)) = access.next_entry::<String, Vec<String>>()? {
                    for value in values {
                        headers.append(key.clone(), value);
                    }
                }
                Ok(headers)
            }
        }

        deserializer.deserialize_map(MultimapVisitor)
    }
}

/// How the body is represented inside the artifact file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyEncoding {
    /// Body is embedded verbatim as a JSON value
    #[default]
    Json,
    /// Body is a UTF-8 string
    Text,
    /// Body is base64 of arbitrary bytes
    Base64,
}

impl BodyEncoding {
    fn is_json(&self) -> bool {
        matches!(self, Self::Json)
    }
}

/// One recorded HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArtifact {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMultimap,
    /// Raw response body
    pub body: Bytes,
}

#[derive(Serialize, Deserialize)]
struct ArtifactFile {
    status: u16,
    #[serde(default)]
    headers: HeaderMultimap,
    body: Box<RawValue>,
    #[serde(default, skip_serializing_if = "BodyEncoding::is_json")]
    encoding: BodyEncoding,
}

/// Serialize an artifact to its on-disk form
///
/// # Errors
///
/// Returns error if the body cannot be embedded
pub fn encode_artifact(artifact: &CachedArtifact) -> Result<Vec<u8>> {
    let (body, encoding) = embed_body(&artifact.body)?;

    let file = ArtifactFile {
        status: artifact.status,
        headers: artifact.headers.clone(),
        body,
        encoding,
    };

    let mut data = serde_json::to_vec_pretty(&file)
        .map_err(|e| ApiReplayError::Other(format!("Failed to encode artifact: {e}")))?;
    data.push(b'\n');
    Ok(data)
}

/// Parse an artifact from its on-disk form
///
/// # Errors
///
/// Returns a description of the problem if the data is not a valid artifact
pub fn decode_artifact(data: &[u8]) -> std::result::Result<CachedArtifact, String> {
    let file: ArtifactFile = serde_json::from_slice(data).map_err(|e| e.to_string())?;

    if !(100..=999).contains(&file.status) {
        return Err(format!("invalid status code {}", file.status));
    }

    for (key, values) in file.headers.iter() {
        HeaderName::from_bytes(key.as_bytes()).map_err(|e| format!("header {key:?}: {e}"))?;
        for value in values {
            HeaderValue::from_str(value).map_err(|e| format!("header {key:?}: {e}"))?;
        }
    }

    let raw = file.body.get();
    let body = match file.encoding {
        BodyEncoding::Json => Bytes::copy_from_slice(raw.as_bytes()),
        BodyEncoding::Text => {
            let text: String =
                serde_json::from_str(raw).map_err(|e| format!("text body: {e}"))?;
            Bytes::from(text)
        }
        BodyEncoding::Base64 => {
            let encoded: String =
                serde_json::from_str(raw).map_err(|e| format!("base64 body: {e}"))?;
            let decoded = STANDARD
                .decode(encoded)
                .map_err(|e| format!("base64 body: {e}"))?;
            Bytes::from(decoded)
        }
    };

    Ok(CachedArtifact {
        status: file.status,
        headers: file.headers,
        body,
    })
}

/// Pick the body representation: verbatim JSON when the bytes are exactly one
/// JSON document, otherwise a string
fn embed_body(body: &[u8]) -> Result<(Box<RawValue>, BodyEncoding)> {
    if let Ok(raw) = serde_json::from_slice::<Box<RawValue>>(body) {
        if raw.get().len() == body.len() {
            return Ok((raw, BodyEncoding::Json));
        }
    }

    let (text, encoding) = match std::str::from_utf8(body) {
        Ok(text) => (text.to_string(), BodyEncoding::Text),
        Err(_) => (STANDARD.encode(body), BodyEncoding::Base64),
    };

    let quoted = serde_json::to_string(&text)
        .map_err(|e| ApiReplayError::Other(format!("Failed to encode body: {e}")))?;
    let raw = RawValue::from_string(quoted)
        .map_err(|e| ApiReplayError::Other(format!("Failed to encode body: {e}")))?;

    Ok((raw, encoding))
}
