//! Request identity and its storage-name encoding
//!
//! A recorded response for `GET <path>?<query>` lives at
//! `<root>/<path>[@<query>].json`. The query is percent-encoded as a single
//! opaque token, so the `@` delimiter can never appear inside it, and the
//! route identity stays slash-separated until a file is actually touched.

use std::path::{Path, PathBuf};

use url::Url;

use crate::{ApiReplayError, Result};

/// File extension carried by every artifact
pub const ARTIFACT_EXTENSION: &str = "json";

/// Separator between the path and the encoded query in a storage name
pub const QUERY_DELIMITER: char = '@';

/// Segment substituted for an empty or root path
pub const INDEX_SEGMENT: &str = "index";

const ARTIFACT_SUFFIX: &str = ".json";

/// Path and raw query of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    /// Slash-separated path, no scheme or host
    pub path: String,
    /// Raw query string, possibly empty
    pub query: String,
}

impl RequestIdentity {
    /// Create an identity from a path and raw query
    pub fn new(path: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: query.into(),
        }
    }

    /// Identity of an absolute URL, keeping its path and query exactly as written
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        Self::new(url.path(), url.query().unwrap_or_default())
    }
}

/// A route decoded from a storage name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Canonical route path (leading slash, no extension)
    pub path: String,
    /// Decoded query the route is restricted to, if any
    pub query: Option<String>,
}

/// Encode a request identity into a relative, slash-separated storage path
///
/// `base_path` is stripped from the front of the path only on a segment
/// boundary, so `/api` strips from `/api/users` but not from `/api2/users`.
///
/// # Errors
///
/// Returns `InvalidIdentity` if the path contains the `@` delimiter or a
/// `.`/`..` segment
pub fn encode(identity: &RequestIdentity, base_path: Option<&str>) -> Result<String> {
    if identity.path.contains(QUERY_DELIMITER) {
        return Err(ApiReplayError::InvalidIdentity(format!(
            "path {:?} contains the reserved '{QUERY_DELIMITER}' delimiter",
            identity.path
        )));
    }

    if identity.path.split('/').any(|s| s == "." || s == "..") {
        return Err(ApiReplayError::InvalidIdentity(format!(
            "path {:?} contains a relative segment",
            identity.path
        )));
    }

    let path = match base_path {
        Some(base) => strip_base_path(&identity.path, base),
        None => &identity.path,
    };

    let mut storage = trim_route(path);

    if !identity.query.is_empty() {
        storage.push(QUERY_DELIMITER);
        storage.push_str(&urlencoding::encode(&identity.query));
    }

    storage.push_str(ARTIFACT_SUFFIX);
    Ok(storage)
}

/// Parse a relative storage name (`<path>['@'<query>].json`) back into a route
///
/// # Errors
///
/// Returns `InvalidIdentity` if the name lacks the artifact extension, has an
/// empty path component, or carries a query token that is not a single
/// percent-decodable value
pub fn parse_storage_name(relative: &str) -> Result<Route> {
    let stem = relative.strip_suffix(ARTIFACT_SUFFIX).ok_or_else(|| {
        ApiReplayError::InvalidIdentity(format!("{relative:?} is not a .{ARTIFACT_EXTENSION} file"))
    })?;

    let (path, token) = match stem.split_once(QUERY_DELIMITER) {
        Some((path, token)) => (path, Some(token)),
        None => (stem, None),
    };

    if path.trim_matches('/').is_empty() {
        return Err(ApiReplayError::InvalidIdentity(format!(
            "{relative:?} has an empty path component"
        )));
    }

    let query = match token {
        Some(token) if token.contains(QUERY_DELIMITER) => {
            return Err(ApiReplayError::InvalidIdentity(format!(
                "{relative:?} has more than one '{QUERY_DELIMITER}' delimiter"
            )));
        }
        Some(token) => {
            let decoded = urlencoding::decode(token).map_err(|e| {
                ApiReplayError::InvalidIdentity(format!(
                    "failed to decode query from {relative:?}: {e}"
                ))
            })?;
            Some(decoded.into_owned()).filter(|q| !q.is_empty())
        }
        None => None,
    };

    Ok(Route {
        path: normalize_route_path(path),
        query,
    })
}

/// Map a path to its canonical route form
///
/// The result has a leading slash, no trailing slash, no empty segments and
/// no artifact extension; the root maps to `/index`.
#[must_use]
pub fn normalize_route_path(path: &str) -> String {
    format!("/{}", trim_route(path))
}

/// Resolve a slash-separated storage path under `root` with platform separators
#[must_use]
pub fn to_fs_path(root: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(root.to_path_buf(), |acc, segment| acc.join(segment))
}

fn strip_base_path<'a>(path: &'a str, base: &str) -> &'a str {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        return path;
    }

    match path.strip_prefix(base) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => path,
    }
}

/// Relative route with empty segments collapsed, as `to_fs_path` lays it out
fn trim_route(path: &str) -> String {
    let joined = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    let trimmed = joined
        .strip_suffix(ARTIFACT_SUFFIX)
        .unwrap_or(&joined)
        .trim_end_matches('/');

    if trimmed.is_empty() {
        INDEX_SEGMENT.to_string()
    } else {
        trimmed.to_string()
    }
}
