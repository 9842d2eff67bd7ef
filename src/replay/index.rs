//! Route table built from a directory of artifacts

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::identity::{normalize_route_path, parse_storage_name, ARTIFACT_EXTENSION};
use crate::{ApiReplayError, Result};

/// One servable route and the file backing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    /// Canonical route path (leading slash, no extension, no query)
    pub route_path: String,
    /// Decoded query this entry is restricted to; `None` matches any query
    pub expected_query: Option<String>,
    /// Artifact file on disk
    pub artifact: PathBuf,
}

impl RouteEntry {
    /// Route as shown to operators, `path?query`
    #[must_use]
    pub fn display_route(&self) -> String {
        match &self.expected_query {
            Some(query) => format!("{}?{query}", self.route_path),
            None => self.route_path.clone(),
        }
    }
}

/// Immutable map from route path to its entries, in insertion order
///
/// Each `(route_path, expected_query)` pair appears at most once; the first
/// insertion wins and later duplicates are dropped as shadowed.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<String, Vec<RouteEntry>>,
    len: usize,
}

impl RouteTable {
    /// Build a table from entries, in the order given
    pub fn from_entries(entries: impl IntoIterator<Item = RouteEntry>) -> Self {
        let mut table = Self::default();
        for entry in entries {
            table.insert(entry);
        }
        table
    }

    /// Walk `root` and index every artifact beneath it
    ///
    /// Files are visited in lexicographic file-name order at every directory
    /// level, which makes duplicate shadowing deterministic. Files whose name
    /// does not decode are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns `Index` if `root` is missing, not a directory or unreadable
    pub fn build(root: &Path) -> Result<Self> {
        let index_error = |reason: String| ApiReplayError::Index {
            root: root.display().to_string(),
            reason,
        };

        let metadata = std::fs::metadata(root).map_err(|e| index_error(e.to_string()))?;
        if !metadata.is_dir() {
            return Err(index_error("not a directory".to_string()));
        }

        let mut table = Self::default();

        for item in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let item = match item {
                Ok(item) => item,
                Err(e) if e.depth() == 0 => return Err(index_error(e.to_string())),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            let path = item.path();
            if !item.file_type().is_file()
                || path.extension().and_then(|s| s.to_str()) != Some(ARTIFACT_EXTENSION)
            {
                continue;
            }

            let Some(relative) = relative_storage_name(root, path) else {
                warn!("Skipping {}: name is not valid UTF-8", path.display());
                continue;
            };

            match parse_storage_name(&relative) {
                Ok(route) => {
                    table.insert(RouteEntry {
                        route_path: route.path,
                        expected_query: route.query,
                        artifact: path.to_path_buf(),
                    });
                }
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }

        info!("Indexed {} routes from {}", table.len(), root.display());
        Ok(table)
    }

    /// Find the entry serving `path` with the raw `query`
    ///
    /// An entry whose expected query equals `query` exactly wins over a
    /// query-less fallback for the same path.
    #[must_use]
    pub fn lookup(&self, path: &str, query: &str) -> Option<&RouteEntry> {
        let candidates = self.routes.get(&normalize_route_path(path))?;

        candidates
            .iter()
            .find(|entry| entry.expected_query.as_deref() == Some(query))
            .or_else(|| candidates.iter().find(|entry| entry.expected_query.is_none()))
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the table has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn insert(&mut self, entry: RouteEntry) {
        let variants = self.routes.entry(entry.route_path.clone()).or_default();

        if let Some(existing) = variants
            .iter()
            .find(|e| e.expected_query == entry.expected_query)
        {
            warn!(
                "{} from {} is shadowed by {}",
                entry.display_route(),
                entry.artifact.display(),
                existing.artifact.display()
            );
            return;
        }

        info!(
            "→ {} mapped to {}",
            entry.display_route(),
            entry.artifact.display()
        );
        debug!("{} variants for {}", variants.len() + 1, entry.route_path);

        variants.push(entry);
        self.len += 1;
    }
}

/// Walk `root` and build its route table
///
/// # Errors
///
/// Returns `Index` if `root` cannot be traversed
pub fn build_index(root: &Path) -> Result<RouteTable> {
    RouteTable::build(root)
}

/// Relative path of `path` under `root`, slash-separated
fn relative_storage_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = crate::identity::to_fs_path(root, relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, br#"{"status": 200, "body": null}"#).unwrap();
    }

    fn file_name(entry: &RouteEntry) -> String {
        entry
            .artifact
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn test_build_indexes_nested_files() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "index.json");
        touch(dir.path(), "api/users.json");
        touch(dir.path(), "api/users/42.json");

        let table = build_index(dir.path()).unwrap();
        assert_eq!(table.len(), 3);

        assert!(table.lookup("/", "").is_some());
        assert!(table.lookup("/api/users", "").is_some());
        assert!(table.lookup("/api/users/42", "").is_some());
        assert!(table.lookup("/api/users/43", "").is_none());
    }

    #[test]
    fn test_build_skips_other_files() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "users.json");
        std::fs::write(dir.path().join("notes.txt"), b"hi").unwrap();
        std::fs::create_dir_all(dir.path().join("empty.json")).unwrap();

        let table = build_index(dir.path()).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_build_skips_undecodable_names() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "users.json");
        touch(dir.path(), "bad@%FF.json");
        touch(dir.path(), "worse@a@b.json");

        let table = build_index(dir.path()).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_query_disambiguation() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "foo@a%3D1.json");
        touch(dir.path(), "foo@a%3D2.json");

        let table = build_index(dir.path()).unwrap();

        assert_eq!(file_name(table.lookup("/foo", "a=1").unwrap()), "foo@a%3D1.json");
        assert_eq!(file_name(table.lookup("/foo", "a=2").unwrap()), "foo@a%3D2.json");
        assert!(table.lookup("/foo", "a=3").is_none());
        assert!(table.lookup("/foo", "").is_none());
    }

    #[test]
    fn test_query_match_is_exact() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "foo@a%3D1%26b%3D2.json");

        let table = build_index(dir.path()).unwrap();

        assert!(table.lookup("/foo", "a=1&b=2").is_some());
        assert!(table.lookup("/foo", "b=2&a=1").is_none());
    }

    #[test]
    fn test_exact_query_beats_fallback() {
        let dir = TempDir::new().unwrap();
        // "foo.json" sorts before "foo@..." but must not shadow the exact match
        touch(dir.path(), "foo.json");
        touch(dir.path(), "foo@a%3D1.json");

        let table = build_index(dir.path()).unwrap();

        assert_eq!(file_name(table.lookup("/foo", "a=1").unwrap()), "foo@a%3D1.json");
        assert_eq!(file_name(table.lookup("/foo", "zzz").unwrap()), "foo.json");
        assert_eq!(file_name(table.lookup("/foo", "").unwrap()), "foo.json");
    }

    #[test]
    fn test_duplicates_first_in_sorted_order_wins() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "foo@a=1.json");
        touch(dir.path(), "foo@a%3D1.json");

        let table = build_index(dir.path()).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(file_name(table.lookup("/foo", "a=1").unwrap()), "foo@a%3D1.json");
    }

    #[test]
    fn test_reindexing_is_deterministic() {
        let dir = TempDir::new().unwrap();
        for name in ["b.json", "a.json", "b@x%3D1.json", "b@x=1.json", "c/d.json"] {
            touch(dir.path(), name);
        }

        let first = build_index(dir.path()).unwrap();
        let second = build_index(dir.path()).unwrap();

        for (path, query) in [("/b", "x=1"), ("/b", ""), ("/a", "q"), ("/c/d", "")] {
            assert_eq!(first.lookup(path, query), second.lookup(path, query));
        }
    }

    #[test]
    fn test_recorded_path_with_empty_segment_is_found() {
        let dir = TempDir::new().unwrap();
        let identity = crate::identity::RequestIdentity::new("/a//b", "");
        let relative = crate::identity::encode(&identity, None).unwrap();

        let artifact = crate::storage::CachedArtifact {
            status: 200,
            headers: crate::storage::HeaderMultimap::new(),
            body: bytes::Bytes::from_static(b"{}"),
        };
        crate::storage::write_artifact(dir.path(), &relative, &artifact).unwrap();

        let table = build_index(dir.path()).unwrap();
        assert!(table.lookup("/a//b", "").is_some());
        assert!(table.lookup("/a/b", "").is_some());
    }

    #[test]
    fn test_lookup_normalizes_path() {
        let table = RouteTable::from_entries([RouteEntry {
            route_path: "/users".to_string(),
            expected_query: None,
            artifact: PathBuf::from("users.json"),
        }]);

        assert!(table.lookup("/users", "").is_some());
        assert!(table.lookup("/users/", "").is_some());
        assert!(table.lookup("/users.json", "").is_some());
    }

    #[test]
    fn test_build_missing_root() {
        let dir = TempDir::new().unwrap();
        let result = build_index(&dir.path().join("nope"));
        assert!(matches!(result, Err(ApiReplayError::Index { .. })));
    }

    #[test]
    fn test_build_root_is_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.json");
        std::fs::write(&file, b"{}").unwrap();

        let result = build_index(&file);
        assert!(matches!(result, Err(ApiReplayError::Index { .. })));
    }

    #[test]
    fn test_display_route() {
        let entry = RouteEntry {
            route_path: "/foo".to_string(),
            expected_query: Some("a=1".to_string()),
            artifact: PathBuf::from("foo@a%3D1.json"),
        };
        assert_eq!(entry.display_route(), "/foo?a=1");
    }
}
