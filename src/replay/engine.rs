//! Replay engine for serving recorded responses

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, warn};

use crate::storage::{load_artifact, CachedArtifact};
use crate::{ApiReplayError, Result};

use super::index::{RouteEntry, RouteTable};

/// Replay engine over a frozen route table
pub struct ReplayEngine {
    root: PathBuf,
    table: RouteTable,
    hits: AtomicUsize,
    misses: AtomicUsize,
    failures: AtomicUsize,
}

impl ReplayEngine {
    /// Index `root` and create an engine serving it
    ///
    /// # Errors
    ///
    /// Returns `Index` if the directory cannot be traversed
    pub fn build(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let table = RouteTable::build(&root)?;
        Ok(Self::from_table(root, table))
    }

    /// Create an engine from an already built table
    #[must_use]
    pub fn from_table(root: PathBuf, table: RouteTable) -> Self {
        Self {
            root,
            table,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    /// Find the route entry for a request
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no entry matches
    pub fn resolve(&self, path: &str, query: &str) -> Result<&RouteEntry> {
        self.table.lookup(path, query).ok_or_else(|| {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!("No route for {} (query {:?})", path, query);
            ApiReplayError::NotFound {
                path: path.to_string(),
                query: query.to_string(),
            }
        })
    }

    /// Resolve a request and load its recorded response
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no entry matches, `ArtifactMissing` if the backing
    /// file was removed after indexing, `ArtifactCorrupt` if it no longer parses
    pub async fn replay(&self, path: &str, query: &str) -> Result<CachedArtifact> {
        let entry = self.resolve(path, query)?;

        match load_artifact(&entry.artifact).await {
            Ok(artifact) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Replaying {} -> {} ({})",
                    entry.display_route(),
                    artifact.status,
                    entry.artifact.display()
                );
                Ok(artifact)
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!("Failed to replay {}: {}", entry.display_route(), e);
                Err(e)
            }
        }
    }

    /// Storage root this engine was built from
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The frozen route table
    #[must_use]
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Get replay statistics
    #[must_use]
    pub fn stats(&self) -> ReplayStats {
        ReplayStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            routes: self.table.len(),
        }
    }
}

/// Replay statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    /// Requests answered from an artifact
    pub hits: usize,
    /// Requests with no matching route
    pub misses: usize,
    /// Requests whose artifact was missing or corrupt
    pub failures: usize,
    /// Number of indexed routes
    pub routes: usize,
}

impl ReplayStats {
    /// Hit rate (0.0 to 1.0)
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.failures;

        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, name: &str, contents: &str) -> PathBuf {
        let path = root.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn test_replay_hit() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "users.json",
            r#"{"status": 201, "headers": {"X-Test": ["v1"]}, "body": {"a":1}}"#,
        );

        let engine = ReplayEngine::build(dir.path()).unwrap();
        let artifact = engine.replay("/users", "").await.unwrap();

        assert_eq!(artifact.status, 201);
        assert_eq!(artifact.body.as_ref(), br#"{"a":1}"#);
        assert_eq!(engine.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_replay_miss() {
        let dir = TempDir::new().unwrap();
        let engine = ReplayEngine::build(dir.path()).unwrap();

        let result = engine.replay("/users", "").await;

        assert!(matches!(result, Err(ApiReplayError::NotFound { .. })));
        assert_eq!(engine.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_replay_missing_file_after_indexing() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "users.json", r#"{"status": 200, "body": []}"#);

        let engine = ReplayEngine::build(dir.path()).unwrap();
        std::fs::remove_file(path).unwrap();

        let result = engine.replay("/users", "").await;

        assert!(matches!(result, Err(ApiReplayError::ArtifactMissing(_))));
        assert_eq!(engine.stats().failures, 1);
        assert_eq!(engine.stats().misses, 0);
    }

    #[tokio::test]
    async fn test_replay_corrupt_file() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "users.json", "{ nope");

        let engine = ReplayEngine::build(dir.path()).unwrap();
        let result = engine.replay("/users", "").await;

        assert!(matches!(result, Err(ApiReplayError::ArtifactCorrupt { .. })));
    }

    #[test]
    fn test_stats_hit_rate() {
        let stats = ReplayStats {
            hits: 1,
            misses: 1,
            failures: 0,
            routes: 3,
        };
        assert!((stats.hit_rate() - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_build_fails_on_missing_root() {
        let dir = TempDir::new().unwrap();
        let result = ReplayEngine::build(dir.path().join("missing"));
        assert!(matches!(result, Err(ApiReplayError::Index { .. })));
    }
}
