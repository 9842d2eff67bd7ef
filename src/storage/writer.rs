//! Artifact file writer

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use super::format::{encode_artifact, CachedArtifact};
use crate::identity::to_fs_path;
use crate::Result;

/// Write an artifact under `root` at the slash-separated `relative` path
///
/// The data goes to a temporary file in the target directory which is then
/// renamed into place, so readers never observe a partial artifact.
///
/// # Errors
///
/// Returns error if directories cannot be created or the file cannot be written
pub fn write_artifact(root: &Path, relative: &str, artifact: &CachedArtifact) -> Result<PathBuf> {
    let path = to_fs_path(root, relative);
    let parent = path.parent().unwrap_or(root);
    std::fs::create_dir_all(parent)?;

    let data = encode_artifact(artifact)?;

    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(&data)?;
    file.as_file().sync_all()?;
    file.persist(&path).map_err(|e| e.error)?;

    debug!("Wrote {} bytes to {}", data.len(), path.display());
    Ok(path)
}
