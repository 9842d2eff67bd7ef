//! Artifact file reader

use std::io;
use std::path::Path;

use super::format::{decode_artifact, CachedArtifact};
use crate::{ApiReplayError, Result};

/// Read and parse an artifact file
///
/// # Errors
///
/// Returns `ArtifactMissing` if the file does not exist, `ArtifactCorrupt` if
/// it cannot be parsed, and `Io` for any other read failure
pub fn read_artifact(path: &Path) -> Result<CachedArtifact> {
    parse(path, std::fs::read(path))
}

/// Read and parse an artifact file without blocking the runtime
///
/// # Errors
///
/// Same as [`read_artifact`]
pub async fn load_artifact(path: &Path) -> Result<CachedArtifact> {
    parse(path, tokio::fs::read(path).await)
}

fn parse(path: &Path, data: io::Result<Vec<u8>>) -> Result<CachedArtifact> {
    let data = match data {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ApiReplayError::ArtifactMissing(path.display().to_string()));
        }
        Err(e) => return Err(ApiReplayError::Io(e)),
    };

    decode_artifact(&data).map_err(|reason| ApiReplayError::ArtifactCorrupt {
        path: path.display().to_string(),
        reason,
    })
}
