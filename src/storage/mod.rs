//! On-disk storage for recorded responses

mod format;
mod reader;
mod writer;

pub use format::{decode_artifact, encode_artifact, BodyEncoding, CachedArtifact, HeaderMultimap};
pub use reader::{load_artifact, read_artifact};
pub use writer::write_artifact;
