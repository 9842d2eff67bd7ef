//! Recording of single upstream responses into the storage layout

mod engine;

pub use engine::{parse_header, storage_path_for, RecordOutcome, RecordRequest, RecordingEngine};

/// The only method recordings are made with
pub const RECORD_METHOD: &str = "GET";
