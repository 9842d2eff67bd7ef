//! Replay of recorded responses from a directory of artifacts
//!
//! Serving has two phases. Indexing walks the storage root once and freezes
//! the result into a [`RouteTable`]; serving then only reads that table, so
//! it is shared between connections without locks.

mod engine;
mod index;

pub use engine::{ReplayEngine, ReplayStats};
pub use index::{build_index, RouteEntry, RouteTable};
