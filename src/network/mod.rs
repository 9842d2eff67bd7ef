//! Network layer for API Replay
//!
//! Provides the upstream client used while recording and the bounded-
//! concurrency HTTP server used while replaying.

mod client;
mod connection_pool;
mod handler;
mod http;

pub use client::{FetchedResponse, UpstreamClient};
pub use connection_pool::{ConnectionGuard, ConnectionPool};
pub use handler::NetworkHandler;
pub use http::HttpHandler;

/// Maximum number of concurrent connections
pub const MAX_CONNECTIONS: usize = 4096;

/// Upstream connection setup timeout
pub const CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Graceful shutdown timeout
pub const SHUTDOWN_TIMEOUT_MS: u64 = 5000;
