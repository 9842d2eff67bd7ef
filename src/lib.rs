//! API Replay - record HTTP API responses and serve them back from disk
//!
//! A recording is one JSON artifact per `GET <path>?<query>`, laid out so the
//! directory tree mirrors the API. Serving indexes that tree once and answers
//! requests from it with exact query matching.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod error;
pub mod identity;
pub mod inspect;
pub mod network;
pub mod recording;
pub mod replay;
pub mod storage;

pub use error::{ApiReplayError, Result};
