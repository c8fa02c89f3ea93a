//! Error types shared across the crate.
//!
//! Every concern gets its own enum in [`types`]; poll-time failures are
//! expressed as [`types::ApiError`] and never escape the controller.

pub mod types;
