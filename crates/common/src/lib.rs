//! Flowboard Common Utilities
//!
//! Shared infrastructure for all Flowboard crates:
//! - Error types and result aliases
//! - Clock utilities for job timers and output frame time
//! - Cooperative cancellation
//! - Tracing/logging initialization
//! - Configuration loading

pub mod cancel;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use cancel::*;
pub use clock::*;
pub use config::*;
pub use error::*;
