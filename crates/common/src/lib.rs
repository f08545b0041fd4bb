//! DualSync Common Utilities
//!
//! Shared infrastructure for all DualSync crates:
//! - Error types and result aliases
//! - Sync clock arithmetic between native and common frame axes
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
