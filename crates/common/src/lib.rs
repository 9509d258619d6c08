//! Heatreel Common Utilities
//!
//! Shared infrastructure for all Heatreel crates:
//! - Error types and result aliases
//! - Tracing/logging initialization
//! - Application configuration loading

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
