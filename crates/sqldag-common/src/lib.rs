//! sqldag Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared infrastructure for the sqldag workspace members.
//!
//! - **Logging**: one place to configure `tracing` output for the engine and the CLI

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel, LogOutput};
