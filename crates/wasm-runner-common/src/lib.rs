//! Common types, errors, and configuration for wasm-runner.
//!
//! This crate provides shared functionality used across the workspace:
//! - Error types using `thiserror`
//! - Configuration structures and the TOML config file

pub mod config;
pub mod config_file;
pub mod error;

pub use config::{EngineConfig, ExecutionConfig, ImportMode, OptLevel, RunnerConfig};
pub use config_file::{ConfigFile, ConfigFileError, LogFormat, LoggingConfig};
pub use error::{ErrorKind, RunnerError};
