//! Wasmtime engine configuration and creation.
//!
//! The [`WasmEngine`] is built once per process. It is configured with async
//! support so that file reads, instantiation and guest calls can all be
//! awaited on the tokio runtime.

use std::sync::Arc;

use tracing::{debug, info};
use wasmtime::{Config, Engine};

use wasm_runner_common::{EngineConfig, OptLevel, RunnerError};

/// Shared WebAssembly engine wrapper.
///
/// # Example
///
/// ```ignore
/// use wasm_runner_common::EngineConfig;
/// use wasm_runner_core::WasmEngine;
///
/// let engine = WasmEngine::new(&EngineConfig::default())?;
/// ```
#[derive(Clone)]
pub struct WasmEngine {
    engine: Arc<Engine>,
    config: EngineConfig,
}

impl WasmEngine {
    /// Create a new WebAssembly engine with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the Wasmtime configuration is invalid or the
    /// compilation cache cannot be set up.
    pub fn new(config: &EngineConfig) -> Result<Self, RunnerError> {
        let mut wasmtime_config = Config::new();

        // Host functions and guest calls are awaited on tokio
        wasmtime_config.async_support(true);

        wasmtime_config.cranelift_opt_level(match config.opt_level {
            OptLevel::None => wasmtime::OptLevel::None,
            OptLevel::Speed => wasmtime::OptLevel::Speed,
            OptLevel::SpeedAndSize => wasmtime::OptLevel::SpeedAndSize,
        });
        wasmtime_config.debug_info(config.debug_info);
        wasmtime_config.wasm_backtrace(config.wasm_backtrace);

        if config.cache_compiled_modules {
            wasmtime_config.cache_config_load_default().map_err(|e| {
                RunnerError::invalid_config(format!("Failed to load compilation cache config: {e}"))
            })?;
            debug!("Compilation cache enabled");
        }

        let engine = Engine::new(&wasmtime_config).map_err(|e| {
            RunnerError::invalid_config(format!("Failed to create Wasmtime engine: {e}"))
        })?;

        info!(opt_level = ?config.opt_level, "Wasmtime engine initialized");

        Ok(Self {
            engine: Arc::new(engine),
            config: config.clone(),
        })
    }

    /// Get a reference to the inner Wasmtime engine.
    pub fn inner(&self) -> &Engine {
        &self.engine
    }

    /// Get the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl std::fmt::Debug for WasmEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmEngine")
            .field("opt_level", &self.config.opt_level)
            .field("wasm_backtrace", &self.config.wasm_backtrace)
            .finish_non_exhaustive()
    }
}
