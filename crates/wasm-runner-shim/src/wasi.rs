//! WASI preview1 command shim.

use async_trait::async_trait;
use tracing::debug;
use wasmtime::{Instance, Linker, Store};
use wasmtime_wasi::preview1;

use wasm_runner_common::RunnerError;
use wasm_runner_core::{CallOutcome, CompiledModule, RunnerContext, Shim, call_export};

/// Import namespace of WASI preview1.
pub const WASI_PREVIEW1: &str = "wasi_snapshot_preview1";

/// Define every `wasi_snapshot_preview1` function on the linker.
///
/// The functions operate on the [`RunnerContext`]'s WASI context, so guest
/// stdio, argv and environment follow the store's configuration.
pub fn link_wasi(linker: &mut Linker<RunnerContext>) -> Result<(), RunnerError> {
    preview1::add_to_linker_async(linker, RunnerContext::wasi_mut).map_err(|e| {
        RunnerError::invalid_config(format!("Failed to register WASI preview1: {e}"))
    })?;

    debug!("WASI preview1 linked");
    Ok(())
}

/// Links WASI preview1 and runs the module as a command.
///
/// A `proc_exit(n)` from the guest ends the run with exit code `n`.
#[derive(Debug, Clone)]
pub struct WasiShim {
    entry_point: String,
}

impl WasiShim {
    /// Create a shim that calls `entry_point` (normally `_start`).
    pub fn new(entry_point: impl Into<String>) -> Self {
        Self {
            entry_point: entry_point.into(),
        }
    }
}

#[async_trait]
impl Shim for WasiShim {
    fn name(&self) -> &'static str {
        "wasi"
    }

    fn build_imports(
        &self,
        linker: &mut Linker<RunnerContext>,
        _module: &CompiledModule,
    ) -> Result<(), RunnerError> {
        link_wasi(linker)
    }

    async fn run(
        &self,
        store: &mut Store<RunnerContext>,
        instance: Instance,
    ) -> Result<i32, RunnerError> {
        match call_export(store, instance, &self.entry_point).await? {
            CallOutcome::Returned => Ok(0),
            CallOutcome::Exited(code) => Ok(code),
        }
    }
}
