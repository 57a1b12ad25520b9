//! Shim that supplies no import object.

use async_trait::async_trait;
use wasmtime::{Instance, Linker, Store};

use wasm_runner_common::RunnerError;
use wasm_runner_core::{CallOutcome, CompiledModule, RunnerContext, Shim, call_export};

/// Instantiates the module with nothing linked and calls a single export.
///
/// Only modules that declare no imports can be run this way; anything else
/// fails at instantiation.
#[derive(Debug, Clone)]
pub struct BareShim {
    entry_point: String,
}

impl BareShim {
    /// Create a shim that calls `entry_point` after instantiation.
    pub fn new(entry_point: impl Into<String>) -> Self {
        Self {
            entry_point: entry_point.into(),
        }
    }
}

#[async_trait]
impl Shim for BareShim {
    fn name(&self) -> &'static str {
        "none"
    }

    fn supplies_imports(&self, _module: &CompiledModule) -> bool {
        false
    }

    fn build_imports(
        &self,
        _linker: &mut Linker<RunnerContext>,
        _module: &CompiledModule,
    ) -> Result<(), RunnerError> {
        Ok(())
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
