//! The seam between the runner and a host compatibility layer.
//!
//! A [`Shim`] owns two things the runner never inspects:
//! the import object a module is linked against, and the convention for
//! starting the guest once it is instantiated.

use async_trait::async_trait;
use wasmtime::{Instance, Linker, Store};

use crate::CompiledModule;
use crate::store::RunnerContext;
use wasm_runner_common::RunnerError;

/// Host compatibility layer for a family of guest modules.
#[async_trait]
pub trait Shim: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether instantiation should receive this shim's import object.
    ///
    /// A shim that returns `false` is instantiated against an empty linker,
    /// so any import the module declares makes instantiation fail.
    fn supplies_imports(&self, _module: &CompiledModule) -> bool {
        true
    }

    /// Define the host bindings the module expects.
    fn build_imports(
        &self,
        linker: &mut Linker<RunnerContext>,
        module: &CompiledModule,
    ) -> Result<(), RunnerError>;

    /// Start the guest and drive it until it returns or exits.
    ///
    /// Returns the guest's exit code.
    async fn run(
        &self,
        store: &mut Store<RunnerContext>,
        instance: Instance,
    ) -> Result<i32, RunnerError>;
}
