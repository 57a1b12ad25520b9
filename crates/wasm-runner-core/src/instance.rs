//! The load → instantiate → run sequence.
//!
//! [`Runner`] drives a single module through three states:
//!
//! ```text
//! Unloaded ──instantiate──▶ Instantiated ──run──▶ Running
//! ```
//!
//! There are no retries and no backward transitions; any error ends the run.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument};
use wasmtime::{Instance, Linker, Store, Trap};
use wasmtime_wasi::I32Exit;

use crate::WasmEngine;
use crate::module::{CompiledModule, load_binary};
use crate::shim::Shim;
use crate::store::RunnerContext;
use wasm_runner_common::RunnerError;

/// Lifecycle state of a [`Runner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// No instance exists yet.
    Unloaded,
    /// The module is linked and instantiated but has not started.
    Instantiated,
    /// The guest's entry point has been invoked.
    Running,
}

impl RunnerState {
    fn as_str(self) -> &'static str {
        match self {
            RunnerState::Unloaded => "Unloaded",
            RunnerState::Instantiated => "Instantiated",
            RunnerState::Running => "Running",
        }
    }
}

/// Result of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Exit code reported by the guest, 0 if it returned normally.
    pub exit_code: i32,
    /// Time spent inside the shim's `run`.
    pub duration: Duration,
}

impl RunOutcome {
    /// Returns `true` if the guest exited with code 0.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// How a call into the guest ended, when it did not trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// The export returned normally.
    Returned,
    /// The guest called `proc_exit` with this code.
    Exited(i32),
}

/// Drives one module through load, instantiate and run.
pub struct Runner {
    engine: WasmEngine,
    shim: Arc<dyn Shim>,
    state: RunnerState,
}

impl Runner {
    /// Create a runner in the `Unloaded` state.
    pub fn new(engine: WasmEngine, shim: Arc<dyn Shim>) -> Self {
        Self {
            engine,
            shim,
            state: RunnerState::Unloaded,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// The shim this runner links and starts modules with.
    pub fn shim(&self) -> &dyn Shim {
        self.shim.as_ref()
    }

    /// Compile loaded bytes against this runner's engine.
    pub fn compile(&self, bytes: &[u8]) -> Result<CompiledModule, RunnerError> {
        CompiledModule::from_bytes(self.engine.inner(), bytes)
    }

    /// Ask the shim for the import object this module should be linked against.
    pub fn build_import_object(
        &self,
        module: &CompiledModule,
    ) -> Result<Linker<RunnerContext>, RunnerError> {
        let mut linker = Linker::new(self.engine.inner());
        self.shim.build_imports(&mut linker, module)?;
        Ok(linker)
    }

    /// Instantiate the module, with the given import object or none at all.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Instantiation`] if linking fails, including when
    /// no import object is supplied and the module declares imports. A trap or
    /// exit raised by the module's start function is [`RunnerError::Trap`].
    #[instrument(skip_all, fields(content_hash = %module.content_hash(), with_imports = imports.is_some()))]
    pub async fn instantiate(
        &mut self,
        store: &mut Store<RunnerContext>,
        module: &CompiledModule,
        imports: Option<&Linker<RunnerContext>>,
    ) -> Result<Instance, RunnerError> {
        self.expect_state(RunnerState::Unloaded)?;

        let empty;
        let linker = if let Some(linker) = imports {
            linker
        } else {
            empty = Linker::new(self.engine.inner());
            &empty
        };

        let instance = linker
            .instantiate_async(&mut *store, module.as_module())
            .await
            .map_err(classify_instantiation)?;

        self.state = RunnerState::Instantiated;
        debug!("Module instantiated");

        Ok(instance)
    }

    /// Hand the instance to the shim's entry convention.
    #[instrument(skip_all, fields(shim = self.shim.name()))]
    pub async fn run(
        &mut self,
        store: &mut Store<RunnerContext>,
        instance: Instance,
    ) -> Result<RunOutcome, RunnerError> {
        self.expect_state(RunnerState::Instantiated)?;
        self.state = RunnerState::Running;

        let start = Instant::now();
        let result = self.shim.run(store, instance).await;
        let duration = start.elapsed();

        match result {
            Ok(exit_code) => {
                info!(
                    exit_code,
                    duration_ms = duration.as_millis(),
                    "Guest finished"
                );
                Ok(RunOutcome {
                    exit_code,
                    duration,
                })
            }
            Err(e) => {
                error!(duration_ms = duration.as_millis(), error = %e, "Guest failed");
                Err(e)
            }
        }
    }

    /// Load the file at `path`, instantiate it, and run it to completion.
    #[instrument(skip_all, fields(path = %path.as_ref().display(), run_id = %store.data().run_id))]
    pub async fn execute(
        &mut self,
        store: &mut Store<RunnerContext>,
        path: impl AsRef<Path>,
    ) -> Result<RunOutcome, RunnerError> {
        let bytes = load_binary(path).await?;
        let module = self.compile(&bytes)?;
        drop(bytes);

        let imports = if self.shim.supplies_imports(&module) {
            Some(self.build_import_object(&module)?)
        } else {
            None
        };

        let instance = self.instantiate(store, &module, imports.as_ref()).await?;
        self.run(store, instance).await
    }

    fn expect_state(&self, expected: RunnerState) -> Result<(), RunnerError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(RunnerError::InvalidState {
                expected: expected.as_str(),
                actual: self.state.as_str(),
            })
        }
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("shim", &self.shim.name())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Call a `() -> ()` export and classify how it ended.
///
/// # Errors
///
/// Returns [`RunnerError::EntryPointNotFound`] if the export is missing or has
/// another signature, and [`RunnerError::Trap`] if the guest traps.
pub async fn call_export(
    store: &mut Store<RunnerContext>,
    instance: Instance,
    name: &str,
) -> Result<CallOutcome, RunnerError> {
    let func = instance
        .get_typed_func::<(), ()>(&mut *store, name)
        .map_err(|_| RunnerError::entry_point_not_found(name))?;

    debug!(export = name, "Calling guest export");
    classify_call(func.call_async(&mut *store, ()).await)
}

/// Map the result of a guest call onto [`CallOutcome`] or a trap error.
///
/// WASI only represents exit statuses in `0..126`. A guest that passes a
/// larger value to `proc_exit` gets an error instead of an exit, and that is
/// reported as a trap.
pub fn classify_call(result: wasmtime::Result<()>) -> Result<CallOutcome, RunnerError> {
    match result {
        Ok(()) => Ok(CallOutcome::Returned),
        Err(e) => {
            if let Some(exit) = e.downcast_ref::<I32Exit>() {
                return Ok(CallOutcome::Exited(exit.0));
            }
            Err(trap_error(&e))
        }
    }
}

/// Split instantiation failures into link errors and guest failures.
///
/// The start function runs during instantiation, so its traps and exits are
/// execution errors rather than instantiation errors.
fn classify_instantiation(e: wasmtime::Error) -> RunnerError {
    if e.downcast_ref::<Trap>().is_some() || e.downcast_ref::<I32Exit>().is_some() {
        trap_error(&e)
    } else {
        RunnerError::instantiation(format!("{e:#}"))
    }
}

fn trap_error(e: &wasmtime::Error) -> RunnerError {
    let code = e.downcast_ref::<Trap>().map(|trap| format!("{trap:?}"));
    RunnerError::trap(format!("{e:#}"), code)
}
