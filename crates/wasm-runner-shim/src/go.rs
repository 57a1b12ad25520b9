//! TinyGo `wasm_exec` compatible shim.
//!
//! TinyGo's `-target wasm` output expects the `Go` object from `wasm_exec.js`:
//! WASI preview1 for stdio and randomness, plus a `gojs` namespace (`env` in
//! older toolchains) for the clock, timers and `syscall/js`. This shim
//! provides the clock and timer functions natively. There is no JavaScript
//! host behind `syscall/js`, so those imports are linked as traps: a program
//! that touches them fails loudly instead of failing to instantiate.
//!
//! # Run convention
//!
//! 1. Call `_start`.
//! 2. While the guest has not exited and has asked for a wake-up through
//!    `runtime.sleepTicks`, sleep for the requested time and call
//!    `go_scheduler`.
//! 3. The exit code is the one passed to `proc_exit`, or 0.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use wasmtime::{Caller, Instance, Linker, Store};

use crate::wasi::{WASI_PREVIEW1, link_wasi};
use wasm_runner_common::RunnerError;
use wasm_runner_core::{
    CallOutcome, CompiledModule, ImportDescriptor, RunnerContext, Shim, call_export,
};

/// Current TinyGo import namespace.
pub const GOJS_NAMESPACE: &str = "gojs";

/// Namespace used by TinyGo releases before the `gojs` rename.
pub const LEGACY_NAMESPACE: &str = "env";

/// Export called once `_start` has returned.
pub const START_EXPORT: &str = "_start";

/// Export that resumes the guest scheduler after a timer fires.
pub const SCHEDULER_EXPORT: &str = "go_scheduler";

const TICKS: &str = "runtime.ticks";
const SLEEP_TICKS: &str = "runtime.sleepTicks";

/// Shim reproducing the `Go` class of TinyGo's `wasm_exec.js`.
#[derive(Debug, Clone, Default)]
pub struct GoShim;

impl GoShim {
    /// Create a new Go shim.
    pub fn new() -> Self {
        Self
    }

    /// The namespace the module imports its runtime functions from.
    pub fn namespace(module: &CompiledModule) -> &'static str {
        if module
            .imports()
            .iter()
            .any(|import| import.module == GOJS_NAMESPACE)
        {
            GOJS_NAMESPACE
        } else {
            LEGACY_NAMESPACE
        }
    }
}

/// Register `runtime.ticks() -> f64`.
///
/// Returns milliseconds since the Unix epoch, advanced by a monotonic clock
/// so the guest never observes time going backwards.
pub fn register_ticks(
    linker: &mut Linker<RunnerContext>,
    namespace: &str,
) -> Result<(), RunnerError> {
    linker
        .func_wrap(
            namespace,
            TICKS,
            |caller: Caller<'_, RunnerContext>| -> f64 { caller.data().scheduler.now_ms() },
        )
        .map_err(|e| {
            RunnerError::invalid_config(format!("Failed to register runtime.ticks: {e}"))
        })?;

    Ok(())
}

/// Register `runtime.sleepTicks(timeout: f64)`.
///
/// The guest calls this right before returning to the host when all its
/// goroutines are blocked on a timer. The host resumes it through
/// [`SCHEDULER_EXPORT`] once `timeout` milliseconds have passed.
pub fn register_sleep_ticks(
    linker: &mut Linker<RunnerContext>,
    namespace: &str,
) -> Result<(), RunnerError> {
    linker
        .func_wrap(
            namespace,
            SLEEP_TICKS,
            |mut caller: Caller<'_, RunnerContext>, timeout: f64| {
                let delay = ticks_to_duration(timeout);
                if delay.is_none() {
                    warn!(timeout, "Invalid sleep duration from guest, waking immediately");
                }

                caller
                    .data_mut()
                    .scheduler
                    .schedule_wakeup(delay.unwrap_or(Duration::ZERO));
            },
        )
        .map_err(|e| {
            RunnerError::invalid_config(format!("Failed to register runtime.sleepTicks: {e}"))
        })?;

    Ok(())
}

/// Returns `true` for imports this shim implements natively.
fn is_provided(import: &ImportDescriptor, namespace: &str) -> bool {
    import.module == WASI_PREVIEW1
        || (import.module == namespace && (import.name == TICKS || import.name == SLEEP_TICKS))
}

/// Convert a tick count (milliseconds as `f64`) into a [`Duration`].
///
/// Returns `None` for NaN, infinities and negative values.
fn ticks_to_duration(ticks: f64) -> Option<Duration> {
    if ticks.is_finite() && ticks >= 0.0 {
        Duration::try_from_secs_f64(ticks / 1000.0).ok()
    } else {
        None
    }
}

#[async_trait]
impl Shim for GoShim {
    fn name(&self) -> &'static str {
        "go"
    }

    fn build_imports(
        &self,
        linker: &mut Linker<RunnerContext>,
        module: &CompiledModule,
    ) -> Result<(), RunnerError> {
        link_wasi(linker)?;

        let namespace = Self::namespace(module);
        register_ticks(linker, namespace)?;
        register_sleep_ticks(linker, namespace)?;

        let unsupported: Vec<String> = module
            .imports()
            .iter()
            .filter(|import| !is_provided(import, namespace))
            .map(|import| format!("{}::{}", import.module, import.name))
            .collect();
        if !unsupported.is_empty() {
            debug!(count = unsupported.len(), imports = ?unsupported, "Linking unsupported imports as traps");
        }

        linker
            .define_unknown_imports_as_traps(module.as_module())
            .map_err(|e| RunnerError::instantiation(format!("{e:#}")))?;

        debug!(namespace, "Go import object built");
        Ok(())
    }

    async fn run(
        &self,
        store: &mut Store<RunnerContext>,
        instance: Instance,
    ) -> Result<i32, RunnerError> {
        if let CallOutcome::Exited(code) = call_export(store, instance, START_EXPORT).await? {
            return Ok(code);
        }

        let mut wakeups = 0u64;
        while let Some(delay) = store.data_mut().scheduler.take_wakeup() {
            wakeups += 1;
            debug!(delay_ms = delay.as_secs_f64() * 1000.0, "Guest sleeping");
            tokio::time::sleep(delay).await;

            if let CallOutcome::Exited(code) =
                call_export(store, instance, SCHEDULER_EXPORT).await?
            {
                info!(wakeups, exit_code = code, "Go program exited");
                return Ok(code);
            }
        }

        info!(wakeups, "Go program returned");
        Ok(0)
    }
}
