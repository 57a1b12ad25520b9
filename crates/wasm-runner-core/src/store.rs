//! Per-run execution context and store management.
//!
//! This module provides:
//! - [`RunnerContext`]: State owned by the [`Store`] and reachable from host functions
//! - [`GuestScheduler`]: Clock and pending wake-up for guests with their own scheduler
//! - [`GuestOptions`]: Arguments and stdio handling for one run

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::debug;
use uuid::Uuid;
use wasmtime::Store;
use wasmtime_wasi::WasiCtxBuilder;
use wasmtime_wasi::pipe::MemoryOutputPipe;
use wasmtime_wasi::preview1::WasiP1Ctx;

use crate::WasmEngine;
use wasm_runner_common::ExecutionConfig;

/// Upper bound on captured guest output per stream.
const CAPTURE_CAPACITY: usize = 4 * 1024 * 1024;

/// Per-run execution context.
///
/// Created once per process invocation and dropped when the process exits.
/// Host functions reach it through [`wasmtime::Caller::data_mut`].
pub struct RunnerContext {
    /// WASI preview1 context backing `wasi_snapshot_preview1` imports.
    wasi: WasiP1Ctx,

    /// Unique run identifier for tracing.
    pub run_id: String,

    /// Guest-visible clock and pending wake-up.
    pub scheduler: GuestScheduler,

    /// In-memory stdout/stderr when capture was requested.
    output: Option<CapturedOutput>,
}

struct CapturedOutput {
    stdout: MemoryOutputPipe,
    stderr: MemoryOutputPipe,
}

/// How the guest's process environment is set up.
#[derive(Debug, Clone, Default)]
pub struct GuestOptions {
    /// Guest `argv`, including `argv[0]`.
    pub args: Vec<String>,

    /// Capture stdout/stderr in memory instead of inheriting the host's.
    pub capture_output: bool,
}

impl GuestOptions {
    /// Options with the given `argv` and inherited stdio.
    pub fn with_args(args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            capture_output: false,
        }
    }

    /// Capture guest output in memory.
    #[must_use]
    pub fn captured(mut self) -> Self {
        self.capture_output = true;
        self
    }
}

/// Guest-visible clock plus the single wake-up a cooperative guest scheduler
/// may request before yielding back to the host.
#[derive(Debug, Clone)]
pub struct GuestScheduler {
    /// Wall-clock time at `clock`'s origin, in milliseconds since the epoch.
    origin_ms: f64,
    clock: Instant,
    pending_wakeup: Option<Duration>,
}

impl GuestScheduler {
    /// Start a clock anchored at the current wall-clock time.
    pub fn new() -> Self {
        let origin_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |d| d.as_secs_f64() * 1000.0);

        Self {
            origin_ms,
            clock: Instant::now(),
            pending_wakeup: None,
        }
    }

    /// Milliseconds since the Unix epoch, advancing monotonically.
    pub fn now_ms(&self) -> f64 {
        self.origin_ms + self.clock.elapsed().as_secs_f64() * 1000.0
    }

    /// Request that the host resume the guest after `delay`.
    ///
    /// A later request replaces an earlier one.
    pub fn schedule_wakeup(&mut self, delay: Duration) {
        self.pending_wakeup = Some(delay);
    }

    /// Take the pending wake-up, if any.
    pub fn take_wakeup(&mut self) -> Option<Duration> {
        self.pending_wakeup.take()
    }
}

impl Default for GuestScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RunnerContext {
    /// Create a new context.
    ///
    /// # Arguments
    ///
    /// * `run_id` - Unique identifier for this run (for tracing)
    /// * `config` - Environment settings
    /// * `options` - Guest argv and stdio handling
    pub fn new(run_id: String, config: &ExecutionConfig, options: &GuestOptions) -> Self {
        let mut builder = WasiCtxBuilder::new();
        builder.args(options.args.as_slice());

        if config.inherit_env {
            builder.inherit_env();
        }
        for (key, value) in &config.env {
            builder.env(key, value);
        }

        let output = if options.capture_output {
            let stdout = MemoryOutputPipe::new(CAPTURE_CAPACITY);
            let stderr = MemoryOutputPipe::new(CAPTURE_CAPACITY);
            builder.stdout(stdout.clone()).stderr(stderr.clone());
            Some(CapturedOutput { stdout, stderr })
        } else {
            builder.inherit_stdio();
            None
        };

        Self {
            wasi: builder.build_p1(),
            run_id,
            scheduler: GuestScheduler::new(),
            output,
        }
    }

    /// WASI preview1 context, for linking `wasi_snapshot_preview1`.
    pub fn wasi_mut(&mut self) -> &mut WasiP1Ctx {
        &mut self.wasi
    }

    /// Captured guest stdout, if capture was requested.
    pub fn captured_stdout(&self) -> Option<Vec<u8>> {
        self.output.as_ref().map(|o| o.stdout.contents().to_vec())
    }

    /// Captured guest stderr, if capture was requested.
    pub fn captured_stderr(&self) -> Option<Vec<u8>> {
        self.output.as_ref().map(|o| o.stderr.contents().to_vec())
    }
}

/// Create a new Wasmtime store for one run.
pub fn create_store(
    engine: &WasmEngine,
    config: &ExecutionConfig,
    options: &GuestOptions,
) -> Store<RunnerContext> {
    let run_id = Uuid::new_v4().to_string();
    debug!(run_id = %run_id, args = ?options.args, "Creating store");

    Store::new(engine.inner(), RunnerContext::new(run_id, config, options))
}
