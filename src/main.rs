//! wasm-runner CLI entry point.
//!
//! Loads one WebAssembly module, links the selected shim, runs it, and exits
//! with the guest's status.

mod cli;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;
use wasm_runner_common::{ConfigFile, LogFormat, LoggingConfig};
use wasm_runner_core::{GuestOptions, Runner, WasmEngine, create_store};
use wasm_runner_shim::shim_for;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let file = match &cli.config {
        Some(path) => ConfigFile::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ConfigFile::default(),
    };

    init_tracing(&file.logging, cli.verbose, cli.log_format);

    let config = cli.apply(file.runner);
    debug!(?config, "Configuration loaded");

    let engine = WasmEngine::new(&config.engine)?;
    let shim = shim_for(config.execution.imports, &config.execution);

    let options = GuestOptions::with_args(cli.guest_argv());
    let mut store = create_store(&engine, &config.execution, &options);

    let mut runner = Runner::new(engine, shim);
    let outcome = runner
        .execute(&mut store, &cli.module)
        .await
        .with_context(|| format!("Failed to run {}", cli.module.display()))?;

    info!(
        exit_code = outcome.exit_code,
        duration_ms = outcome.duration.as_millis(),
        "Run complete"
    );

    Ok(exit_status(outcome.exit_code))
}

/// Initialize tracing on stderr so guest stdout stays untouched.
fn init_tracing(config: &LoggingConfig, verbose: bool, format: Option<LogFormat>) {
    let default_level = if verbose { "debug" } else { config.level.as_str() };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    match format.unwrap_or(config.format) {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

/// Map a guest exit code onto a process status.
///
/// Codes outside `1..=255` are reported as 1 so a failing guest never looks
/// successful after truncation.
fn exit_status(code: i32) -> ExitCode {
    if code == 0 {
        return ExitCode::SUCCESS;
    }
    u8::try_from(code).map_or(ExitCode::FAILURE, ExitCode::from)
}
