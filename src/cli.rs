//! Command-line arguments.

use std::path::{Path, PathBuf};

use clap::Parser;

use wasm_runner_common::{ImportMode, LogFormat, RunnerConfig};

/// Run a WebAssembly module's entry point.
///
/// The exit status is the guest's own exit code, or 1 if the module could not
/// be loaded, failed to instantiate, or trapped.
#[derive(Debug, Parser)]
#[command(name = "wasm-runner", version, about)]
pub struct Cli {
    /// Path to the WebAssembly module.
    pub module: PathBuf,

    /// Arguments passed to the guest after `argv[0]`.
    #[arg(last = true)]
    pub guest_args: Vec<String>,

    /// Host imports to supply: auto, none, go or wasi.
    #[arg(long, env = "WASM_RUNNER_IMPORTS")]
    pub imports: Option<ImportMode>,

    /// Export called by the none and wasi shims.
    #[arg(long)]
    pub entry: Option<String>,

    /// Guest environment variable (repeatable).
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_var)]
    pub env: Vec<(String, String)>,

    /// TOML configuration file.
    #[arg(short, long, env = "WASM_RUNNER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(short, long)]
    pub verbose: bool,

    /// Log output format: text or json.
    #[arg(long)]
    pub log_format: Option<LogFormat>,
}

impl Cli {
    /// Apply command-line overrides on top of file configuration.
    pub fn apply(&self, mut config: RunnerConfig) -> RunnerConfig {
        if let Some(imports) = self.imports {
            config.execution.imports = imports;
        }
        if let Some(entry) = &self.entry {
            config.execution.entry_point.clone_from(entry);
        }
        for (key, value) in &self.env {
            config.execution.env.insert(key.clone(), value.clone());
        }
        config
    }

    /// Guest `argv`: the module's file name followed by the extra arguments.
    pub fn guest_argv(&self) -> Vec<String> {
        std::iter::once(program_name(&self.module))
            .chain(self.guest_args.iter().cloned())
            .collect()
    }
}

fn program_name(module: &Path) -> String {
    module.file_name().map_or_else(
        || module.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

fn parse_env_var(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' in '{s}'"))?;
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
