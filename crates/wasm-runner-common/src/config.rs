//! Configuration structures for wasm-runner.
//!
//! - [`RunnerConfig`]: Top-level configuration containing all settings
//! - [`EngineConfig`]: Wasmtime engine settings (optimization, debug info, caching)
//! - [`ExecutionConfig`]: How a single run links and starts the guest

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Top-level runner configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// Wasmtime engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Per-run execution configuration.
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// Which host imports are supplied when instantiating the module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Pick a mode from the imports the module declares.
    #[default]
    Auto,
    /// Instantiate with no import object at all.
    None,
    /// TinyGo `wasm_exec` compatible imports (`gojs` plus WASI preview1).
    Go,
    /// WASI preview1 imports only.
    Wasi,
}

impl ImportMode {
    /// Lowercase name, as accepted on the command line.
    pub const fn as_str(self) -> &'static str {
        match self {
            ImportMode::Auto => "auto",
            ImportMode::None => "none",
            ImportMode::Go => "go",
            ImportMode::Wasi => "wasi",
        }
    }
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(ImportMode::Auto),
            "none" => Ok(ImportMode::None),
            "go" | "gojs" | "tinygo" => Ok(ImportMode::Go),
            "wasi" => Ok(ImportMode::Wasi),
            other => Err(format!(
                "unknown import mode '{other}' (expected auto, none, go or wasi)"
            )),
        }
    }
}

/// Cranelift optimization level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptLevel {
    /// No optimizations; fastest compile.
    None,
    /// Optimize for speed.
    #[default]
    Speed,
    /// Optimize for speed and code size.
    SpeedAndSize,
}

/// Wasmtime engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Cranelift optimization level.
    #[serde(default)]
    pub opt_level: OptLevel,

    /// Emit DWARF debug info for guest code.
    #[serde(default)]
    pub debug_info: bool,

    /// Capture wasm backtraces on traps.
    ///
    /// Backtraces make trap messages much more useful when a test fails.
    #[serde(default = "defaults::wasm_backtrace")]
    pub wasm_backtrace: bool,

    /// Cache compiled machine code using wasmtime's default cache settings.
    #[serde(default)]
    pub cache_compiled_modules: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            opt_level: OptLevel::default(),
            debug_info: false,
            wasm_backtrace: defaults::wasm_backtrace(),
            cache_compiled_modules: false,
        }
    }
}

/// Per-run execution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// Which import object to supply.
    #[serde(default)]
    pub imports: ImportMode,

    /// Export invoked by the bare and WASI shims.
    #[serde(default = "defaults::entry_point")]
    pub entry_point: String,

    /// Environment variables visible to the guest.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Pass the host process environment through to the guest.
    #[serde(default)]
    pub inherit_env: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            imports: ImportMode::default(),
            entry_point: defaults::entry_point(),
            env: BTreeMap::new(),
            inherit_env: false,
        }
    }
}

/// Default value functions for serde.
mod defaults {
    pub const fn wasm_backtrace() -> bool {
        true
    }

    pub fn entry_point() -> String {
        "_start".to_string()
    }
}
