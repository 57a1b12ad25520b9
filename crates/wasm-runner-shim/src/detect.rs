//! Choosing a shim from configuration or from the module itself.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tracing::info;
use wasmtime::{Instance, Linker, Store};

use crate::go::{GOJS_NAMESPACE, LEGACY_NAMESPACE};
use crate::wasi::WASI_PREVIEW1;
use crate::{BareShim, GoShim, WasiShim};
use wasm_runner_common::{ExecutionConfig, ImportMode, RunnerError};
use wasm_runner_core::{CompiledModule, RunnerContext, Shim};

/// Pick an import mode from the imports a module declares.
///
/// - No imports: [`ImportMode::None`]
/// - Any `gojs` import, or an `env` import from the Go runtime: [`ImportMode::Go`]
/// - Only `wasi_snapshot_preview1` imports: [`ImportMode::Wasi`]
/// - Anything else: [`ImportMode::Go`]
///
/// Never returns [`ImportMode::Auto`].
pub fn detect_import_mode(module: &CompiledModule) -> ImportMode {
    if !module.has_imports() {
        return ImportMode::None;
    }

    let go_runtime = module.imports().iter().any(|import| {
        import.module == GOJS_NAMESPACE
            || (import.module == LEGACY_NAMESPACE
                && (import.name.starts_with("runtime.") || import.name.starts_with("syscall/js.")))
    });
    if go_runtime {
        return ImportMode::Go;
    }

    if module
        .import_modules()
        .into_iter()
        .all(|namespace| namespace == WASI_PREVIEW1)
    {
        ImportMode::Wasi
    } else {
        ImportMode::Go
    }
}

/// Build the shim for an import mode.
pub fn shim_for(mode: ImportMode, config: &ExecutionConfig) -> Arc<dyn Shim> {
    match mode {
        ImportMode::Auto => Arc::new(AutoShim::new(config)),
        ImportMode::None => Arc::new(BareShim::new(config.entry_point.clone())),
        ImportMode::Go => Arc::new(GoShim::new()),
        ImportMode::Wasi => Arc::new(WasiShim::new(config.entry_point.clone())),
    }
}

/// Shim that inspects the module on first use and delegates to the matching
/// concrete shim for the rest of the run.
pub struct AutoShim {
    config: ExecutionConfig,
    selected: OnceLock<(ImportMode, Arc<dyn Shim>)>,
}

impl AutoShim {
    /// Create an undecided auto shim.
    pub fn new(config: &ExecutionConfig) -> Self {
        Self {
            config: config.clone(),
            selected: OnceLock::new(),
        }
    }

    /// The mode chosen so far, if a module has been seen.
    pub fn selected_mode(&self) -> Option<ImportMode> {
        self.selected.get().map(|(mode, _)| *mode)
    }

    fn select(&self, module: &CompiledModule) -> &dyn Shim {
        let (_, shim) = self.selected.get_or_init(|| {
            let mode = detect_import_mode(module);
            info!(
                mode = %mode,
                imports = module.imports().len(),
                "Import mode detected"
            );
            (mode, shim_for(mode, &self.config))
        });
        shim.as_ref()
    }
}

#[async_trait]
impl Shim for AutoShim {
    fn name(&self) -> &'static str {
        self.selected
            .get()
            .map_or("auto", |(_, shim)| shim.name())
    }

    fn supplies_imports(&self, module: &CompiledModule) -> bool {
        self.select(module).supplies_imports(module)
    }

    fn build_imports(
        &self,
        linker: &mut Linker<RunnerContext>,
        module: &CompiledModule,
    ) -> Result<(), RunnerError> {
        self.select(module).build_imports(linker, module)
    }

    async fn run(
        &self,
        store: &mut Store<RunnerContext>,
        instance: Instance,
    ) -> Result<i32, RunnerError> {
        let Some((_, shim)) = self.selected.get() else {
            return Err(RunnerError::invalid_config(
                "auto shim ran before a module was selected",
            ));
        };
        shim.run(store, instance).await
    }
}

impl std::fmt::Debug for AutoShim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoShim")
            .field("selected", &self.selected_mode())
            .finish_non_exhaustive()
    }
}
