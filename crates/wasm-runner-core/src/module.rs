//! Loading and compiling WebAssembly binaries.
//!
//! [`load_binary`] reads the file named on the command line and
//! [`CompiledModule`] wraps the compiled Wasmtime [`Module`] together with the
//! import and export information shims use to decide what to link.

use std::collections::BTreeSet;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::Path;
use std::time::Instant;

use tracing::{debug, info, instrument};
use wasmtime::{Engine, ExternType, Module};

use wasm_runner_common::RunnerError;

/// Read the full contents of a module file.
///
/// # Errors
///
/// Returns [`RunnerError::Io`] if the path does not exist or cannot be read.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub async fn load_binary(path: impl AsRef<Path>) -> Result<Vec<u8>, RunnerError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| RunnerError::io(path, e))?;

    debug!(bytes_len = bytes.len(), "Binary loaded");
    Ok(bytes)
}

/// What kind of item an import or export refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExternKind {
    Func,
    Global,
    Table,
    Memory,
    /// Anything newer than the MVP kinds (e.g. exception tags).
    Other,
}

impl From<&ExternType> for ExternKind {
    fn from(ty: &ExternType) -> Self {
        match ty {
            ExternType::Func(_) => ExternKind::Func,
            ExternType::Global(_) => ExternKind::Global,
            ExternType::Table(_) => ExternKind::Table,
            ExternType::Memory(_) => ExternKind::Memory,
            #[allow(unreachable_patterns)]
            _ => ExternKind::Other,
        }
    }
}

/// A single import declared by a module.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ImportDescriptor {
    /// Import namespace, e.g. `wasi_snapshot_preview1`.
    pub module: String,
    /// Field name within the namespace.
    pub name: String,
    /// Kind of the imported item.
    pub kind: ExternKind,
}

/// A compiled WebAssembly module.
#[derive(Clone)]
pub struct CompiledModule {
    inner: Module,

    /// Hash of the original bytes, used to correlate log lines.
    content_hash: String,

    /// Imports in declaration order.
    imports: Vec<ImportDescriptor>,
}

impl CompiledModule {
    /// Compile a core module from WebAssembly bytes.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Instantiation`] if the bytes are not a valid module.
    #[instrument(skip(engine, bytes), fields(bytes_len = bytes.len()))]
    pub fn from_bytes(engine: &Engine, bytes: &[u8]) -> Result<Self, RunnerError> {
        let start = Instant::now();

        Self::validate_wasm_header(bytes)?;

        let module = Module::from_binary(engine, bytes).map_err(|e| {
            RunnerError::instantiation(format!("Module compilation failed: {e:#}"))
        })?;

        let compiled = Self::wrap(module, compute_hash(bytes));

        info!(
            content_hash = %compiled.content_hash,
            imports = compiled.imports.len(),
            duration_ms = start.elapsed().as_millis(),
            "Module compiled"
        );

        Ok(compiled)
    }

    /// Compile a core module from WAT (WebAssembly Text Format).
    ///
    /// This is primarily for testing purposes.
    #[instrument(skip(engine, wat))]
    pub fn from_wat(engine: &Engine, wat: &str) -> Result<Self, RunnerError> {
        let module = Module::new(engine, wat)
            .map_err(|e| RunnerError::instantiation(format!("WAT compilation failed: {e:#}")))?;

        Ok(Self::wrap(module, compute_hash(wat.as_bytes())))
    }

    fn wrap(module: Module, content_hash: String) -> Self {
        let imports = module
            .imports()
            .map(|import| ImportDescriptor {
                module: import.module().to_string(),
                name: import.name().to_string(),
                kind: ExternKind::from(&import.ty()),
            })
            .collect();

        Self {
            inner: module,
            content_hash,
            imports,
        }
    }

    /// Get the inner Wasmtime module.
    pub fn as_module(&self) -> &Module {
        &self.inner
    }

    /// Get the content hash of the original bytes.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Imports declared by the module, in declaration order.
    pub fn imports(&self) -> &[ImportDescriptor] {
        &self.imports
    }

    /// Returns `true` if the module declares at least one import.
    pub fn has_imports(&self) -> bool {
        !self.imports.is_empty()
    }

    /// Distinct import namespaces.
    pub fn import_modules(&self) -> BTreeSet<&str> {
        self.imports.iter().map(|i| i.module.as_str()).collect()
    }

    /// Validate WebAssembly header (magic number).
    fn validate_wasm_header(bytes: &[u8]) -> Result<(), RunnerError> {
        if bytes.len() < 8 {
            return Err(RunnerError::instantiation("Invalid Wasm: file too small"));
        }

        // Check magic number: \0asm
        if &bytes[0..4] != b"\0asm" {
            return Err(RunnerError::instantiation("Invalid Wasm: bad magic number"));
        }

        Ok(())
    }
}

impl std::fmt::Debug for CompiledModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledModule")
            .field("content_hash", &self.content_hash)
            .field("imports", &self.imports.len())
            .finish_non_exhaustive()
    }
}

/// Compute a hash of the given bytes.
fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
