//! Host import shims for wasm-runner.
//!
//! Each shim implements [`wasm_runner_core::Shim`]: it builds the import
//! object a family of guest modules expects and knows how to start them.
//!
//! - [`BareShim`]: No imports; calls one export
//! - [`WasiShim`]: WASI preview1 command modules
//! - [`GoShim`]: TinyGo `-target wasm` output (the `wasm_exec` convention)
//! - [`AutoShim`]: Picks one of the above from the module's imports

pub mod bare;
pub mod detect;
pub mod go;
pub mod wasi;

pub use bare::BareShim;
pub use detect::{AutoShim, detect_import_mode, shim_for};
pub use go::GoShim;
pub use wasi::{WasiShim, link_wasi};
