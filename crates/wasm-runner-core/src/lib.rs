//! Core Wasmtime runner for wasm-runner.
//!
//! This crate provides the load → instantiate → run machinery:
//! - [`WasmEngine`]: Configured Wasmtime engine
//! - [`CompiledModule`] and [`load_binary`]: Reading and compiling binaries
//! - [`RunnerContext`]: Per-run store data
//! - [`Shim`]: The host compatibility layer interface
//! - [`Runner`]: The state machine tying it together
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  bytes  ┌────────────────┐  Linker (import object)  ┌──────────┐
//! │ load_binary│────────▶│ CompiledModule │◀─────────────────────────│   Shim   │
//! └────────────┘         └────────────────┘                          └──────────┘
//!                                │ instantiate                            │ run
//!                                ▼                                        ▼
//!                  ┌──────────────────────────────────────────────────────────┐
//!                  │            Store<RunnerContext> + Instance               │
//!                  │  - WASI preview1 context                                 │
//!                  │  - Guest scheduler clock / wake-up                       │
//!                  └──────────────────────────────────────────────────────────┘
//! ```

pub mod engine;
pub mod instance;
pub mod module;
pub mod shim;
pub mod store;

pub use engine::WasmEngine;
pub use instance::{CallOutcome, RunOutcome, Runner, RunnerState, call_export, classify_call};
pub use module::{CompiledModule, ExternKind, ImportDescriptor, load_binary};
pub use shim::Shim;
pub use store::{GuestOptions, GuestScheduler, RunnerContext, create_store};
