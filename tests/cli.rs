//! End-to-end tests for the `wasm-runner` binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn write_module(dir: &TempDir, name: &str, wat: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, wat::parse_str(wat).unwrap()).unwrap();
    path
}

fn run(args: &[&str], module: Option<&Path>, guest_args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_wasm-runner"));
    cmd.env_remove("RUST_LOG")
        .env_remove("WASM_RUNNER_IMPORTS")
        .env_remove("WASM_RUNNER_CONFIG")
        .args(args);
    if let Some(module) = module {
        cmd.arg(module);
    }
    if !guest_args.is_empty() {
        cmd.arg("--").args(guest_args);
    }
    cmd.output().unwrap()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

const EMPTY_START: &str = r#"(module (func (export "_start")))"#;

const HELLO_WASI: &str = r#"(module
    (import "wasi_snapshot_preview1" "fd_write"
        (func $fd_write (param i32 i32 i32 i32) (result i32)))
    (memory (export "memory") 1)
    (data (i32.const 16) "hello from wasm\n")
    (func (export "_start")
        (i32.store (i32.const 0) (i32.const 16))
        (i32.store (i32.const 4) (i32.const 16))
        (drop (call $fd_write (i32.const 1) (i32.const 0) (i32.const 1) (i32.const 8)))))"#;

const EXIT_THREE: &str = r#"(module
    (import "wasi_snapshot_preview1" "proc_exit" (func $proc_exit (param i32)))
    (memory (export "memory") 1)
    (func (export "_start") (call $proc_exit (i32.const 3))))"#;

// Prints the raw argv buffer, then exits with `argc * 10 + min(envc, 9)`.
const ARGS_AND_ENV: &str = r#"(module
    (import "wasi_snapshot_preview1" "args_sizes_get"
        (func $args_sizes_get (param i32 i32) (result i32)))
    (import "wasi_snapshot_preview1" "args_get" (func $args_get (param i32 i32) (result i32)))
    (import "wasi_snapshot_preview1" "environ_sizes_get"
        (func $environ_sizes_get (param i32 i32) (result i32)))
    (import "wasi_snapshot_preview1" "fd_write"
        (func $fd_write (param i32 i32 i32 i32) (result i32)))
    (import "wasi_snapshot_preview1" "proc_exit" (func $proc_exit (param i32)))
    (memory (export "memory") 1)
    (func (export "_start")
        (local $envc i32)
        (drop (call $args_sizes_get (i32.const 0) (i32.const 4)))
        (drop (call $args_get (i32.const 64) (i32.const 256)))
        (drop (call $environ_sizes_get (i32.const 8) (i32.const 12)))
        (i32.store (i32.const 16) (i32.const 256))
        (i32.store (i32.const 20) (i32.load (i32.const 4)))
        (drop (call $fd_write (i32.const 1) (i32.const 16) (i32.const 1) (i32.const 24)))
        (local.set $envc (i32.load (i32.const 8)))
        (if (i32.gt_u (local.get $envc) (i32.const 9))
            (then (local.set $envc (i32.const 9))))
        (call $proc_exit
            (i32.add (i32.mul (i32.load (i32.const 0)) (i32.const 10)) (local.get $envc)))))"#;

// ============================================================================
// Test: Exit status
// ============================================================================

#[test]
fn test_no_import_module_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let module = write_module(&dir, "empty.wasm", EMPTY_START);

    let output = run(&["--imports", "none"], Some(&module), &[]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_guest_exit_code_is_process_status() {
    let dir = tempfile::tempdir().unwrap();
    let module = write_module(&dir, "exit.wasm", EXIT_THREE);

    let output = run(&[], Some(&module), &[]);

    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn test_repeated_runs_are_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let module = write_module(&dir, "exit.wasm", EXIT_THREE);

    let first = run(&[], Some(&module), &[]);
    let second = run(&[], Some(&module), &[]);

    assert_eq!(first.status.code(), second.status.code());
    assert_eq!(first.stdout, second.stdout);
}

// ============================================================================
// Test: Failures
// ============================================================================

#[test]
fn test_imports_without_import_object_fail() {
    let dir = tempfile::tempdir().unwrap();
    let module = write_module(&dir, "hello.wasm", HELLO_WASI);

    let output = run(&["--imports", "none"], Some(&module), &[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("Instantiation failed"),
        "stderr: {}",
        stderr(&output)
    );
}

#[test]
fn test_missing_module_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.wasm");

    let output = run(&[], Some(&missing), &[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("Failed to read"),
        "stderr: {}",
        stderr(&output)
    );
}

#[test]
fn test_trap_fails() {
    let dir = tempfile::tempdir().unwrap();
    let module = write_module(
        &dir,
        "trap.wasm",
        r#"(module (func (export "_start") unreachable))"#,
    );

    let output = run(&[], Some(&module), &[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("unreachable"), "stderr: {}", stderr(&output));
}

#[test]
fn test_module_path_is_first_positional() {
    let dir = tempfile::tempdir().unwrap();
    let module = write_module(&dir, "empty.wasm", EMPTY_START);
    let module = module.to_str().unwrap();

    // A second positional without `--` is a usage error
    let output = run(&["ignored", module], None, &[]);
    assert_eq!(output.status.code(), Some(2));

    // After `--` it is a guest argument and `ignored` is the module
    let output = run(&["ignored"], None, &[module]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Failed to read"), "stderr: {}", stderr(&output));
}

// ============================================================================
// Test: Shims
// ============================================================================

#[test]
fn test_wasi_stdout_passes_through() {
    let dir = tempfile::tempdir().unwrap();
    let module = write_module(&dir, "hello.wasm", HELLO_WASI);

    let output = run(&[], Some(&module), &["arg1"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hello from wasm\n");
}

#[test]
fn test_guest_argv_and_env() {
    let dir = tempfile::tempdir().unwrap();
    let module = write_module(&dir, "args.wasm", ARGS_AND_ENV);

    let output = run(&["--env", "X=1"], Some(&module), &["one", "two"]);

    // argv is the module file name plus the arguments after `--`
    assert_eq!(output.status.code(), Some(31), "stderr: {}", stderr(&output));
    assert_eq!(output.stdout, b"args.wasm\0one\0two\0");
}

#[test]
fn test_go_scheduler_loop() {
    let dir = tempfile::tempdir().unwrap();
    let module = write_module(
        &dir,
        "go.wasm",
        r#"(module
            (import "wasi_snapshot_preview1" "fd_write"
                (func $fd_write (param i32 i32 i32 i32) (result i32)))
            (import "gojs" "runtime.sleepTicks" (func $sleep_ticks (param f64)))
            (memory (export "memory") 1)
            (global $wakeups (mut i32) (i32.const 0))
            (data (i32.const 16) "tick\n")
            (func (export "_start") (call $sleep_ticks (f64.const 1)))
            (func (export "go_scheduler")
                (global.set $wakeups (i32.add (global.get $wakeups) (i32.const 1)))
                (i32.store (i32.const 0) (i32.const 16))
                (i32.store (i32.const 4) (i32.const 5))
                (drop (call $fd_write (i32.const 1) (i32.const 0) (i32.const 1) (i32.const 8)))
                (if (i32.lt_u (global.get $wakeups) (i32.const 2))
                    (then (call $sleep_ticks (f64.const 1))))))"#,
    );

    let output = run(&["--imports", "go"], Some(&module), &[]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "tick\ntick\n");
}

// ============================================================================
// Test: Configuration
// ============================================================================

#[test]
fn test_config_file_selects_imports() {
    let dir = tempfile::tempdir().unwrap();
    let module = write_module(&dir, "hello.wasm", HELLO_WASI);
    let config = dir.path().join("runner.toml");
    std::fs::write(&config, "[runner.execution]\nimports = \"none\"\n").unwrap();

    let output = run(&["--config", config.to_str().unwrap()], Some(&module), &[]);
    assert_eq!(output.status.code(), Some(1));

    // The command line wins over the file
    let output = run(
        &["--config", config.to_str().unwrap(), "--imports", "wasi"],
        Some(&module),
        &[],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
}

#[test]
fn test_invalid_config_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let module = write_module(&dir, "empty.wasm", EMPTY_START);
    let config = dir.path().join("runner.toml");
    std::fs::write(&config, "[runner.execution]\nimports = \"deno\"\n").unwrap();

    let output = run(&["--config", config.to_str().unwrap()], Some(&module), &[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("Failed to load configuration"),
        "stderr: {}",
        stderr(&output)
    );
}
