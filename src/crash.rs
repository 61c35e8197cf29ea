//! Crash handling and diagnostics
//!
//! Panics are appended to `crash.log` in the log directory with a full
//! backtrace. The capture session also drops `CRITICAL_OP` markers before
//! libobs calls that are known to take the process down, so the last marker
//! in the file points at the call that never returned.
//!
//! Both are no-ops until [`init_crash_handler`] has run.

use anyhow::{Context, Result};
use std::any::Any;
use std::fs::OpenOptions;
use std::io::Write;
use std::panic::PanicInfo;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::error;

static CRASH_LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

const CRASH_LOG_FILENAME: &str = "crash.log";

/// Install the panic hook. Returns the crash log path.
pub fn init_crash_handler(log_dir: &Path) -> Result<PathBuf> {
    let crash_log_path = log_dir.join(CRASH_LOG_FILENAME);

    // Fail early if the file cannot be created rather than inside the hook.
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&crash_log_path)
        .with_context(|| format!("Failed to open crash log: {:?}", crash_log_path))?;

    let _ = CRASH_LOG_PATH.set(crash_log_path.clone());

    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        handle_panic(panic_info);
        default_hook(panic_info);
    }));

    Ok(crash_log_path)
}

fn timestamp() -> impl std::fmt::Display {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ")
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic payload".to_string()
    }
}

fn handle_panic(panic_info: &PanicInfo) {
    let message = panic_message(panic_info.payload());
    let location = panic_info
        .location()
        .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
        .unwrap_or_else(|| "unknown location".to_string());
    let backtrace = std::backtrace::Backtrace::force_capture();

    let separator = "=".repeat(80);
    let report = format!(
        "\n{sep}\n\
         PANIC at {ts}\n\
         {sep}\n\
         Location: {loc}\n\
         Message: {msg}\n\
         \n\
         Backtrace:\n\
         {bt}\n\
         {sep}\n",
        sep = separator,
        ts = timestamp(),
        loc = location,
        msg = message,
        bt = backtrace
    );

    append(report.as_bytes(), true);

    error!(
        "PANIC at {}: {} (see crash.log for full backtrace)",
        location, message
    );
}

fn append(bytes: &[u8], sync: bool) {
    let Some(path) = CRASH_LOG_PATH.get() else {
        return;
    };
    let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) else {
        return;
    };
    let _ = file.write_all(bytes);
    let _ = file.flush();
    if sync {
        let _ = file.sync_all();
    }
}

/// Record that `operation` is about to run.
pub fn log_critical_operation(operation: &str) {
    let msg = format!("[{}] CRITICAL_OP: {}\n", timestamp(), operation);
    append(msg.as_bytes(), false);
}
