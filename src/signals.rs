//! OS stop sources wired into the process-wide [`STOP`] coordinator

use libc::c_int;
use tracing::debug;

use crate::stop::{StopReason, STOP};

/// Ctrl+Break, delivered through the CRT on Windows
#[cfg(windows)]
const SIGBREAK: c_int = 21;

fn reason_for_signal(signal: c_int) -> StopReason {
    match signal {
        libc::SIGINT => StopReason::SigInt,
        libc::SIGTERM => StopReason::SigTerm,
        #[cfg(windows)]
        SIGBREAK => StopReason::SigBreak,
        _ => StopReason::None,
    }
}

// Runs in signal context: atomics only.
extern "C" fn handle_signal(signal: c_int) {
    STOP.set(reason_for_signal(signal));
}

/// Route SIGINT, SIGTERM and (on Windows) SIGBREAK to the stop coordinator.
///
/// Returns the signals whose handler could not be installed.
pub fn install_signal_handlers() -> Vec<c_int> {
    let handler = handle_signal as extern "C" fn(c_int) as libc::sighandler_t;

    #[cfg(windows)]
    let signals = [libc::SIGINT, libc::SIGTERM, SIGBREAK];
    #[cfg(not(windows))]
    let signals = [libc::SIGINT, libc::SIGTERM];

    // The CRT returns SIG_ERR as a plain int; unix already types it as a handler.
    let failed: Vec<c_int> = signals
        .into_iter()
        .filter(|&signal| {
            (unsafe { libc::signal(signal, handler) }) == libc::SIG_ERR as libc::sighandler_t
        })
        .collect();

    debug!(installed = signals.len() - failed.len(), "Signal handlers installed");
    failed
}

#[cfg(windows)]
mod console {
    use windows::Win32::Foundation::BOOL;
    use windows::Win32::System::Console::{
        SetConsoleCtrlHandler, CTRL_CLOSE_EVENT, CTRL_LOGOFF_EVENT, CTRL_SHUTDOWN_EVENT,
    };

    use crate::stop::{StopReason, STOP};

    unsafe extern "system" fn on_console_event(event: u32) -> BOOL {
        match event {
            CTRL_CLOSE_EVENT | CTRL_LOGOFF_EVENT | CTRL_SHUTDOWN_EVENT => {
                STOP.set(StopReason::ConsoleClose);
                BOOL::from(true)
            }
            // Ctrl+C and Ctrl+Break fall through to the CRT signal handlers.
            _ => BOOL::from(false),
        }
    }

    /// Treat console close, logoff and shutdown as a stop request.
    pub fn install_console_handler() -> windows::core::Result<()> {
        unsafe { SetConsoleCtrlHandler(Some(on_console_event), BOOL::from(true)) }
    }
}

#[cfg(windows)]
pub use console::install_console_handler;
