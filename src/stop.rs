//! Stop coordination
//!
//! Process-wide rendezvous between the run loop and every asynchronous
//! stop producer: OS signal handlers, the console-control handler, and the
//! output `stop` callback delivered from a libobs worker thread.
//!
//! The first producer to claim the stop reason wins. Signal handlers touch
//! only the atomics; the output error string is guarded by a mutex that
//! only the output callback and the final reporter ever take.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, Ordering};
use std::sync::Mutex;

/// Cause of session termination
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    #[default]
    None = 0,
    SigInt = 1,
    SigTerm = 2,
    SigBreak = 3,
    ConsoleClose = 4,
    OutputStopped = 5,
}

impl StopReason {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::SigInt,
            2 => Self::SigTerm,
            3 => Self::SigBreak,
            4 => Self::ConsoleClose,
            5 => Self::OutputStopped,
            _ => Self::None,
        }
    }
}

/// Snapshot of how the session ended, rendered as the stop-cause line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    NotStopped,
    SigInt,
    SigTerm,
    SigBreak,
    ConsoleClose,
    OutputStopped { code: i64, error: Option<String> },
}

impl fmt::Display for StopOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStopped => Ok(()),
            Self::SigInt => f.write_str("Stopped by SIGINT"),
            Self::SigTerm => f.write_str("Stopped by SIGTERM"),
            Self::SigBreak => f.write_str("Stopped by SIGBREAK"),
            Self::ConsoleClose => f.write_str("Stopped by console close"),
            Self::OutputStopped { code, error } => {
                write!(f, "Output stopped. code={}", code)?;
                if let Some(error) = error {
                    write!(f, ", error={}", error)?;
                }
                Ok(())
            }
        }
    }
}

/// Single-assignment stop reason plus the run-loop flag
#[derive(Debug)]
pub struct StopCoordinator {
    reason: AtomicU8,
    keep_running: AtomicBool,
    output_code: AtomicI64,
    output_error: Mutex<String>,
}

/// Coordinator shared with the OS signal and console handlers
pub static STOP: StopCoordinator = StopCoordinator::new();

impl StopCoordinator {
    pub const fn new() -> Self {
        Self {
            reason: AtomicU8::new(StopReason::None as u8),
            keep_running: AtomicBool::new(true),
            output_code: AtomicI64::new(0),
            output_error: Mutex::new(String::new()),
        }
    }

    /// Request a stop. Returns true if this call set the reason.
    ///
    /// Async-signal-safe: only atomics are touched.
    pub fn set(&self, reason: StopReason) -> bool {
        let claimed = self.claim(reason);
        self.keep_running.store(false, Ordering::Release);
        claimed
    }

    /// Record an output `stop` event.
    ///
    /// The code and error are stored only if this event becomes the stop
    /// reason, so a later stop raised by teardown never overwrites them.
    pub fn record_output_stop(&self, code: i64, error: Option<String>) -> bool {
        let claimed = {
            let mut slot = self
                .output_error
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let claimed = self.claim(StopReason::OutputStopped);
            if claimed {
                self.output_code.store(code, Ordering::Release);
                *slot = error.unwrap_or_default();
            }
            claimed
        };
        self.keep_running.store(false, Ordering::Release);
        claimed
    }

    pub fn keep_running(&self) -> bool {
        self.keep_running.load(Ordering::Acquire)
    }

    pub fn reason(&self) -> StopReason {
        StopReason::from_u8(self.reason.load(Ordering::Acquire))
    }

    pub fn outcome(&self) -> StopOutcome {
        match self.reason() {
            StopReason::None => StopOutcome::NotStopped,
            StopReason::SigInt => StopOutcome::SigInt,
            StopReason::SigTerm => StopOutcome::SigTerm,
            StopReason::SigBreak => StopOutcome::SigBreak,
            StopReason::ConsoleClose => StopOutcome::ConsoleClose,
            StopReason::OutputStopped => {
                let error = self
                    .output_error
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .clone();
                StopOutcome::OutputStopped {
                    code: self.output_code.load(Ordering::Acquire),
                    error: (!error.is_empty()).then_some(error),
                }
            }
        }
    }

    fn claim(&self, reason: StopReason) -> bool {
        if reason == StopReason::None {
            return false;
        }
        self.reason
            .compare_exchange(
                StopReason::None as u8,
                reason as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

impl Default for StopCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
