//! Error types for the capture driver

use thiserror::Error;

/// Hard failures that abort a capture or scan run.
///
/// Soft conditions (monitor index out of range, video encoder fallback,
/// provisional video reset failure) are reported as warnings instead.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// libobs startup returned failure.
    #[error("Failed to startup OBS")]
    BootstrapFailed,

    /// Video context reset with the final canvas failed.
    #[error("Failed to reset video, error code: {0}")]
    VideoInitFailed(i32),

    /// Audio context reset failed.
    #[error("Failed to reset audio")]
    AudioInitFailed,

    /// Neither `--output` nor `--rtmp` was supplied.
    #[error("No output specified. Use --output <file> or --rtmp <url>")]
    NoOutputSpecified,

    #[error("Failed to create scene")]
    SceneCreateFailed,

    #[error("Failed to create output or service")]
    OutputCreateFailed,

    /// Encoder could not be created, even after falling back.
    #[error("Failed to create encoder: {0}")]
    EncoderCreateFailed(String),

    /// `obs_output_start` returned false; carries the output's last error.
    #[error("Failed to start output: {0}")]
    OutputStartFailed(String),

    /// A numeric flag had a value outside its domain.
    #[error("Invalid value for {flag}: {value:?}")]
    InvalidArgument { flag: &'static str, value: String },
}

impl CaptureError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        -1
    }
}
