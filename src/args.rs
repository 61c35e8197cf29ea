//! Command-line parsing
//!
//! Parses the driver's flags into a frozen [`CaptureArgs`] record. Unknown
//! flags are ignored and a flag missing its value is dropped, so callers
//! that pass extra options keep working.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::CaptureError;

/// Video encoder used when `--encoder` is absent or unusable
pub const DEFAULT_ENCODER: &str = "obs_x264";

/// Immutable run configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureArgs {
    pub scan: bool,
    pub help: bool,
    /// Monitor index in enumeration order
    pub monitor: u32,
    /// Desktop audio device id from the scan output
    pub desktop_audio: Option<String>,
    /// Microphone device id from the scan output
    pub mic_audio: Option<String>,
    pub output_file: Option<PathBuf>,
    pub rtmp_url: Option<String>,
    pub rtmp_key: Option<String>,
    pub encoder: String,
    /// Video bitrate in Kbps
    pub bitrate: u32,
    /// 0 = auto-detect from the monitor
    pub width: u32,
    /// 0 = auto-detect from the monitor
    pub height: u32,
    pub fps: u32,
}

impl Default for CaptureArgs {
    fn default() -> Self {
        Self {
            scan: false,
            help: false,
            monitor: 0,
            desktop_audio: None,
            mic_audio: None,
            output_file: None,
            rtmp_url: None,
            rtmp_key: None,
            encoder: DEFAULT_ENCODER.to_string(),
            bitrate: 2500,
            width: 0,
            height: 0,
            fps: 30,
        }
    }
}

/// Where the encoded stream goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTarget<'a> {
    Rtmp { url: &'a str, key: &'a str },
    File(&'a Path),
}

impl fmt::Display for OutputTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rtmp { url, .. } => f.write_str(url),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl CaptureArgs {
    /// Parse arguments, excluding the program name.
    pub fn parse<I, S>(args: I) -> Result<Self, CaptureError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parsed = Self::default();
        let mut args = args.into_iter().map(Into::into);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--scan" => parsed.scan = true,
                "--help" | "-h" => parsed.help = true,
                "--monitor" | "--desktop-audio" | "--mic-audio" | "--output" | "--rtmp"
                | "--key" | "--encoder" | "--bitrate" | "--width" | "--height" | "--fps" => {
                    let Some(value) = args.next() else {
                        break;
                    };
                    parsed.apply(&arg, value)?;
                }
                _ => {}
            }
        }

        Ok(parsed)
    }

    fn apply(&mut self, flag: &str, value: String) -> Result<(), CaptureError> {
        match flag {
            "--monitor" => self.monitor = parse_number("--monitor", &value)?,
            "--desktop-audio" => self.desktop_audio = non_empty(value),
            "--mic-audio" => self.mic_audio = non_empty(value),
            "--output" => self.output_file = non_empty(value).map(PathBuf::from),
            "--rtmp" => self.rtmp_url = non_empty(value),
            "--key" => self.rtmp_key = non_empty(value),
            "--encoder" => {
                self.encoder = non_empty(value).unwrap_or_else(|| DEFAULT_ENCODER.to_string())
            }
            "--bitrate" => self.bitrate = parse_positive("--bitrate", &value)?,
            "--width" => self.width = parse_number("--width", &value)?,
            "--height" => self.height = parse_number("--height", &value)?,
            "--fps" => self.fps = parse_positive("--fps", &value)?,
            _ => {}
        }
        Ok(())
    }

    /// Selected output; RTMP takes precedence over a file path.
    pub fn output_target(&self) -> Option<OutputTarget<'_>> {
        if let Some(url) = self.rtmp_url.as_deref() {
            return Some(OutputTarget::Rtmp {
                url,
                key: self.rtmp_key.as_deref().unwrap_or_default(),
            });
        }
        self.output_file.as_deref().map(OutputTarget::File)
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

fn parse_number(flag: &'static str, value: &str) -> Result<u32, CaptureError> {
    value
        .trim()
        .parse()
        .map_err(|_| CaptureError::InvalidArgument {
            flag,
            value: value.to_string(),
        })
}

fn parse_positive(flag: &'static str, value: &str) -> Result<u32, CaptureError> {
    match parse_number(flag, value)? {
        0 => Err(CaptureError::InvalidArgument {
            flag,
            value: value.to_string(),
        }),
        n => Ok(n),
    }
}

pub fn print_help() {
    println!("cli-capture - libobs screen capture driver");
    println!();
    println!("USAGE:");
    println!("    cli-capture --scan");
    println!("    cli-capture [OPTIONS] (--output <path> | --rtmp <url> [--key <key>])");
    println!();
    println!("OPTIONS:");
    println!("    --scan                 Print monitors, audio devices and encoders as JSON");
    println!("    --monitor <index>      Monitor to capture (default 0)");
    println!("    --desktop-audio <id>   Desktop audio device id from --scan");
    println!("    --mic-audio <id>       Microphone device id from --scan");
    println!("    --output <path>        Record to a file");
    println!("    --rtmp <url>           Stream to an RTMP server (takes precedence over --output)");
    println!("    --key <key>            RTMP stream key");
    println!("    --encoder <id>         Video encoder id from --scan (default {})", DEFAULT_ENCODER);
    println!("    --bitrate <kbps>       Video bitrate (default 2500)");
    println!("    --width <px>           Canvas width, 0 = monitor width");
    println!("    --height <px>          Canvas height, 0 = monitor height");
    println!("    --fps <n>              Frames per second (default 30)");
    println!("    -h, --help             Print this help message");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG               Set log level (e.g., debug, info, warn)");
    println!("    CLI_CAPTURE_LOG_DIR    Also write logs and crash reports to this directory");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CaptureArgs, CaptureError> {
        CaptureArgs::parse(args.iter().copied())
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]).unwrap();
        assert_eq!(args, CaptureArgs::default());
        assert_eq!(args.encoder, "obs_x264");
        assert_eq!(args.bitrate, 2500);
        assert_eq!(args.fps, 30);
        assert_eq!((args.width, args.height), (0, 0));
        assert!(args.output_target().is_none());
    }

    #[test]
    fn test_all_flags() {
        let args = parse(&[
            "--monitor",
            "1",
            "--desktop-audio",
            "{0.0.0.00000000}.{abc}",
            "--mic-audio",
            "default",
            "--output",
            "C:\\rec\\out.mp4",
            "--encoder",
            "jim_nvenc",
            "--bitrate",
            "6000",
            "--width",
            "2560",
            "--height",
            "1440",
            "--fps",
            "60",
        ])
        .unwrap();

        assert_eq!(args.monitor, 1);
        assert_eq!(args.desktop_audio.as_deref(), Some("{0.0.0.00000000}.{abc}"));
        assert_eq!(args.mic_audio.as_deref(), Some("default"));
        assert_eq!(args.encoder, "jim_nvenc");
        assert_eq!(args.bitrate, 6000);
        assert_eq!((args.width, args.height, args.fps), (2560, 1440, 60));
        assert_eq!(
            args.output_target(),
            Some(OutputTarget::File(Path::new("C:\\rec\\out.mp4")))
        );
    }

    #[test]
    fn test_scan_and_help() {
        assert!(parse(&["--scan"]).unwrap().scan);
        assert!(parse(&["-h"]).unwrap().help);
        assert!(parse(&["--help"]).unwrap().help);
    }

    #[test]
    fn test_unknown_flags_ignored() {
        let args = parse(&["--verbose", "--output", "a.mp4", "stray"]).unwrap();
        assert_eq!(args.output_file, Some(PathBuf::from("a.mp4")));
    }

    #[test]
    fn test_missing_value_ignored() {
        let args = parse(&["--output", "a.mp4", "--bitrate"]).unwrap();
        assert_eq!(args.bitrate, 2500);
        assert_eq!(args.output_file, Some(PathBuf::from("a.mp4")));
    }

    #[test]
    fn test_value_taken_verbatim_even_if_flag_like() {
        let args = parse(&["--output", "--scan"]).unwrap();
        assert!(!args.scan);
        assert_eq!(args.output_file, Some(PathBuf::from("--scan")));
    }

    #[test]
    fn test_invalid_numbers() {
        for (flag, value) in [
            ("--monitor", "one"),
            ("--monitor", "-1"),
            ("--width", "12px"),
            ("--bitrate", "0"),
            ("--fps", "0"),
            ("--fps", ""),
        ] {
            match parse(&[flag, value]) {
                Err(CaptureError::InvalidArgument { flag: f, value: v }) => {
                    assert_eq!(f, flag);
                    assert_eq!(v, value);
                }
                other => panic!("expected InvalidArgument for {flag} {value:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_rtmp_dominates_output() {
        let args = parse(&[
            "--output",
            "local.mp4",
            "--rtmp",
            "rtmp://127.0.0.1/live",
            "--key",
            "secret",
        ])
        .unwrap();
        let target = args.output_target().unwrap();
        assert_eq!(
            target,
            OutputTarget::Rtmp {
                url: "rtmp://127.0.0.1/live",
                key: "secret",
            }
        );
        assert_eq!(target.to_string(), "rtmp://127.0.0.1/live");
    }

    #[test]
    fn test_rtmp_without_key() {
        let args = parse(&["--rtmp", "rtmp://host/app"]).unwrap();
        assert_eq!(
            args.output_target(),
            Some(OutputTarget::Rtmp {
                url: "rtmp://host/app",
                key: "",
            })
        );
    }

    #[test]
    fn test_empty_values_are_absent() {
        let args = parse(&["--output", "", "--desktop-audio", "", "--encoder", ""]).unwrap();
        assert!(args.output_file.is_none());
        assert!(args.desktop_audio.is_none());
        assert_eq!(args.encoder, DEFAULT_ENCODER);
    }
}
