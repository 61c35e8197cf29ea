//! cli-capture
//!
//! Headless screen capture driver over libobs. `--scan` prints the
//! available screens, audio devices and encoders as JSON; otherwise one
//! monitor is recorded to a file or streamed over RTMP until a stop signal
//! arrives or the output stops on its own.

#![cfg_attr(not(windows), allow(dead_code))]

mod args;
mod crash;
mod display;
mod error;
mod host;
mod logging;
mod platform;
mod scan;
mod session;
mod signals;
mod stop;

fn main() {
    std::process::exit(run());
}

#[cfg(windows)]
fn run() -> i32 {
    use tracing::{debug, error, info, warn};

    use args::CaptureArgs;
    use display::SystemDisplays;
    use host::ObsHost;
    use session::CaptureSession;
    use stop::STOP;

    // Setup results are reported once the subscriber is installed.
    let console = platform::configure_console();
    let console_handler = signals::install_console_handler();
    let dpi = platform::declare_dpi_awareness();

    let args = match CaptureArgs::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            return e.exit_code();
        }
    };

    if args.help {
        args::print_help();
        return 0;
    }

    let log_dir = logging::log_dir();
    let _log_guard = match logging::init_logging(args.scan, log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            None
        }
    };
    if let Some(dir) = &log_dir {
        if let Err(e) = crash::init_crash_handler(dir) {
            warn!("Crash handler not installed: {:#}", e);
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), scan = args.scan, "cli-capture starting");
    if let Err(e) = console {
        warn!("Failed to set UTF-8 console code pages: {}", e);
    }
    if let Err(e) = console_handler {
        warn!("Failed to install console control handler: {}", e);
    }
    match dpi {
        Ok(awareness) => debug!(?awareness, "DPI awareness declared"),
        Err(e) => warn!("{:#}", e),
    }

    match platform::executable_dir() {
        Ok(dir) => {
            if let Err(e) = std::env::set_current_dir(&dir) {
                warn!("Failed to change directory to {:?}: {}", dir, e);
            }
        }
        Err(e) => warn!("{:#}", e),
    }

    let mut session = CaptureSession::new(ObsHost, &STOP);
    if let Err(e) = session.bootstrap(args.scan) {
        // Scan mode keeps stderr quiet; the exit code reports the failure.
        if !args.scan {
            eprintln!("{}", e);
        }
        return e.exit_code();
    }

    if args.scan {
        let report = session.scan(&SystemDisplays);
        return match report.to_json() {
            Ok(json) => {
                println!("{}", json);
                0
            }
            Err(e) => {
                error!("Failed to serialize scan report: {}", e);
                -1
            }
        };
    }

    for signal in signals::install_signal_handlers() {
        warn!(signal, "Failed to install signal handler");
    }

    match session.capture(&args, &SystemDisplays) {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("{}", e);
            e.exit_code()
        }
    }
}

#[cfg(not(windows))]
fn run() -> i32 {
    eprintln!("cli-capture only supports Windows");
    -1
}
