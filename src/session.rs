//! Capture session controller
//!
//! Drives libobs through bootstrap, scene assembly, output wiring and the
//! run loop. Every handle the session creates lives in an `Option` field so
//! teardown can release exactly what was built, in reverse order, no matter
//! which phase failed.

use serde_json::json;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::args::{CaptureArgs, OutputTarget, DEFAULT_ENCODER};
use crate::crash::log_critical_operation;
use crate::display::{DisplayEnumerator, Rotation};
use crate::error::CaptureError;
use crate::host::{kinds, AudioSettings, MediaHost, SceneItemLayout, VideoSettings};
use crate::scan::ScanReport;
use crate::stop::{StopCoordinator, StopOutcome};

const LOCALE: &str = "en-US";

/// Relative to the executable directory, which is the working directory
/// by the time libobs starts resolving them.
const DATA_PATHS: [&str; 2] = ["../../data/libobs", "../../data/obs-plugins/%module%"];

const DEFAULT_WIDTH: u32 = 1920;
const DEFAULT_HEIGHT: u32 = 1080;
const AUDIO_BITRATE_KBPS: u32 = 192;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

const VIDEO_CHANNEL: u32 = 0;
const DESKTOP_AUDIO_CHANNEL: u32 = 1;
const MIC_AUDIO_CHANNEL: u32 = 2;

/// Final canvas geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
}

impl Canvas {
    /// Round width down to a multiple of 4 and height to a multiple of 2.
    pub fn aligned(width: u32, height: u32, rotation: Rotation) -> Self {
        Self {
            width: width & !3,
            height: height & !1,
            rotation,
        }
    }

    /// Explicit dimensions win; otherwise adopt the selected monitor's mode.
    pub fn resolve<D>(args: &CaptureArgs, displays: &D) -> Self
    where
        D: DisplayEnumerator + ?Sized,
    {
        if args.width != 0 && args.height != 0 {
            return Self::aligned(args.width, args.height, Rotation::None);
        }

        let monitors = displays.list();
        match monitors.get(args.monitor as usize) {
            Some(monitor) => {
                println!(
                    "Auto-detected resolution: {}x{}",
                    monitor.width, monitor.height
                );
                Self::aligned(monitor.width, monitor.height, monitor.rotation)
            }
            None => {
                eprintln!(
                    "Monitor index out of range, using default {}x{}",
                    DEFAULT_WIDTH, DEFAULT_HEIGHT
                );
                warn!(
                    monitor = args.monitor,
                    available = monitors.len(),
                    "Monitor index out of range"
                );
                Self::aligned(DEFAULT_WIDTH, DEFAULT_HEIGHT, Rotation::None)
            }
        }
    }
}

/// Owner of every libobs object a run creates
pub struct CaptureSession<H: MediaHost> {
    host: H,
    stop: &'static StopCoordinator,
    started: bool,
    channels_bound: bool,
    output_running: bool,
    output: Option<H::Output>,
    video_encoder: Option<H::Encoder>,
    audio_encoder: Option<H::Encoder>,
    scene: Option<H::Scene>,
    service: Option<H::Service>,
}

impl<H: MediaHost> CaptureSession<H> {
    pub fn new(host: H, stop: &'static StopCoordinator) -> Self {
        Self {
            host,
            stop,
            started: false,
            channels_bound: false,
            output_running: false,
            output: None,
            video_encoder: None,
            audio_encoder: None,
            scene: None,
            service: None,
        }
    }

    /// Start libobs, register data paths, load plugins and bring up a
    /// provisional video context.
    ///
    /// `quiet` silences libobs logging so a scan's stdout stays pure JSON.
    #[instrument(skip(self))]
    pub fn bootstrap(&mut self, quiet: bool) -> Result<(), CaptureError> {
        if quiet {
            self.host.silence_logs();
        }

        log_critical_operation("obs_startup");
        if !self.host.startup(LOCALE) {
            return Err(CaptureError::BootstrapFailed);
        }
        self.started = true;

        for path in DATA_PATHS {
            self.host.add_data_path(path);
        }

        debug!("Loading modules");
        self.host.load_modules(!quiet);

        log_critical_operation("obs_reset_video (provisional)");
        match self.host.reset_video(&VideoSettings::PROVISIONAL) {
            Ok(()) => debug!("Provisional video context ready"),
            Err(code) => warn!(code, "Provisional video reset failed"),
        }
        Ok(())
    }

    /// Collect the device report, then shut libobs down.
    pub fn scan<D>(&mut self, displays: &D) -> ScanReport
    where
        D: DisplayEnumerator + ?Sized,
    {
        let report = ScanReport::collect(&mut self.host, displays);
        self.teardown();
        report
    }

    /// Run a capture until a stop event, then tear down.
    ///
    /// Hard failures abort the run after releasing everything built so far.
    pub fn capture<D>(&mut self, args: &CaptureArgs, displays: &D) -> Result<StopOutcome, CaptureError>
    where
        D: DisplayEnumerator + ?Sized,
    {
        let result = self.run(args, displays);
        self.teardown();
        result
    }

    fn run<D>(&mut self, args: &CaptureArgs, displays: &D) -> Result<StopOutcome, CaptureError>
    where
        D: DisplayEnumerator + ?Sized,
    {
        let canvas = Canvas::resolve(args, displays);
        info!(
            width = canvas.width,
            height = canvas.height,
            rotation = canvas.rotation.degrees(),
            fps = args.fps,
            "Resolved canvas"
        );

        log_critical_operation("obs_reset_video");
        self.host
            .reset_video(&VideoSettings {
                width: canvas.width,
                height: canvas.height,
                fps: args.fps,
            })
            .map_err(CaptureError::VideoInitFailed)?;

        if !self.host.reset_audio(&AudioSettings::default()) {
            return Err(CaptureError::AudioInitFailed);
        }

        self.assemble_scene(args, canvas)?;
        let target = self.create_output(args)?;
        self.create_encoders(args)?;
        self.start()?;

        println!("Capture started. Output: {}", target);
        println!("Press Ctrl+C to stop.");

        while self.stop.keep_running() {
            thread::sleep(POLL_INTERVAL);
        }

        println!("Stopping...");
        let outcome = self.stop.outcome();
        if outcome != StopOutcome::NotStopped {
            eprintln!("{}", outcome);
        }
        info!(reason = ?self.stop.reason(), "Capture loop exited");
        Ok(outcome)
    }

    fn assemble_scene(&mut self, args: &CaptureArgs, canvas: Canvas) -> Result<(), CaptureError> {
        let scene = self
            .host
            .create_scene("Main Scene")
            .ok_or(CaptureError::SceneCreateFailed)?;

        let monitor = self.host.create_source(
            kinds::MONITOR_CAPTURE,
            "Screen Capture",
            &json!({ "monitor": args.monitor }),
        );
        match monitor {
            Some(source) => {
                // The active context is authoritative if libobs adjusted the canvas.
                let (width, height) = self
                    .host
                    .canvas_size()
                    .unwrap_or((canvas.width, canvas.height));
                let layout = SceneItemLayout::fill(width, height, canvas.rotation.degrees() as f32);
                if !self.host.add_to_scene(&scene, &source, &layout) {
                    warn!("Could not add monitor source to scene");
                }
                self.host.release_source(source);
            }
            None => eprintln!("Failed to create monitor source"),
        }

        self.host.bind_scene(VIDEO_CHANNEL, &scene);
        self.scene = Some(scene);
        self.channels_bound = true;

        let audio = [
            (DESKTOP_AUDIO_CHANNEL, kinds::DESKTOP_AUDIO, "Desktop Audio", &args.desktop_audio),
            (MIC_AUDIO_CHANNEL, kinds::MIC_AUDIO, "Mic Audio", &args.mic_audio),
        ];
        for (channel, kind, name, device) in audio {
            let Some(device) = device else {
                continue;
            };
            match self
                .host
                .create_source(kind, name, &json!({ "device_id": device }))
            {
                Some(source) => {
                    self.host.bind_source(channel, &source);
                    self.host.release_source(source);
                    debug!(channel, device = %device, "Bound audio source");
                }
                None => warn!(device = %device, "Failed to create {} source", name),
            }
        }

        Ok(())
    }

    fn create_output<'a>(&mut self, args: &'a CaptureArgs) -> Result<OutputTarget<'a>, CaptureError> {
        let target = args
            .output_target()
            .ok_or(CaptureError::NoOutputSpecified)?;

        match target {
            OutputTarget::Rtmp { url, key } => {
                self.output = self
                    .host
                    .create_output(kinds::RTMP_OUTPUT, "RTMP Stream", &serde_json::Value::Null);
                self.service = self.host.create_service(kinds::RTMP_SERVICE, "RTMP Service");
                if let Some(service) = &self.service {
                    self.host
                        .update_service(service, &json!({ "server": url, "key": key }));
                }
                match (&self.output, &self.service) {
                    (Some(output), Some(service)) => self.host.attach_service(output, service),
                    _ => return Err(CaptureError::OutputCreateFailed),
                }
            }
            OutputTarget::File(path) => {
                self.output = self.host.create_output(
                    kinds::FILE_OUTPUT,
                    "File Output",
                    &json!({ "path": path.to_string_lossy() }),
                );
                if self.output.is_none() {
                    return Err(CaptureError::OutputCreateFailed);
                }
            }
        }

        info!(target = %target, "Output created");
        Ok(target)
    }

    fn create_encoders(&mut self, args: &CaptureArgs) -> Result<(), CaptureError> {
        let video_settings = json!({ "bitrate": args.bitrate });
        let mut video =
            self.host
                .create_video_encoder(&args.encoder, "Video Encoder", &video_settings);
        if video.is_none() && args.encoder != DEFAULT_ENCODER {
            eprintln!(
                "Failed to create video encoder: {}, falling back to {}",
                args.encoder, DEFAULT_ENCODER
            );
            video = self
                .host
                .create_video_encoder(DEFAULT_ENCODER, "Video Encoder", &video_settings);
        }
        self.video_encoder = video;

        self.audio_encoder = self.host.create_audio_encoder(
            kinds::AAC_ENCODER,
            "Audio Encoder",
            &json!({ "bitrate": AUDIO_BITRATE_KBPS }),
        );

        let (Some(output), Some(video), Some(audio)) =
            (&self.output, &self.video_encoder, &self.audio_encoder)
        else {
            let missing = if self.video_encoder.is_none() {
                DEFAULT_ENCODER
            } else {
                kinds::AAC_ENCODER
            };
            return Err(CaptureError::EncoderCreateFailed(missing.to_string()));
        };

        self.host.bind_encoder_buses(video, audio);
        self.host.attach_encoders(output, video, audio);
        Ok(())
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        let Some(output) = &self.output else {
            return Err(CaptureError::OutputCreateFailed);
        };

        self.host.watch_output_stop(output, self.stop);

        log_critical_operation("obs_output_start");
        self.host
            .start_output(output)
            .map_err(CaptureError::OutputStartFailed)?;
        self.output_running = true;
        Ok(())
    }

    /// Release everything in reverse dependency order and shut libobs down.
    ///
    /// Safe to call repeatedly; later calls find nothing left to release.
    pub fn teardown(&mut self) {
        if let Some(output) = &self.output {
            if self.output_running {
                log_critical_operation("obs_output_stop");
                self.host.stop_output(output);
                self.output_running = false;
            }
        }
        if let Some(output) = self.output.take() {
            self.host.release_output(output);
        }
        if let Some(encoder) = self.video_encoder.take() {
            self.host.release_encoder(encoder);
        }
        if let Some(encoder) = self.audio_encoder.take() {
            self.host.release_encoder(encoder);
        }
        if let Some(scene) = self.scene.take() {
            self.host.release_scene(scene);
        }
        if let Some(service) = self.service.take() {
            self.host.release_service(service);
        }

        if self.channels_bound {
            for channel in [VIDEO_CHANNEL, DESKTOP_AUDIO_CHANNEL, MIC_AUDIO_CHANNEL] {
                self.host.clear_channel(channel);
            }
            self.channels_bound = false;
        }

        if self.started {
            log_critical_operation("obs_shutdown");
            self.host.shutdown();
            self.started = false;
            debug!("libobs shut down");
        }
    }
}

impl<H: MediaHost> Drop for CaptureSession<H> {
    fn drop(&mut self) {
        self.teardown();
    }
}
