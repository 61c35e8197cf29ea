//! Media host façade
//!
//! The capture controller and the scan reporter talk to libobs only through
//! [`MediaHost`]. Handles are reference-counted on the library side; every
//! handle a `create_*` call returns is owned by the caller and must come
//! back through the matching `release_*` call exactly once.

#[cfg(test)]
pub mod mock;
#[cfg(windows)]
mod obs;

#[cfg(windows)]
pub use obs::ObsHost;

use serde_json::Value;

use crate::stop::StopCoordinator;

/// Plugin type identifiers used by the driver
pub mod kinds {
    pub const MONITOR_CAPTURE: &str = "monitor_capture";
    pub const DESKTOP_AUDIO: &str = "wasapi_output_capture";
    pub const MIC_AUDIO: &str = "wasapi_input_capture";
    pub const FILE_OUTPUT: &str = "ffmpeg_muxer";
    pub const RTMP_OUTPUT: &str = "rtmp_output";
    pub const RTMP_SERVICE: &str = "rtmp_custom";
    pub const AAC_ENCODER: &str = "ffmpeg_aac";
}

/// Video context dimensions and rate.
///
/// The pixel pipeline is fixed: NV12, BT.709, partial range, GPU
/// conversion, bicubic scaling, D3D11 backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl VideoSettings {
    /// Placeholder context so plugins that query video state during
    /// property enumeration see a live canvas.
    pub const PROVISIONAL: Self = Self {
        width: 1920,
        height: 1080,
        fps: 30,
    };
}

/// Audio context, always stereo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSettings {
    pub samples_per_sec: u32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            samples_per_sec: 48_000,
        }
    }
}

/// Placement of a source inside a scene.
///
/// Bounds are scale-inner with center alignment; `position` is the item's
/// center point on the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneItemLayout {
    pub bounds: (f32, f32),
    pub position: (f32, f32),
    /// Clockwise degrees
    pub rotation: f32,
}

impl SceneItemLayout {
    /// Fill a canvas of the given size, rotated about its center.
    pub fn fill(canvas_width: u32, canvas_height: u32, rotation: f32) -> Self {
        let (width, height) = (canvas_width as f32, canvas_height as f32);
        Self {
            bounds: (width, height),
            position: (width * 0.5, height * 0.5),
            rotation,
        }
    }
}

/// One entry of an enumerated list property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub name: String,
    pub value: String,
}

/// A registered encoder type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderType {
    pub id: String,
    pub display_name: Option<String>,
}

/// Narrow interface into the media pipeline library
///
/// Settings are JSON objects; `Value::Null` means "no settings".
pub trait MediaHost {
    type Source;
    type Scene;
    type Encoder;
    type Output;
    type Service;

    /// Discard library log output (scan mode keeps stdout clean).
    fn silence_logs(&mut self);
    fn startup(&mut self, locale: &str) -> bool;
    fn add_data_path(&mut self, path: &str);
    /// Load all plugin modules and run their post-load hooks.
    fn load_modules(&mut self, log_loaded: bool);
    /// Returns the library's error code on failure.
    fn reset_video(&mut self, video: &VideoSettings) -> Result<(), i32>;
    fn reset_audio(&mut self, audio: &AudioSettings) -> bool;
    /// Base canvas size of the active video context
    fn canvas_size(&self) -> Option<(u32, u32)>;
    fn shutdown(&mut self);

    fn create_scene(&mut self, name: &str) -> Option<Self::Scene>;
    fn create_source(&mut self, kind: &str, name: &str, settings: &Value) -> Option<Self::Source>;
    fn add_to_scene(
        &mut self,
        scene: &Self::Scene,
        source: &Self::Source,
        layout: &SceneItemLayout,
    ) -> bool;
    /// Bind a scene to an output channel; the channel takes its own reference.
    fn bind_scene(&mut self, channel: u32, scene: &Self::Scene);
    /// Bind a source to an output channel; the channel takes its own reference.
    fn bind_source(&mut self, channel: u32, source: &Self::Source);
    fn clear_channel(&mut self, channel: u32);
    fn release_source(&mut self, source: Self::Source);
    fn release_scene(&mut self, scene: Self::Scene);

    fn create_output(&mut self, kind: &str, name: &str, settings: &Value) -> Option<Self::Output>;
    fn create_service(&mut self, kind: &str, name: &str) -> Option<Self::Service>;
    fn update_service(&mut self, service: &Self::Service, settings: &Value);
    fn attach_service(&mut self, output: &Self::Output, service: &Self::Service);
    fn create_video_encoder(
        &mut self,
        id: &str,
        name: &str,
        settings: &Value,
    ) -> Option<Self::Encoder>;
    fn create_audio_encoder(
        &mut self,
        id: &str,
        name: &str,
        settings: &Value,
    ) -> Option<Self::Encoder>;
    /// Connect encoders to the current video/audio buses and declare the
    /// video encoder's preferred format.
    fn bind_encoder_buses(&mut self, video: &Self::Encoder, audio: &Self::Encoder);
    fn attach_encoders(&mut self, output: &Self::Output, video: &Self::Encoder, audio: &Self::Encoder);
    /// Forward the output's `stop` signal (`code`, `last_error`) to the coordinator.
    fn watch_output_stop(&mut self, output: &Self::Output, coordinator: &'static StopCoordinator);
    /// Returns the output's last error on failure.
    fn start_output(&mut self, output: &Self::Output) -> Result<(), String>;
    fn stop_output(&mut self, output: &Self::Output);
    fn release_output(&mut self, output: Self::Output);
    fn release_encoder(&mut self, encoder: Self::Encoder);
    fn release_service(&mut self, service: Self::Service);

    fn encoder_types(&self) -> Vec<EncoderType>;
    /// Items of a list property, read from a transient source of `kind`.
    ///
    /// Returns `None` if the source cannot be instantiated.
    fn list_source_property(&mut self, kind: &str, property: &str) -> Option<Vec<ListItem>>;
}
