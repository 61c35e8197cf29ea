//! Recording test double for [`MediaHost`]

use serde_json::Value;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use super::{AudioSettings, EncoderType, ListItem, MediaHost, SceneItemLayout, VideoSettings};
use crate::stop::StopCoordinator;

/// Handle kinds in release order assertions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Released {
    Source(String),
    Scene,
    Output,
    VideoEncoder,
    AudioEncoder,
    Service,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SilenceLogs,
    Startup(String),
    AddDataPath(String),
    LoadModules { log_loaded: bool },
    ResetVideo(VideoSettings),
    ResetAudio(AudioSettings),
    Shutdown,
    CreateScene(String),
    CreateSource { kind: String, name: String, settings: Value },
    AddToScene(SceneItemLayout),
    BindScene(u32),
    BindSource { channel: u32, kind: String },
    ClearChannel(u32),
    CreateOutput { kind: String, settings: Value },
    CreateService(String),
    UpdateService(Value),
    AttachService,
    CreateVideoEncoder { id: String, settings: Value },
    CreateAudioEncoder { id: String, settings: Value },
    BindEncoderBuses,
    AttachEncoders { video: String, audio: String },
    WatchOutputStop,
    StartOutput,
    StopOutput,
    Release(Released),
}

pub struct MockSource {
    kind: String,
}

pub struct MockScene;

pub struct MockEncoder {
    id: String,
    video: bool,
}

pub struct MockOutput;

pub struct MockService;

/// Scriptable in-memory host that logs every call
pub struct MockHost {
    calls: Rc<RefCell<Vec<Call>>>,
    pub startup_ok: bool,
    /// Results for successive video resets; `Ok` once exhausted
    pub video_results: VecDeque<Result<(), i32>>,
    pub audio_ok: bool,
    /// Source kinds, output kinds and encoder ids that fail to create
    pub unavailable: Vec<String>,
    pub encoder_types: Vec<EncoderType>,
    /// List-property items per source kind; missing kinds fail to instantiate
    pub property_items: HashMap<String, Vec<ListItem>>,
    pub start_error: Option<String>,
    /// Fire the output stop signal as soon as the output starts
    pub stop_on_start: Option<(i64, Option<String>)>,
    canvas: Option<(u32, u32)>,
    watcher: Option<&'static StopCoordinator>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            calls: Rc::new(RefCell::new(Vec::new())),
            startup_ok: true,
            video_results: VecDeque::new(),
            audio_ok: true,
            unavailable: Vec::new(),
            encoder_types: Vec::new(),
            property_items: HashMap::new(),
            start_error: None,
            stop_on_start: None,
            canvas: None,
            watcher: None,
        }
    }

    /// Shared view of the call log, usable after the host is moved
    pub fn log(&self) -> Rc<RefCell<Vec<Call>>> {
        Rc::clone(&self.calls)
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn available(&self, kind: &str) -> bool {
        !self.unavailable.iter().any(|k| k == kind)
    }
}

/// Handle releases in the order they happened
pub fn releases(calls: &[Call]) -> Vec<Released> {
    calls
        .iter()
        .filter_map(|call| match call {
            Call::Release(released) => Some(released.clone()),
            _ => None,
        })
        .collect()
}

impl MediaHost for MockHost {
    type Source = MockSource;
    type Scene = MockScene;
    type Encoder = MockEncoder;
    type Output = MockOutput;
    type Service = MockService;

    fn silence_logs(&mut self) {
        self.record(Call::SilenceLogs);
    }

    fn startup(&mut self, locale: &str) -> bool {
        self.record(Call::Startup(locale.to_string()));
        self.startup_ok
    }

    fn add_data_path(&mut self, path: &str) {
        self.record(Call::AddDataPath(path.to_string()));
    }

    fn load_modules(&mut self, log_loaded: bool) {
        self.record(Call::LoadModules { log_loaded });
    }

    fn reset_video(&mut self, video: &VideoSettings) -> Result<(), i32> {
        self.record(Call::ResetVideo(*video));
        let result = self.video_results.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            self.canvas = Some((video.width, video.height));
        }
        result
    }

    fn reset_audio(&mut self, audio: &AudioSettings) -> bool {
        self.record(Call::ResetAudio(*audio));
        self.audio_ok
    }

    fn canvas_size(&self) -> Option<(u32, u32)> {
        self.canvas
    }

    fn shutdown(&mut self) {
        self.record(Call::Shutdown);
    }

    fn create_scene(&mut self, name: &str) -> Option<MockScene> {
        self.record(Call::CreateScene(name.to_string()));
        self.available("scene").then_some(MockScene)
    }

    fn create_source(&mut self, kind: &str, name: &str, settings: &Value) -> Option<MockSource> {
        self.record(Call::CreateSource {
            kind: kind.to_string(),
            name: name.to_string(),
            settings: settings.clone(),
        });
        self.available(kind).then(|| MockSource {
            kind: kind.to_string(),
        })
    }

    fn add_to_scene(&mut self, _scene: &MockScene, _source: &MockSource, layout: &SceneItemLayout) -> bool {
        self.record(Call::AddToScene(*layout));
        true
    }

    fn bind_scene(&mut self, channel: u32, _scene: &MockScene) {
        self.record(Call::BindScene(channel));
    }

    fn bind_source(&mut self, channel: u32, source: &MockSource) {
        self.record(Call::BindSource {
            channel,
            kind: source.kind.clone(),
        });
    }

    fn clear_channel(&mut self, channel: u32) {
        self.record(Call::ClearChannel(channel));
    }

    fn release_source(&mut self, source: MockSource) {
        self.record(Call::Release(Released::Source(source.kind)));
    }

    fn release_scene(&mut self, _scene: MockScene) {
        self.record(Call::Release(Released::Scene));
    }

    fn create_output(&mut self, kind: &str, _name: &str, settings: &Value) -> Option<MockOutput> {
        self.record(Call::CreateOutput {
            kind: kind.to_string(),
            settings: settings.clone(),
        });
        self.available(kind).then_some(MockOutput)
    }

    fn create_service(&mut self, kind: &str, _name: &str) -> Option<MockService> {
        self.record(Call::CreateService(kind.to_string()));
        self.available(kind).then_some(MockService)
    }

    fn update_service(&mut self, _service: &MockService, settings: &Value) {
        self.record(Call::UpdateService(settings.clone()));
    }

    fn attach_service(&mut self, _output: &MockOutput, _service: &MockService) {
        self.record(Call::AttachService);
    }

    fn create_video_encoder(&mut self, id: &str, _name: &str, settings: &Value) -> Option<MockEncoder> {
        self.record(Call::CreateVideoEncoder {
            id: id.to_string(),
            settings: settings.clone(),
        });
        self.available(id).then(|| MockEncoder {
            id: id.to_string(),
            video: true,
        })
    }

    fn create_audio_encoder(&mut self, id: &str, _name: &str, settings: &Value) -> Option<MockEncoder> {
        self.record(Call::CreateAudioEncoder {
            id: id.to_string(),
            settings: settings.clone(),
        });
        self.available(id).then(|| MockEncoder {
            id: id.to_string(),
            video: false,
        })
    }

    fn bind_encoder_buses(&mut self, _video: &MockEncoder, _audio: &MockEncoder) {
        self.record(Call::BindEncoderBuses);
    }

    fn attach_encoders(&mut self, _output: &MockOutput, video: &MockEncoder, audio: &MockEncoder) {
        self.record(Call::AttachEncoders {
            video: video.id.clone(),
            audio: audio.id.clone(),
        });
    }

    fn watch_output_stop(&mut self, _output: &MockOutput, coordinator: &'static StopCoordinator) {
        self.record(Call::WatchOutputStop);
        self.watcher = Some(coordinator);
    }

    fn start_output(&mut self, _output: &MockOutput) -> Result<(), String> {
        self.record(Call::StartOutput);
        if let Some(error) = &self.start_error {
            return Err(error.clone());
        }
        if let (Some((code, error)), Some(watcher)) = (self.stop_on_start.take(), self.watcher) {
            watcher.record_output_stop(code, error);
        }
        Ok(())
    }

    fn stop_output(&mut self, _output: &MockOutput) {
        self.record(Call::StopOutput);
        // libobs raises `stop` with code 0 on a requested stop
        if let Some(watcher) = self.watcher {
            watcher.record_output_stop(0, None);
        }
    }

    fn release_output(&mut self, _output: MockOutput) {
        self.record(Call::Release(Released::Output));
    }

    fn release_encoder(&mut self, encoder: MockEncoder) {
        let kind = if encoder.video {
            Released::VideoEncoder
        } else {
            Released::AudioEncoder
        };
        self.record(Call::Release(kind));
    }

    fn release_service(&mut self, _service: MockService) {
        self.record(Call::Release(Released::Service));
    }

    fn encoder_types(&self) -> Vec<EncoderType> {
        self.encoder_types.clone()
    }

    fn list_source_property(&mut self, kind: &str, _property: &str) -> Option<Vec<ListItem>> {
        self.property_items.get(kind).cloned()
    }
}
