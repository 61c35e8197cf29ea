//! libobs implementation of [`MediaHost`]
//!
//! Thin unsafe layer over the C API exposed by the `libobs` bindings. Each
//! wrapper type holds one strong reference; ownership moves back to libobs
//! through the matching `release_*` call.

use serde_json::Value;
use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::mem;
use std::ptr::{self, NonNull};
use tracing::{debug, warn};

use libobs::{
    calldata_t, obs_audio_info, obs_data_t, obs_encoder_t, obs_output_t, obs_scene_t,
    obs_service_t, obs_source_t, obs_transform_info, obs_video_info, vec2,
};

use super::{AudioSettings, EncoderType, ListItem, MediaHost, SceneItemLayout, VideoSettings};
use crate::stop::StopCoordinator;

const GRAPHICS_MODULE: &CStr = c"libobs-d3d11";
const TRANSIENT_SOURCE_NAME: &CStr = c"temp_audio";
const STOP_SIGNAL: &CStr = c"stop";

pub struct ObsSource(NonNull<obs_source_t>);
pub struct ObsScene(NonNull<obs_scene_t>);
pub struct ObsEncoder(NonNull<obs_encoder_t>);
pub struct ObsOutput(NonNull<obs_output_t>);
pub struct ObsService(NonNull<obs_service_t>);

/// Process-global libobs instance
#[derive(Debug, Default)]
pub struct ObsHost;

/// Owned `obs_data_t` built from JSON, released on drop
struct ObsData(NonNull<obs_data_t>);

impl ObsData {
    fn from_json(value: &Value) -> Option<Self> {
        if value.is_null() {
            return None;
        }
        let json = to_cstring(&value.to_string());
        let data = unsafe { libobs::obs_data_create_from_json(json.as_ptr()) };
        if data.is_null() {
            warn!("libobs rejected settings: {}", value);
        }
        NonNull::new(data).map(Self)
    }

    fn ptr(data: &Option<Self>) -> *mut obs_data_t {
        data.as_ref().map_or(ptr::null_mut(), |d| d.0.as_ptr())
    }
}

impl Drop for ObsData {
    fn drop(&mut self) {
        unsafe { libobs::obs_data_release(self.0.as_ptr()) }
    }
}

fn to_cstring(value: &str) -> CString {
    CString::new(value.replace('\0', "")).unwrap_or_default()
}

/// Copy a borrowed C string owned by libobs.
unsafe fn copy_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}

/// `vec2` wraps `{ float x, y; }` in an anonymous union with `float ptr[2]`.
fn set_vec2(v: &mut vec2, x: f32, y: f32) {
    unsafe {
        v.__bindgen_anon_1.__bindgen_anon_1.x = x;
        v.__bindgen_anon_1.__bindgen_anon_1.y = y;
    }
}

fn video_info(video: &VideoSettings) -> obs_video_info {
    let mut ovi: obs_video_info = unsafe { mem::zeroed() };
    ovi.adapter = 0;
    ovi.graphics_module = GRAPHICS_MODULE.as_ptr();
    ovi.fps_num = video.fps;
    ovi.fps_den = 1;
    ovi.base_width = video.width;
    ovi.base_height = video.height;
    ovi.output_width = video.width;
    ovi.output_height = video.height;
    ovi.output_format = libobs::video_format_VIDEO_FORMAT_NV12;
    ovi.colorspace = libobs::video_colorspace_VIDEO_CS_709;
    ovi.range = libobs::video_range_type_VIDEO_RANGE_PARTIAL;
    ovi.gpu_conversion = true;
    ovi.scale_type = libobs::obs_scale_type_OBS_SCALE_BICUBIC;
    ovi
}

unsafe extern "C" fn discard_log(
    _level: c_int,
    _msg: *const c_char,
    _args: libobs::va_list,
    _param: *mut c_void,
) {
}

/// Output `stop` signal handler; `data` is the `&'static StopCoordinator`.
unsafe extern "C" fn output_stopped(data: *mut c_void, calldata: *mut calldata_t) {
    let coordinator = &*(data as *const StopCoordinator);

    let mut code: i64 = 0;
    libobs::calldata_get_data(
        calldata,
        c"code".as_ptr(),
        &mut code as *mut i64 as *mut c_void,
        mem::size_of::<i64>(),
    );

    let mut last_error: *const c_char = ptr::null();
    libobs::calldata_get_string(calldata, c"last_error".as_ptr(), &mut last_error);

    coordinator.record_output_stop(code, copy_str(last_error));
}

impl MediaHost for ObsHost {
    type Source = ObsSource;
    type Scene = ObsScene;
    type Encoder = ObsEncoder;
    type Output = ObsOutput;
    type Service = ObsService;

    fn silence_logs(&mut self) {
        unsafe { libobs::base_set_log_handler(Some(discard_log), ptr::null_mut()) }
    }

    fn startup(&mut self, locale: &str) -> bool {
        let locale = to_cstring(locale);
        unsafe { libobs::obs_startup(locale.as_ptr(), ptr::null(), ptr::null_mut()) }
    }

    fn add_data_path(&mut self, path: &str) {
        let path = to_cstring(path);
        unsafe { libobs::obs_add_data_path(path.as_ptr()) }
    }

    fn load_modules(&mut self, log_loaded: bool) {
        unsafe {
            libobs::obs_load_all_modules();
            libobs::obs_post_load_modules();
            if log_loaded {
                libobs::obs_log_loaded_modules();
            }
        }
    }

    fn reset_video(&mut self, video: &VideoSettings) -> Result<(), i32> {
        let mut ovi = video_info(video);
        let ret = unsafe { libobs::obs_reset_video(&mut ovi) };
        if ret == libobs::OBS_VIDEO_SUCCESS as i32 {
            Ok(())
        } else {
            Err(ret)
        }
    }

    fn reset_audio(&mut self, audio: &AudioSettings) -> bool {
        let mut oai: obs_audio_info = unsafe { mem::zeroed() };
        oai.samples_per_sec = audio.samples_per_sec;
        oai.speakers = libobs::speaker_layout_SPEAKERS_STEREO;
        unsafe { libobs::obs_reset_audio(&oai) }
    }

    fn canvas_size(&self) -> Option<(u32, u32)> {
        let mut ovi: obs_video_info = unsafe { mem::zeroed() };
        unsafe { libobs::obs_get_video_info(&mut ovi) }.then_some((ovi.base_width, ovi.base_height))
    }

    fn shutdown(&mut self) {
        unsafe { libobs::obs_shutdown() }
    }

    fn create_scene(&mut self, name: &str) -> Option<ObsScene> {
        let name = to_cstring(name);
        NonNull::new(unsafe { libobs::obs_scene_create(name.as_ptr()) }).map(ObsScene)
    }

    fn create_source(&mut self, kind: &str, name: &str, settings: &Value) -> Option<ObsSource> {
        let (kind, name) = (to_cstring(kind), to_cstring(name));
        let data = ObsData::from_json(settings);
        let source = unsafe {
            libobs::obs_source_create(
                kind.as_ptr(),
                name.as_ptr(),
                ObsData::ptr(&data),
                ptr::null_mut(),
            )
        };
        NonNull::new(source).map(ObsSource)
    }

    fn add_to_scene(&mut self, scene: &ObsScene, source: &ObsSource, layout: &SceneItemLayout) -> bool {
        let item = unsafe { libobs::obs_scene_add(scene.0.as_ptr(), source.0.as_ptr()) };
        if item.is_null() {
            return false;
        }

        let mut info: obs_transform_info = unsafe { mem::zeroed() };
        unsafe { libobs::obs_sceneitem_get_info2(item, &mut info) };
        info.bounds_type = libobs::obs_bounds_type_OBS_BOUNDS_SCALE_INNER;
        set_vec2(&mut info.bounds, layout.bounds.0, layout.bounds.1);
        info.alignment = libobs::OBS_ALIGN_CENTER;
        info.bounds_alignment = libobs::OBS_ALIGN_CENTER;
        set_vec2(&mut info.pos, layout.position.0, layout.position.1);
        info.rot = layout.rotation;
        unsafe { libobs::obs_sceneitem_set_info2(item, &info) };
        true
    }

    fn bind_scene(&mut self, channel: u32, scene: &ObsScene) {
        unsafe {
            let source = libobs::obs_scene_get_source(scene.0.as_ptr());
            libobs::obs_set_output_source(channel, source);
        }
    }

    fn bind_source(&mut self, channel: u32, source: &ObsSource) {
        unsafe { libobs::obs_set_output_source(channel, source.0.as_ptr()) }
    }

    fn clear_channel(&mut self, channel: u32) {
        unsafe { libobs::obs_set_output_source(channel, ptr::null_mut()) }
    }

    fn release_source(&mut self, source: ObsSource) {
        unsafe { libobs::obs_source_release(source.0.as_ptr()) }
    }

    fn release_scene(&mut self, scene: ObsScene) {
        unsafe { libobs::obs_scene_release(scene.0.as_ptr()) }
    }

    fn create_output(&mut self, kind: &str, name: &str, settings: &Value) -> Option<ObsOutput> {
        let (kind, name) = (to_cstring(kind), to_cstring(name));
        let data = ObsData::from_json(settings);
        let output = unsafe {
            libobs::obs_output_create(
                kind.as_ptr(),
                name.as_ptr(),
                ObsData::ptr(&data),
                ptr::null_mut(),
            )
        };
        NonNull::new(output).map(ObsOutput)
    }

    fn create_service(&mut self, kind: &str, name: &str) -> Option<ObsService> {
        let (kind, name) = (to_cstring(kind), to_cstring(name));
        let service = unsafe {
            libobs::obs_service_create(kind.as_ptr(), name.as_ptr(), ptr::null_mut(), ptr::null_mut())
        };
        NonNull::new(service).map(ObsService)
    }

    fn update_service(&mut self, service: &ObsService, settings: &Value) {
        let data = ObsData::from_json(settings);
        if data.is_some() {
            unsafe { libobs::obs_service_update(service.0.as_ptr(), ObsData::ptr(&data)) }
        }
    }

    fn attach_service(&mut self, output: &ObsOutput, service: &ObsService) {
        unsafe { libobs::obs_output_set_service(output.0.as_ptr(), service.0.as_ptr()) }
    }

    fn create_video_encoder(&mut self, id: &str, name: &str, settings: &Value) -> Option<ObsEncoder> {
        let (id, name) = (to_cstring(id), to_cstring(name));
        let data = ObsData::from_json(settings);
        let encoder = unsafe {
            libobs::obs_video_encoder_create(
                id.as_ptr(),
                name.as_ptr(),
                ObsData::ptr(&data),
                ptr::null_mut(),
            )
        };
        NonNull::new(encoder).map(ObsEncoder)
    }

    fn create_audio_encoder(&mut self, id: &str, name: &str, settings: &Value) -> Option<ObsEncoder> {
        let (id, name) = (to_cstring(id), to_cstring(name));
        let data = ObsData::from_json(settings);
        let encoder = unsafe {
            libobs::obs_audio_encoder_create(
                id.as_ptr(),
                name.as_ptr(),
                ObsData::ptr(&data),
                0,
                ptr::null_mut(),
            )
        };
        NonNull::new(encoder).map(ObsEncoder)
    }

    fn bind_encoder_buses(&mut self, video: &ObsEncoder, audio: &ObsEncoder) {
        let (video, audio) = (video.0.as_ptr(), audio.0.as_ptr());
        unsafe {
            libobs::obs_encoder_set_video(video, libobs::obs_get_video());
            libobs::obs_encoder_set_audio(audio, libobs::obs_get_audio());
            libobs::obs_encoder_set_preferred_video_format(
                video,
                libobs::video_format_VIDEO_FORMAT_NV12,
            );
            libobs::obs_encoder_set_preferred_color_space(
                video,
                libobs::video_colorspace_VIDEO_CS_709,
            );
            libobs::obs_encoder_set_preferred_range(
                video,
                libobs::video_range_type_VIDEO_RANGE_PARTIAL,
            );
        }
    }

    fn attach_encoders(&mut self, output: &ObsOutput, video: &ObsEncoder, audio: &ObsEncoder) {
        unsafe {
            libobs::obs_output_set_video_encoder(output.0.as_ptr(), video.0.as_ptr());
            libobs::obs_output_set_audio_encoder(output.0.as_ptr(), audio.0.as_ptr(), 0);
        }
    }

    fn watch_output_stop(&mut self, output: &ObsOutput, coordinator: &'static StopCoordinator) {
        let handler = unsafe { libobs::obs_output_get_signal_handler(output.0.as_ptr()) };
        if handler.is_null() {
            warn!("Output has no signal handler; unexpected stops will go unnoticed");
            return;
        }
        unsafe {
            libobs::signal_handler_connect_ref(
                handler,
                STOP_SIGNAL.as_ptr(),
                Some(output_stopped),
                coordinator as *const StopCoordinator as *mut c_void,
            );
        }
        debug!("Connected output stop signal");
    }

    fn start_output(&mut self, output: &ObsOutput) -> Result<(), String> {
        if unsafe { libobs::obs_output_start(output.0.as_ptr()) } {
            return Ok(());
        }
        let error = unsafe { copy_str(libobs::obs_output_get_last_error(output.0.as_ptr())) };
        Err(error.unwrap_or_else(|| "unknown error".to_string()))
    }

    fn stop_output(&mut self, output: &ObsOutput) {
        unsafe { libobs::obs_output_stop(output.0.as_ptr()) }
    }

    fn release_output(&mut self, output: ObsOutput) {
        unsafe { libobs::obs_output_release(output.0.as_ptr()) }
    }

    fn release_encoder(&mut self, encoder: ObsEncoder) {
        unsafe { libobs::obs_encoder_release(encoder.0.as_ptr()) }
    }

    fn release_service(&mut self, service: ObsService) {
        unsafe { libobs::obs_service_release(service.0.as_ptr()) }
    }

    fn encoder_types(&self) -> Vec<EncoderType> {
        let mut types = Vec::new();
        let mut idx = 0usize;
        let mut id: *const c_char = ptr::null();

        while unsafe { libobs::obs_enum_encoder_types(idx, &mut id) } {
            idx += 1;
            let Some(id_str) = (unsafe { copy_str(id) }) else {
                continue;
            };
            let display_name = unsafe { copy_str(libobs::obs_encoder_get_display_name(id)) };
            types.push(EncoderType {
                id: id_str,
                display_name,
            });
        }

        types
    }

    fn list_source_property(&mut self, kind: &str, property: &str) -> Option<Vec<ListItem>> {
        let (kind, property) = (to_cstring(kind), to_cstring(property));
        let source = unsafe {
            libobs::obs_source_create(
                kind.as_ptr(),
                TRANSIENT_SOURCE_NAME.as_ptr(),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        if source.is_null() {
            return None;
        }

        let mut items = Vec::new();
        unsafe {
            let props = libobs::obs_source_properties(source);
            if !props.is_null() {
                let prop = libobs::obs_properties_get(props, property.as_ptr());
                if !prop.is_null() {
                    let count = libobs::obs_property_list_item_count(prop);
                    for i in 0..count {
                        let name = copy_str(libobs::obs_property_list_item_name(prop, i));
                        let value = copy_str(libobs::obs_property_list_item_string(prop, i));
                        if let (Some(name), Some(value)) = (name, value) {
                            items.push(ListItem { name, value });
                        }
                    }
                }
                libobs::obs_properties_destroy(props);
            }
            libobs::obs_source_release(source);
        }

        Some(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_vec2_writes_both_components() {
        let mut v: vec2 = unsafe { mem::zeroed() };
        set_vec2(&mut v, 960.0, 540.0);
        let xy = unsafe { v.__bindgen_anon_1.__bindgen_anon_1 };
        assert_eq!((xy.x, xy.y), (960.0, 540.0));
    }
}
