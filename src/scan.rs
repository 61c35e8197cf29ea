//! Device scan report
//!
//! Lists capturable screens, audio endpoints and usable encoders as one
//! JSON document on stdout, for front-ends to feed back into capture flags.

use serde::Serialize;
use tracing::{debug, warn};

use crate::display::DisplayEnumerator;
use crate::host::{kinds, MediaHost};

const DEVICE_ID_PROPERTY: &str = "device_id";
const HARDWARE_ENCODER_MARKERS: [&str; 3] = ["nvenc", "amf", "qsv"];
const SOFTWARE_ENCODER: &str = "obs_x264";

/// One selectable device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub id: String,
    pub name: String,
}

/// Scan output; field order is the JSON key order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub screens: Vec<Device>,
    pub desktop_audio: Vec<Device>,
    pub microphone: Vec<Device>,
    pub encoders: Vec<Device>,
}

impl ScanReport {
    pub fn collect<H, D>(host: &mut H, displays: &D) -> Self
    where
        H: MediaHost,
        D: DisplayEnumerator + ?Sized,
    {
        let screens = displays
            .list()
            .iter()
            .map(|monitor| Device {
                id: monitor.index.to_string(),
                name: monitor.display_name(),
            })
            .collect();

        let report = Self {
            screens,
            desktop_audio: audio_devices(host, kinds::DESKTOP_AUDIO),
            microphone: audio_devices(host, kinds::MIC_AUDIO),
            encoders: encoders(host),
        };

        debug!(
            screens = report.screens.len(),
            desktop_audio = report.desktop_audio.len(),
            microphone = report.microphone.len(),
            encoders = report.encoders.len(),
            "Scan complete"
        );
        report
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn audio_devices<H: MediaHost>(host: &mut H, kind: &str) -> Vec<Device> {
    let Some(items) = host.list_source_property(kind, DEVICE_ID_PROPERTY) else {
        warn!("Could not instantiate {} for device listing", kind);
        return Vec::new();
    };

    items
        .into_iter()
        .filter(|item| !item.value.is_empty())
        .map(|item| Device {
            id: item.value,
            name: item.name,
        })
        .collect()
}

fn is_listed_encoder(id: &str) -> bool {
    id == SOFTWARE_ENCODER || HARDWARE_ENCODER_MARKERS.iter().any(|m| id.contains(m))
}

fn encoders<H: MediaHost>(host: &H) -> Vec<Device> {
    host.encoder_types()
        .into_iter()
        .filter(|encoder| is_listed_encoder(&encoder.id))
        .map(|encoder| Device {
            name: encoder
                .display_name
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| encoder.id.clone()),
            id: encoder.id,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{test_monitor, Monitor};
    use crate::host::mock::MockHost;
    use crate::host::{EncoderType, ListItem};

    fn encoder(id: &str, name: Option<&str>) -> EncoderType {
        EncoderType {
            id: id.to_string(),
            display_name: name.map(str::to_string),
        }
    }

    fn item(name: &str, value: &str) -> ListItem {
        ListItem {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    fn scenario_host() -> MockHost {
        let mut host = MockHost::new();
        host.encoder_types = vec![
            encoder("obs_x264", Some("x264")),
            encoder("jim_nvenc", Some("NVIDIA NVENC H.264")),
            encoder("ffmpeg_aac", Some("FFmpeg AAC")),
            encoder("obs_x264_lossless", None),
            encoder("h264_texture_amf", None),
            encoder("obs_qsv11_v2", Some("")),
        ];
        host.property_items.insert(
            kinds::DESKTOP_AUDIO.to_string(),
            vec![item("Default", "default"), item("Speakers", "{0.0.0.0001}")],
        );
        host.property_items.insert(
            kinds::MIC_AUDIO.to_string(),
            vec![item("Blank", ""), item("Headset", "{0.0.1.0002}")],
        );
        host
    }

    #[test]
    fn test_two_monitor_scan() {
        let mut host = scenario_host();
        let displays = vec![
            test_monitor(0, 0, 1920, 1080, true),
            test_monitor(1, 1920, 2560, 1440, false),
        ];

        let report = ScanReport::collect(&mut host, &displays);

        assert_eq!(report.screens.len(), 2);
        assert_eq!(report.screens[0].id, "0");
        assert!(report.screens[0]
            .name
            .starts_with("Display 1: 1920x1080 @ 0,0 (Primary Monitor)"));
        assert_eq!(report.screens[1].name, "Display 2: 2560x1440 @ 1920,0");
        assert!(report.encoders.iter().any(|e| e.id == "obs_x264"));
        assert!(report.encoders.iter().any(|e| e.id.contains("nvenc")));
    }

    #[test]
    fn test_encoder_filter_and_name_fallback() {
        let mut host = scenario_host();
        let report = ScanReport::collect(&mut host, &Vec::<Monitor>::new());

        let ids: Vec<&str> = report.encoders.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(
            ids,
            ["obs_x264", "jim_nvenc", "h264_texture_amf", "obs_qsv11_v2"]
        );
        assert_eq!(report.encoders[2].name, "h264_texture_amf");
        assert_eq!(report.encoders[3].name, "obs_qsv11_v2");
    }

    #[test]
    fn test_audio_devices_skip_empty_ids() {
        let mut host = scenario_host();
        let report = ScanReport::collect(&mut host, &Vec::<Monitor>::new());

        assert_eq!(report.desktop_audio.len(), 2);
        assert_eq!(
            report.microphone,
            vec![Device {
                id: "{0.0.1.0002}".to_string(),
                name: "Headset".to_string(),
            }]
        );
    }

    #[test]
    fn test_missing_audio_source_yields_empty_list() {
        let mut host = MockHost::new();
        let report = ScanReport::collect(&mut host, &Vec::<Monitor>::new());
        assert!(report.desktop_audio.is_empty());
        assert!(report.microphone.is_empty());
        assert!(report.encoders.is_empty());
    }

    #[test]
    fn test_json_key_order_and_ids() {
        let mut host = scenario_host();
        let displays = vec![test_monitor(0, 0, 1920, 1080, true)];
        let json = ScanReport::collect(&mut host, &displays).to_json().unwrap();

        let positions: Vec<usize> = ["\"screens\"", "\"desktop_audio\"", "\"microphone\"", "\"encoders\""]
            .iter()
            .map(|key| json.find(key).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 4);
        for devices in object.values() {
            for device in devices.as_array().unwrap() {
                assert!(!device["id"].as_str().unwrap().is_empty());
            }
        }
    }
}
