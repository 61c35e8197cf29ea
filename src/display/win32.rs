//! Win32 monitor enumeration

use tracing::{debug, instrument};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{BOOL, LPARAM, RECT};
use windows::Win32::Graphics::Gdi::{
    EnumDisplayMonitors, EnumDisplaySettingsExW, GetMonitorInfoW, DEVMODEW, DMDO_180, DMDO_270,
    DMDO_90, ENUM_CURRENT_SETTINGS, ENUM_DISPLAY_SETTINGS_FLAGS, HDC, HMONITOR, MONITORINFOEXW,
};

use super::{DisplayEnumerator, Monitor, Rect, Rotation};

const MONITORINFOF_PRIMARY: u32 = 1;

/// Monitors as reported by `EnumDisplayMonitors`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDisplays;

impl DisplayEnumerator for SystemDisplays {
    #[instrument(name = "enumerate_monitors", skip(self))]
    fn list(&self) -> Vec<Monitor> {
        let mut monitors: Vec<Monitor> = Vec::new();

        let ok = unsafe {
            EnumDisplayMonitors(
                HDC::default(),
                None,
                Some(enum_monitor_callback),
                LPARAM(&mut monitors as *mut Vec<Monitor> as isize),
            )
        };
        if !ok.as_bool() {
            debug!("EnumDisplayMonitors reported failure");
        }

        debug!(count = monitors.len(), "Enumerated monitors");
        monitors
    }
}

unsafe extern "system" fn enum_monitor_callback(
    hmonitor: HMONITOR,
    _hdc: HDC,
    rect: *mut RECT,
    lparam: LPARAM,
) -> BOOL {
    let monitors = &mut *(lparam.0 as *mut Vec<Monitor>);

    let mut info = MONITORINFOEXW::default();
    info.monitorInfo.cbSize = std::mem::size_of::<MONITORINFOEXW>() as u32;
    let have_info = GetMonitorInfoW(hmonitor, &mut info.monitorInfo).as_bool();

    let bounds = if rect.is_null() {
        info.monitorInfo.rcMonitor
    } else {
        *rect
    };
    let rect = Rect {
        left: bounds.left,
        top: bounds.top,
        right: bounds.right,
        bottom: bounds.bottom,
    };

    let device_len = info
        .szDevice
        .iter()
        .position(|&c| c == 0)
        .unwrap_or(info.szDevice.len());
    let device = String::from_utf16_lossy(&info.szDevice[..device_len]);

    let mut mode = DEVMODEW {
        dmSize: std::mem::size_of::<DEVMODEW>() as u16,
        ..Default::default()
    };
    let have_mode = have_info
        && EnumDisplaySettingsExW(
            PCWSTR(info.szDevice.as_ptr()),
            ENUM_CURRENT_SETTINGS,
            &mut mode,
            ENUM_DISPLAY_SETTINGS_FLAGS(0),
        )
        .as_bool();

    let (width, height, rotation) = if have_mode {
        let rotation = match mode.Anonymous1.Anonymous2.dmDisplayOrientation {
            o if o == DMDO_90 => Rotation::Deg90,
            o if o == DMDO_180 => Rotation::Deg180,
            o if o == DMDO_270 => Rotation::Deg270,
            _ => Rotation::None,
        };
        (mode.dmPelsWidth, mode.dmPelsHeight, rotation)
    } else {
        (rect.width(), rect.height(), Rotation::None)
    };

    monitors.push(Monitor {
        index: monitors.len(),
        rect,
        device,
        width,
        height,
        rotation,
        primary: (info.monitorInfo.dwFlags & MONITORINFOF_PRIMARY) != 0,
    });

    BOOL::from(true)
}
