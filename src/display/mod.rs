//! Monitor enumeration
//!
//! Portable monitor model plus the OS binding that fills it. Lists are
//! produced on demand and never cached, so a scan always reflects the
//! current display layout.

#[cfg(windows)]
mod win32;

#[cfg(windows)]
pub use win32::SystemDisplays;

/// Display rotation reported by the current display mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }
}

/// Monitor bounds in virtual-screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn width(&self) -> u32 {
        (self.right - self.left).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom - self.top).max(0) as u32
    }
}

/// A connected monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Monitor {
    /// 0-based enumeration order
    pub index: usize,
    pub rect: Rect,
    /// OS device name (e.g. `\\.\DISPLAY1`)
    pub device: String,
    /// Pixel width of the current mode
    pub width: u32,
    /// Pixel height of the current mode
    pub height: u32,
    pub rotation: Rotation,
    pub primary: bool,
}

impl Monitor {
    /// Human-readable name used in the scan report
    ///
    /// Format: `Display N: WxH @ X,Y[ (Primary Monitor)][ rot=R]`
    pub fn display_name(&self) -> String {
        let mut name = format!(
            "Display {}: {}x{} @ {},{}",
            self.index + 1,
            self.width,
            self.height,
            self.rect.left,
            self.rect.top
        );
        if self.primary {
            name.push_str(" (Primary Monitor)");
        }
        if self.rotation != Rotation::None {
            name.push_str(&format!(" rot={}", self.rotation.degrees()));
        }
        name
    }
}

/// Source of the current monitor list
pub trait DisplayEnumerator {
    /// Monitors in OS-reported order; the primary is not moved to the front.
    fn list(&self) -> Vec<Monitor>;
}

impl DisplayEnumerator for [Monitor] {
    fn list(&self) -> Vec<Monitor> {
        self.to_vec()
    }
}

impl DisplayEnumerator for Vec<Monitor> {
    fn list(&self) -> Vec<Monitor> {
        self.clone()
    }
}

#[cfg(test)]
pub(crate) fn test_monitor(index: usize, left: i32, width: u32, height: u32, primary: bool) -> Monitor {
    Monitor {
        index,
        rect: Rect {
            left,
            top: 0,
            right: left + width as i32,
            bottom: height as i32,
        },
        device: format!("\\\\.\\DISPLAY{}", index + 1),
        width,
        height,
        rotation: Rotation::None,
        primary,
    }
}
