//! Camera types and data structures.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// A physical acquisition source, identified by its friendly name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Device {
    pub name: String,
}

impl Device {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Everything needed to run one device session.
///
/// Immutable once built: the worker gets its own clone and the controller
/// keeps another for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraConfig {
    device: Device,
    nick: String,
    grab_profile: PathBuf,
    snap_profile: PathBuf,
}

impl CameraConfig {
    pub fn new(
        device: Device,
        grab_profile: impl Into<PathBuf>,
        snap_profile: impl Into<PathBuf>,
    ) -> Self {
        Self {
            device,
            nick: String::new(),
            grab_profile: grab_profile.into(),
            snap_profile: snap_profile.into(),
        }
    }

    /// Same config with a user-facing nickname.
    pub fn with_nick(mut self, nick: impl Into<String>) -> Self {
        self.nick = nick.into();
        self
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// Parameter profile loaded before streaming.
    pub fn grab_profile(&self) -> &Path {
        &self.grab_profile
    }

    /// Parameter profile loaded before a snapshot.
    pub fn snap_profile(&self) -> &Path {
        &self.snap_profile
    }

    /// Nickname if one was set, otherwise the device name.
    pub fn display_name(&self) -> &str {
        if self.nick.is_empty() {
            &self.device.name
        } else {
            &self.nick
        }
    }
}

/// Pixel layout of a frame as delivered by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Mono8,
    Rgb8,
    Bgr8,
}

impl PixelFormat {
    pub fn channels(&self) -> usize {
        match self {
            PixelFormat::Mono8 => 1,
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
        }
    }
}

/// Unconverted acquisition result straight from the driver.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Pixel format of a converted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// RGB format (3 bytes per pixel)
    Rgb,
}

/// A decoded, independently owned image.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Packed pixel data
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
    /// Position of this frame within its grab session (snapshots use 0)
    pub sequence: u64,
    /// When the frame was converted
    pub timestamp: Instant,
}

impl Frame {
    /// Get the number of bytes per pixel (3 for RGB).
    pub fn bytes_per_pixel(&self) -> usize {
        match self.format {
            FrameFormat::Rgb => 3,
        }
    }
}

/// Controller-side view of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcquisitionState {
    #[default]
    Idle,
    Streaming,
    StoppingStreaming,
    SnapshotPending,
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AcquisitionState::Idle => "idle",
            AcquisitionState::Streaming => "streaming",
            AcquisitionState::StoppingStreaming => "stopping",
            AcquisitionState::SnapshotPending => "snapshot pending",
        };
        f.write_str(s)
    }
}

/// What the worker thread is doing with the device right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    #[default]
    Idle,
    Grabbing,
    SnapshotInProgress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_equality_is_by_name() {
        assert_eq!(Device::new("acA1300"), Device::new("acA1300"));
        assert_ne!(Device::new("acA1300"), Device::new("acA1920"));
        assert_eq!(format!("{}", Device::new("acA1300")), "acA1300");
    }

    #[test]
    fn test_display_name_prefers_nick() {
        let config = CameraConfig::new(Device::new("Basler acA1300"), "grab.pfs", "snap.pfs");
        assert_eq!(config.display_name(), "Basler acA1300");

        let config = config.with_nick("Left");
        assert_eq!(config.display_name(), "Left");
        assert_eq!(config.device().name, "Basler acA1300");
    }

    #[test]
    fn test_profiles_are_kept_separate() {
        let config = CameraConfig::new(Device::new("cam"), "a/grab.pfs", "b/snap.pfs");
        assert_eq!(config.grab_profile(), Path::new("a/grab.pfs"));
        assert_eq!(config.snap_profile(), Path::new("b/snap.pfs"));
    }

    #[test]
    fn test_pixel_format_channels() {
        assert_eq!(PixelFormat::Mono8.channels(), 1);
        assert_eq!(PixelFormat::Rgb8.channels(), 3);
        assert_eq!(PixelFormat::Bgr8.channels(), 3);
    }

    #[test]
    fn test_states_default_to_idle() {
        assert_eq!(AcquisitionState::default(), AcquisitionState::Idle);
        assert_eq!(WorkerState::default(), WorkerState::Idle);
        assert_eq!(format!("{}", AcquisitionState::SnapshotPending), "snapshot pending");
    }
}
