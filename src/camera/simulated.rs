//! In-process camera driver producing a moving test pattern.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use super::error::{EnumerationError, OpenError, ProfileError, RetrieveError};
use super::source::{DeviceEnumerator, FrameSource};
use super::types::{Device, PixelFormat, RawFrame};

/// Names of the devices this driver exposes.
pub const SIMULATED_DEVICES: [&str; 2] = ["Simulated Camera 0", "Simulated Camera 1"];

/// Devices currently held open by any simulated source.
static IN_USE: Mutex<Vec<String>> = Mutex::new(Vec::new());

/// Open simulated device.
#[derive(Debug)]
pub struct SimulatedHandle {
    device: String,
    profile: Option<PathBuf>,
    tick: u64,
    next_frame: Instant,
}

impl SimulatedHandle {
    pub fn profile(&self) -> Option<&Path> {
        self.profile.as_deref()
    }
}

/// Test-pattern driver.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    pub width: u32,
    pub height: u32,
    pub frame_interval: Duration,
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            frame_interval: Duration::from_millis(33),
        }
    }
}

impl SimulatedSource {
    fn pattern(&self, tick: u64) -> RawFrame {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut data = Vec::with_capacity(w * h * 3);
        let shift = (tick * 4) as usize;
        for y in 0..h {
            for x in 0..w {
                let b = ((x + shift) % 256) as u8;
                let g = (y % 256) as u8;
                let r = ((x + y + shift) % 256) as u8;
                data.extend_from_slice(&[b, g, r]);
            }
        }
        RawFrame {
            data,
            width: self.width,
            height: self.height,
            format: PixelFormat::Bgr8,
        }
    }
}

impl FrameSource for SimulatedSource {
    type Handle = SimulatedHandle;

    fn open(&mut self, device: &Device) -> Result<SimulatedHandle, OpenError> {
        if !SIMULATED_DEVICES.contains(&device.name.as_str()) {
            return Err(OpenError::NotFound(device.name.clone()));
        }
        let mut in_use = IN_USE.lock().map_err(|_| OpenError::Driver {
            device: device.name.clone(),
            reason: "device registry poisoned".to_string(),
        })?;
        if in_use.contains(&device.name) {
            return Err(OpenError::InUse(device.name.clone()));
        }
        in_use.push(device.name.clone());
        log::debug!("opened simulated device '{}'", device.name);

        Ok(SimulatedHandle {
            device: device.name.clone(),
            profile: None,
            tick: 0,
            next_frame: Instant::now(),
        })
    }

    fn load_profile(&mut self, handle: &mut SimulatedHandle, path: &Path) -> Result<(), ProfileError> {
        if !path.is_file() {
            return Err(ProfileError::Missing(path.to_path_buf()));
        }
        std::fs::read(path).map_err(|e| ProfileError::Rejected {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        handle.profile = Some(path.to_path_buf());
        Ok(())
    }

    fn retrieve_next(
        &mut self,
        handle: &mut SimulatedHandle,
        timeout: Duration,
    ) -> Result<RawFrame, RetrieveError> {
        let wait = handle.next_frame.saturating_duration_since(Instant::now());
        if wait > timeout {
            thread::sleep(timeout);
            return Err(RetrieveError::Timeout(timeout));
        }
        thread::sleep(wait);

        handle.next_frame = Instant::now() + self.frame_interval;
        handle.tick += 1;
        Ok(self.pattern(handle.tick))
    }

    fn close(&mut self, handle: SimulatedHandle) {
        if let Ok(mut in_use) = IN_USE.lock() {
            in_use.retain(|d| d != &handle.device);
        }
        log::debug!("closed simulated device '{}'", handle.device);
    }
}

/// Lists [`SIMULATED_DEVICES`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedEnumerator;

impl DeviceEnumerator for SimulatedEnumerator {
    fn enumerate(&self) -> Result<Vec<Device>, EnumerationError> {
        Ok(SIMULATED_DEVICES.iter().map(|n| Device::new(*n)).collect())
    }
}
