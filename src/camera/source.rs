//! Driver and display boundaries.
//!
//! A [`FrameSource`] is the vendor transport; the core only ever calls it from
//! the worker thread. A [`FrameSink`] is whatever shows streamed frames.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::error::{EnumerationError, OpenError, ProfileError, RetrieveError};
use super::types::{Device, Frame, RawFrame};

/// A camera driver able to run one device session at a time.
pub trait FrameSource: Send + 'static {
    /// Open device handle. Only obtainable from [`FrameSource::open`] and
    /// consumed by [`FrameSource::close`].
    type Handle: Send;

    /// Attach to the device with the given friendly name.
    fn open(&mut self, device: &Device) -> Result<Self::Handle, OpenError>;

    /// Apply a parameter profile file to the open device.
    fn load_profile(&mut self, handle: &mut Self::Handle, path: &Path)
        -> Result<(), ProfileError>;

    /// Block until the next frame arrives or `timeout` elapses.
    fn retrieve_next(
        &mut self,
        handle: &mut Self::Handle,
        timeout: Duration,
    ) -> Result<RawFrame, RetrieveError>;

    /// Detach from the device.
    fn close(&mut self, handle: Self::Handle);
}

/// Receives streamed frames on the worker thread. Must return quickly.
pub trait FrameSink: Send + 'static {
    fn receive(&mut self, frame: Frame);
}

impl<F> FrameSink for F
where
    F: FnMut(Frame) + Send + 'static,
{
    fn receive(&mut self, frame: Frame) {
        self(frame)
    }
}

#[derive(Debug, Default)]
struct Slot {
    frame: Option<Frame>,
    delivered: u64,
}

/// Single-slot sink: each new frame replaces the previous one.
///
/// Clones share the same slot, so one clone can be handed to the worker
/// while the display side polls another.
#[derive(Debug, Clone, Default)]
pub struct LatestFrame {
    slot: Arc<Mutex<Slot>>,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the most recent frame, if any arrived yet.
    pub fn get(&self) -> Option<Frame> {
        let slot = self.slot.lock().ok()?;
        slot.frame.clone()
    }

    /// Take the most recent frame, leaving the slot empty.
    pub fn take(&self) -> Option<Frame> {
        let mut slot = self.slot.lock().ok()?;
        slot.frame.take()
    }

    /// Total number of frames ever delivered to this slot.
    pub fn delivered(&self) -> u64 {
        self.slot.lock().map(|s| s.delivered).unwrap_or(0)
    }
}

impl FrameSink for LatestFrame {
    fn receive(&mut self, frame: Frame) {
        if let Ok(mut slot) = self.slot.lock() {
            slot.frame = Some(frame);
            slot.delivered += 1;
        }
    }
}

/// Lists the devices a driver can currently see.
pub trait DeviceEnumerator {
    fn enumerate(&self) -> Result<Vec<Device>, EnumerationError>;
}

/// List devices sorted by name, keeping at most `max` of them.
///
/// Truncation happens in driver order, before sorting.
pub fn list_devices(
    enumerator: &dyn DeviceEnumerator,
    max: Option<usize>,
) -> Result<Vec<Device>, EnumerationError> {
    let mut devices = enumerator.enumerate()?;
    if let Some(max) = max {
        devices.truncate(max);
    }
    devices.sort();
    Ok(devices)
}
