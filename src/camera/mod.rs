//! Camera acquisition core.
//!
//! - Driver boundary via [`FrameSource`], display boundary via [`FrameSink`]
//! - Device work on a dedicated thread in [`AcquisitionWorker`]
//! - Blocking-looking start/stop/snapshot calls via [`AcquisitionController`]
//! - Device listing via [`list_devices`]

mod controller;
mod error;
mod frame_utils;
mod simulated;
mod source;
mod types;
mod worker;

pub use controller::AcquisitionController;
pub use error::{
    AcquisitionError, ControllerError, ConvertError, EnumerationError, OpenError, ProfileError,
    RetrieveError,
};
pub use frame_utils::convert;
pub use simulated::{SimulatedEnumerator, SimulatedHandle, SimulatedSource, SIMULATED_DEVICES};
pub use source::{list_devices, DeviceEnumerator, FrameSink, FrameSource, LatestFrame};
pub use types::{
    AcquisitionState, CameraConfig, Device, Frame, FrameFormat, PixelFormat, RawFrame,
    WorkerState,
};
pub use worker::{
    AcquisitionSettings, AcquisitionWorker, CancelToken, Command, Envelope, Event, EventKind,
    WorkerStatus, DEFAULT_POLL_INTERVAL, DEFAULT_RETRIEVE_TIMEOUT, TRANSPORT_WARN_EVERY,
};
