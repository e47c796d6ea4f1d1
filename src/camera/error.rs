//! Camera error types.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::types::Frame;

/// The device could not be attached.
#[derive(Debug, Clone, Error)]
pub enum OpenError {
    #[error("camera '{0}' not found")]
    NotFound(String),
    #[error("camera '{0}' is already in use")]
    InUse(String),
    #[error("driver failed to open '{device}': {reason}")]
    Driver { device: String, reason: String },
}

/// A parameter profile could not be applied to an open device.
#[derive(Debug, Clone, Error)]
pub enum ProfileError {
    #[error("parameter profile '{}' does not exist", .0.display())]
    Missing(PathBuf),
    #[error("device rejected parameter profile '{}': {reason}", .path.display())]
    Rejected { path: PathBuf, reason: String },
}

/// A single frame retrieval did not produce a frame.
#[derive(Debug, Clone, Error)]
pub enum RetrieveError {
    #[error("no frame within {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
}

/// A raw frame could not be turned into a [`Frame`](super::Frame).
#[derive(Debug, Clone, Error)]
pub enum ConvertError {
    #[error("raw buffer holds {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Device enumeration failed.
#[derive(Debug, Clone, Error)]
pub enum EnumerationError {
    #[error("failed to enumerate cameras: {0}")]
    Driver(String),
}

/// Any failure of a worker operation, reported back as an event value.
#[derive(Debug, Clone, Error)]
pub enum AcquisitionError {
    #[error(transparent)]
    Open(#[from] OpenError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Retrieve(#[from] RetrieveError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
}

/// Errors surfaced by [`AcquisitionController`](super::AcquisitionController).
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Opening or configuring the device for streaming failed
    #[error("could not open camera: {0}")]
    Open(#[source] AcquisitionError),
    /// The snapshot itself failed; streaming state was restored
    #[error("snapshot failed: {0}")]
    Snapshot(#[source] AcquisitionError),
    /// The snapshot was taken but streaming could not be resumed.
    /// The captured frame is still handed back.
    #[error("snapshot taken but streaming could not be resumed: {source}")]
    Resume {
        frame: Box<Frame>,
        source: AcquisitionError,
    },
    /// The worker thread is no longer running
    #[error("acquisition worker has stopped")]
    WorkerGone,
    #[error("unexpected worker event {0}")]
    UnexpectedEvent(&'static str),
    #[error("failed to spawn acquisition worker: {0}")]
    Spawn(#[from] std::io::Error),
}

impl ControllerError {
    /// The captured frame, if the snapshot itself succeeded.
    pub fn into_frame(self) -> Option<Frame> {
        match self {
            ControllerError::Resume { frame, .. } => Some(*frame),
            _ => None,
        }
    }
}
