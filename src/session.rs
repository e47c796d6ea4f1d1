//! Camera switching: at most one live device session at a time.

use thiserror::Error;

use crate::camera::{
    AcquisitionController, AcquisitionSettings, CameraConfig, ControllerError, Frame, FrameSink,
    FrameSource,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no camera selected")]
    NoCamera,
    #[error("Couldn't open camera '{camera}': {source}")]
    OpenFailed {
        camera: String,
        #[source]
        source: ControllerError,
    },
    #[error(transparent)]
    Acquisition(#[from] ControllerError),
}

/// Owns the active [`AcquisitionController`], if any.
///
/// `make_source` builds a fresh driver instance per session; every session
/// streams into a clone of the same sink.
pub struct SessionManager<F, K> {
    make_source: F,
    sink: K,
    settings: AcquisitionSettings,
    controller: Option<AcquisitionController>,
}

impl<F, K, S> SessionManager<F, K>
where
    F: FnMut(&CameraConfig) -> S,
    S: FrameSource,
    K: FrameSink + Clone,
{
    pub fn new(make_source: F, sink: K, settings: AcquisitionSettings) -> Self {
        Self {
            make_source,
            sink,
            settings,
            controller: None,
        }
    }

    /// Switch to `camera`, or to no camera.
    ///
    /// The current session is always torn down first. If the new camera
    /// cannot be opened the manager is left without a camera.
    pub fn set_camera(&mut self, camera: Option<CameraConfig>) -> Result<(), SessionError> {
        self.close();

        let Some(camera) = camera else {
            log::info!("no camera selected");
            return Ok(());
        };

        let name = camera.display_name().to_string();
        let source = (self.make_source)(&camera);
        let open_failed = |source| SessionError::OpenFailed {
            camera: name.clone(),
            source,
        };

        let mut controller =
            AcquisitionController::spawn(camera, source, self.sink.clone(), self.settings)
                .map_err(open_failed)?;
        if let Err(e) = controller.start_grab() {
            log::error!("Couldn't open camera '{}': {}", name, e);
            return Err(open_failed(e));
        }

        log::info!("streaming from '{}'", name);
        self.controller = Some(controller);
        Ok(())
    }

    pub fn active_camera(&self) -> Option<&CameraConfig> {
        self.controller.as_ref().map(AcquisitionController::config)
    }

    pub fn controller_mut(&mut self) -> Option<&mut AcquisitionController> {
        self.controller.as_mut()
    }

    /// Snapshot from the active camera; streaming resumes afterwards.
    pub fn snapshot(&mut self) -> Result<Frame, SessionError> {
        let controller = self.controller.as_mut().ok_or(SessionError::NoCamera)?;
        Ok(controller.snapshot()?)
    }

    /// Stop streaming and release the device.
    pub fn close(&mut self) {
        if let Some(mut controller) = self.controller.take() {
            if let Err(e) = controller.stop_grab() {
                log::warn!("error stopping '{}': {}", controller.config().display_name(), e);
            }
        }
    }
}
