//! Acquisition controller: the synchronous face of the worker thread.
//!
//! Every call posts one command and then waits for the matching lifecycle
//! event. Waiting is cooperative: the event channel is polled every
//! `poll_interval` and the registered event pump runs between polls, so a
//! UI loop on the calling thread keeps servicing its own queue.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::error::ControllerError;
use super::source::{FrameSink, FrameSource};
use super::types::{AcquisitionState, CameraConfig, Frame, WorkerState};
use super::worker::{
    AcquisitionSettings, AcquisitionWorker, Command, Envelope, Event, EventKind, WorkerStatus,
};

type EventPump = Box<dyn FnMut() + Send>;

/// Controls one device session running on a dedicated worker thread.
pub struct AcquisitionController {
    config: CameraConfig,
    commands: Sender<Envelope>,
    events: Receiver<Event>,
    status: WorkerStatus,
    worker: Option<JoinHandle<()>>,
    state: AcquisitionState,
    grabbing: bool,
    next_id: u64,
    poll_interval: Duration,
    pump: Option<EventPump>,
}

impl std::fmt::Debug for AcquisitionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionController")
            .field("camera", &self.config.display_name())
            .field("state", &self.state)
            .field("worker_state", &self.status.get())
            .finish_non_exhaustive()
    }
}

impl AcquisitionController {
    /// Start a worker thread owning `source` for the device in `config`.
    ///
    /// The device is not touched until the first command.
    pub fn spawn<S, K>(
        config: CameraConfig,
        source: S,
        sink: K,
        settings: AcquisitionSettings,
    ) -> Result<Self, ControllerError>
    where
        S: FrameSource,
        K: FrameSink,
    {
        let (command_tx, command_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let status = WorkerStatus::default();

        let worker = AcquisitionWorker::new(
            config.clone(),
            source,
            Box::new(sink),
            settings,
            command_rx,
            event_tx,
            status.clone(),
        );
        let handle = thread::Builder::new()
            .name("acquisition-worker".to_string())
            .spawn(move || worker.run())?;

        Ok(Self {
            config,
            commands: command_tx,
            events: event_rx,
            status,
            worker: Some(handle),
            state: AcquisitionState::Idle,
            grabbing: false,
            next_id: 1,
            poll_interval: settings.poll_interval,
            pump: None,
        })
    }

    /// Run `pump` on this thread whenever a call is waiting on the worker.
    pub fn set_event_pump(&mut self, pump: impl FnMut() + Send + 'static) {
        self.pump = Some(Box::new(pump));
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    pub fn is_grabbing(&self) -> bool {
        self.grabbing
    }

    /// What the worker thread reports it is doing right now.
    pub fn worker_state(&self) -> WorkerState {
        self.status.get()
    }

    /// Start streaming and return once the worker reports it started.
    ///
    /// Calling this while already streaming does nothing. On failure the
    /// device has been closed again and the controller is idle.
    pub fn start_grab(&mut self) -> Result<(), ControllerError> {
        if self.grabbing {
            log::debug!("already grabbing '{}'", self.config.display_name());
            return Ok(());
        }

        log::debug!("starting grab");
        let id = self.post(Command::StartGrab)?;
        match self.await_event(id) {
            Ok(EventKind::GrabStarted) => {
                self.grabbing = true;
                self.state = AcquisitionState::Streaming;
                Ok(())
            }
            Ok(EventKind::GrabFailed(e)) => {
                self.reset();
                Err(ControllerError::Open(e))
            }
            Ok(other) => {
                self.reset();
                Err(ControllerError::UnexpectedEvent(other.name()))
            }
            Err(e) => {
                self.reset();
                Err(e)
            }
        }
    }

    /// Stop streaming and return once the device has been closed.
    ///
    /// May take up to one retrieval timeout: the frame retrieval in flight
    /// finishes before the worker sees the request.
    pub fn stop_grab(&mut self) -> Result<(), ControllerError> {
        if !self.grabbing {
            log::debug!("not grabbing; nothing to stop");
            return Ok(());
        }

        log::debug!("stopping grab");
        self.state = AcquisitionState::StoppingStreaming;
        let result = self
            .post(Command::StopGrab)
            .and_then(|id| self.await_event(id));
        self.reset();

        match result? {
            EventKind::GrabStopped => Ok(()),
            other => Err(ControllerError::UnexpectedEvent(other.name())),
        }
    }

    /// Take one frame with the snapshot profile.
    ///
    /// Streaming is stopped first and resumed afterwards if it was running,
    /// including when the snapshot itself fails. If only the resume fails,
    /// the frame comes back inside [`ControllerError::Resume`].
    pub fn snapshot(&mut self) -> Result<Frame, ControllerError> {
        let was_grabbing = self.grabbing;
        if was_grabbing {
            self.stop_grab()?;
        }

        log::debug!("receiving snapshot");
        self.state = AcquisitionState::SnapshotPending;
        let outcome = self
            .post(Command::Snapshot)
            .and_then(|id| self.await_event(id));
        self.state = AcquisitionState::Idle;

        let result = match outcome {
            Ok(EventKind::SnapshotReady(frame)) => Ok(frame),
            Ok(EventKind::SnapshotFailed(e)) => Err(ControllerError::Snapshot(e)),
            Ok(other) => Err(ControllerError::UnexpectedEvent(other.name())),
            Err(e) => Err(e),
        };

        if was_grabbing {
            if let Err(e) = self.start_grab() {
                match (result, e) {
                    (Ok(frame), ControllerError::Open(source)) => {
                        log::warn!("snapshot taken but streaming did not resume: {}", source);
                        return Err(ControllerError::Resume {
                            frame: Box::new(frame),
                            source,
                        });
                    }
                    (Ok(_), other) => return Err(other),
                    (Err(snap), resume) => {
                        log::warn!("could not resume streaming after failed snapshot: {}", resume);
                        return Err(snap);
                    }
                }
            }
        }
        result
    }

    fn reset(&mut self) {
        self.grabbing = false;
        self.state = AcquisitionState::Idle;
    }

    fn post(&mut self, command: Command) -> Result<u64, ControllerError> {
        let id = self.next_id;
        self.next_id += 1;
        self.commands
            .send(Envelope { id, command })
            .map_err(|_| ControllerError::WorkerGone)?;
        Ok(id)
    }

    /// Wait for the event answering command `id`, pumping between polls.
    fn await_event(&mut self, id: u64) -> Result<EventKind, ControllerError> {
        loop {
            match self.events.recv_timeout(self.poll_interval) {
                Ok(event) if event.id == id => return Ok(event.kind),
                Ok(event) => {
                    log::warn!(
                        "discarding stale {} for command {} while waiting on {}",
                        event.kind.name(),
                        event.id,
                        id
                    );
                }
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(pump) = self.pump.as_mut() {
                        pump();
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Err(ControllerError::WorkerGone),
            }
        }
    }
}

impl Drop for AcquisitionController {
    fn drop(&mut self) {
        if let Err(e) = self.stop_grab() {
            log::warn!("error stopping '{}': {}", self.config.display_name(), e);
        }
        let _ = self.post(Command::Shutdown);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("acquisition worker for '{}' panicked", self.config.display_name());
            }
        }
    }
}
