//! Acquisition worker: the only code that touches the device.
//!
//! The worker runs on its own thread and executes commands strictly one at a
//! time. While a grab loop is running it keeps draining the command channel
//! between retrievals so that a stop request is observed; any other command
//! that shows up meanwhile is parked in a backlog and run afterwards, in the
//! order it arrived.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::error::{AcquisitionError, RetrieveError};
use super::frame_utils::convert;
use super::source::{FrameSink, FrameSource};
use super::types::{CameraConfig, Frame, WorkerState};

/// Hard limit for a single frame retrieval.
pub const DEFAULT_RETRIEVE_TIMEOUT: Duration = Duration::from_millis(5000);

/// How often a waiting controller services its event pump.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Consecutive streaming transport failures between repeated warnings.
pub const TRANSPORT_WARN_EVERY: u32 = 50;

/// Run of consecutive streaming transport failures.
#[derive(Debug, Default)]
struct FailureStreak(u32);

impl FailureStreak {
    /// Count one failure; true when this one should be logged.
    fn fail(&mut self) -> bool {
        self.0 += 1;
        self.0 == 1 || self.0 % TRANSPORT_WARN_EVERY == 0
    }

    fn clear(&mut self) {
        self.0 = 0;
    }

    fn len(&self) -> u32 {
        self.0
    }
}

/// Timing knobs shared by worker and controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionSettings {
    pub retrieve_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            retrieve_timeout: DEFAULT_RETRIEVE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Requests sent to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartGrab,
    StopGrab,
    Snapshot,
    Shutdown,
}

/// A command tagged with the id the controller will wait on.
#[derive(Debug)]
pub struct Envelope {
    pub id: u64,
    pub command: Command,
}

/// Lifecycle outcomes reported by the worker.
///
/// Streamed frames do not travel here; they go straight to the sink.
#[derive(Debug)]
pub enum EventKind {
    GrabStarted,
    GrabFailed(AcquisitionError),
    GrabStopped,
    SnapshotReady(Frame),
    SnapshotFailed(AcquisitionError),
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::GrabStarted => "GrabStarted",
            EventKind::GrabFailed(_) => "GrabFailed",
            EventKind::GrabStopped => "GrabStopped",
            EventKind::SnapshotReady(_) => "SnapshotReady",
            EventKind::SnapshotFailed(_) => "SnapshotFailed",
        }
    }
}

/// An event tagged with the id of the command that produced it.
#[derive(Debug)]
pub struct Event {
    pub id: u64,
    pub kind: EventKind,
}

/// Cooperative cancellation flag checked once per grab loop iteration.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Read-only view of the worker's state, shared with the controller.
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus(Arc<Mutex<WorkerState>>);

impl WorkerStatus {
    pub fn get(&self) -> WorkerState {
        self.0.lock().map(|s| *s).unwrap_or_default()
    }

    fn set(&self, state: WorkerState) {
        if let Ok(mut s) = self.0.lock() {
            *s = state;
        }
    }
}

/// Owns a [`FrameSource`] exclusively and runs commands against it.
pub struct AcquisitionWorker<S: FrameSource> {
    config: CameraConfig,
    source: S,
    sink: Box<dyn FrameSink>,
    settings: AcquisitionSettings,
    commands: Receiver<Envelope>,
    events: Sender<Event>,
    status: WorkerStatus,
    backlog: VecDeque<Envelope>,
    shutdown: bool,
}

impl<S: FrameSource> AcquisitionWorker<S> {
    pub fn new(
        config: CameraConfig,
        source: S,
        sink: Box<dyn FrameSink>,
        settings: AcquisitionSettings,
        commands: Receiver<Envelope>,
        events: Sender<Event>,
        status: WorkerStatus,
    ) -> Self {
        Self {
            config,
            source,
            sink,
            settings,
            commands,
            events,
            status,
            backlog: VecDeque::new(),
            shutdown: false,
        }
    }

    /// Execute commands until Shutdown or until the controller goes away.
    pub fn run(mut self) {
        log::debug!("worker for '{}' started", self.config.display_name());
        while !self.shutdown {
            let envelope = match self.backlog.pop_front() {
                Some(envelope) => envelope,
                None => match self.commands.recv() {
                    Ok(envelope) => envelope,
                    Err(_) => break,
                },
            };
            self.execute(envelope);
        }
        log::debug!("worker for '{}' exiting", self.config.display_name());
    }

    fn execute(&mut self, envelope: Envelope) {
        match envelope.command {
            Command::StartGrab => self.grab(envelope.id),
            Command::StopGrab => log::debug!("stop requested while not grabbing; ignored"),
            Command::Snapshot => self.snapshot(envelope.id),
            Command::Shutdown => self.shutdown = true,
        }
    }

    fn emit(&self, id: u64, kind: EventKind) {
        if self.events.send(Event { id, kind }).is_err() {
            log::debug!("controller gone; dropping event for command {}", id);
        }
    }

    /// Open the device and apply a profile. Never returns a half-configured handle.
    fn open_session(&mut self, profile: &Path) -> Result<S::Handle, AcquisitionError> {
        let mut handle = self.source.open(self.config.device())?;
        if let Err(e) = self.source.load_profile(&mut handle, profile) {
            self.source.close(handle);
            return Err(e.into());
        }
        Ok(handle)
    }

    fn grab(&mut self, id: u64) {
        let profile = self.config.grab_profile().to_path_buf();
        let mut handle = match self.open_session(&profile) {
            Ok(handle) => handle,
            Err(e) => {
                log::warn!("could not start grab on '{}': {}", self.config.display_name(), e);
                self.emit(id, EventKind::GrabFailed(e));
                return;
            }
        };

        self.status.set(WorkerState::Grabbing);
        self.emit(id, EventKind::GrabStarted);

        let cancel = CancelToken::new();
        let stop_id = self.grab_loop(&mut handle, &cancel);

        self.source.close(handle);
        self.status.set(WorkerState::Idle);
        self.emit(stop_id.unwrap_or(id), EventKind::GrabStopped);
    }

    /// Retrieve-convert-emit until cancelled. Returns the id of the stop request, if any.
    fn grab_loop(&mut self, handle: &mut S::Handle, cancel: &CancelToken) -> Option<u64> {
        let mut stop_id = None;
        let mut sequence = 0u64;
        let mut transport_failures = FailureStreak::default();

        loop {
            self.poll_commands(cancel, &mut stop_id);
            if cancel.is_cancelled() {
                break;
            }

            match self.source.retrieve_next(handle, self.settings.retrieve_timeout) {
                Ok(raw) => {
                    transport_failures.clear();
                    match convert(raw, sequence) {
                        Ok(frame) => {
                            sequence += 1;
                            self.sink.receive(frame);
                        }
                        Err(e) => log::warn!("dropping unconvertible frame: {}", e),
                    }
                }
                Err(RetrieveError::Timeout(timeout)) => {
                    log::debug!("no frame within {:?}; retrying", timeout);
                }
                // Retried like a timeout; a disconnected device keeps us here until stopped.
                Err(RetrieveError::Transport(msg)) => {
                    if transport_failures.fail() {
                        log::warn!(
                            "transport error on '{}' ({} in a row): {}",
                            self.config.display_name(),
                            transport_failures.len(),
                            msg
                        );
                    }
                }
            }
        }
        stop_id
    }

    fn poll_commands(&mut self, cancel: &CancelToken, stop_id: &mut Option<u64>) {
        loop {
            match self.commands.try_recv() {
                Ok(envelope) => match envelope.command {
                    Command::StopGrab => {
                        stop_id.get_or_insert(envelope.id);
                        cancel.cancel();
                    }
                    // Shutdown ends the grab now but still runs after anything queued before it.
                    Command::Shutdown => {
                        cancel.cancel();
                        self.backlog.push_back(envelope);
                    }
                    Command::StartGrab | Command::Snapshot => self.backlog.push_back(envelope),
                },
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    cancel.cancel();
                    break;
                }
            }
        }
    }

    fn snapshot(&mut self, id: u64) {
        self.status.set(WorkerState::SnapshotInProgress);
        let result = self.snap_once();
        self.status.set(WorkerState::Idle);

        match result {
            Ok(frame) => self.emit(id, EventKind::SnapshotReady(frame)),
            Err(e) => {
                log::warn!("snapshot on '{}' failed: {}", self.config.display_name(), e);
                self.emit(id, EventKind::SnapshotFailed(e));
            }
        }
    }

    fn snap_once(&mut self) -> Result<Frame, AcquisitionError> {
        let profile = self.config.snap_profile().to_path_buf();
        let mut handle = self.open_session(&profile)?;
        let result = self
            .source
            .retrieve_next(&mut handle, self.settings.retrieve_timeout);
        self.source.close(handle);
        Ok(convert(result?, 0)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::error::{OpenError, ProfileError};
    use crate::camera::types::{Device, PixelFormat, RawFrame};
    use std::sync::mpsc;

    /// Source that replays a fixed list of retrieval results, then times out.
    struct Replay {
        results: VecDeque<Result<RawFrame, RetrieveError>>,
        fail_open: bool,
        opens: Arc<Mutex<u32>>,
        closes: Arc<Mutex<u32>>,
    }

    impl Replay {
        fn new(results: Vec<Result<RawFrame, RetrieveError>>) -> Self {
            Self {
                results: results.into(),
                fail_open: false,
                opens: Arc::default(),
                closes: Arc::default(),
            }
        }
    }

    impl FrameSource for Replay {
        type Handle = ();

        fn open(&mut self, device: &Device) -> Result<(), OpenError> {
            if self.fail_open {
                return Err(OpenError::NotFound(device.name.clone()));
            }
            *self.opens.lock().unwrap() += 1;
            Ok(())
        }

        fn load_profile(&mut self, _: &mut (), _: &Path) -> Result<(), ProfileError> {
            Ok(())
        }

        fn retrieve_next(&mut self, _: &mut (), timeout: Duration) -> Result<RawFrame, RetrieveError> {
            self.results
                .pop_front()
                .unwrap_or(Err(RetrieveError::Timeout(timeout)))
        }

        fn close(&mut self, _: ()) {
            *self.closes.lock().unwrap() += 1;
        }
    }

    fn pixel() -> Result<RawFrame, RetrieveError> {
        Ok(RawFrame {
            data: vec![1],
            width: 1,
            height: 1,
            format: PixelFormat::Mono8,
        })
    }

    fn worker(source: Replay) -> (AcquisitionWorker<Replay>, Sender<Envelope>, Receiver<Event>) {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (evt_tx, evt_rx) = mpsc::channel();
        let config = CameraConfig::new(Device::new("cam"), "grab.pfs", "snap.pfs");
        let settings = AcquisitionSettings {
            retrieve_timeout: Duration::from_millis(1),
            poll_interval: Duration::from_millis(1),
        };
        let worker = AcquisitionWorker::new(
            config,
            source,
            Box::new(|_: Frame| {}),
            settings,
            cmd_rx,
            evt_tx,
            WorkerStatus::default(),
        );
        (worker, cmd_tx, evt_rx)
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_snapshot_timeout_is_fatal_and_closes() {
        let source = Replay::new(vec![Err(RetrieveError::Timeout(Duration::from_millis(1)))]);
        let closes = Arc::clone(&source.closes);
        let (worker, tx, rx) = worker(source);

        tx.send(Envelope { id: 1, command: Command::Snapshot }).unwrap();
        tx.send(Envelope { id: 2, command: Command::Shutdown }).unwrap();
        worker.run();

        let event = rx.recv().unwrap();
        assert_eq!(event.id, 1);
        assert!(matches!(
            event.kind,
            EventKind::SnapshotFailed(AcquisitionError::Retrieve(RetrieveError::Timeout(_)))
        ));
        assert_eq!(*closes.lock().unwrap(), 1);
    }

    #[test]
    fn test_open_failure_reports_grab_failed_without_close() {
        let mut source = Replay::new(vec![]);
        source.fail_open = true;
        let closes = Arc::clone(&source.closes);
        let (worker, tx, rx) = worker(source);

        tx.send(Envelope { id: 7, command: Command::StartGrab }).unwrap();
        drop(tx);
        worker.run();

        let event = rx.recv().unwrap();
        assert_eq!(event.id, 7);
        assert!(matches!(event.kind, EventKind::GrabFailed(AcquisitionError::Open(_))));
        assert_eq!(*closes.lock().unwrap(), 0);
    }

    #[test]
    fn test_stop_queued_behind_start_ends_grab_with_stop_id() {
        let source = Replay::new(vec![pixel(), pixel()]);
        let opens = Arc::clone(&source.opens);
        let closes = Arc::clone(&source.closes);
        let (worker, tx, rx) = worker(source);

        tx.send(Envelope { id: 1, command: Command::StartGrab }).unwrap();
        tx.send(Envelope { id: 2, command: Command::StopGrab }).unwrap();
        tx.send(Envelope { id: 3, command: Command::Snapshot }).unwrap();
        tx.send(Envelope { id: 4, command: Command::Shutdown }).unwrap();
        worker.run();

        let events: Vec<_> = rx.iter().map(|e| (e.id, e.kind.name())).collect();
        assert_eq!(
            events,
            vec![(1, "GrabStarted"), (2, "GrabStopped"), (3, "SnapshotReady")]
        );
        assert_eq!(*opens.lock().unwrap(), 2);
        assert_eq!(*closes.lock().unwrap(), 2);
    }

    #[test]
    fn test_stop_while_idle_is_ignored() {
        let (worker, tx, rx) = worker(Replay::new(vec![]));
        tx.send(Envelope { id: 1, command: Command::StopGrab }).unwrap();
        tx.send(Envelope { id: 2, command: Command::Shutdown }).unwrap();
        worker.run();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_shutdown_during_grab_stops_and_closes() {
        let source = Replay::new(vec![]);
        let closes = Arc::clone(&source.closes);
        let (worker, tx, rx) = worker(source);

        tx.send(Envelope { id: 1, command: Command::StartGrab }).unwrap();
        tx.send(Envelope { id: 2, command: Command::Shutdown }).unwrap();
        worker.run();

        let events: Vec<_> = rx.iter().map(|e| (e.id, e.kind.name())).collect();
        assert_eq!(events, vec![(1, "GrabStarted"), (1, "GrabStopped")]);
        assert_eq!(*closes.lock().unwrap(), 1);
    }

    #[test]
    fn test_shutdown_during_grab_runs_earlier_backlog_first() {
        let source = Replay::new(vec![pixel()]);
        let opens = Arc::clone(&source.opens);
        let (worker, tx, rx) = worker(source);

        tx.send(Envelope { id: 1, command: Command::StartGrab }).unwrap();
        tx.send(Envelope { id: 2, command: Command::Snapshot }).unwrap();
        tx.send(Envelope { id: 3, command: Command::Shutdown }).unwrap();
        tx.send(Envelope { id: 4, command: Command::StartGrab }).unwrap();
        worker.run();

        let events: Vec<_> = rx.iter().map(|e| (e.id, e.kind.name())).collect();
        assert_eq!(
            events,
            vec![(1, "GrabStarted"), (1, "GrabStopped"), (2, "SnapshotReady")]
        );
        assert_eq!(*opens.lock().unwrap(), 2);
    }

    #[test]
    fn test_disconnected_controller_ends_grab() {
        let source = Replay::new(vec![pixel()]);
        let closes = Arc::clone(&source.closes);
        let (worker, tx, rx) = worker(source);

        tx.send(Envelope { id: 5, command: Command::StartGrab }).unwrap();
        drop(tx);
        worker.run();

        let events: Vec<_> = rx.iter().map(|e| (e.id, e.kind.name())).collect();
        assert_eq!(events, vec![(5, "GrabStarted"), (5, "GrabStopped")]);
        assert_eq!(*closes.lock().unwrap(), 1);
    }

    #[test]
    fn test_failure_streak_warns_first_and_every_nth() {
        let mut streak = FailureStreak::default();
        assert!(streak.fail());
        let warned = (2..=TRANSPORT_WARN_EVERY).filter(|_| streak.fail()).count();
        assert_eq!(warned, 1);
        assert_eq!(streak.len(), TRANSPORT_WARN_EVERY);

        streak.clear();
        assert!(streak.fail());
        assert!(!streak.fail());
    }
}
