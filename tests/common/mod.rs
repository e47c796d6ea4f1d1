//! Scripted camera driver shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use dentcam::camera::{
    AcquisitionSettings, CameraConfig, Device, Frame, FrameSource, OpenError, PixelFormat,
    ProfileError, RawFrame, RetrieveError,
};

/// One scripted retrieval result.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// A 1x1 mono frame whose pixel value is the tag
    Frame(u8),
    Timeout,
    Transport,
}

/// Driver calls as observed by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(String),
    LoadProfile(PathBuf),
    Retrieve,
    Close,
}

#[derive(Default)]
struct Script {
    stream: VecDeque<Step>,
    snap: VecDeque<Step>,
    calls: Vec<Call>,
    fail_opens: u32,
    fail_profiles: u32,
    open_attempts: u32,
    in_use_at: Option<u32>,
}

/// Shared view into the fake's script and call log.
#[derive(Clone, Default)]
pub struct Probe(Arc<Mutex<Script>>);

impl Probe {
    pub fn new(stream: Vec<Step>, snap: Vec<Step>) -> Self {
        let probe = Probe::default();
        {
            let mut script = probe.0.lock().unwrap();
            script.stream = stream.into();
            script.snap = snap.into();
        }
        probe
    }

    /// A driver instance backed by this probe.
    pub fn source(&self) -> ScriptedSource {
        ScriptedSource {
            probe: self.clone(),
        }
    }

    pub fn fail_next_opens(&self, n: u32) {
        self.0.lock().unwrap().fail_opens = n;
    }

    /// Make the `n`th open attempt overall (1-based) report the device as in use.
    pub fn in_use_on_open(&self, n: u32) {
        self.0.lock().unwrap().in_use_at = Some(n);
    }

    pub fn fail_next_profiles(&self, n: u32) {
        self.0.lock().unwrap().fail_profiles = n;
    }

    pub fn push_stream(&self, step: Step) {
        self.0.lock().unwrap().stream.push_back(step);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().calls.clone()
    }

    pub fn opens(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::Open(_))).count()
    }

    pub fn closes(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::Close)).count()
    }

    /// File names of the profiles loaded, in order.
    pub fn profiles(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| match c {
                Call::LoadProfile(p) => p.file_name().map(|n| n.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect()
    }

    /// Every open is closed before the next open.
    pub fn assert_balanced(&self) {
        let mut open = false;
        for call in self.calls() {
            match call {
                Call::Open(_) => {
                    assert!(!open, "device opened twice without close");
                    open = true;
                }
                Call::Close => {
                    assert!(open, "device closed while not open");
                    open = false;
                }
                _ => {}
            }
        }
    }
}

pub struct ScriptedHandle {
    profile: Option<PathBuf>,
}

/// Replays scripted steps; once a queue runs dry it blocks for the full timeout.
pub struct ScriptedSource {
    probe: Probe,
}

impl FrameSource for ScriptedSource {
    type Handle = ScriptedHandle;

    fn open(&mut self, device: &Device) -> Result<ScriptedHandle, OpenError> {
        let mut script = self.probe.0.lock().unwrap();
        script.open_attempts += 1;
        if script.in_use_at == Some(script.open_attempts) {
            return Err(OpenError::InUse(device.name.clone()));
        }
        if script.fail_opens > 0 {
            script.fail_opens -= 1;
            return Err(OpenError::NotFound(device.name.clone()));
        }
        script.calls.push(Call::Open(device.name.clone()));
        Ok(ScriptedHandle { profile: None })
    }

    fn load_profile(&mut self, handle: &mut ScriptedHandle, path: &Path) -> Result<(), ProfileError> {
        let mut script = self.probe.0.lock().unwrap();
        if script.fail_profiles > 0 {
            script.fail_profiles -= 1;
            return Err(ProfileError::Missing(path.to_path_buf()));
        }
        script.calls.push(Call::LoadProfile(path.to_path_buf()));
        handle.profile = Some(path.to_path_buf());
        Ok(())
    }

    fn retrieve_next(
        &mut self,
        handle: &mut ScriptedHandle,
        timeout: Duration,
    ) -> Result<RawFrame, RetrieveError> {
        let snap = handle
            .profile
            .as_deref()
            .is_some_and(|p| p.ends_with("snap.pfs"));
        let step = {
            let mut script = self.probe.0.lock().unwrap();
            script.calls.push(Call::Retrieve);
            if snap {
                script.snap.pop_front()
            } else {
                script.stream.pop_front()
            }
        };

        match step {
            Some(Step::Frame(tag)) => Ok(RawFrame {
                data: vec![tag],
                width: 1,
                height: 1,
                format: PixelFormat::Mono8,
            }),
            Some(Step::Timeout) => Err(RetrieveError::Timeout(timeout)),
            Some(Step::Transport) => Err(RetrieveError::Transport("cable unplugged".to_string())),
            None => {
                thread::sleep(timeout);
                Err(RetrieveError::Timeout(timeout))
            }
        }
    }

    fn close(&mut self, _handle: ScriptedHandle) {
        self.probe.0.lock().unwrap().calls.push(Call::Close);
    }
}

pub fn camera() -> CameraConfig {
    CameraConfig::new(Device::new("Test Camera"), "/profiles/grab.pfs", "/profiles/snap.pfs")
}

pub fn named_camera(name: &str) -> CameraConfig {
    CameraConfig::new(Device::new(name), "/profiles/grab.pfs", "/profiles/snap.pfs")
}

pub fn fast_settings() -> AcquisitionSettings {
    AcquisitionSettings {
        retrieve_timeout: Duration::from_millis(20),
        poll_interval: Duration::from_millis(1),
    }
}

/// Sink that records the tag of every frame it receives.
pub fn recording_sink() -> (impl FnMut(Frame) + Send + 'static, Arc<Mutex<Vec<u8>>>) {
    let tags = Arc::new(Mutex::new(Vec::new()));
    let tags_clone = Arc::clone(&tags);
    let sink = move |frame: Frame| tags_clone.lock().unwrap().push(frame.data[0]);
    (sink, tags)
}

/// Poll `condition` until it holds or `limit` passes.
pub fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let started = Instant::now();
    while started.elapsed() < limit {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}
