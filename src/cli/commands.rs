//! Subcommand handlers.

use std::error::Error;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use dentcam::camera::{
    list_devices, CameraConfig, ControllerError, Device, LatestFrame, SimulatedEnumerator,
    SimulatedSource,
};
use dentcam::config::{default_path, default_profile, Config};
use dentcam::output::{save_snapshot, snapshot_path, timestamp_millis};
use dentcam::session::{SessionError, SessionManager};

use super::args::ConfigAction;

/// Set by the Ctrl+C handler.
static CTRLC_RECEIVED: AtomicBool = AtomicBool::new(false);

fn setup_ctrlc_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        CTRLC_RECEIVED.store(true, Ordering::SeqCst);
        eprintln!("\nReceived Ctrl+C, shutting down...");
    })
}

/// Resolve a camera from the config, falling back to a bare device name.
fn resolve_camera(config: &Config, name: &str) -> CameraConfig {
    config.find_camera(name).unwrap_or_else(|| {
        log::debug!("'{}' not configured; using default profiles", name);
        CameraConfig::new(
            Device::new(name),
            default_profile("grab.pfs"),
            default_profile("snap.pfs"),
        )
    })
}

fn session(
    config: &Config,
    display: LatestFrame,
) -> SessionManager<impl FnMut(&CameraConfig) -> SimulatedSource, LatestFrame> {
    SessionManager::new(
        |_: &CameraConfig| SimulatedSource::default(),
        display,
        config.acquisition.settings(),
    )
}

/// List available cameras and print them to stdout.
pub fn list_cameras(config: &Config, max: Option<usize>) -> Result<(), Box<dyn Error>> {
    let devices = list_devices(&SimulatedEnumerator, max)?;
    println!("Found {} camera devices:", devices.len());
    for device in &devices {
        println!("  {}", device);
    }

    let configured = config.cameras();
    if !configured.is_empty() {
        println!();
        println!("Configured cameras:");
        for camera in configured {
            println!("  {} -> {}", camera.display_name(), camera.device());
        }
    }
    Ok(())
}

/// Stream for `seconds` and report how many frames reached the display.
pub fn stream(config: &Config, camera: &str, seconds: u64) -> Result<(), Box<dyn Error>> {
    if let Err(e) = setup_ctrlc_handler() {
        log::warn!("could not install Ctrl+C handler: {}", e);
    }

    let display = LatestFrame::new();
    let mut sessions = session(config, display.clone());
    sessions.set_camera(Some(resolve_camera(config, camera)))?;

    let started = Instant::now();
    let limit = Duration::from_secs(seconds);
    while started.elapsed() < limit && !CTRLC_RECEIVED.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(500));
        if let Some(frame) = display.get() {
            log::info!(
                "frame #{} {}x{} ({} delivered)",
                frame.sequence,
                frame.width,
                frame.height,
                display.delivered()
            );
        }
    }
    sessions.close();

    let elapsed = started.elapsed().as_secs_f64();
    let delivered = display.delivered();
    println!(
        "Received {} frames in {:.1}s ({:.1} fps)",
        delivered,
        elapsed,
        if elapsed > 0.0 { delivered as f64 / elapsed } else { 0.0 }
    );
    Ok(())
}

/// Take one snapshot and save it when asked to.
pub fn snap(
    config: &Config,
    camera: &str,
    folder: &str,
    output: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let mut sessions = session(config, LatestFrame::new());
    sessions.set_camera(Some(resolve_camera(config, camera)))?;
    let frame = sessions.snapshot();
    sessions.close();
    let frame = match frame {
        Err(SessionError::Acquisition(ControllerError::Resume { frame, source })) => {
            log::warn!("streaming did not resume after snapshot: {}", source);
            *frame
        }
        other => other?,
    };
    println!("Snapshot {}x{}", frame.width, frame.height);

    let path = match output {
        Some(path) => path.to_path_buf(),
        None if config.output.auto_save => {
            snapshot_path(&config.output.output_dir(), folder, timestamp_millis())?
        }
        None => return Ok(()),
    };
    save_snapshot(
        &frame,
        &path,
        config.output.flip_horizontal,
        config.output.flip_vertical,
    )?;
    println!("Saved {}", path.display());
    Ok(())
}

/// Handle config subcommand actions.
pub fn handle_config_action(
    action: ConfigAction,
    config: &Config,
    path: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(default_path);
    match action {
        ConfigAction::Show => {
            println!("{}", toml::to_string_pretty(config)?);
            if config_path.exists() {
                println!("Config file: {} (exists)", config_path.display());
            } else {
                println!("Config file: {} (not found)", config_path.display());
            }
        }
        ConfigAction::Init => {
            if config_path.exists() {
                return Err(format!(
                    "Config file already exists: {}\nUse 'dentcam config show' to view current settings.",
                    config_path.display()
                )
                .into());
            }
            Config::write_default(&config_path)?;
            println!("Created config file: {}", config_path.display());

            for name in ["grab.pfs", "snap.pfs"] {
                let profile = default_profile(name);
                if !profile.exists() {
                    if let Some(parent) = profile.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&profile, "# camera parameter profile\n")?;
                    println!("Created profile: {}", profile.display());
                }
            }
        }
    }
    Ok(())
}
