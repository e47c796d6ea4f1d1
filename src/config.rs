//! Configuration file handling for dentcam.
//!
//! Loads configuration from `<config dir>/dentcam/config.toml` or a custom path.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::camera::{AcquisitionSettings, CameraConfig, Device};

/// Configuration file structure for dentcam.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default, rename = "camera")]
    pub cameras: Vec<CameraEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AcquisitionConfig {
    #[serde(default = "default_retrieve_timeout_ms")]
    pub retrieve_timeout_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            retrieve_timeout_ms: default_retrieve_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl AcquisitionConfig {
    pub fn settings(&self) -> AcquisitionSettings {
        AcquisitionSettings {
            retrieve_timeout: Duration::from_millis(self.retrieve_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default)]
pub struct OutputConfig {
    /// Base folder for saved snapshots
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Save every snapshot without asking
    #[serde(default)]
    pub auto_save: bool,
    #[serde(default)]
    pub flip_horizontal: bool,
    #[serde(default)]
    pub flip_vertical: bool,
}

impl OutputConfig {
    pub fn output_dir(&self) -> PathBuf {
        self.path
            .clone()
            .or_else(dirs::picture_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// One `[[camera]]` table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CameraEntry {
    /// Friendly name as reported by the driver
    pub device: String,
    #[serde(default)]
    pub nick: String,
    #[serde(default)]
    pub grab_profile: Option<PathBuf>,
    #[serde(default)]
    pub snap_profile: Option<PathBuf>,
}

impl CameraEntry {
    pub fn to_camera_config(&self) -> CameraConfig {
        let grab = self
            .grab_profile
            .clone()
            .unwrap_or_else(|| default_profile("grab.pfs"));
        let snap = self
            .snap_profile
            .clone()
            .unwrap_or_else(|| default_profile("snap.pfs"));
        CameraConfig::new(Device::new(self.device.clone()), grab, snap).with_nick(self.nick.clone())
    }
}

fn default_retrieve_timeout_ms() -> u64 {
    5000
}

fn default_poll_interval_ms() -> u64 {
    10
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
                path: path.clone(),
                source: e,
            })?;
            let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.clone(),
                source: e,
            })?;
            log::debug!("loaded {} camera(s) from {}", config.cameras.len(), path.display());
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Configured cameras, sorted by display name.
    pub fn cameras(&self) -> Vec<CameraConfig> {
        let mut cameras: Vec<_> = self.cameras.iter().map(CameraEntry::to_camera_config).collect();
        cameras.sort_by(|a, b| a.display_name().cmp(b.display_name()));
        cameras
    }

    /// Find a camera by nickname or device name.
    pub fn find_camera(&self, name: &str) -> Option<CameraConfig> {
        self.cameras()
            .into_iter()
            .find(|c| c.display_name() == name || c.device().name == name)
    }

    /// Write a commented starter config to `path`, creating parent folders.
    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        let io_err = |e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, DEFAULT_CONFIG).map_err(io_err)
    }
}

const DEFAULT_CONFIG: &str = r#"# dentcam configuration

[acquisition]
retrieve_timeout_ms = 5000
poll_interval_ms = 10

[output]
auto_save = false
flip_horizontal = false
flip_vertical = false

[[camera]]
device = "Simulated Camera 0"
nick = "Front"
"#;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("dentcam").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from(".dentcam.toml"))
}

/// Where profiles live when a camera entry does not name one.
pub fn default_profile(file: &str) -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("dentcam"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pfs")
        .join(file)
}
