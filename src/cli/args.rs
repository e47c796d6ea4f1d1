//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Live view and snapshots from acquisition cameras
#[derive(Parser, Debug)]
#[command(name = "dentcam")]
#[command(version, about = "Stream and snapshot from acquisition cameras", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter (error, warn, info, debug, trace); RUST_LOG overrides it
    #[arg(long, default_value = "debug", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List available cameras
    ListCameras {
        /// Only consider the first N devices reported by the driver
        #[arg(long)]
        max: Option<usize>,
    },
    /// Stream from a camera for a while and report the frame rate
    Stream {
        /// Camera nickname or device name
        #[arg(long)]
        camera: String,
        /// How long to stream (Ctrl+C stops early)
        #[arg(long, default_value = "10")]
        seconds: u64,
    },
    /// Take a snapshot with the snapshot profile
    Snap {
        /// Camera nickname or device name
        #[arg(long)]
        camera: String,
        /// Sub-folder of the output path to save into
        #[arg(long, default_value = "")]
        folder: String,
        /// Explicit output file; .jpg, .png or .bmp picks the format (overrides folder and auto-save)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Create default config file and empty parameter profiles
    Init,
}
