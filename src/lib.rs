//! dentcam library crate.
//!
//! Camera acquisition core plus the configuration, session and output
//! layers used by the `dentcam` binary.

pub mod camera;
pub mod config;
pub mod output;
pub mod session;
