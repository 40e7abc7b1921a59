//! CLI module for the workout timer.
//!
//! This module provides the command-line interface:
//! - `commands`: Command definitions using clap derive
//! - `client`: IPC client for daemon communication
//! - `display`: Output formatting and display logic
//! - `foreground`: Daemon-less countdown for `workout-timer run`

pub mod client;
pub mod commands;
pub mod display;
pub mod foreground;

pub use client::IpcClient;
pub use commands::{Cli, Commands, DaemonArgs, DurationArg, RunArgs};
pub use display::Display;
pub use foreground::{run_foreground, RunOutcome};
