//! Command definitions for the workout timer CLI.
//!
//! Uses clap derive macro for argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::types::TimerDuration;

// ============================================================================
// CLI Structure
// ============================================================================

/// Workout Timer CLI - a countdown timer for workout intervals
#[derive(Parser, Debug)]
#[command(
    name = "workout-timer",
    version,
    about = "Countdown timer for workout intervals",
    long_about = "A countdown timer with start, pause, reset and toggle controls.\n\
                  Run `workout-timer daemon` in the background and drive it from any terminal,\n\
                  or use `workout-timer run` for a one-off countdown in the foreground.",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Daemon socket path (default: ~/.workout-timer/workout-timer.sock)
    #[arg(long, global = true, value_name = "PATH")]
    pub socket: Option<PathBuf>,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Set the countdown duration (ignored while running)
    Set(DurationArg),

    /// Start the countdown
    Start,

    /// Pause the countdown, keeping the remaining time
    Pause,

    /// Stop the countdown and restore the default duration
    Reset,

    /// Start if idle, pause if running
    Toggle,

    /// Show current timer status
    Status,

    /// Run as daemon (background service)
    Daemon(DaemonArgs),

    /// Count down in the foreground without a daemon
    Run(RunArgs),

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Command Arguments
// ============================================================================

/// Duration argument shared by `set` and `run`.
#[derive(Args, Debug, Clone)]
pub struct DurationArg {
    /// Duration as H:MM:SS, MM:SS or a number of seconds
    #[arg(value_name = "DURATION")]
    pub duration: TimerDuration,
}

/// Arguments for the daemon command
#[derive(Args, Debug, Clone, Default)]
pub struct DaemonArgs {
    /// Config file (default: ~/.workout-timer/config.json)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable the completion sound
    #[arg(long)]
    pub no_sound: bool,
}

/// Arguments for the run command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Duration as H:MM:SS, MM:SS or a number of seconds
    #[arg(value_name = "DURATION")]
    pub duration: TimerDuration,

    /// Disable the completion sound
    #[arg(long)]
    pub no_sound: bool,
}

// ============================================================================
// Tests
// ============================================================================
