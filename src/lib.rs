//! Workout Timer Library
//!
//! This library provides the core functionality for the workout timer CLI.
//! It includes:
//! - Countdown engine with start/pause/reset/toggle and snapshot observers
//! - IPC server/client for daemon-CLI communication
//! - CLI command parsing and display utilities
//! - Type definitions for durations, configuration and state
//! - Completion notifiers (log, terminal bell, optional sound)

pub mod cli;
pub mod daemon;
pub mod notification;
pub mod types;

// Re-export commonly used types for convenience
pub use types::{
    IpcRequest, IpcResponse, ResponseData, TimerConfig, TimerDuration, TimerPhase, TimerState,
};

pub use daemon::{StateObserver, TimerEngine, TimerError};

pub use notification::{
    CompletionEvent, FanoutNotifier, LogNotifier, MockNotifier, NotificationError, Notifier,
    TerminalNotifier,
};
