//! Daemon module for the workout timer.
//!
//! This module contains the core daemon functionality:
//! - `timer`: Countdown engine with state transitions and observers
//! - `ipc`: Unix socket server and request dispatch
//! - `server`: Daemon lifecycle (bind, serve, shut down)

pub mod ipc;
pub mod server;
pub mod timer;

pub use ipc::{default_socket_path, IpcError, IpcServer, RequestHandler};
pub use server::{build_notifier, run_daemon, serve, DaemonOptions};
pub use timer::{StateObserver, TimerEngine, TimerError};
