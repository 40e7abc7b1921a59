//! Display utilities for the workout timer CLI.
//!
//! This module provides formatted output for:
//! - Command results
//! - Error messages
//! - Status display
//! - The foreground countdown line

use crate::types::{IpcResponse, ResponseData, TimerState};

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Shows the result of a control command (`set`, `start`, ...).
    pub fn show_command_result(response: &IpcResponse) {
        println!("{}", Self::format_command_result(response));
    }

    /// Shows the current timer status.
    pub fn show_status(response: &IpcResponse) {
        println!("{}", Self::format_status(response));
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("Error: {}", message);
    }

    /// Formats a command result as a message line plus the remaining time.
    pub fn format_command_result(response: &IpcResponse) -> String {
        let mut out = response.message.clone();
        if let Some(state) = response.data.as_ref().and_then(ResponseData::to_timer_state) {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("  Remaining: {}", Self::format_clock(&state)));
        }
        out
    }

    /// Formats the status block.
    pub fn format_status(response: &IpcResponse) -> String {
        let Some(state) = response.data.as_ref().and_then(ResponseData::to_timer_state) else {
            return "The timer is not running".to_string();
        };

        let label = if state.is_active { "running" } else { "idle" };
        format!(
            "Workout Timer Status\n\
             ────────────────────\n\
             State:     {}\n\
             Remaining: {}",
            label,
            Self::format_clock(&state)
        )
    }

    /// Formats one frame of the foreground countdown.
    pub fn format_countdown(state: &TimerState) -> String {
        let marker = if state.is_active { ">" } else { "||" };
        format!("{} {}", marker, Self::format_clock(state))
    }

    /// Formats a snapshot as `H:MM:SS`.
    pub fn format_clock(state: &TimerState) -> String {
        state.duration().to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
