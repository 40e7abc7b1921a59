//! Core data types for the workout timer.
//!
//! This module defines the data structures used for:
//! - Countdown durations and their validation
//! - Timer state snapshots handed to observers
//! - Timer configuration with serde defaults
//! - IPC request/response serialization

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Seconds per hour.
const SECS_PER_HOUR: u64 = 3600;

/// Seconds per minute.
const SECS_PER_MINUTE: u64 = 60;

/// Directory (under the home directory) holding the socket and config file.
pub const APP_DIR_NAME: &str = ".workout-timer";

/// Config file name inside [`APP_DIR_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.json";

// ============================================================================
// TimerDuration
// ============================================================================

/// A countdown length split into hours, minutes and seconds.
///
/// Minutes and seconds must each be in `0..=59`; hours are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerDuration {
    /// Whole hours
    pub hours: u32,
    /// Minutes (0-59)
    pub minutes: u32,
    /// Seconds (0-59)
    pub seconds: u32,
}

impl TimerDuration {
    /// Duration a fresh or reset timer is configured with (2 minutes).
    pub const DEFAULT: Self = Self {
        hours: 0,
        minutes: 2,
        seconds: 0,
    };

    /// The empty duration.
    pub const ZERO: Self = Self {
        hours: 0,
        minutes: 0,
        seconds: 0,
    };

    /// Creates a duration, returning `None` when minutes or seconds exceed 59.
    #[must_use]
    pub fn new(hours: u32, minutes: u32, seconds: u32) -> Option<Self> {
        let duration = Self {
            hours,
            minutes,
            seconds,
        };
        duration.is_valid().then_some(duration)
    }

    /// Decomposes a total number of seconds using integer division.
    #[must_use]
    pub fn from_total_seconds(total: u64) -> Self {
        Self {
            hours: u32::try_from(total / SECS_PER_HOUR).unwrap_or(u32::MAX),
            // Both remainders are below 60 and always fit.
            minutes: ((total % SECS_PER_HOUR) / SECS_PER_MINUTE) as u32,
            seconds: (total % SECS_PER_MINUTE) as u32,
        }
    }

    /// Returns `hours*3600 + minutes*60 + seconds`.
    #[must_use]
    pub fn total_seconds(&self) -> u64 {
        u64::from(self.hours) * SECS_PER_HOUR
            + u64::from(self.minutes) * SECS_PER_MINUTE
            + u64::from(self.seconds)
    }

    /// Returns true if minutes and seconds are within `0..=59`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.minutes <= 59 && self.seconds <= 59
    }

    /// Returns true if the duration is zero seconds long.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.total_seconds() == 0
    }
}

impl Default for TimerDuration {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for TimerDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

impl std::str::FromStr for TimerDuration {
    type Err = String;

    /// Parses `H:M:S`, `M:S`, or a plain number of seconds.
    ///
    /// A plain number may exceed 59 and is decomposed into hours and minutes.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let mut numbers = Vec::with_capacity(parts.len());
        for part in &parts {
            let value = part.trim().parse::<u32>().map_err(|_| {
                format!("'{}' is not a valid duration (use H:MM:SS, MM:SS or seconds)", s)
            })?;
            numbers.push(value);
        }

        let (hours, minutes, seconds) = match numbers.as_slice() {
            [total] => return Ok(Self::from_total_seconds(u64::from(*total))),
            [m, s] => (0, *m, *s),
            [h, m, s] => (*h, *m, *s),
            _ => return Err(format!("'{}' has too many ':' separated parts", s)),
        };

        Self::new(hours, minutes, seconds)
            .ok_or_else(|| format!("'{}': minutes and seconds must be 0-59", s))
    }
}

// ============================================================================
// TimerPhase
// ============================================================================

/// The two states of the countdown state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    /// Configured but not counting down (fresh, paused or reset)
    #[default]
    Idle,
    /// Counting down once per tick
    Running,
}

impl TimerPhase {
    /// Returns the string representation of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerPhase::Idle => "idle",
            TimerPhase::Running => "running",
        }
    }
}

// ============================================================================
// TimerState
// ============================================================================

/// Immutable snapshot of the countdown.
///
/// `remaining_total_seconds` always equals `hours*3600 + minutes*60 + seconds`;
/// every constructor and transition derives one side from the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    /// Hours remaining
    pub hours: u32,
    /// Minutes remaining (0-59)
    pub minutes: u32,
    /// Seconds remaining (0-59)
    pub seconds: u32,
    /// Whether a run loop is counting down
    pub is_active: bool,
    /// Total seconds remaining
    pub remaining_total_seconds: u64,
}

impl TimerState {
    /// Creates an idle state configured with the given duration.
    #[must_use]
    pub fn idle(duration: TimerDuration) -> Self {
        Self::from_total_seconds(duration.total_seconds(), false)
    }

    /// Builds a state from a total, recomputing hours/minutes/seconds.
    #[must_use]
    pub fn from_total_seconds(total: u64, is_active: bool) -> Self {
        let duration = TimerDuration::from_total_seconds(total);
        Self {
            hours: duration.hours,
            minutes: duration.minutes,
            seconds: duration.seconds,
            is_active,
            remaining_total_seconds: total,
        }
    }

    /// Returns the remaining time as a duration.
    #[must_use]
    pub fn duration(&self) -> TimerDuration {
        TimerDuration::from_total_seconds(self.remaining_total_seconds)
    }

    /// Returns the state-machine phase of this snapshot.
    #[must_use]
    pub fn phase(&self) -> TimerPhase {
        if self.is_active {
            TimerPhase::Running
        } else {
            TimerPhase::Idle
        }
    }

    /// Returns true if the timer is counting down.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.is_active
    }

    /// Marks the state active or idle, keeping the remaining time.
    pub fn set_active(&mut self, is_active: bool) {
        self.is_active = is_active;
    }

    /// Decrements the countdown by one second.
    ///
    /// Returns true if the countdown has reached zero.
    pub fn tick(&mut self) -> bool {
        let total = self.remaining_total_seconds.saturating_sub(1);
        *self = Self::from_total_seconds(total, self.is_active);
        total == 0
    }

    /// Returns true if the derived fields agree with the total.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.minutes <= 59
            && self.seconds <= 59
            && TimerDuration {
                hours: self.hours,
                minutes: self.minutes,
                seconds: self.seconds,
            }
            .total_seconds()
                == self.remaining_total_seconds
    }
}

impl Default for TimerState {
    fn default() -> Self {
        Self::idle(TimerDuration::DEFAULT)
    }
}

// ============================================================================
// TimerConfig
// ============================================================================

fn default_duration() -> TimerDuration {
    TimerDuration::DEFAULT
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_observer_capacity() -> usize {
    64
}

/// Configuration for the timer engine.
///
/// Every field has a serde default so a partial config file is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Duration restored by `reset` and after completion
    #[serde(default = "default_duration")]
    pub default_duration: TimerDuration,

    /// Milliseconds between ticks
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Snapshots buffered per observer before it is considered lagging
    #[serde(default = "default_observer_capacity")]
    pub observer_capacity: usize,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            default_duration: default_duration(),
            tick_interval_ms: default_tick_interval_ms(),
            observer_capacity: default_observer_capacity(),
        }
    }
}

impl TimerConfig {
    /// Sets the default duration.
    #[must_use]
    pub fn with_default_duration(mut self, duration: TimerDuration) -> Self {
        self.default_duration = duration;
        self
    }

    /// Sets the tick interval in milliseconds.
    #[must_use]
    pub fn with_tick_interval_ms(mut self, millis: u64) -> Self {
        self.tick_interval_ms = millis;
        self
    }

    /// Returns the tick interval as a `Duration`.
    #[must_use]
    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_interval_ms)
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if !self.default_duration.is_valid() {
            return Err(format!(
                "default duration {} is out of range (minutes and seconds must be 0-59)",
                self.default_duration
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err("tick interval must be at least 1 ms".to_string());
        }
        if self.observer_capacity == 0 {
            return Err("observer capacity must be at least 1".to_string());
        }
        Ok(())
    }

    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: TimerConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    /// Loads the given file, else the default config file if it exists,
    /// else the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file is unreadable or invalid.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Returns `~/.workout-timer/config.json`, if a home directory is known.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

// ============================================================================
// IPC Types
// ============================================================================

/// IPC request from client to daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum IpcRequest {
    /// Configure the countdown duration
    Set {
        /// Hours
        hours: u32,
        /// Minutes (0-59)
        minutes: u32,
        /// Seconds (0-59)
        seconds: u32,
    },
    /// Start counting down
    Start,
    /// Pause the countdown
    Pause,
    /// Restore the default duration
    Reset,
    /// Start if idle, pause if running
    Toggle,
    /// Query the current snapshot
    Status,
}

/// Response data for IPC responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseData {
    /// Current phase ("idle" or "running")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Hours remaining
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours: Option<u32>,
    /// Minutes remaining
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minutes: Option<u32>,
    /// Seconds remaining
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds: Option<u32>,
    /// Whether the countdown is running
    #[serde(rename = "isActive", skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    /// Total seconds remaining
    #[serde(
        rename = "remainingTotalSeconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub remaining_total_seconds: Option<u64>,
}

impl ResponseData {
    /// Creates response data from a timer snapshot.
    pub fn from_timer_state(state: &TimerState) -> Self {
        Self {
            state: Some(state.phase().as_str().to_string()),
            hours: Some(state.hours),
            minutes: Some(state.minutes),
            seconds: Some(state.seconds),
            is_active: Some(state.is_active),
            remaining_total_seconds: Some(state.remaining_total_seconds),
        }
    }

    /// Rebuilds a snapshot from the response, if the timing fields are present.
    #[must_use]
    pub fn to_timer_state(&self) -> Option<TimerState> {
        let total = self.remaining_total_seconds?;
        Some(TimerState::from_total_seconds(
            total,
            self.is_active.unwrap_or(false),
        ))
    }
}

/// IPC response from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcResponse {
    /// Response status ("success" or "error")
    pub status: String,
    /// Human-readable message
    pub message: String,
    /// Optional response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

impl IpcResponse {
    /// Creates a success response.
    pub fn success(message: impl Into<String>, data: Option<ResponseData>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data,
        }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            data: None,
        }
    }

    /// Returns true if this is an error response.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status == "error"
    }
}

// ============================================================================
// Tests
// ============================================================================
