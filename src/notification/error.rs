//! Notification error types.
//!
//! Notifier failures are reported to the caller for logging only; they never
//! feed back into timer state.

use thiserror::Error;

/// Errors that can occur while alerting the user.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// Failed to deliver a notification.
    #[error("failed to send notification: {0}")]
    SendFailed(String),

    /// Audio output is not available (e.g., no sound device).
    #[error("audio device is not available: {0}")]
    DeviceNotAvailable(String),

    /// Failed to play the completion sound.
    #[error("sound playback failed: {0}")]
    PlaybackFailed(String),
}

impl NotificationError {
    /// Returns true if this error is related to audio output.
    #[must_use]
    pub fn is_audio_error(&self) -> bool {
        matches!(self, Self::DeviceNotAvailable(_) | Self::PlaybackFailed(_))
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::SendFailed(_) => "check that the terminal or log output is writable",
            Self::DeviceNotAvailable(_) => "connect an audio device or run with --no-sound",
            Self::PlaybackFailed(_) => "check the system audio settings",
        }
    }
}
