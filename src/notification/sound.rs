//! Completion tone using rodio.
//!
//! rodio's `OutputStream` is not `Send`, so every tone is played on a short
//! lived thread that owns its own stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rodio::source::{SineWave, Source};
use rodio::{OutputStream, Sink};
use tracing::{debug, warn};

use super::{CompletionEvent, NotificationError, Notifier};

/// Tone frequency in Hz.
const TONE_FREQUENCY_HZ: f32 = 880.0;

/// Length of one beep.
const BEEP_MILLIS: u64 = 250;

/// Silence between beeps.
const GAP_MILLIS: u64 = 150;

/// Beeps per completion.
const BEEP_COUNT: usize = 3;

/// Plays a short beep pattern when a countdown completes.
#[derive(Debug, Default)]
pub struct SoundNotifier {
    disabled: AtomicBool,
}

impl SoundNotifier {
    /// Creates an enabled sound notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if playback is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    /// Enables playback.
    pub fn enable(&self) {
        self.disabled.store(false, Ordering::Relaxed);
    }

    /// Disables playback; `notify` then succeeds silently.
    pub fn disable(&self) {
        self.disabled.store(true, Ordering::Relaxed);
    }

    /// Opens the default output device and plays the beep pattern to the end.
    fn play_blocking() -> Result<(), NotificationError> {
        let (_stream, handle) = OutputStream::try_default()
            .map_err(|e| NotificationError::DeviceNotAvailable(e.to_string()))?;
        let sink =
            Sink::try_new(&handle).map_err(|e| NotificationError::PlaybackFailed(e.to_string()))?;

        for _ in 0..BEEP_COUNT {
            sink.append(
                SineWave::new(TONE_FREQUENCY_HZ)
                    .take_duration(Duration::from_millis(BEEP_MILLIS))
                    .amplify(0.20),
            );
            sink.append(
                SineWave::new(TONE_FREQUENCY_HZ)
                    .take_duration(Duration::from_millis(GAP_MILLIS))
                    .amplify(0.0),
            );
        }
        sink.sleep_until_end();
        Ok(())
    }
}

impl Notifier for SoundNotifier {
    fn notify(&self, event: &CompletionEvent) -> Result<(), NotificationError> {
        if self.is_disabled() {
            debug!("Sound playback disabled, skipping");
            return Ok(());
        }

        let id = event.id;
        std::thread::Builder::new()
            .name("completion-sound".to_string())
            .spawn(move || {
                if let Err(e) = Self::play_blocking() {
                    warn!(%id, "Completion sound failed: {} ({})", e, e.suggestion());
                }
            })
            .map_err(|e| NotificationError::PlaybackFailed(e.to_string()))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sound"
    }
}
