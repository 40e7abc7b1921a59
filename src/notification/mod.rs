//! Completion notifications.
//!
//! The timer engine calls a [`Notifier`] exactly once each time a countdown
//! reaches zero. Notifiers are fire-and-forget: their errors are logged by the
//! engine and never change timer state.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use workout_timer::notification::{CompletionEvent, FanoutNotifier, LogNotifier, Notifier};
//! use workout_timer::types::TimerDuration;
//!
//! let notifier = FanoutNotifier::new(vec![Arc::new(LogNotifier)]);
//! notifier
//!     .notify(&CompletionEvent::new(TimerDuration::DEFAULT))
//!     .expect("log notifier never fails");
//! ```

pub mod error;
#[cfg(feature = "sound")]
pub mod sound;

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::types::TimerDuration;

pub use self::error::NotificationError;
#[cfg(feature = "sound")]
pub use self::sound::SoundNotifier;

// ============================================================================
// CompletionEvent
// ============================================================================

/// A countdown reached zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionEvent {
    /// Unique id of this completion (used as the notification request id)
    pub id: Uuid,
    /// The duration that was counted down
    pub duration: TimerDuration,
}

impl CompletionEvent {
    /// Creates an event with a fresh id.
    #[must_use]
    pub fn new(duration: TimerDuration) -> Self {
        Self {
            id: Uuid::new_v4(),
            duration,
        }
    }

    /// Returns the user-facing alert text.
    #[must_use]
    pub fn message(&self) -> String {
        format!("Time's up! Your {} countdown has finished.", self.duration)
    }
}

// ============================================================================
// Notifier
// ============================================================================

/// Alerts the user when a countdown completes.
pub trait Notifier: Send + Sync {
    /// Delivers the completion alert.
    ///
    /// # Errors
    ///
    /// Returns an error if the alert could not be delivered.
    fn notify(&self, event: &CompletionEvent) -> Result<(), NotificationError>;

    /// Short name used in log output.
    fn name(&self) -> &'static str;
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn notify(&self, event: &CompletionEvent) -> Result<(), NotificationError> {
        (**self).notify(event)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Writes the alert to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &CompletionEvent) -> Result<(), NotificationError> {
        tracing::info!(id = %event.id, duration = %event.duration, "{}", event.message());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Rings the terminal bell and prints the alert.
pub struct TerminalNotifier<W = std::io::Stdout> {
    out: Mutex<W>,
}

impl TerminalNotifier<std::io::Stdout> {
    /// Creates a notifier writing to standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TerminalNotifier<W> {
    /// Creates a notifier writing to the given sink.
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Consumes the notifier and returns the sink.
    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl<W: Write + Send> Notifier for TerminalNotifier<W> {
    fn notify(&self, event: &CompletionEvent) -> Result<(), NotificationError> {
        let mut out = self
            .out
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        writeln!(out, "\x07{}", event.message())
            .and_then(|()| out.flush())
            .map_err(|e| NotificationError::SendFailed(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "terminal"
    }
}

impl<W> std::fmt::Debug for TerminalNotifier<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalNotifier").finish_non_exhaustive()
    }
}

/// Forwards each alert to several notifiers.
///
/// Every notifier is attempted even if an earlier one fails; the first error
/// is returned.
#[derive(Default)]
pub struct FanoutNotifier {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    /// Creates a fan-out over the given notifiers.
    #[must_use]
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    /// Adds a notifier.
    pub fn push(&mut self, notifier: Arc<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    /// Returns the number of wrapped notifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    /// Returns true if no notifiers are wrapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

impl Notifier for FanoutNotifier {
    fn notify(&self, event: &CompletionEvent) -> Result<(), NotificationError> {
        let mut first_error = None;
        for notifier in &self.notifiers {
            if let Err(e) = notifier.notify(event) {
                tracing::warn!("{} notifier failed: {}", notifier.name(), e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn name(&self) -> &'static str {
        "fanout"
    }
}

impl std::fmt::Debug for FanoutNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.notifiers.iter().map(|n| n.name()).collect();
        f.debug_struct("FanoutNotifier")
            .field("notifiers", &names)
            .finish()
    }
}

/// Mock notifier for testing.
#[derive(Debug, Default)]
pub struct MockNotifier {
    events: Mutex<Vec<CompletionEvent>>,
    should_fail: AtomicBool,
}

impl MockNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn notification_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    #[must_use]
    pub fn get_events(&self) -> Vec<CompletionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear_recorded(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl Notifier for MockNotifier {
    fn notify(&self, event: &CompletionEvent) -> Result<(), NotificationError> {
        // Calls are recorded even when failing so tests can count attempts.
        self.events.lock().unwrap().push(event.clone());
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(NotificationError::SendFailed("Mock failure".to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
