//! Countdown engine for the workout timer.
//!
//! This module provides the core timer functionality:
//! - State transitions (Idle ⇄ Running)
//! - Countdown with tokio::time::interval on a single spawned run loop
//! - Snapshot fan-out to any number of observers
//! - One notification per completed countdown
//!
//! Every command bumps a generation counter when it cancels the run loop.
//! A tick only applies if it still holds the current generation, so no tick
//! can land after `pause` or `reset` has returned.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::notification::{CompletionEvent, Notifier};
use crate::types::{TimerConfig, TimerDuration, TimerState};

// ============================================================================
// TimerError
// ============================================================================

/// Reasons a timer command is rejected. Rejections never change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimerError {
    /// Minutes or seconds outside `0..=59`
    #[error("invalid duration {hours}:{minutes:02}:{seconds:02}: minutes and seconds must be 0-59")]
    InvalidDuration {
        /// Requested hours
        hours: u32,
        /// Requested minutes
        minutes: u32,
        /// Requested seconds
        seconds: u32,
    },

    /// `start` while a countdown is already running
    #[error("timer is already running")]
    AlreadyRunning,

    /// `start` with nothing left to count down
    #[error("cannot start a zero-length countdown")]
    ZeroDuration,
}

impl TimerError {
    /// Returns true for rejections the caller may silently ignore.
    #[must_use]
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::AlreadyRunning)
    }
}

// ============================================================================
// Shared state
// ============================================================================

struct Inner {
    /// Canonical snapshot
    state: TimerState,
    /// Duration last configured through `set_duration` or `reset`
    configured: TimerDuration,
    /// Bumped whenever the current run loop is invalidated
    generation: u64,
    /// Registered run loop, if any
    task: Option<JoinHandle<()>>,
}

impl Inner {
    /// Invalidates and aborts the registered run loop.
    fn cancel_loop(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Shared {
    inner: Mutex<Inner>,
    updates: broadcast::Sender<TimerState>,
    config: TimerConfig,
    notifier: Arc<dyn Notifier>,
}

/// Result of applying one tick.
enum TickOutcome {
    /// Countdown continues
    Continue,
    /// The loop was cancelled; the tick was discarded
    Stale,
    /// The countdown reached zero
    Completed(CompletionEvent),
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes a snapshot. Must be called with the lock held so snapshots
    /// go out in transition order.
    fn publish(&self, state: TimerState) {
        // An error only means nobody is observing.
        let _ = self.updates.send(state);
    }

    fn apply_tick(&self, generation: u64) -> TickOutcome {
        let mut inner = self.lock();
        if inner.generation != generation || !inner.state.is_active {
            return TickOutcome::Stale;
        }

        let completed = inner.state.tick();
        trace!(remaining = inner.state.remaining_total_seconds, "tick");
        self.publish(inner.state);

        if !completed {
            return TickOutcome::Continue;
        }

        let event = CompletionEvent::new(inner.configured);
        inner.generation = inner.generation.wrapping_add(1);
        // We are the registered task; dropping the handle just detaches it.
        inner.task = None;
        inner.configured = self.config.default_duration;
        inner.state = TimerState::idle(self.config.default_duration);
        self.publish(inner.state);

        TickOutcome::Completed(event)
    }

    fn notify(&self, event: &CompletionEvent) {
        info!(id = %event.id, duration = %event.duration, "Countdown completed");
        if let Err(e) = self.notifier.notify(event) {
            warn!(
                "{} notifier failed: {} ({})",
                self.notifier.name(),
                e,
                e.suggestion()
            );
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = inner.task.take() {
            task.abort();
        }
    }
}

/// The run loop: wait one interval, apply one tick, repeat.
async fn run_loop(shared: Weak<Shared>, generation: u64, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(engine) = shared.upgrade() else {
            debug!("Timer engine dropped, run loop exiting");
            return;
        };

        match engine.apply_tick(generation) {
            TickOutcome::Continue => {}
            TickOutcome::Stale => {
                debug!(generation, "Discarded tick from cancelled run loop");
                return;
            }
            TickOutcome::Completed(event) => {
                engine.notify(&event);
                return;
            }
        }
    }
}

// ============================================================================
// TimerEngine
// ============================================================================

/// Countdown engine handle.
///
/// Cloning is cheap and every clone drives the same countdown. The run loop is
/// torn down when `reset`/`pause`/`shutdown` is called or the last handle is
/// dropped.
#[derive(Clone)]
pub struct TimerEngine {
    shared: Arc<Shared>,
}

impl TimerEngine {
    /// Creates an idle engine configured with `config.default_duration`.
    pub fn new(config: TimerConfig, notifier: Arc<dyn Notifier>) -> Self {
        let (updates, _) = broadcast::channel(config.observer_capacity.max(1));
        let initial = TimerState::idle(config.default_duration);

        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: initial,
                    configured: config.default_duration,
                    generation: 0,
                    task: None,
                }),
                updates,
                config,
                notifier,
            }),
        }
    }

    /// Sets the countdown duration.
    ///
    /// Ignored while running.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidDuration`] if minutes or seconds exceed 59.
    pub fn set_duration(&self, hours: u32, minutes: u32, seconds: u32) -> Result<(), TimerError> {
        let duration = TimerDuration::new(hours, minutes, seconds).ok_or(
            TimerError::InvalidDuration {
                hours,
                minutes,
                seconds,
            },
        )?;

        let mut inner = self.shared.lock();
        if inner.state.is_active {
            debug!(%duration, "Ignoring set_duration while running");
            return Ok(());
        }

        inner.configured = duration;
        inner.state = TimerState::idle(duration);
        self.shared.publish(inner.state);
        debug!(%duration, "Duration set");
        Ok(())
    }

    /// Starts counting down.
    ///
    /// Must be called from within a Tokio runtime; the run loop is spawned on
    /// it.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::AlreadyRunning`] if a run loop exists, or
    /// [`TimerError::ZeroDuration`] if nothing remains to count down.
    pub fn start(&self) -> Result<(), TimerError> {
        let mut inner = self.shared.lock();
        if inner.state.is_active {
            return Err(TimerError::AlreadyRunning);
        }
        if inner.state.remaining_total_seconds == 0 {
            return Err(TimerError::ZeroDuration);
        }

        inner.generation = inner.generation.wrapping_add(1);
        let generation = inner.generation;
        inner.state.set_active(true);
        self.shared.publish(inner.state);

        let period = self
            .shared
            .config
            .tick_interval()
            .max(Duration::from_millis(1));
        inner.task = Some(tokio::spawn(run_loop(
            Arc::downgrade(&self.shared),
            generation,
            period,
        )));

        info!(
            remaining = inner.state.remaining_total_seconds,
            "Countdown started"
        );
        Ok(())
    }

    /// Pauses the countdown, keeping the remaining time. No-op when idle.
    pub fn pause(&self) {
        let mut inner = self.shared.lock();
        if !inner.state.is_active {
            return;
        }

        inner.cancel_loop();
        inner.state.set_active(false);
        self.shared.publish(inner.state);
        info!(
            remaining = inner.state.remaining_total_seconds,
            "Countdown paused"
        );
    }

    /// Cancels any countdown and restores the default duration.
    pub fn reset(&self) {
        let mut inner = self.shared.lock();
        inner.cancel_loop();

        let default = self.shared.config.default_duration;
        inner.configured = default;
        inner.state = TimerState::idle(default);
        self.shared.publish(inner.state);
        info!(duration = %default, "Timer reset");
    }

    /// Pauses if running, otherwise starts.
    ///
    /// A rejected start (zero duration) is logged and otherwise ignored.
    pub fn toggle(&self) {
        if self.is_running() {
            self.pause();
        } else if let Err(e) = self.start() {
            debug!("Toggle did not start the timer: {}", e);
        }
    }

    /// Tears down the run loop when the owning session ends.
    ///
    /// The remaining time is kept and the timer is left idle.
    pub fn shutdown(&self) {
        let mut inner = self.shared.lock();
        let was_active = inner.state.is_active;
        inner.cancel_loop();
        if was_active {
            inner.state.set_active(false);
            self.shared.publish(inner.state);
        }
        info!("Timer engine shut down");
    }

    /// Returns a copy of the current snapshot.
    #[must_use]
    pub fn state(&self) -> TimerState {
        self.shared.lock().state
    }

    /// Returns true if the countdown is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.lock().state.is_active
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &TimerConfig {
        &self.shared.config
    }

    /// Returns the number of live observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.shared.updates.receiver_count()
    }

    /// Subscribes to snapshots.
    ///
    /// The observer first yields the current snapshot, then later ones in
    /// publish order. Ordering holds without gaps only while the observer
    /// stays within `observer_capacity` unread snapshots; see
    /// [`StateObserver`] for what happens when it falls behind.
    #[must_use]
    pub fn subscribe(&self) -> StateObserver {
        let inner = self.shared.lock();
        StateObserver {
            pending: Some(inner.state),
            receiver: self.shared.updates.subscribe(),
            shared: Arc::downgrade(&self.shared),
        }
    }
}

impl std::fmt::Debug for TimerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerEngine")
            .field("state", &self.state())
            .field("notifier", &self.shared.notifier.name())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// StateObserver
// ============================================================================

/// Read-only subscription to engine snapshots.
///
/// Snapshots are buffered up to `observer_capacity`. An observer that falls
/// further behind loses the backlog: its next read logs a warning and returns
/// the engine's current snapshot, skipping everything in between. Later reads
/// continue in publish order from there.
pub struct StateObserver {
    pending: Option<TimerState>,
    receiver: broadcast::Receiver<TimerState>,
    shared: Weak<Shared>,
}

impl StateObserver {
    /// Waits for the next snapshot.
    ///
    /// Returns `None` once the engine has been dropped.
    pub async fn recv(&mut self) -> Option<TimerState> {
        if let Some(state) = self.pending.take() {
            return Some(state);
        }

        match self.receiver.recv().await {
            Ok(state) => Some(state),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "State observer lagged, resynchronising");
                self.resync()
            }
            Err(RecvError::Closed) => None,
        }
    }

    /// Returns the next snapshot if one is already available.
    pub fn try_recv(&mut self) -> Option<TimerState> {
        if let Some(state) = self.pending.take() {
            return Some(state);
        }

        match self.receiver.try_recv() {
            Ok(state) => Some(state),
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "State observer lagged, resynchronising");
                self.resync()
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => None,
        }
    }

    /// Drops the backlog and restarts from the current snapshot.
    fn resync(&mut self) -> Option<TimerState> {
        let shared = self.shared.upgrade()?;
        let inner = shared.lock();
        self.receiver = shared.updates.subscribe();
        Some(inner.state)
    }
}

impl std::fmt::Debug for StateObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateObserver")
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
