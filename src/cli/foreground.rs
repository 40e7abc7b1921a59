//! Foreground countdown: a private engine rendered straight to the terminal.

use std::future::Future;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use tokio::sync::oneshot;

use crate::daemon::{build_notifier, TimerEngine};
use crate::notification::{CompletionEvent, NotificationError, Notifier, TerminalNotifier};
use crate::types::{TimerConfig, TimerDuration, TimerState};

use super::display::Display;

/// Time left for a detached completion tone before the process exits.
#[cfg(feature = "sound")]
const SOUND_LINGER: std::time::Duration = std::time::Duration::from_millis(1500);

/// How a foreground countdown ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The countdown reached zero
    Completed(CompletionEvent),
    /// Interrupted before reaching zero; carries the paused snapshot
    Interrupted(TimerState),
}

/// Hands the first completion event to the waiting countdown.
struct CompletionLatch {
    sender: Mutex<Option<oneshot::Sender<CompletionEvent>>>,
}

impl CompletionLatch {
    fn new() -> (Self, oneshot::Receiver<CompletionEvent>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sender: Mutex::new(Some(tx)),
            },
            rx,
        )
    }
}

impl Notifier for CompletionLatch {
    fn notify(&self, event: &CompletionEvent) -> Result<(), NotificationError> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = sender {
            // The receiver is gone only if the countdown was abandoned.
            let _ = sender.send(event.clone());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "completion-latch"
    }
}

/// Counts `duration` down in the foreground until it completes or Ctrl-C.
///
/// # Errors
///
/// Returns an error if the countdown cannot start (for example a zero
/// duration) or the terminal cannot be written.
pub async fn run_foreground(
    duration: TimerDuration,
    config: TimerConfig,
    sound: bool,
) -> Result<RunOutcome> {
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("Invalid timer configuration")?;

    let (latch, done) = CompletionLatch::new();
    let notifier = build_notifier(
        sound,
        vec![
            Arc::new(TerminalNotifier::stdout()) as Arc<dyn Notifier>,
            Arc::new(latch) as Arc<dyn Notifier>,
        ],
    );
    let engine = TimerEngine::new(config, notifier);

    let mut stdout = std::io::stdout();
    let interrupt = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let outcome = countdown(&engine, duration, done, &mut stdout, interrupt).await?;

    #[cfg(feature = "sound")]
    if sound && matches!(outcome, RunOutcome::Completed(_)) {
        tokio::time::sleep(SOUND_LINGER).await;
    }

    Ok(outcome)
}

/// Drives `engine` and renders one line per running snapshot to `out`.
async fn countdown<W, F>(
    engine: &TimerEngine,
    duration: TimerDuration,
    done: oneshot::Receiver<CompletionEvent>,
    out: &mut W,
    interrupt: F,
) -> Result<RunOutcome>
where
    W: Write,
    F: Future<Output = ()>,
{
    engine.set_duration(duration.hours, duration.minutes, duration.seconds)?;
    let mut observer = engine.subscribe();
    engine.start()?;

    tokio::pin!(interrupt);
    tokio::pin!(done);

    loop {
        tokio::select! {
            biased;

            () = &mut interrupt => {
                engine.shutdown();
                writeln!(out).context("Failed to write to the terminal")?;
                return Ok(RunOutcome::Interrupted(engine.state()));
            }
            event = &mut done => {
                let event = event.context("Countdown ended without completing")?;
                // Frames published just before completion are still queued.
                while let Some(state) = observer.try_recv() {
                    render(out, &state)?;
                }
                return Ok(RunOutcome::Completed(event));
            }
            state = observer.recv() => {
                let state = state.context("Timer engine stopped unexpectedly")?;
                render(out, &state)?;
            }
        }
    }
}

/// Redraws the countdown line for a running snapshot; idle ones are skipped.
fn render<W: Write>(out: &mut W, state: &TimerState) -> Result<()> {
    if !state.is_active {
        return Ok(());
    }
    write!(out, "\r{}", Display::format_countdown(state))
        .and_then(|()| {
            if state.remaining_total_seconds == 0 {
                writeln!(out)?;
            }
            out.flush()
        })
        .context("Failed to write to the terminal")
}
