//! Integration tests for daemon-CLI IPC communication.
//!
//! These tests run the daemon's accept loop on a temporary socket and drive
//! it with the real CLI client:
//! - Duration set and status query
//! - Start, pause, toggle and reset over IPC
//! - Completion notification through a running daemon
//! - Error responses and connection failures
//! - Requests are not resent after a dropped reply

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::net::UnixListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};

use workout_timer::cli::client::IpcClient;
use workout_timer::daemon::{serve, IpcServer, TimerEngine};
use workout_timer::notification::MockNotifier;
use workout_timer::types::{IpcRequest, TimerConfig, TimerDuration};

// ============================================================================
// Test Helpers
// ============================================================================

/// A daemon serving on a temporary socket.
struct TestDaemon {
    socket_path: PathBuf,
    engine: TimerEngine,
    notifier: Arc<MockNotifier>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    _dir: tempfile::TempDir,
}

impl TestDaemon {
    fn start(config: TimerConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("integration_test.sock");
        let server = IpcServer::new(&socket_path).unwrap();

        let notifier = Arc::new(MockNotifier::new());
        let engine = TimerEngine::new(config, notifier.clone());

        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(serve(server, engine.clone(), async {
            let _ = rx.await;
        }));

        Self {
            socket_path,
            engine,
            notifier,
            shutdown: Some(tx),
            task,
            _dir: dir,
        }
    }

    fn client(&self) -> IpcClient {
        IpcClient::with_socket_path(self.socket_path.clone())
            .with_retry_delay(Duration::from_millis(10))
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        timeout(Duration::from_secs(2), &mut self.task)
            .await
            .expect("daemon did not stop")
            .unwrap();
    }
}

fn fast_config() -> TimerConfig {
    TimerConfig::default().with_tick_interval_ms(20)
}

// ============================================================================
// Set and Status
// ============================================================================

#[tokio::test]
async fn set_then_status_reports_duration() {
    let daemon = TestDaemon::start(TimerConfig::default());
    let client = daemon.client();

    let response = client
        .set(TimerDuration::new(0, 45, 30).unwrap())
        .await
        .unwrap();
    assert_eq!(response.message, "Duration set");

    let status = client.status().await.unwrap();
    let data = status.data.unwrap();
    assert_eq!(data.hours, Some(0));
    assert_eq!(data.minutes, Some(45));
    assert_eq!(data.seconds, Some(30));
    assert_eq!(data.remaining_total_seconds, Some(2730));
    assert_eq!(data.is_active, Some(false));

    daemon.stop().await;
}

#[tokio::test]
async fn fresh_daemon_reports_default_duration() {
    let daemon = TestDaemon::start(TimerConfig::default());

    let status = daemon.client().status().await.unwrap();
    let state = status.data.unwrap().to_timer_state().unwrap();
    assert_eq!(state.duration(), TimerDuration::DEFAULT);
    assert!(!state.is_active);

    daemon.stop().await;
}

// ============================================================================
// Start / Pause / Toggle / Reset
// ============================================================================

#[tokio::test]
async fn start_pause_keeps_remaining_time() {
    let daemon = TestDaemon::start(fast_config());
    let client = daemon.client();
    client.set(TimerDuration::new(0, 0, 50).unwrap()).await.unwrap();

    let response = client.start().await.unwrap();
    assert_eq!(response.data.unwrap().is_active, Some(true));

    sleep(Duration::from_millis(150)).await;
    let paused = client.pause().await.unwrap().data.unwrap();
    assert_eq!(paused.is_active, Some(false));
    let remaining = paused.remaining_total_seconds.unwrap();
    assert!(remaining < 50, "expected some ticks, remaining={}", remaining);

    sleep(Duration::from_millis(150)).await;
    let status = client.status().await.unwrap().data.unwrap();
    assert_eq!(status.remaining_total_seconds, Some(remaining));

    daemon.stop().await;
}

#[tokio::test]
async fn toggle_and_reset() {
    let daemon = TestDaemon::start(TimerConfig::default());
    let client = daemon.client();

    let started = client.toggle().await.unwrap();
    assert_eq!(started.message, "Timer started");
    assert!(daemon.engine.is_running());

    let paused = client.toggle().await.unwrap();
    assert_eq!(paused.message, "Timer paused");
    assert!(!daemon.engine.is_running());

    client.set(TimerDuration::new(1, 0, 0).unwrap()).await.unwrap();
    let reset = client.reset().await.unwrap().data.unwrap();
    assert_eq!(reset.remaining_total_seconds, Some(120));

    daemon.stop().await;
}

#[tokio::test]
async fn double_start_is_reported_not_failed() {
    let daemon = TestDaemon::start(TimerConfig::default());
    let client = daemon.client();

    client.start().await.unwrap();
    let again = client.start().await.unwrap();
    assert_eq!(again.message, "Timer is already running");

    daemon.stop().await;
}

// ============================================================================
// Completion
// ============================================================================

#[tokio::test]
async fn countdown_completes_and_notifies_once() {
    let daemon = TestDaemon::start(fast_config());
    let client = daemon.client();
    client.set(TimerDuration::new(0, 0, 3).unwrap()).await.unwrap();
    client.start().await.unwrap();

    sleep(Duration::from_millis(400)).await;

    assert_eq!(daemon.notifier.notification_count(), 1);
    let status = client.status().await.unwrap().data.unwrap();
    assert_eq!(status.is_active, Some(false));
    assert_eq!(status.remaining_total_seconds, Some(120));

    daemon.stop().await;
}

// ============================================================================
// Errors
// ============================================================================

#[tokio::test]
async fn invalid_duration_is_an_error() {
    let daemon = TestDaemon::start(TimerConfig::default());

    // Bypass client-side parsing to exercise the daemon's validation.
    let invalid = TimerDuration {
        hours: 0,
        minutes: 75,
        seconds: 0,
    };
    let err = daemon.client().set(invalid).await.unwrap_err();
    assert!(err.to_string().contains("invalid duration"));
    assert_eq!(daemon.engine.state().remaining_total_seconds, 120);

    daemon.stop().await;
}

#[tokio::test]
async fn zero_duration_start_is_an_error() {
    let daemon = TestDaemon::start(TimerConfig::default());
    let client = daemon.client();
    client.set(TimerDuration::ZERO).await.unwrap();

    let err = client.start().await.unwrap_err();
    assert!(err.to_string().contains("zero-length"));
    assert!(!daemon.engine.is_running());

    daemon.stop().await;
}

#[tokio::test]
async fn zero_duration_toggle_is_an_error() {
    let daemon = TestDaemon::start(TimerConfig::default());
    let client = daemon.client();
    client.set(TimerDuration::ZERO).await.unwrap();

    let err = client.toggle().await.unwrap_err();
    assert!(err.to_string().contains("Nothing to count down"));
    assert!(!daemon.engine.is_running());

    daemon.stop().await;
}

#[tokio::test]
async fn toggle_is_sent_once_when_daemon_drops_reply() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("silent.sock");
    let listener = UnixListener::bind(&socket_path).unwrap();

    // Reads each request and hangs up without answering.
    let toggles = Arc::new(AtomicUsize::new(0));
    let counter = toggles.clone();
    let server = tokio::spawn(async move {
        loop {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buffer = Vec::new();
            stream.read_to_end(&mut buffer).await.unwrap();
            if let Ok(IpcRequest::Toggle) = serde_json::from_slice(&buffer) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
    });

    let client = IpcClient::with_socket_path(socket_path)
        .with_retry_delay(Duration::from_millis(1));
    let result = client.toggle().await;
    assert!(result.is_err());

    // Leave room for any resend to land before counting.
    sleep(Duration::from_millis(100)).await;
    assert_eq!(toggles.load(Ordering::SeqCst), 1);

    server.abort();
}

#[tokio::test]
async fn connection_error_without_daemon() {
    let dir = tempfile::tempdir().unwrap();
    let client = IpcClient::with_socket_path(dir.path().join("missing.sock"))
        .with_retry_delay(Duration::from_millis(1));

    let result = client.status().await;
    assert!(result.is_err());
}

#[tokio::test]
async fn socket_removed_after_shutdown() {
    let daemon = TestDaemon::start(TimerConfig::default());
    let socket_path = daemon.socket_path.clone();
    assert!(socket_path.exists());

    daemon.stop().await;
    assert!(!socket_path.exists());
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn concurrent_clients_see_consistent_state() {
    let daemon = TestDaemon::start(TimerConfig::default());
    daemon
        .client()
        .set(TimerDuration::new(0, 10, 0).unwrap())
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let client = daemon.client();
        handles.push(tokio::spawn(async move { client.status().await }));
    }

    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.data.unwrap().remaining_total_seconds, Some(600));
    }

    daemon.stop().await;
}
