//! Daemon entry point: owns the timer engine and serves IPC clients.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::UnixStream;
use tracing::{debug, info, warn};

use crate::notification::{FanoutNotifier, LogNotifier, Notifier};
use crate::types::{IpcResponse, TimerConfig};

use super::ipc::{IpcServer, RequestHandler};
use super::timer::TimerEngine;

/// Settings for [`run_daemon`].
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    /// Unix socket to listen on
    pub socket_path: PathBuf,
    /// Engine configuration
    pub config: TimerConfig,
    /// Play a tone on completion (needs the `sound` feature)
    pub sound: bool,
}

impl DaemonOptions {
    /// Creates options with the given socket path, default config and sound on.
    pub fn new(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            config: TimerConfig::default(),
            sound: true,
        }
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn with_config(mut self, config: TimerConfig) -> Self {
        self.config = config;
        self
    }

    /// Enables or disables the completion tone.
    #[must_use]
    pub fn with_sound(mut self, sound: bool) -> Self {
        self.sound = sound;
        self
    }
}

/// Builds the notifier chain used by the daemon and the foreground runner.
///
/// Always logs; plays a tone too when `sound` is set and the crate was built
/// with the `sound` feature. `extra` notifiers run last, in order.
pub fn build_notifier(sound: bool, extra: Vec<Arc<dyn Notifier>>) -> Arc<dyn Notifier> {
    let mut fanout = FanoutNotifier::new(vec![Arc::new(LogNotifier)]);

    #[cfg(feature = "sound")]
    if sound {
        fanout.push(Arc::new(crate::notification::SoundNotifier::new()));
    }
    #[cfg(not(feature = "sound"))]
    if sound {
        debug!("Built without the `sound` feature, completion tone disabled");
    }

    for notifier in extra {
        fanout.push(notifier);
    }
    Arc::new(fanout)
}

/// Runs the daemon until Ctrl-C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the socket cannot be
/// bound.
pub async fn run_daemon(options: DaemonOptions) -> Result<()> {
    options
        .config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("Invalid timer configuration")?;

    let notifier = build_notifier(options.sound, Vec::new());
    let engine = TimerEngine::new(options.config, notifier);
    let server = IpcServer::new(&options.socket_path)?;

    info!(
        socket = %options.socket_path.display(),
        duration = %engine.state().duration(),
        "Daemon started"
    );

    serve(server, engine.clone(), shutdown_signal()).await;

    engine.shutdown();
    info!("Daemon stopped");
    Ok(())
}

/// Accepts connections until `shutdown` resolves.
///
/// Each connection is served on its own task. The socket file is removed when
/// the server is dropped on return.
pub async fn serve<F>(server: IpcServer, engine: TimerEngine, shutdown: F)
where
    F: Future<Output = ()>,
{
    let handler = RequestHandler::new(engine);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
            accepted = server.accept() => match accepted {
                Ok(stream) => {
                    tokio::spawn(handle_connection(stream, handler.clone()));
                }
                Err(e) => warn!("{:#}", e),
            },
        }
    }
}

/// Serves a single request/response exchange.
async fn handle_connection(mut stream: UnixStream, handler: RequestHandler) {
    let response = match IpcServer::receive_request(&mut stream).await {
        Ok(request) => handler.handle(request),
        Err(e) => {
            warn!("Rejected IPC request: {:#}", e);
            IpcResponse::error(format!("Invalid request: {:#}", e))
        }
    };

    if let Err(e) = IpcServer::send_response(&mut stream, &response).await {
        debug!("Failed to send IPC response: {:#}", e);
    }
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
