//! IPC Client for communicating with the workout timer daemon.
//!
//! This module provides:
//! - Unix Domain Socket client
//! - Request/response handling
//! - Connection retry logic
//! - Timeout handling

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::daemon::default_socket_path;
use crate::types::{IpcRequest, IpcResponse, TimerDuration};

// ============================================================================
// Constants
// ============================================================================

/// Connection timeout in seconds
const CONNECTION_TIMEOUT_SECS: u64 = 5;

/// Read/write timeout in seconds
const IO_TIMEOUT_SECS: u64 = 5;

/// Maximum response size in bytes (64KB)
const MAX_RESPONSE_SIZE: u64 = 65536;

/// Maximum retry attempts
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds (base delay, multiplied by attempt number)
const RETRY_DELAY_MS: u64 = 500;

// ============================================================================
// IpcClient
// ============================================================================

/// IPC client for daemon communication.
#[derive(Debug, Clone)]
pub struct IpcClient {
    /// Socket path
    socket_path: PathBuf,
    /// Connection timeout
    timeout: Duration,
    /// Base delay between attempts
    retry_delay: Duration,
}

impl IpcClient {
    /// Creates a new IPC client with the default socket path.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self> {
        Ok(Self::with_socket_path(default_socket_path()?))
    }

    /// Creates a new IPC client with a custom socket path.
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: Duration::from_secs(CONNECTION_TIMEOUT_SECS),
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        }
    }

    /// Uses `socket_path` if given, otherwise the default.
    ///
    /// # Errors
    ///
    /// Returns an error if no path was given and the home directory cannot be
    /// determined.
    pub fn from_option(socket_path: Option<PathBuf>) -> Result<Self> {
        match socket_path {
            Some(path) => Ok(Self::with_socket_path(path)),
            None => Self::new(),
        }
    }

    /// Sets the base retry delay.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Sends a set command to the daemon.
    pub async fn set(&self, duration: TimerDuration) -> Result<IpcResponse> {
        let request = IpcRequest::Set {
            hours: duration.hours,
            minutes: duration.minutes,
            seconds: duration.seconds,
        };
        self.execute(&request).await
    }

    /// Sends a start command to the daemon.
    pub async fn start(&self) -> Result<IpcResponse> {
        self.execute(&IpcRequest::Start).await
    }

    /// Sends a pause command to the daemon.
    pub async fn pause(&self) -> Result<IpcResponse> {
        self.execute(&IpcRequest::Pause).await
    }

    /// Sends a reset command to the daemon.
    pub async fn reset(&self) -> Result<IpcResponse> {
        self.execute(&IpcRequest::Reset).await
    }

    /// Sends a toggle command to the daemon.
    pub async fn toggle(&self) -> Result<IpcResponse> {
        self.execute(&IpcRequest::Toggle).await
    }

    /// Sends a status query to the daemon.
    pub async fn status(&self) -> Result<IpcResponse> {
        self.execute(&IpcRequest::Status).await
    }

    /// Sends a request and turns an error response into an `Err`.
    async fn execute(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let response = self.send_request_with_retry(request).await?;
        if response.is_error() {
            anyhow::bail!("{}", response.message);
        }
        Ok(response)
    }

    /// Sends a request to the daemon, retrying only the connection.
    ///
    /// Once the request has been written the daemon may already have applied
    /// it, so later failures are returned without resending. `toggle` is not
    /// idempotent.
    async fn send_request_with_retry(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let stream = self.connect_with_retry().await?;
        self.send_request(stream, request).await
    }

    /// Connects to the daemon socket, with linear back-off between attempts.
    async fn connect_with_retry(&self) -> Result<UnixStream> {
        let mut attempt = 1;
        loop {
            match self.connect().await {
                Ok(stream) => return Ok(stream),
                Err(e) if attempt >= MAX_RETRIES => return Err(e),
                Err(e) => {
                    tracing::warn!("Connection failed (attempt {}/{}): {:#}", attempt, MAX_RETRIES, e);
                    tokio::time::sleep(self.retry_delay * attempt).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Opens a single connection to the daemon.
    async fn connect(&self) -> Result<UnixStream> {
        timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Connection timed out")?
            .with_context(|| {
                format!(
                    "Cannot connect to the daemon at {}. Start it with 'workout-timer daemon'",
                    self.socket_path.display()
                )
            })
    }

    /// Writes one request on `stream` and reads the reply.
    async fn send_request(&self, mut stream: UnixStream, request: &IpcRequest) -> Result<IpcResponse> {
        let io_timeout = Duration::from_secs(IO_TIMEOUT_SECS);

        let request_json = serde_json::to_vec(request).context("Failed to serialize request")?;

        timeout(io_timeout, stream.write_all(&request_json))
            .await
            .context("Write timed out")?
            .context("Failed to send request")?;

        // Shutdown write side to signal end of request
        stream
            .shutdown()
            .await
            .context("Failed to shut down the write half")?;

        let mut buffer = Vec::new();
        timeout(
            io_timeout,
            (&mut stream)
                .take(MAX_RESPONSE_SIZE)
                .read_to_end(&mut buffer),
        )
        .await
        .context("Read timed out")?
        .context("Failed to receive response")?;

        if buffer.is_empty() {
            anyhow::bail!("The daemon closed the connection without responding");
        }

        serde_json::from_slice(&buffer).context("Failed to parse response")
    }
}

// ============================================================================
// Tests
// ============================================================================
