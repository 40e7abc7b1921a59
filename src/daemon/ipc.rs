//! IPC Server for the workout timer.
//!
//! This module provides Unix Domain Socket IPC functionality:
//! - Server that listens on a Unix socket
//! - Request/response handling for timer commands
//! - Integration with TimerEngine for command execution

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::time::{timeout, Duration};

use crate::types::{IpcRequest, IpcResponse, ResponseData, APP_DIR_NAME};

use super::timer::{TimerEngine, TimerError};

// ============================================================================
// Constants
// ============================================================================

/// Socket file name inside the app directory
pub const SOCKET_FILE_NAME: &str = "workout-timer.sock";

/// Maximum request size in bytes (4KB)
const MAX_REQUEST_SIZE: usize = 4096;

/// Read buffer chunk size
const READ_CHUNK_SIZE: usize = 1024;

/// Read timeout in seconds
const READ_TIMEOUT_SECS: u64 = 5;

/// Returns `~/.workout-timer/workout-timer.sock`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn default_socket_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine the home directory")?;
    Ok(home.join(APP_DIR_NAME).join(SOCKET_FILE_NAME))
}

// ============================================================================
// IpcError
// ============================================================================

/// IPC-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// Read error
    #[error("Failed to read request: {0}")]
    ReadError(String),

    /// Connection closed before a full request arrived
    #[error("Connection closed by client")]
    ConnectionClosed,

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Request too large
    #[error("Request too large (max {MAX_REQUEST_SIZE} bytes)")]
    RequestTooLarge,
}

// ============================================================================
// IpcServer
// ============================================================================

/// Unix Domain Socket IPC server.
pub struct IpcServer {
    /// Unix socket listener
    listener: UnixListener,
    /// Socket path (for cleanup)
    socket_path: PathBuf,
}

impl IpcServer {
    /// Creates a new IPC server bound to the specified socket path.
    ///
    /// If the socket file already exists, it will be removed before binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub fn new(socket_path: &Path) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .with_context(|| format!("Failed to remove existing socket: {:?}", socket_path))?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory: {:?}", parent))?;
        }

        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("Failed to bind Unix socket: {:?}", socket_path))?;

        tracing::debug!("IPC server listening on {:?}", socket_path);

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
        })
    }

    /// Accepts an incoming client connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be accepted.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .context("Failed to accept connection")?;
        Ok(stream)
    }

    /// Receives and deserializes an IPC request from the stream.
    ///
    /// Reads until a complete JSON document has arrived, the client closes
    /// its write side, or the read timeout expires.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or deserialization fails.
    pub async fn receive_request(stream: &mut UnixStream) -> Result<IpcRequest> {
        let read = async {
            let mut buffer = Vec::with_capacity(READ_CHUNK_SIZE);
            let mut chunk = [0u8; READ_CHUNK_SIZE];

            loop {
                let n = stream
                    .read(&mut chunk)
                    .await
                    .map_err(|e| IpcError::ReadError(e.to_string()))?;

                if n == 0 {
                    if buffer.is_empty() {
                        return Err(IpcError::ConnectionClosed.into());
                    }
                    return serde_json::from_slice(&buffer)
                        .context("Failed to deserialize IPC request");
                }

                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_SIZE {
                    return Err(IpcError::RequestTooLarge.into());
                }

                match serde_json::from_slice::<IpcRequest>(&buffer) {
                    Ok(request) => return Ok(request),
                    // Incomplete document, keep reading.
                    Err(e) if e.is_eof() => continue,
                    Err(e) => {
                        return Err(anyhow::Error::new(e).context("Failed to deserialize IPC request"))
                    }
                }
            }
        };

        match timeout(Duration::from_secs(READ_TIMEOUT_SECS), read).await {
            Ok(result) => result,
            Err(_) => Err(IpcError::Timeout.into()),
        }
    }

    /// Serializes and sends an IPC response to the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub async fn send_response(stream: &mut UnixStream, response: &IpcResponse) -> Result<()> {
        let json = serde_json::to_vec(response).context("Failed to serialize IPC response")?;

        stream
            .write_all(&json)
            .await
            .context("Failed to write response")?;
        stream.flush().await.context("Failed to flush response")?;

        Ok(())
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

// ============================================================================
// RequestHandler
// ============================================================================

/// Handles IPC requests by dispatching to TimerEngine.
#[derive(Debug, Clone)]
pub struct RequestHandler {
    /// Handle to the shared timer engine
    engine: TimerEngine,
}

impl RequestHandler {
    /// Creates a new request handler with the given timer engine.
    pub fn new(engine: TimerEngine) -> Self {
        Self { engine }
    }

    /// Handles an IPC request and returns the appropriate response.
    pub fn handle(&self, request: IpcRequest) -> IpcResponse {
        tracing::debug!(?request, "Handling IPC request");
        match request {
            IpcRequest::Set {
                hours,
                minutes,
                seconds,
            } => self.handle_set(hours, minutes, seconds),
            IpcRequest::Start => self.handle_start(),
            IpcRequest::Pause => {
                self.engine.pause();
                self.respond("Timer paused")
            }
            IpcRequest::Reset => {
                self.engine.reset();
                self.respond("Timer reset")
            }
            IpcRequest::Toggle => self.handle_toggle(),
            IpcRequest::Status => self.respond(""),
        }
    }

    /// Handles the set command.
    fn handle_set(&self, hours: u32, minutes: u32, seconds: u32) -> IpcResponse {
        if let Err(e) = self.engine.set_duration(hours, minutes, seconds) {
            return IpcResponse::error(e.to_string());
        }

        // The engine ignores the new duration while counting down.
        if self.engine.is_running() {
            self.respond("Timer is running; pause or reset it before changing the duration")
        } else {
            self.respond("Duration set")
        }
    }

    /// Handles the start command.
    fn handle_start(&self) -> IpcResponse {
        match self.engine.start() {
            Ok(()) => self.respond("Timer started"),
            Err(e) if e.is_benign() => self.respond("Timer is already running"),
            Err(e) => IpcResponse::error(e.to_string()),
        }
    }

    /// Handles the toggle command.
    ///
    /// A rejected start is reported rather than answered as a pause.
    fn handle_toggle(&self) -> IpcResponse {
        if self.engine.is_running() {
            self.engine.pause();
            return self.respond("Timer paused");
        }
        match self.engine.start() {
            Ok(()) => self.respond("Timer started"),
            Err(e) if e.is_benign() => self.respond("Timer is already running"),
            Err(TimerError::ZeroDuration) => {
                IpcResponse::error("Nothing to count down; set a duration first")
            }
            Err(e) => IpcResponse::error(e.to_string()),
        }
    }

    /// Builds a success response carrying the current snapshot.
    fn respond(&self, message: &str) -> IpcResponse {
        IpcResponse::success(
            message,
            Some(ResponseData::from_timer_state(&self.engine.state())),
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::notification::MockNotifier;
    use crate::types::TimerConfig;

    // ------------------------------------------------------------------------
    // Helper functions
    // ------------------------------------------------------------------------

    fn create_temp_socket_path() -> PathBuf {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sock");
        // Keep the directory so it's not deleted
        std::mem::forget(dir);
        path
    }

    fn create_engine() -> TimerEngine {
        TimerEngine::new(TimerConfig::default(), Arc::new(MockNotifier::new()))
    }

    // ------------------------------------------------------------------------
    // IpcServer Tests
    // ------------------------------------------------------------------------

    mod ipc_server_tests {
        use super::*;

        #[tokio::test]
        async fn test_server_creation() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path);

            assert!(server.is_ok());
            assert!(socket_path.exists());
        }

        #[tokio::test]
        async fn test_server_removes_existing_socket() {
            let socket_path = create_temp_socket_path();
            std::fs::write(&socket_path, "stale").unwrap();

            let server = IpcServer::new(&socket_path);
            assert!(server.is_ok());
        }

        #[tokio::test]
        async fn test_server_creates_parent_directory() {
            let dir = tempfile::tempdir().unwrap();
            let socket_path = dir.path().join("subdir").join("test.sock");

            let server = IpcServer::new(&socket_path);
            assert!(server.is_ok());
            assert!(socket_path.parent().unwrap().exists());
        }

        #[tokio::test]
        async fn test_receive_request_set() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();

            let client_path = socket_path.clone();
            let client_handle = tokio::spawn(async move {
                let mut stream = UnixStream::connect(&client_path).await.unwrap();
                let request = r#"{"command":"set","hours":0,"minutes":45,"seconds":0}"#;
                stream.write_all(request.as_bytes()).await.unwrap();
                stream.flush().await.unwrap();
                stream
            });

            let mut stream = server.accept().await.unwrap();
            let request = IpcServer::receive_request(&mut stream).await.unwrap();

            assert_eq!(
                request,
                IpcRequest::Set {
                    hours: 0,
                    minutes: 45,
                    seconds: 0
                }
            );

            client_handle.await.unwrap();
        }

        #[tokio::test]
        async fn test_receive_request_split_writes() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();

            let client_path = socket_path.clone();
            let client_handle = tokio::spawn(async move {
                let mut stream = UnixStream::connect(&client_path).await.unwrap();
                stream.write_all(br#"{"command":"#).await.unwrap();
                stream.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
                stream.write_all(br#""toggle"}"#).await.unwrap();
                stream.shutdown().await.unwrap();
            });

            let mut stream = server.accept().await.unwrap();
            let request = IpcServer::receive_request(&mut stream).await.unwrap();
            assert_eq!(request, IpcRequest::Toggle);

            client_handle.await.unwrap();
        }

        #[tokio::test]
        async fn test_receive_request_invalid_json() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();

            let client_path = socket_path.clone();
            let _client_handle = tokio::spawn(async move {
                let mut stream = UnixStream::connect(&client_path).await.unwrap();
                stream.write_all(b"not valid json").await.unwrap();
                stream.shutdown().await.unwrap();
            });

            let mut stream = server.accept().await.unwrap();
            let request = IpcServer::receive_request(&mut stream).await;

            assert!(request.is_err());
        }

        #[tokio::test]
        async fn test_receive_request_too_large() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();

            let client_path = socket_path.clone();
            let _client_handle = tokio::spawn(async move {
                let mut stream = UnixStream::connect(&client_path).await.unwrap();
                let padding = " ".repeat(MAX_REQUEST_SIZE + 10);
                let request = format!(r#"{{"command":{}"status"}}"#, padding);
                let _ = stream.write_all(request.as_bytes()).await;
                let _ = stream.shutdown().await;
            });

            let mut stream = server.accept().await.unwrap();
            let err = IpcServer::receive_request(&mut stream).await.unwrap_err();

            assert!(err.to_string().contains("too large"));
        }

        #[tokio::test]
        async fn test_send_response() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();

            let client_path = socket_path.clone();
            let client_handle = tokio::spawn(async move {
                let mut stream = UnixStream::connect(&client_path).await.unwrap();
                let mut buffer = Vec::new();
                stream.read_to_end(&mut buffer).await.unwrap();
                serde_json::from_slice::<IpcResponse>(&buffer).unwrap()
            });

            let mut stream = server.accept().await.unwrap();
            let response = IpcResponse::success("Test message", None);
            IpcServer::send_response(&mut stream, &response)
                .await
                .unwrap();
            drop(stream);

            let received = client_handle.await.unwrap();
            assert_eq!(received.status, "success");
            assert_eq!(received.message, "Test message");
        }

        #[tokio::test]
        async fn test_socket_path_getter() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();

            assert_eq!(server.socket_path(), socket_path);
        }

        #[tokio::test]
        async fn test_server_drop_cleanup() {
            let socket_path = create_temp_socket_path();

            {
                let _server = IpcServer::new(&socket_path).unwrap();
                assert!(socket_path.exists());
            }

            assert!(!socket_path.exists());
        }

        #[test]
        fn test_default_socket_path() {
            if let Ok(path) = default_socket_path() {
                assert!(path.ends_with(".workout-timer/workout-timer.sock"));
            }
        }
    }

    // ------------------------------------------------------------------------
    // RequestHandler Tests
    // ------------------------------------------------------------------------

    mod request_handler_tests {
        use super::*;

        #[test]
        fn test_handle_status() {
            let handler = RequestHandler::new(create_engine());

            let response = handler.handle(IpcRequest::Status);

            assert_eq!(response.status, "success");
            let data = response.data.unwrap();
            assert_eq!(data.state, Some("idle".to_string()));
            assert_eq!(data.minutes, Some(2));
            assert_eq!(data.remaining_total_seconds, Some(120));
            assert_eq!(data.is_active, Some(false));
        }

        #[test]
        fn test_handle_set() {
            let handler = RequestHandler::new(create_engine());

            let response = handler.handle(IpcRequest::Set {
                hours: 1,
                minutes: 0,
                seconds: 30,
            });

            assert_eq!(response.status, "success");
            assert_eq!(response.message, "Duration set");
            let data = response.data.unwrap();
            assert_eq!(data.hours, Some(1));
            assert_eq!(data.seconds, Some(30));
            assert_eq!(data.remaining_total_seconds, Some(3630));
        }

        #[test]
        fn test_handle_set_invalid() {
            let handler = RequestHandler::new(create_engine());

            let response = handler.handle(IpcRequest::Set {
                hours: 0,
                minutes: 0,
                seconds: 75,
            });

            assert!(response.is_error());
            assert!(response.message.contains("invalid duration"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_handle_set_while_running() {
            let engine = create_engine();
            let handler = RequestHandler::new(engine.clone());
            handler.handle(IpcRequest::Start);

            let response = handler.handle(IpcRequest::Set {
                hours: 0,
                minutes: 0,
                seconds: 5,
            });

            assert_eq!(response.status, "success");
            assert!(response.message.contains("running"));
            assert_eq!(engine.state().remaining_total_seconds, 120);
        }

        #[tokio::test(start_paused = true)]
        async fn test_handle_start() {
            let handler = RequestHandler::new(create_engine());

            let response = handler.handle(IpcRequest::Start);

            assert_eq!(response.status, "success");
            assert_eq!(response.message, "Timer started");
            let data = response.data.unwrap();
            assert_eq!(data.state, Some("running".to_string()));
            assert_eq!(data.is_active, Some(true));
        }

        #[tokio::test(start_paused = true)]
        async fn test_handle_start_already_running() {
            let handler = RequestHandler::new(create_engine());
            handler.handle(IpcRequest::Start);

            let response = handler.handle(IpcRequest::Start);

            assert_eq!(response.status, "success");
            assert_eq!(response.message, "Timer is already running");
        }

        #[test]
        fn test_handle_start_zero_duration() {
            let handler = RequestHandler::new(create_engine());
            handler.handle(IpcRequest::Set {
                hours: 0,
                minutes: 0,
                seconds: 0,
            });

            let response = handler.handle(IpcRequest::Start);

            assert!(response.is_error());
            assert!(response.message.contains("zero-length"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_handle_toggle() {
            let handler = RequestHandler::new(create_engine());

            let started = handler.handle(IpcRequest::Toggle);
            assert_eq!(started.message, "Timer started");
            assert_eq!(started.data.unwrap().is_active, Some(true));

            let paused = handler.handle(IpcRequest::Toggle);
            assert_eq!(paused.message, "Timer paused");
            assert_eq!(paused.data.unwrap().is_active, Some(false));
        }

        #[test]
        fn test_handle_toggle_zero_duration() {
            let handler = RequestHandler::new(create_engine());
            handler.handle(IpcRequest::Set {
                hours: 0,
                minutes: 0,
                seconds: 0,
            });

            let response = handler.handle(IpcRequest::Toggle);

            assert!(response.is_error());
            assert!(response.message.contains("Nothing to count down"));
            assert!(response.data.is_none());
        }

        #[tokio::test(start_paused = true)]
        async fn test_handle_pause() {
            let handler = RequestHandler::new(create_engine());
            handler.handle(IpcRequest::Start);

            let response = handler.handle(IpcRequest::Pause);

            assert_eq!(response.message, "Timer paused");
            let data = response.data.unwrap();
            assert_eq!(data.state, Some("idle".to_string()));
            assert_eq!(data.remaining_total_seconds, Some(120));
        }

        #[test]
        fn test_handle_pause_when_idle() {
            let handler = RequestHandler::new(create_engine());

            let response = handler.handle(IpcRequest::Pause);

            assert_eq!(response.status, "success");
        }

        #[tokio::test(start_paused = true)]
        async fn test_handle_reset() {
            let handler = RequestHandler::new(create_engine());
            handler.handle(IpcRequest::Set {
                hours: 0,
                minutes: 30,
                seconds: 0,
            });
            handler.handle(IpcRequest::Start);

            let response = handler.handle(IpcRequest::Reset);

            assert_eq!(response.message, "Timer reset");
            let data = response.data.unwrap();
            assert_eq!(data.is_active, Some(false));
            assert_eq!(data.remaining_total_seconds, Some(120));
        }

        #[tokio::test(start_paused = true)]
        async fn test_all_commands_flow() {
            let handler = RequestHandler::new(create_engine());

            let commands = vec![
                (r#"{"command":"set","hours":0,"minutes":0,"seconds":30}"#, "idle"),
                (r#"{"command":"toggle"}"#, "running"),
                (r#"{"command":"toggle"}"#, "idle"),
                (r#"{"command":"start"}"#, "running"),
                (r#"{"command":"pause"}"#, "idle"),
                (r#"{"command":"reset"}"#, "idle"),
                (r#"{"command":"status"}"#, "idle"),
            ];

            for (cmd_json, expected_state) in commands {
                let request: IpcRequest = serde_json::from_str(cmd_json).unwrap();
                let response = handler.handle(request);

                assert_eq!(response.status, "success", "Command: {}", cmd_json);
                assert_eq!(
                    response.data.unwrap().state,
                    Some(expected_state.to_string()),
                    "Command: {}",
                    cmd_json
                );
            }
        }
    }

    // ------------------------------------------------------------------------
    // Error Handling Tests
    // ------------------------------------------------------------------------

    mod error_tests {
        use super::*;

        #[tokio::test]
        async fn test_connection_closed() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();

            let client_path = socket_path.clone();
            let _client = tokio::spawn(async move {
                let stream = UnixStream::connect(&client_path).await.unwrap();
                drop(stream);
            });

            let mut stream = server.accept().await.unwrap();
            let result = IpcServer::receive_request(&mut stream).await;

            assert!(result.is_err());
        }

        #[test]
        fn test_ipc_error_display() {
            assert_eq!(IpcError::Timeout.to_string(), "Operation timed out");
            assert_eq!(
                IpcError::ConnectionClosed.to_string(),
                "Connection closed by client"
            );
            assert!(IpcError::RequestTooLarge.to_string().contains("4096"));
        }
    }
}
