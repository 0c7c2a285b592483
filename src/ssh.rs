//! SSH session management and remote command execution.
//!
//! One authenticated session to the cluster login node at a time, owned by
//! [`Console`]. Commands run over short-lived exec channels and are drained
//! to completion before returning; there is no terminal emulation, no
//! multiplexing, and no automatic reconnection. The only recovery path
//! after a transport failure is an explicit disconnect plus a fresh connect.

use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Duration;

use russh::client::{AuthResult, Handle};
use russh::ChannelMsg;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::ConnectionConfig;

/// Error type for SSH transport and authentication failures
#[derive(Debug, Error)]
pub enum SshError {
    /// Hostname did not resolve to a usable address
    #[error("failed to resolve {0}")]
    Resolve(String),

    /// Network-level failure (connect refused, reset, ...)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TCP connect or SSH handshake exceeded the configured timeout
    #[error("connection timeout after {0}s")]
    Timeout(u64),

    /// The server rejected the credentials
    #[error("authentication failed: {0}")]
    Auth(String),

    /// SSH protocol failure
    #[error("SSH protocol error: {0}")]
    Protocol(String),

    /// Exec channel failure
    #[error("channel error: {0}")]
    Channel(String),

    /// An operation required an active session and there is none
    #[error("no active session")]
    NotConnected,
}

impl From<russh::Error> for SshError {
    fn from(e: russh::Error) -> Self {
        SshError::Protocol(e.to_string())
    }
}

/// Which output stream a decode failure occurred on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

/// A fully drained output stream that was not valid UTF-8
#[derive(Debug, Clone, Error)]
#[error("{stream} is not valid UTF-8: {source}")]
pub struct DecodeError {
    pub stream: StreamKind,
    #[source]
    pub source: std::string::FromUtf8Error,
}

impl DecodeError {
    /// The undecodable bytes, for lossy fallback display
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.source.as_bytes()
    }
}

fn decode(stream: StreamKind, bytes: Vec<u8>) -> Result<String, DecodeError> {
    String::from_utf8(bytes).map_err(|source| DecodeError { stream, source })
}

/// Outcome of one remote command execution.
///
/// Both streams are fully drained before this is produced, and each stream
/// decodes independently: undecodable stdout does not discard a readable
/// stderr, or vice versa.
#[derive(Debug)]
pub struct CommandOutput {
    /// The command string as sent to the server
    pub command: String,
    pub stdout: Result<String, DecodeError>,
    pub stderr: Result<String, DecodeError>,
}

/// Connection lifecycle of the console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// The operations the console can be asked to perform.
///
/// UIs query [`Console::allowed_operations`] for the set callable in the
/// current state instead of hardcoding per-control enable/disable logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Connect,
    Disconnect,
    Queue,
    QueueForUser,
    CancelJob,
    NodeStatus,
    Diagnostics,
    Passthrough,
}

const CONNECTED_OPERATIONS: &[Operation] = &[
    Operation::Disconnect,
    Operation::Queue,
    Operation::QueueForUser,
    Operation::CancelJob,
    Operation::NodeStatus,
    Operation::Diagnostics,
    Operation::Passthrough,
];

const DISCONNECTED_OPERATIONS: &[Operation] = &[Operation::Connect];

/// russh event handler. Host keys are accepted and logged by fingerprint:
/// the tool targets login nodes the operator already reaches over plain ssh,
/// and password auth is the only method in play.
struct ClientHandler;

impl russh::client::Handler for ClientHandler {
    type Error = russh::Error;

    fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::PublicKey,
    ) -> impl std::future::Future<Output = Result<bool, Self::Error>> + Send {
        let fingerprint = server_public_key.fingerprint(russh::keys::ssh_key::HashAlg::Sha256);
        tracing::debug!(%fingerprint, "accepting server host key");
        async { Ok(true) }
    }
}

/// One authenticated session to the login node.
///
/// The session carries its own username so callers that need it (user
/// filtering, self-highlighting) read it from here instead of re-deriving it
/// from credential input.
pub struct Session {
    handle: Handle<ClientHandler>,
    host: String,
    username: String,
}

impl Session {
    /// Resolve, connect, handshake and authenticate.
    async fn open(config: &ConnectionConfig) -> Result<Self, SshError> {
        let addr = format!("{}:{}", config.host, config.port);
        let socket_addr = addr
            .to_socket_addrs()
            .map_err(|e| SshError::Resolve(format!("{addr}: {e}")))?
            .next()
            .ok_or_else(|| SshError::Resolve(addr.clone()))?;

        tracing::debug!(%socket_addr, user = %config.username, "opening connection");

        let connect_timeout = Duration::from_secs(config.connect_timeout);
        let tcp = timeout(connect_timeout, TcpStream::connect(socket_addr))
            .await
            .map_err(|_| SshError::Timeout(config.connect_timeout))??;

        let russh_config = Arc::new(russh::client::Config::default());
        let mut handle = timeout(
            connect_timeout,
            russh::client::connect_stream(russh_config, tcp, ClientHandler),
        )
        .await
        .map_err(|_| SshError::Timeout(config.connect_timeout))??;

        authenticate(&mut handle, &config.username, &config.password).await?;

        Ok(Self {
            handle,
            host: config.host.clone(),
            username: config.username.clone(),
        })
    }

    /// Hostname of the login node
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Username the session authenticated as
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Run one command to completion, draining both output streams.
    async fn exec(&self, command: &str) -> Result<CommandOutput, SshError> {
        let mut channel = self.handle.channel_open_session().await?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| SshError::Channel(e.to_string()))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => stdout.extend_from_slice(&data),
                Some(ChannelMsg::ExtendedData { data, ext }) if ext == 1 => {
                    stderr.extend_from_slice(&data);
                }
                Some(ChannelMsg::Eof | ChannelMsg::Close) | None => break,
                Some(_) => {}
            }
        }

        tracing::debug!(
            command,
            stdout_bytes = stdout.len(),
            stderr_bytes = stderr.len(),
            "command finished"
        );

        Ok(CommandOutput {
            command: command.to_string(),
            stdout: decode(StreamKind::Stdout, stdout),
            stderr: decode(StreamKind::Stderr, stderr),
        })
    }

    async fn close(self) {
        // the Handle tears the transport down on drop; ask the server for a
        // clean goodbye first
        let _ = self
            .handle
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await;
    }
}

async fn authenticate(
    handle: &mut Handle<ClientHandler>,
    username: &str,
    password: &str,
) -> Result<(), SshError> {
    let auth_result = handle.authenticate_password(username, password).await?;

    match auth_result {
        AuthResult::Success => Ok(()),
        AuthResult::Failure {
            remaining_methods,
            partial_success,
        } => {
            if partial_success {
                return Err(SshError::Auth(
                    "server requires additional authentication".to_string(),
                ));
            }
            Err(SshError::Auth(format!(
                "password rejected for '{username}' (server offers: {remaining_methods:?})"
            )))
        }
    }
}

/// Owns the lifecycle of the single active session and executes commands
/// over it.
///
/// Exactly one session is active at a time: connecting while connected tears
/// the previous session down first (replace, not stack). Execution is
/// serialized through `&mut self`; commands never interleave on the
/// transport.
#[derive(Default)]
pub struct Console {
    session: Option<Session>,
    state: ConnectionState,
}

impl Console {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current connection state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Username of the active session, if connected
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.session.as_ref().map(Session::username)
    }

    /// Hostname of the active session, if connected
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.session.as_ref().map(Session::host)
    }

    /// The operations callable in the current state
    #[must_use]
    pub fn allowed_operations(&self) -> &'static [Operation] {
        match self.state {
            ConnectionState::Connected => CONNECTED_OPERATIONS,
            _ => DISCONNECTED_OPERATIONS,
        }
    }

    /// Establish a new authenticated session.
    ///
    /// Does not retry: a failure leaves the console in the `Failed` state
    /// and the caller decides whether to connect again.
    ///
    /// # Errors
    /// Any resolution, transport, handshake or authentication failure, with
    /// the underlying cause attached.
    pub async fn connect(&mut self, config: &ConnectionConfig) -> Result<(), SshError> {
        if self.session.is_some() {
            self.disconnect().await;
        }

        self.state = ConnectionState::Connecting;
        match Session::open(config).await {
            Ok(session) => {
                tracing::info!(host = %session.host(), user = %session.username(), "connected");
                self.session = Some(session);
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Failed;
                Err(e)
            }
        }
    }

    /// Close the active session, if any. Idempotent: disconnecting an
    /// already disconnected console is a no-op, not an error.
    pub async fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::info!(host = %session.host(), "disconnected");
            session.close().await;
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Execute a command over the active session.
    ///
    /// Blocks the caller until the command completes and both output streams
    /// are drained. The command string is sent as-is: the operator already
    /// has shell access to the target, so nothing is interpreted or
    /// sanitized here.
    ///
    /// # Errors
    /// [`SshError::NotConnected`] when no session is active (nothing is sent
    /// anywhere); otherwise any channel-level failure.
    pub async fn execute(&mut self, command: &str) -> Result<CommandOutput, SshError> {
        match (self.state, self.session.as_ref()) {
            (ConnectionState::Connected, Some(session)) => session.exec(command).await,
            _ => Err(SshError::NotConnected),
        }
    }
}
