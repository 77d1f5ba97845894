//! Connection management for ESL
//!
//! The transport is split into a `Clone + Send` command handle
//! ([`EslClient`]) and a dedicated event stream ([`EslEventStream`]), backed
//! by a single background reader task that owns the socket's read half.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::{interval, timeout, Instant};
use tracing::{debug, info, trace, warn};

use crate::{
    command::{EslCommand, EslResponse},
    constants::*,
    error::{EslError, EslResult},
    event::{EslEvent, EslEventType, EventFormat},
    protocol::{EslMessage, EslParser, MessageType},
};

/// Connection mode for ESL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Inbound connection - client connects to FreeSWITCH
    Inbound,
    /// Outbound connection - FreeSWITCH connects to client
    Outbound,
}

/// Why a connection went down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// FreeSWITCH sent a `text/disconnect-notice` message.
    ServerNotice,
    /// The TCP connection was closed or errored.
    ConnectionClosed,
    /// No traffic was observed within the liveness timeout.
    HeartbeatExpired,
}

/// Current connection status, observable from any clone of [`EslClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// The reader task is alive and the socket is open.
    Connected,
    /// The connection is down; no further commands will succeed.
    Disconnected(DisconnectReason),
}

/// Shared state between [`EslClient`] clones and the background reader task.
struct Shared {
    writer: Mutex<WriteHalf<TcpStream>>,
    /// Serializes command submission: ESL replies carry no command id, so at
    /// most one command may be in flight at a time.
    command_gate: Mutex<()>,
    pending_reply: StdMutex<Option<oneshot::Sender<EslMessage>>>,
    status: StdMutex<ConnectionStatus>,
    event_format: StdMutex<EventFormat>,
    liveness_timeout_ms: AtomicU64,
    command_timeout_ms: AtomicU64,
}

impl Shared {
    fn status(&self) -> ConnectionStatus {
        *self
            .status
            .lock()
            .unwrap()
    }

    fn is_connected(&self) -> bool {
        matches!(
            self.status(),
            ConnectionStatus::Connected
        )
    }

    fn mark_disconnected(&self, reason: DisconnectReason) {
        let mut status = self
            .status
            .lock()
            .unwrap();
        if matches!(*status, ConnectionStatus::Connected) {
            *status = ConnectionStatus::Disconnected(reason);
        }
    }
}

/// A cloneable handle for issuing ESL commands over a shared connection.
///
/// Every clone shares the same underlying socket and command correlation
/// state; commands issued from different clones are serialized so that
/// replies are matched to the right caller.
#[derive(Clone)]
pub struct EslClient {
    shared: Arc<Shared>,
}

/// The receiving half of an ESL connection: yields events demultiplexed by
/// the background reader task.
pub struct EslEventStream {
    rx: mpsc::Receiver<EslEvent>,
}

impl EslEventStream {
    /// Receive the next event, or `None` once the connection is closed and
    /// all buffered events have been drained.
    pub async fn recv(&mut self) -> Option<EslEvent> {
        self.rx
            .recv()
            .await
    }

    /// Build a stream directly from a channel receiver, bypassing a real
    /// connection. Used to feed the [`crate::router::EventRouter`] a scripted
    /// sequence of events in tests.
    pub fn from_receiver(rx: mpsc::Receiver<EslEvent>) -> Self {
        Self { rx }
    }
}

impl EslClient {
    /// Connect to FreeSWITCH (inbound mode) and authenticate.
    pub async fn connect(host: &str, port: u16, password: &str) -> EslResult<(Self, EslEventStream)> {
        info!("Connecting to FreeSWITCH at {}:{}", host, port);

        let tcp_result = timeout(
            Duration::from_millis(DEFAULT_TIMEOUT_MS),
            TcpStream::connect((host, port)),
        )
        .await;

        let stream = match tcp_result {
            Ok(Ok(s)) => s,
            Ok(Err(e)) => return Err(EslError::Io(e)),
            Err(_) => {
                return Err(EslError::Timeout {
                    timeout_ms: DEFAULT_TIMEOUT_MS,
                })
            }
        };

        Self::from_stream(stream, AuthMode::Password(password.to_string())).await
    }

    /// Connect to FreeSWITCH using `user@domain` directory authentication.
    pub async fn connect_with_user(
        host: &str,
        port: u16,
        user: &str,
        password: &str,
    ) -> EslResult<(Self, EslEventStream)> {
        if !user.contains('@') {
            return Err(EslError::auth_failed(format!(
                "Invalid username format '{}': must be user@domain (e.g., admin@default)",
                user
            )));
        }

        info!(
            "Connecting to FreeSWITCH at {}:{} with user {}",
            host, port, user
        );

        let stream = TcpStream::connect((host, port))
            .await
            .map_err(EslError::Io)?;

        Self::from_stream(
            stream,
            AuthMode::User {
                user: user.to_string(),
                password: password.to_string(),
            },
        )
        .await
    }

    /// Accept an outbound connection from FreeSWITCH on a bound listener.
    ///
    /// Outbound connections don't require authentication.
    pub async fn accept_outbound(listener: TcpListener) -> EslResult<(Self, EslEventStream)> {
        info!("Waiting for outbound connection from FreeSWITCH");

        let (stream, addr) = listener
            .accept()
            .await
            .map_err(EslError::Io)?;
        info!("Accepted outbound connection from {}", addr);

        Self::from_stream(stream, AuthMode::None).await
    }

    async fn from_stream(
        stream: TcpStream,
        auth: AuthMode,
    ) -> EslResult<(Self, EslEventStream)> {
        let (mut read_half, write_half) = tokio::io::split(stream);

        let (event_tx, event_rx) = mpsc::channel(MAX_EVENT_QUEUE_SIZE);

        let shared = Arc::new(Shared {
            writer: Mutex::new(write_half),
            command_gate: Mutex::new(()),
            pending_reply: StdMutex::new(None),
            status: StdMutex::new(ConnectionStatus::Connected),
            event_format: StdMutex::new(EventFormat::Plain),
            liveness_timeout_ms: AtomicU64::new(DEFAULT_LIVENESS_TIMEOUT_MS),
            command_timeout_ms: AtomicU64::new(DEFAULT_COMMAND_TIMEOUT_MS),
        });

        let client = EslClient {
            shared: shared.clone(),
        };

        // Authenticate before handing the client to the caller: the reader
        // task isn't spawned yet, so we read the handshake inline on
        // `read_half`, then hand the half off to the reader task.
        match auth {
            AuthMode::None => {}
            AuthMode::Password(password) => {
                Self::authenticate(&mut read_half, &shared, &password).await?;
            }
            AuthMode::User { user, password } => {
                Self::authenticate_user(&mut read_half, &shared, &user, &password).await?;
            }
        }

        tokio::spawn(reader_task(read_half, shared, event_tx));

        info!("Successfully connected and authenticated to FreeSWITCH");
        Ok((client, EslEventStream { rx: event_rx }))
    }

    async fn authenticate(
        read_half: &mut ReadHalf<TcpStream>,
        shared: &Shared,
        password: &str,
    ) -> EslResult<()> {
        let mut parser = EslParser::new();
        let message = read_one_message(read_half, &mut parser).await?;
        if message.message_type != MessageType::AuthRequest {
            return Err(EslError::protocol_error("Expected auth request"));
        }

        let auth_cmd = EslCommand::Auth {
            password: password.to_string(),
        };
        let response =
            handshake_command(read_half, &mut parser, &shared.writer, auth_cmd).await?;
        if !response.is_success() {
            return Err(EslError::auth_failed(
                response
                    .reply_text()
                    .cloned()
                    .unwrap_or_else(|| "Authentication failed".to_string()),
            ));
        }
        Ok(())
    }

    async fn authenticate_user(
        read_half: &mut ReadHalf<TcpStream>,
        shared: &Shared,
        user: &str,
        password: &str,
    ) -> EslResult<()> {
        let mut parser = EslParser::new();
        let message = read_one_message(read_half, &mut parser).await?;
        if message.message_type != MessageType::AuthRequest {
            return Err(EslError::protocol_error("Expected auth request"));
        }

        let auth_cmd = EslCommand::UserAuth {
            user: user.to_string(),
            password: password.to_string(),
        };
        let response =
            handshake_command(read_half, &mut parser, &shared.writer, auth_cmd).await?;
        if !response.is_success() {
            return Err(EslError::auth_failed(
                response
                    .reply_text()
                    .cloned()
                    .unwrap_or_else(|| "User authentication failed".to_string()),
            ));
        }
        Ok(())
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.shared
            .status()
    }

    /// `true` if the connection is up.
    pub fn is_connected(&self) -> bool {
        self.shared
            .is_connected()
    }

    /// Override the idle-traffic timeout before the connection is declared
    /// dead. Reset by any inbound traffic, not just heartbeats.
    pub fn set_liveness_timeout(&self, timeout: Duration) {
        self.shared
            .liveness_timeout_ms
            .store(timeout.as_millis() as u64, Ordering::Relaxed);
    }

    /// Override the per-command reply timeout.
    pub fn set_command_timeout(&self, timeout: Duration) {
        self.shared
            .command_timeout_ms
            .store(timeout.as_millis() as u64, Ordering::Relaxed);
    }

    /// Send a command and wait for its correlated response.
    pub async fn send_command(&self, command: EslCommand) -> EslResult<EslResponse> {
        if !self.is_connected() {
            return Err(EslError::NotConnected);
        }

        let _gate = self
            .shared
            .command_gate
            .lock()
            .await;

        if !self.is_connected() {
            return Err(EslError::NotConnected);
        }

        let (tx, rx) = oneshot::channel();
        *self
            .shared
            .pending_reply
            .lock()
            .unwrap() = Some(tx);

        let command_str = command.to_wire_format();
        debug!("Sending command: {}", command_str.trim());

        {
            let mut writer = self
                .shared
                .writer
                .lock()
                .await;
            if let Err(e) = writer
                .write_all(command_str.as_bytes())
                .await
            {
                self.shared
                    .pending_reply
                    .lock()
                    .unwrap()
                    .take();
                return Err(EslError::Io(e));
            }
        }

        let timeout_ms = self
            .shared
            .command_timeout_ms
            .load(Ordering::Relaxed);

        match timeout(Duration::from_millis(timeout_ms), rx).await {
            Ok(Ok(message)) => {
                let response = message.into_response();
                debug!("Received response: success={}", response.is_success());
                Ok(response)
            }
            Ok(Err(_)) => Err(EslError::NotConnected),
            Err(_) => {
                // Clear our own stale slot so the next command isn't blocked
                // waiting on a reply that will never resolve to us.
                self.shared
                    .pending_reply
                    .lock()
                    .unwrap()
                    .take();
                Err(EslError::Timeout { timeout_ms })
            }
        }
    }

    /// Execute API command.
    pub async fn api(&self, command: &str) -> EslResult<EslResponse> {
        let cmd = EslCommand::Api {
            command: command.to_string(),
        };
        self.send_command(cmd)
            .await
    }

    /// Execute background API command.
    pub async fn bgapi(&self, command: &str) -> EslResult<EslResponse> {
        let cmd = EslCommand::BgApi {
            command: command.to_string(),
        };
        self.send_command(cmd)
            .await
    }

    /// Subscribe to events. Idempotent; call once after connect.
    pub async fn subscribe_events(
        &self,
        format: EventFormat,
        events: &[EslEventType],
    ) -> EslResult<()> {
        let events_str = if events.contains(&EslEventType::All) {
            "ALL".to_string()
        } else {
            events
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        };

        let cmd = EslCommand::Events {
            format: format.to_string(),
            events: events_str,
        };

        let response = self
            .send_command(cmd)
            .await?;
        if !response.is_success() {
            return Err(EslError::CommandFailed {
                reply_text: response
                    .reply_text()
                    .cloned()
                    .unwrap_or_else(|| "Event subscription failed".to_string()),
            });
        }

        *self
            .shared
            .event_format
            .lock()
            .unwrap() = format;

        info!("Subscribed to events with format {:?}", format);
        Ok(())
    }

    /// Set an event filter (narrows which events the server forwards).
    pub async fn filter_events(&self, header: &str, value: &str) -> EslResult<()> {
        let cmd = EslCommand::Filter {
            header: header.to_string(),
            value: value.to_string(),
        };

        let response = self
            .send_command(cmd)
            .await?;
        response.into_result()?;

        debug!("Set event filter: {} = {}", header, value);
        Ok(())
    }

    /// Execute an application on a channel.
    pub async fn execute(
        &self,
        app: &str,
        args: Option<&str>,
        uuid: Option<&str>,
    ) -> EslResult<EslResponse> {
        let cmd = EslCommand::Execute {
            app: app.to_string(),
            args: args.map(|s| s.to_string()),
            uuid: uuid.map(|s| s.to_string()),
        };
        self.send_command(cmd)
            .await
    }

    /// Send a raw message to a channel.
    pub async fn sendmsg(&self, uuid: Option<&str>, event: EslEvent) -> EslResult<EslResponse> {
        let cmd = EslCommand::SendMsg {
            uuid: uuid.map(|s| s.to_string()),
            event,
        };
        self.send_command(cmd)
            .await
    }

    /// Best-effort graceful shutdown: sends `exit` without waiting for a
    /// reply and marks the connection closed locally. Matches the C ESL
    /// library's approach of not blocking on the socket actually closing;
    /// the reader task will observe the peer's disconnect and tear itself
    /// down on its own.
    pub async fn close(&self) {
        if !self.is_connected() {
            return;
        }

        let command_str = EslCommand::Exit.to_wire_format();
        {
            let mut writer = self
                .shared
                .writer
                .lock()
                .await;
            let _ = writer
                .write_all(command_str.as_bytes())
                .await;
        }

        self.shared
            .mark_disconnected(DisconnectReason::ConnectionClosed);
    }
}

enum AuthMode {
    None,
    Password(String),
    User { user: String, password: String },
}

/// Read a single framed message from the read half, blocking on socket reads
/// as needed. Used only during the handshake, before the reader task exists.
async fn read_one_message(
    read_half: &mut ReadHalf<TcpStream>,
    parser: &mut EslParser,
) -> EslResult<EslMessage> {
    loop {
        if let Some(message) = parser.parse_message()? {
            return Ok(message);
        }

        let mut buf = [0u8; SOCKET_BUF_SIZE];
        let read_result = timeout(
            Duration::from_millis(DEFAULT_TIMEOUT_MS),
            read_half.read(&mut buf),
        )
        .await;

        let n = match read_result {
            Ok(Ok(0)) => return Err(EslError::ConnectionClosed),
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(EslError::Io(e)),
            Err(_) => {
                return Err(EslError::Timeout {
                    timeout_ms: DEFAULT_TIMEOUT_MS,
                })
            }
        };

        parser.add_data(&buf[..n])?;
    }
}

/// Write a command and read back its reply during the handshake, before the
/// reader task takes ownership of the read half.
async fn handshake_command(
    read_half: &mut ReadHalf<TcpStream>,
    parser: &mut EslParser,
    writer: &Mutex<WriteHalf<TcpStream>>,
    command: EslCommand,
) -> EslResult<EslResponse> {
    let command_str = command.to_wire_format();
    writer
        .lock()
        .await
        .write_all(command_str.as_bytes())
        .await
        .map_err(EslError::Io)?;

    loop {
        let message = read_one_message(read_half, parser).await?;
        match message.message_type {
            MessageType::CommandReply | MessageType::ApiResponse => {
                return Ok(message.into_response())
            }
            MessageType::Disconnect => return Err(EslError::ConnectionClosed),
            _ => continue,
        }
    }
}

/// Background task owning the socket's read half: demultiplexes every
/// inbound frame to either the pending command's correlation slot or the
/// event stream, and watches for idle-traffic expiry.
async fn reader_task(
    mut read_half: ReadHalf<TcpStream>,
    shared: Arc<Shared>,
    event_tx: mpsc::Sender<EslEvent>,
) {
    let mut parser = EslParser::new();
    let mut buf = [0u8; SOCKET_BUF_SIZE];
    let mut last_seen = Instant::now();
    let mut liveness_check = interval(Duration::from_millis(LIVENESS_CHECK_INTERVAL_MS));
    liveness_check.tick().await; // first tick fires immediately

    'outer: loop {
        loop {
            let parsed = parser.parse_message();
            let message = match parsed {
                Ok(Some(message)) => message,
                Ok(None) => break,
                Err(e) => {
                    warn!("Protocol error, closing connection: {}", e);
                    shared.mark_disconnected(DisconnectReason::ConnectionClosed);
                    break 'outer;
                }
            };

            match message.message_type {
                MessageType::CommandReply | MessageType::ApiResponse => {
                    if let Some(tx) = shared
                        .pending_reply
                        .lock()
                        .unwrap()
                        .take()
                    {
                        let _ = tx.send(message);
                    } else {
                        debug!("Received reply with no pending command");
                    }
                }
                MessageType::Event => {
                    let format = *shared
                        .event_format
                        .lock()
                        .unwrap();
                    match parser.parse_event(message, format) {
                        Ok(event) => {
                            trace!("Dispatching event: {:?}", event.event_type());
                            if event_tx
                                .send(event)
                                .await
                                .is_err()
                            {
                                debug!("Event receiver dropped, stopping reader task");
                                break 'outer;
                            }
                        }
                        Err(e) => warn!("Failed to parse event: {}", e),
                    }
                }
                MessageType::Disconnect => {
                    info!("Received disconnect notice from FreeSWITCH");
                    shared.mark_disconnected(DisconnectReason::ServerNotice);
                    break 'outer;
                }
                MessageType::AuthRequest => {
                    debug!("Ignoring unexpected auth request after handshake");
                }
                MessageType::Unknown(ref kind) => {
                    trace!("Ignoring message of unknown type: {}", kind);
                }
            }
        }

        tokio::select! {
            _ = liveness_check.tick() => {
                let liveness_timeout_ms = shared.liveness_timeout_ms.load(Ordering::Relaxed);
                if last_seen.elapsed() >= Duration::from_millis(liveness_timeout_ms) {
                    warn!("No traffic for {}ms, declaring connection dead", liveness_timeout_ms);
                    shared.mark_disconnected(DisconnectReason::HeartbeatExpired);
                    break 'outer;
                }
            }
            read_result = read_half.read(&mut buf) => {
                match read_result {
                    Ok(0) => {
                        info!("Connection closed by peer");
                        shared.mark_disconnected(DisconnectReason::ConnectionClosed);
                        break 'outer;
                    }
                    Ok(n) => {
                        last_seen = Instant::now();
                        if let Err(e) = parser.add_data(&buf[..n]) {
                            warn!("Failed to buffer socket data: {}", e);
                            shared.mark_disconnected(DisconnectReason::ConnectionClosed);
                            break 'outer;
                        }
                    }
                    Err(e) => {
                        warn!("Socket read error: {}", e);
                        shared.mark_disconnected(DisconnectReason::ConnectionClosed);
                        break 'outer;
                    }
                }
            }
        }
    }

    // Wake any in-flight command so it fails fast instead of hanging until
    // its own timeout.
    shared
        .pending_reply
        .lock()
        .unwrap()
        .take();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_mode() {
        assert_eq!(ConnectionMode::Inbound, ConnectionMode::Inbound);
        assert_ne!(ConnectionMode::Inbound, ConnectionMode::Outbound);
    }

    #[test]
    fn disconnect_reason_equality() {
        assert_eq!(
            DisconnectReason::ServerNotice,
            DisconnectReason::ServerNotice
        );
        assert_ne!(
            DisconnectReason::ServerNotice,
            DisconnectReason::ConnectionClosed
        );
    }
}
