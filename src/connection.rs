//! Connection state machine.
//!
//! A [`Connection`] owns one [`Transport`] and the [`FrameBuffer`] that
//! reassembles its inbound bytes. It drives the handshake, answers pings,
//! turns `Message` frames into [`Event`]s and exposes the outbound commands.
//!
//! ```text
//! Disconnected ──connect()──► Connecting ──READY──► Connected
//!      ▲                          │                     │
//!      └──────── error / close frame / EOF / disconnect / dispose
//! ```
//!
//! The `Ready` event produced by a successful handshake is held back and
//! handed out through [`Connection::take_pending_ready`], so the owner can
//! finish its own bookkeeping before anyone observes it.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{IpcError, Result};
use crate::event::{Event, User, CLOSED_BY_CLIENT_CODE, PROTOCOL_ERROR_CODE, TRANSPORT_LOST_CODE};
use crate::presence::Presence;
use crate::protocol::{build_frame, encode_frame, Frame, FrameBuffer, Opcode};
use crate::rpc::{parse_response, CommandBuilder, JoinReply, Subscription};
use crate::transport::{Inbound, Transport, DEFAULT_READ_BUFFER_SIZE};

/// Lifecycle phase of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Tunables for a connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Give up waiting for READY after this long. `None` waits forever.
    pub handshake_timeout: Option<Duration>,
    /// Bytes requested per read by the platform transport built in
    /// [`ClientBuilder::build`](crate::ClientBuilder::build). Custom
    /// transports ignore it.
    pub read_buffer_size: usize,
    /// Process id reported with `SET_ACTIVITY`.
    pub pid: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: None,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            pid: std::process::id(),
        }
    }
}

/// Receiving side of a connection's event stream.
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

/// Why the channel went down.
enum Disconnect {
    /// Host sent a close frame.
    Closed { code: i32, message: String },
    /// Transport ended or failed.
    Lost(Option<IpcError>),
    /// We received something we could not accept.
    Protocol(IpcError),
    /// `disconnect()` or `dispose()`.
    Local { disposed: bool },
}

impl Disconnect {
    /// Error handed to a connect attempt that was still waiting.
    fn into_error(self) -> IpcError {
        match self {
            Disconnect::Closed { code, message } => IpcError::Closed { code, message },
            Disconnect::Lost(Some(e)) => e,
            Disconnect::Lost(None) => IpcError::ConnectionClosed,
            Disconnect::Protocol(e) => e,
            Disconnect::Local { disposed: true } => {
                IpcError::State("connection disposed during connect".to_string())
            }
            Disconnect::Local { disposed: false } => IpcError::ConnectionClosed,
        }
    }

    /// Events reported to an established connection's owner.
    fn into_events(self) -> Vec<Event> {
        match self {
            Disconnect::Closed { code, message } => vec![Event::Disconnected { code, message }],
            Disconnect::Lost(e) => vec![Event::Disconnected {
                code: TRANSPORT_LOST_CODE,
                message: e
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "connection lost".to_string()),
            }],
            Disconnect::Protocol(e) => {
                let message = e.to_string();
                vec![
                    Event::Error {
                        code: PROTOCOL_ERROR_CODE,
                        message: message.clone(),
                    },
                    Event::Disconnected {
                        code: PROTOCOL_ERROR_CODE,
                        message,
                    },
                ]
            }
            Disconnect::Local { .. } => vec![Event::Disconnected {
                code: CLOSED_BY_CLIENT_CODE,
                message: "closed by client".to_string(),
            }],
        }
    }
}

/// One IPC connection and its lifecycle.
pub struct Connection {
    shared: Arc<Shared>,
}

struct Shared {
    transport: Box<dyn Transport>,
    commands: CommandBuilder,
    config: ConnectionConfig,
    inner: Mutex<Inner>,
}

struct Inner {
    state: ConnectionState,
    disposed: bool,
    /// Bumped by every connect attempt and every local close; stale reader
    /// tasks compare against it and stand down.
    generation: u64,
    user: Option<User>,
    pending_connect: Option<oneshot::Sender<Result<User>>>,
    pending_ready: Option<Event>,
    reader: Option<JoinHandle<()>>,
    events: Option<mpsc::UnboundedSender<Event>>,
}

impl Connection {
    /// Create a connection over `transport`, returning it with its event stream.
    pub fn new(transport: Box<dyn Transport>, config: ConnectionConfig) -> (Self, EventReceiver) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            transport,
            commands: CommandBuilder::new(config.pid),
            config,
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                disposed: false,
                generation: 0,
                user: None,
                pending_connect: None,
                pending_ready: None,
                reader: None,
                events: Some(events_tx),
            }),
        });

        (Self { shared }, events_rx)
    }

    /// Current lifecycle phase.
    pub fn state(&self) -> ConnectionState {
        self.shared.inner.lock().state
    }

    /// User reported by the last READY, while connected.
    pub fn current_user(&self) -> Option<User> {
        self.shared.inner.lock().user.clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.inner.lock().disposed
    }

    /// Open the transport, handshake as `application_id` and subscribe to
    /// join/spectate notifications.
    ///
    /// Legal only while `Disconnected`. On failure everything opened so far
    /// is released and the state returns to `Disconnected`.
    pub async fn connect(&self, application_id: &str) -> Result<User> {
        let (ready_tx, ready_rx) = oneshot::channel();

        let generation = {
            let mut inner = self.shared.inner.lock();
            if inner.disposed {
                return Err(IpcError::State("connection is disposed".to_string()));
            }
            if inner.state != ConnectionState::Disconnected {
                return Err(IpcError::State(format!(
                    "cannot connect while {}",
                    inner.state
                )));
            }
            inner.state = ConnectionState::Connecting;
            inner.generation += 1;
            inner.pending_connect = Some(ready_tx);
            inner.pending_ready = None;
            inner.generation
        };

        tracing::info!(application_id, "Connecting to IPC host");

        match self.establish(application_id, generation, ready_rx).await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, username = %user.username, "IPC connection ready");
                Ok(user)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Connect attempt failed");
                self.shared.abandon(generation).await;
                Err(e)
            }
        }
    }

    async fn establish(
        &self,
        application_id: &str,
        generation: u64,
        ready: oneshot::Receiver<Result<User>>,
    ) -> Result<User> {
        let shared = &self.shared;
        let inbound = shared.transport.open().await?;

        let reader = tokio::spawn(read_loop(Arc::downgrade(shared), generation, inbound));
        let stale = {
            let mut inner = shared.inner.lock();
            if inner.generation == generation {
                inner.reader = Some(reader);
                None
            } else {
                Some(reader)
            }
        };
        if let Some(reader) = stale {
            reader.abort();
            shared.transport.close().await;
            return Err(IpcError::State("connection closed during connect".to_string()));
        }

        let handshake = shared.commands.handshake(application_id);
        shared
            .transport
            .send(encode_frame(Opcode::Handshake, &handshake)?)
            .await?;

        let outcome = match shared.config.handshake_timeout {
            Some(limit) => tokio::time::timeout(limit, ready)
                .await
                .map_err(|_| IpcError::HandshakeTimeout(limit))?,
            None => ready.await,
        };
        let user = outcome.map_err(|_| IpcError::ConnectionClosed)??;

        {
            let mut inner = shared.inner.lock();
            if inner.generation != generation || inner.state != ConnectionState::Connected {
                return Err(IpcError::ConnectionClosed);
            }
            inner.pending_ready = Some(Event::Ready { user: user.clone() });
        }

        // Only after READY is parked: the subscriptions must not race it.
        for subscription in Subscription::AFTER_READY {
            let command = shared.commands.subscribe(subscription);
            shared
                .transport
                .send(encode_frame(Opcode::Message, &command)?)
                .await?;
        }

        Ok(user)
    }

    /// Hand out the READY captured by the last successful `connect`, once.
    pub fn take_pending_ready(&self) -> Option<Event> {
        self.shared.inner.lock().pending_ready.take()
    }

    /// Send `SET_ACTIVITY`; `None` clears the presence.
    pub async fn set_activity(&self, presence: Option<&Presence>) -> Result<()> {
        self.shared.ensure_connected()?;
        let command = self.shared.commands.set_activity(presence);
        self.shared.send_message(&command).await
    }

    /// Clear the presence.
    pub async fn clear_activity(&self) -> Result<()> {
        self.set_activity(None).await
    }

    /// Answer a join request from `user_id`.
    pub async fn respond_to_join_request(&self, user_id: &str, reply: JoinReply) -> Result<()> {
        self.shared.ensure_connected()?;
        let command = self.shared.commands.join_reply(user_id, reply);
        self.shared.send_message(&command).await
    }

    /// Close the channel; `connect` may be called again afterwards.
    pub async fn disconnect(&self) {
        self.shared.shutdown(false).await;
    }

    /// Close the channel for good and end the event stream. Idempotent.
    pub async fn dispose(&self) {
        self.shared.shutdown(true).await;
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("Connection")
            .field("state", &inner.state)
            .field("disposed", &inner.disposed)
            .finish()
    }
}

impl Shared {
    fn ensure_connected(&self) -> Result<()> {
        let inner = self.inner.lock();
        if inner.disposed {
            return Err(IpcError::State("connection is disposed".to_string()));
        }
        if inner.state != ConnectionState::Connected {
            return Err(IpcError::State(format!("not connected ({})", inner.state)));
        }
        Ok(())
    }

    async fn send_message(&self, command: &Value) -> Result<()> {
        self.transport
            .send(encode_frame(Opcode::Message, command)?)
            .await
    }

    fn emit(inner: &Inner, event: Event) {
        if let Some(events) = &inner.events {
            if events.send(event).is_err() {
                tracing::trace!("Event dropped, no subscriber");
            }
        }
    }

    /// Handle one complete frame. `Some` means the connection must go down.
    async fn handle_frame(&self, generation: u64, frame: Frame) -> Option<Disconnect> {
        match frame.opcode {
            Opcode::Message => {
                let message: Value = match frame.json() {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::warn!(error = %e, "Undecodable message payload");
                        return Some(Disconnect::Protocol(e));
                    }
                };
                match parse_response(&message) {
                    Some(event) => self.on_event(generation, event),
                    None => tracing::trace!(cmd = ?message.get("cmd"), "Message without event"),
                }
                None
            }
            Opcode::Ping => {
                tracing::trace!(len = frame.payload_len(), "Ping received, echoing");
                let pong = match build_frame(Opcode::Pong, frame.payload()) {
                    Ok(pong) => pong,
                    Err(e) => return Some(Disconnect::Protocol(e)),
                };
                match self.transport.send(pong).await {
                    Ok(()) => None,
                    Err(e) => Some(Disconnect::Lost(Some(e))),
                }
            }
            Opcode::Pong => None,
            Opcode::Close => {
                let (code, message) = close_reason(&frame);
                tracing::info!(code, message = %message, "IPC host closed the connection");
                Some(Disconnect::Closed { code, message })
            }
            Opcode::Handshake => {
                tracing::warn!("Ignoring handshake frame from host");
                None
            }
        }
    }

    fn on_event(&self, generation: u64, event: Event) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return;
        }

        match event {
            Event::Ready { user } => match inner.pending_connect.take() {
                Some(pending) => {
                    inner.state = ConnectionState::Connected;
                    inner.user = Some(user.clone());
                    let _ = pending.send(Ok(user));
                }
                None => {
                    tracing::debug!("READY outside of a handshake");
                    if inner.state == ConnectionState::Connected {
                        inner.user = Some(user);
                    }
                }
            },
            Event::Error { code, message } => match inner.pending_connect.take() {
                Some(pending) => {
                    let _ = pending.send(Err(IpcError::Rejected { code, message }));
                }
                None => Self::emit(&inner, Event::Error { code, message }),
            },
            event @ (Event::Disconnected { .. }
            | Event::JoinGame { .. }
            | Event::SpectateGame { .. }
            | Event::JoinRequest { .. }) => Self::emit(&inner, event),
        }
    }

    /// Remote-driven teardown, called from the reader task.
    async fn on_disconnect(&self, generation: u64, reason: Disconnect) {
        let (prior, pending, events) = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                return;
            }
            let prior = std::mem::replace(&mut inner.state, ConnectionState::Disconnected);
            inner.user = None;
            inner.pending_ready = None;
            // We are that task; detach rather than abort.
            drop(inner.reader.take());
            (prior, inner.pending_connect.take(), inner.events.clone())
        };

        self.transport.close().await;
        Self::report(prior, pending, events, reason);
    }

    /// Caller-driven teardown.
    async fn shutdown(&self, dispose: bool) {
        let (prior, pending, events, reader) = {
            let mut inner = self.inner.lock();
            if inner.disposed {
                return;
            }
            if dispose {
                inner.disposed = true;
            }
            inner.generation += 1;
            let prior = std::mem::replace(&mut inner.state, ConnectionState::Disconnected);
            inner.user = None;
            inner.pending_ready = None;
            let events = if dispose {
                inner.events.take()
            } else {
                inner.events.clone()
            };
            (prior, inner.pending_connect.take(), events, inner.reader.take())
        };

        if let Some(reader) = reader {
            reader.abort();
        }
        self.transport.close().await;

        tracing::info!(dispose, "IPC connection closed by client");
        Self::report(prior, pending, events, Disconnect::Local { disposed: dispose });
    }

    /// Clean up after a failed connect attempt.
    async fn abandon(&self, generation: u64) {
        let (close, reader) = {
            let mut inner = self.inner.lock();
            if inner.generation == generation {
                inner.state = ConnectionState::Disconnected;
                inner.user = None;
                inner.pending_connect = None;
                inner.pending_ready = None;
                (true, inner.reader.take())
            } else {
                (inner.disposed, None)
            }
        };

        if let Some(reader) = reader {
            reader.abort();
        }
        if close {
            self.transport.close().await;
        }
    }

    /// A waiting connect gets the failure; otherwise an established
    /// connection reports it as events.
    fn report(
        prior: ConnectionState,
        pending: Option<oneshot::Sender<Result<User>>>,
        events: Option<mpsc::UnboundedSender<Event>>,
        reason: Disconnect,
    ) {
        if let Some(pending) = pending {
            let _ = pending.send(Err(reason.into_error()));
            return;
        }
        if prior != ConnectionState::Connected {
            return;
        }
        if let Some(events) = events {
            for event in reason.into_events() {
                let _ = events.send(event);
            }
        }
    }
}

/// Pull `{code, message}` out of a close frame, tolerating garbage.
fn close_reason(frame: &Frame) -> (i32, String) {
    let value: Value = frame.json().unwrap_or(Value::Null);
    let code = value
        .get("code")
        .and_then(Value::as_i64)
        .and_then(|c| i32::try_from(c).ok())
        .unwrap_or(TRANSPORT_LOST_CODE);
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    (code, message)
}

/// Reassemble inbound chunks and dispatch frames in arrival order.
async fn read_loop(shared: Weak<Shared>, generation: u64, mut inbound: Inbound) {
    let mut frames = FrameBuffer::new();

    let reason = 'read: loop {
        let chunk = match inbound.recv().await {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => break Disconnect::Lost(Some(IpcError::Io(e))),
            None => break Disconnect::Lost(None),
        };

        let batch = match frames.push(&chunk) {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(error = %e, "Protocol violation, closing connection");
                break Disconnect::Protocol(e);
            }
        };

        let Some(shared) = shared.upgrade() else {
            return;
        };
        for frame in batch {
            if let Some(reason) = shared.handle_frame(generation, frame).await {
                break 'read reason;
            }
        }
    };

    if let Some(shared) = shared.upgrade() {
        shared.on_disconnect(generation, reason).await;
    }
}
