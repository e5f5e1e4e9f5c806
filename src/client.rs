//! Client builder and facade.
//!
//! The [`ClientBuilder`] collects connection settings and builds a
//! [`PresenceClient`]. The client fans the connection's single event stream
//! out into one broadcast channel per event kind and guards every outbound
//! operation behind its own "initialized" flag.
//!
//! # Example
//!
//! ```ignore
//! use rich_presence_ipc::{Presence, PresenceClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = PresenceClient::builder()
//!         .handshake_timeout(std::time::Duration::from_secs(10))
//!         .build();
//!
//!     let mut joins = client.subscribe_join_requests();
//!     let user = client.connect("123456789012345678").await?;
//!     println!("logged in as {}", user.display_name());
//!
//!     client
//!         .set_presence(&Presence::new().with_state("In a match").with_party("p1", 1, 4))
//!         .await?;
//!
//!     while let Ok(requester) = joins.recv().await {
//!         client.accept_join_request(&requester.id).await?;
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::connection::{Connection, ConnectionConfig, ConnectionState, EventReceiver};
use crate::error::{IpcError, Result};
use crate::event::{Event, Reason, User};
use crate::presence::Presence;
use crate::rpc::JoinReply;
use crate::transport::{default_transport, Transport};

/// Default capacity of each per-kind event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 16;

/// Builder for configuring and creating a [`PresenceClient`].
pub struct ClientBuilder {
    config: ConnectionConfig,
    channel_capacity: usize,
    transport: Option<Box<dyn Transport>>,
}

impl ClientBuilder {
    /// Create a new client builder.
    pub fn new() -> Self {
        Self {
            config: ConnectionConfig::default(),
            channel_capacity: DEFAULT_EVENT_CAPACITY,
            transport: None,
        }
    }

    /// Fail `connect` if READY does not arrive within `timeout`.
    ///
    /// Default: wait indefinitely
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = Some(timeout);
        self
    }

    /// Set the size of a single transport read.
    ///
    /// Only applies to the platform transport; a transport passed to
    /// [`transport`](Self::transport) keeps its own read size.
    /// Default: 4096
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Override the process id reported with the activity.
    ///
    /// Default: the current process id
    pub fn pid(mut self, pid: u32) -> Self {
        self.config.pid = pid;
        self
    }

    /// Set the capacity of each per-kind event channel.
    ///
    /// Slow subscribers lag rather than block the connection.
    /// Default: 16
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Use `transport` instead of the platform default.
    pub fn transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client.
    ///
    /// Must be called from within a Tokio runtime; the event router is
    /// spawned here.
    pub fn build(self) -> PresenceClient {
        let transport = self
            .transport
            .unwrap_or_else(|| default_transport(self.config.read_buffer_size));
        let (connection, events) = Connection::new(transport, self.config);
        PresenceClient::start(connection, events, self.channel_capacity)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-kind delivery channels plus the readiness flag.
struct ClientShared {
    initialized: AtomicBool,
    ready: broadcast::Sender<User>,
    disconnected: broadcast::Sender<Reason>,
    errors: broadcast::Sender<Reason>,
    join_game: broadcast::Sender<String>,
    spectate_game: broadcast::Sender<String>,
    join_requests: broadcast::Sender<User>,
}

impl ClientShared {
    fn new(capacity: usize) -> Self {
        Self {
            initialized: AtomicBool::new(false),
            ready: broadcast::channel(capacity).0,
            disconnected: broadcast::channel(capacity).0,
            errors: broadcast::channel(capacity).0,
            join_game: broadcast::channel(capacity).0,
            spectate_game: broadcast::channel(capacity).0,
            join_requests: broadcast::channel(capacity).0,
        }
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Hand one event to its channel. Send errors only mean nobody listens.
    fn deliver(&self, event: Event) {
        match event {
            Event::Ready { user } => {
                if self.is_initialized() {
                    let _ = self.ready.send(user);
                } else {
                    tracing::debug!("Dropping READY received before initialization");
                }
            }
            Event::Disconnected { code, message } => {
                let _ = self.disconnected.send(Reason { code, message });
            }
            Event::Error { code, message } => {
                let _ = self.errors.send(Reason { code, message });
            }
            Event::JoinGame { secret } => {
                let _ = self.join_game.send(secret);
            }
            Event::SpectateGame { secret } => {
                let _ = self.spectate_game.send(secret);
            }
            Event::JoinRequest { user } => {
                let _ = self.join_requests.send(user);
            }
        }
    }
}

/// A Rich Presence client.
///
/// Connect with [`connect`](Self::connect), publish with
/// [`set_presence`](Self::set_presence), and listen with the
/// `subscribe_*` methods. There is no automatic reconnection: after a
/// disconnect event, call `connect` again.
pub struct PresenceClient {
    connection: Arc<Connection>,
    shared: Arc<ClientShared>,
    _router: JoinHandle<()>,
}

impl PresenceClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Client with default settings over the platform transport.
    pub fn new() -> Self {
        ClientBuilder::new().build()
    }

    fn start(connection: Connection, events: EventReceiver, capacity: usize) -> Self {
        let connection = Arc::new(connection);
        let shared = Arc::new(ClientShared::new(capacity));

        let router = tokio::spawn(route_events(
            events,
            shared.clone(),
            Arc::downgrade(&connection),
        ));

        Self {
            connection,
            shared,
            _router: router,
        }
    }

    /// Connect and handshake as `application_id`.
    ///
    /// The `Ready` notification reaches [`subscribe_ready`](Self::subscribe_ready)
    /// only after the client reports [`is_ready`](Self::is_ready), so a
    /// subscriber may publish a presence straight away.
    pub async fn connect(&self, application_id: &str) -> Result<User> {
        let user = self.connection.connect(application_id).await?;
        self.mark_ready()?;

        if let Some(ready) = self.connection.take_pending_ready() {
            self.shared.deliver(ready);
        }

        Ok(user)
    }

    /// Set the ready flag, unless the link already dropped again.
    fn mark_ready(&self) -> Result<()> {
        self.shared.initialized.store(true, Ordering::SeqCst);
        // The router may have handled a Disconnected between connect and the store.
        if self.connection.state() != ConnectionState::Connected {
            self.shared.initialized.store(false, Ordering::SeqCst);
            return Err(IpcError::ConnectionClosed);
        }
        Ok(())
    }

    /// Validate and publish `presence`.
    pub async fn set_presence(&self, presence: &Presence) -> Result<()> {
        presence.validate()?;
        self.ensure_ready()?;
        self.connection.set_activity(Some(presence)).await
    }

    /// Remove the presence.
    pub async fn clear_presence(&self) -> Result<()> {
        self.ensure_ready()?;
        self.connection.clear_activity().await
    }

    /// Answer a join request from `user_id`.
    pub async fn respond_to_join_request(&self, user_id: &str, reply: JoinReply) -> Result<()> {
        self.ensure_ready()?;
        self.connection.respond_to_join_request(user_id, reply).await
    }

    pub async fn accept_join_request(&self, user_id: &str) -> Result<()> {
        self.respond_to_join_request(user_id, JoinReply::Accept).await
    }

    pub async fn deny_join_request(&self, user_id: &str) -> Result<()> {
        self.respond_to_join_request(user_id, JoinReply::Deny).await
    }

    /// Dismiss a join request without an explicit refusal.
    pub async fn ignore_join_request(&self, user_id: &str) -> Result<()> {
        self.respond_to_join_request(user_id, JoinReply::Ignore).await
    }

    /// Close the connection. The client can `connect` again afterwards.
    pub async fn disconnect(&self) {
        self.shared.initialized.store(false, Ordering::SeqCst);
        self.connection.disconnect().await;
    }

    /// Close the connection for good. Safe to call from any state, repeatedly.
    pub async fn dispose(&self) {
        self.shared.initialized.store(false, Ordering::SeqCst);
        self.connection.dispose().await;
    }

    /// Connected and handshake complete.
    pub fn is_ready(&self) -> bool {
        self.shared.is_initialized()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn current_user(&self) -> Option<User> {
        self.connection.current_user()
    }

    pub fn subscribe_ready(&self) -> broadcast::Receiver<User> {
        self.shared.ready.subscribe()
    }

    pub fn subscribe_disconnected(&self) -> broadcast::Receiver<Reason> {
        self.shared.disconnected.subscribe()
    }

    pub fn subscribe_errors(&self) -> broadcast::Receiver<Reason> {
        self.shared.errors.subscribe()
    }

    /// Join secrets from accepted invites.
    pub fn subscribe_join_game(&self) -> broadcast::Receiver<String> {
        self.shared.join_game.subscribe()
    }

    /// Spectate secrets.
    pub fn subscribe_spectate_game(&self) -> broadcast::Receiver<String> {
        self.shared.spectate_game.subscribe()
    }

    /// Users asking to join.
    pub fn subscribe_join_requests(&self) -> broadcast::Receiver<User> {
        self.shared.join_requests.subscribe()
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.connection.is_disposed() {
            return Err(IpcError::State("client is disposed".to_string()));
        }
        if !self.is_ready() {
            return Err(IpcError::State("client is not ready".to_string()));
        }
        Ok(())
    }
}

impl Default for PresenceClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Route the connection's event stream until it ends.
async fn route_events(
    mut events: EventReceiver,
    shared: Arc<ClientShared>,
    connection: Weak<Connection>,
) {
    while let Some(event) = events.recv().await {
        if matches!(event, Event::Disconnected { .. }) {
            // A late event from a previous session must not un-ready a new one.
            let reconnected = connection
                .upgrade()
                .map(|c| c.state() == ConnectionState::Connected)
                .unwrap_or(false);
            if !reconnected {
                shared.initialized.store(false, Ordering::SeqCst);
            }
        }
        shared.deliver(event);
    }
    tracing::debug!("Event stream ended");
}
