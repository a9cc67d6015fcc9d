//! In-memory connection doubles and session fixtures for unit tests.

use crate::conn::{BackendConnection, ClientConnection};
use crate::discovery::StaticDiscovery;
use crate::error::{ConnError, TransportError};
use crate::options::Options;
use crate::processor::Processor;
use crate::registry::SessionRegistry;
use crate::session::Session;
use crate::transport::Transport;
use async_trait::async_trait;
use parking_lot::Mutex;
use shared::{GameData, IdentityData, Packet, Vec3};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};

/// Address the fixtures' discovery always answers with.
pub(crate) const FIRST_SERVER: &str = "a:19132";

/// Read side of a mock connection: packets queued by the test, ending once
/// the connection is closed or hung up.
struct Inbox {
    tx: mpsc::UnboundedSender<Packet>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Packet>>,
    closed: watch::Sender<bool>,
}

impl Inbox {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            closed,
        }
    }

    fn push(&self, packet: Packet) {
        let _ = self.tx.send(packet);
    }

    fn is_closed(&self) -> bool {
        let closed = *self.closed.borrow();
        closed
    }

    /// Marks the connection closed. Returns whether it already was.
    fn shut(&self) -> bool {
        self.closed.send_replace(true)
    }

    async fn read(&self) -> Result<Packet, ConnError> {
        let mut closed = self.closed.subscribe();
        if self.is_closed() {
            return Err(ConnError::Closed);
        }

        let mut rx = self.rx.lock().await;
        tokio::select! {
            _ = closed.changed() => Err(ConnError::Closed),
            packet = rx.recv() => packet.ok_or(ConnError::Closed),
        }
    }
}

pub(crate) struct MockClient {
    identity: IdentityData,
    latency: Mutex<Duration>,
    started: Mutex<Option<GameData>>,
    written: Mutex<Vec<Packet>>,
    inbox: Inbox,
    close_calls: AtomicUsize,
}

impl MockClient {
    pub(crate) fn new(xuid: &str, display_name: &str) -> Self {
        Self {
            identity: IdentityData::new(xuid, display_name),
            latency: Mutex::new(Duration::ZERO),
            started: Mutex::new(None),
            written: Mutex::new(Vec::new()),
            inbox: Inbox::new(),
            close_calls: AtomicUsize::new(0),
        }
    }

    /// Every packet written to the player so far, in order.
    pub(crate) fn written(&self) -> Vec<Packet> {
        self.written.lock().clone()
    }

    pub(crate) fn clear_written(&self) {
        self.written.lock().clear();
    }

    /// Queues a packet as if the player had sent it.
    pub(crate) fn send(&self, packet: Packet) {
        self.inbox.push(packet);
    }

    /// Drops the link from the player's side.
    pub(crate) fn hang_up(&self) {
        self.inbox.shut();
    }

    pub(crate) fn started(&self) -> Option<GameData> {
        self.started.lock().clone()
    }

    pub(crate) fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientConnection for MockClient {
    fn identity(&self) -> &IdentityData {
        &self.identity
    }

    fn latency(&self) -> Duration {
        *self.latency.lock()
    }

    async fn start_game(&self, data: GameData) -> Result<(), ConnError> {
        if self.inbox.is_closed() {
            return Err(ConnError::Closed);
        }
        *self.started.lock() = Some(data);
        Ok(())
    }

    async fn read_packet(&self) -> Result<Packet, ConnError> {
        self.inbox.read().await
    }

    async fn write_packet(&self, packet: Packet) -> Result<(), ConnError> {
        if self.inbox.is_closed() {
            return Err(ConnError::Closed);
        }
        self.written.lock().push(packet);
        Ok(())
    }

    async fn close(&self) -> Result<(), ConnError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.inbox.shut() {
            return Err(ConnError::Closed);
        }
        Ok(())
    }
}

pub(crate) struct MockBackend {
    data: GameData,
    connect_error: Option<String>,
    spawn_error: Option<String>,
    gate: Option<Arc<Notify>>,
    login: Mutex<Option<(IdentityData, String)>>,
    spawns: AtomicUsize,
    written: Mutex<Vec<Packet>>,
    inbox: Inbox,
    close_calls: AtomicUsize,
}

impl MockBackend {
    pub(crate) fn new(data: GameData) -> Self {
        Self {
            data,
            connect_error: None,
            spawn_error: None,
            gate: None,
            login: Mutex::new(None),
            spawns: AtomicUsize::new(0),
            written: Mutex::new(Vec::new()),
            inbox: Inbox::new(),
            close_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing_connect(mut self, reason: &str) -> Self {
        self.connect_error = Some(reason.to_string());
        self
    }

    pub(crate) fn failing_spawn(mut self, reason: &str) -> Self {
        self.spawn_error = Some(reason.to_string());
        self
    }

    /// Makes `connect` wait for one permit of `gate` first.
    pub(crate) fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Identity and token of the login this server received.
    pub(crate) fn login(&self) -> Option<(IdentityData, String)> {
        self.login.lock().clone()
    }

    pub(crate) fn spawns(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }

    pub(crate) fn written(&self) -> Vec<Packet> {
        self.written.lock().clone()
    }

    /// Queues a packet as if this server had sent it.
    pub(crate) fn send(&self, packet: Packet) {
        self.inbox.push(packet);
    }

    /// Drops the connection from the server's side.
    pub(crate) fn hang_up(&self) {
        self.inbox.shut();
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendConnection for MockBackend {
    async fn connect(&self, identity: &IdentityData, token: &str) -> Result<(), ConnError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(reason) = &self.connect_error {
            return Err(ConnError::Rejected(reason.clone()));
        }
        *self.login.lock() = Some((identity.clone(), token.to_string()));
        Ok(())
    }

    async fn spawn(&self) -> Result<(), ConnError> {
        if let Some(reason) = &self.spawn_error {
            return Err(ConnError::Rejected(reason.clone()));
        }
        self.spawns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn game_data(&self) -> GameData {
        if self.login.lock().is_some() {
            self.data.clone()
        } else {
            GameData::default()
        }
    }

    async fn read_packet(&self) -> Result<Packet, ConnError> {
        self.inbox.read().await
    }

    async fn write_packet(&self, packet: Packet) -> Result<(), ConnError> {
        if self.inbox.is_closed() {
            return Err(ConnError::Closed);
        }
        self.written.lock().push(packet);
        Ok(())
    }

    async fn close(&self) -> Result<(), ConnError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.inbox.shut() {
            return Err(ConnError::Closed);
        }
        Ok(())
    }
}

/// Dials the backends registered under each address; everything else is
/// refused.
#[derive(Default)]
pub(crate) struct MockTransport {
    backends: Mutex<HashMap<String, Arc<MockBackend>>>,
    dials: Mutex<Vec<String>>,
}

impl MockTransport {
    pub(crate) fn insert(&self, addr: &str, backend: Arc<MockBackend>) {
        self.backends.lock().insert(addr.to_string(), backend);
    }

    pub(crate) fn dials(&self) -> Vec<String> {
        self.dials.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn dial(&self, addr: &str) -> Result<Arc<dyn BackendConnection>, TransportError> {
        self.dials.lock().push(addr.to_string());
        let backend = self.backends.lock().get(addr).cloned();
        match backend {
            Some(backend) => Ok(backend),
            None => Err(TransportError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))),
        }
    }
}

/// Records every hook call as a short event string.
pub(crate) struct RecordingProcessor {
    allow_transfers: bool,
    drop_text: bool,
    events: Mutex<Vec<String>>,
}

impl RecordingProcessor {
    pub(crate) fn new() -> Self {
        Self {
            allow_transfers: true,
            drop_text: false,
            events: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn vetoing() -> Self {
        Self {
            allow_transfers: false,
            ..Self::new()
        }
    }

    /// Drops every chat packet in both directions.
    pub(crate) fn dropping_packets() -> Self {
        Self {
            drop_text: true,
            ..Self::new()
        }
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl Processor for RecordingProcessor {
    fn pre_transfer(&self, addr: &str) -> bool {
        self.events.lock().push(format!("pre:{}", addr));
        self.allow_transfers
    }

    fn post_transfer(&self, addr: &str) {
        self.events.lock().push(format!("post:{}", addr));
    }

    fn on_disconnect(&self) {
        self.events.lock().push("disconnect".to_string());
    }

    fn process_client(&self, packet: &mut Packet) -> bool {
        !(self.drop_text && matches!(packet, Packet::Text { .. }))
    }

    fn process_server(&self, packet: &mut Packet) -> bool {
        !(self.drop_text && matches!(packet, Packet::Text { .. }))
    }
}

pub(crate) fn game_data(world_name: &str, runtime_id: u64, position: Vec3) -> GameData {
    GameData {
        world_name: world_name.to_string(),
        entity_unique_id: runtime_id as i64,
        entity_runtime_id: runtime_id,
        player_position: position,
        ..GameData::default()
    }
}

/// A session over a [`MockClient`] whose transport knows no servers.
pub(crate) fn session_with_client(
    registry: &Arc<SessionRegistry>,
    xuid: &str,
    display_name: &str,
) -> Arc<Session> {
    Session::new(
        Arc::new(MockClient::new(xuid, display_name)),
        Arc::clone(registry),
        Arc::new(StaticDiscovery::new(FIRST_SERVER)),
        Arc::new(MockTransport::default()),
        Options::default(),
    )
}

pub(crate) struct Fixture {
    pub(crate) client: Arc<MockClient>,
    pub(crate) transport: Arc<MockTransport>,
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) session: Arc<Session>,
}

/// A fresh, not yet logged in session for player "Alex" whose discovery
/// points at [`FIRST_SERVER`].
pub(crate) fn fixture(options: Options) -> Fixture {
    let client = Arc::new(MockClient::new("1", "Alex"));
    let transport = Arc::new(MockTransport::default());
    let registry = Arc::new(SessionRegistry::new());
    let session = Session::new(
        client.clone(),
        Arc::clone(&registry),
        Arc::new(StaticDiscovery::new(FIRST_SERVER)),
        transport.clone(),
        options,
    );

    Fixture {
        client,
        transport,
        registry,
        session,
    }
}

/// A session logged in on [`FIRST_SERVER`], with the first server's handle.
pub(crate) async fn logged_in() -> (Fixture, Arc<MockBackend>) {
    logged_in_with(Options::default()).await
}

pub(crate) async fn logged_in_with(options: Options) -> (Fixture, Arc<MockBackend>) {
    let fixture = fixture(options);
    let backend = Arc::new(MockBackend::new(game_data(
        "a",
        1,
        Vec3::new(0.5, 64.0, 0.5),
    )));
    fixture.transport.insert(FIRST_SERVER, Arc::clone(&backend));

    fixture.session.login().await.unwrap();
    (fixture, backend)
}
