//! The proxy-side state of one connected player.
//!
//! A [`Session`] owns the player's client connection and the connection to
//! whichever server the player is currently on, and keeps the illusion of a
//! single continuous connection while that server changes.
//!
//! ## Backend slot
//!
//! The current server address and connection live together in one slot
//! behind an async read/write lock. Packet pumps, the latency probe and
//! [`Session::server`] take the read side; login and transfers take the
//! write side. The constructor already holds the write side and parks the
//! guard inside the session, so nothing can read the slot before
//! [`Session::login`] has filled it.
//!
//! ## Transfers
//!
//! [`Session::transfer`] holds the write side for its whole run. The new
//! server is dialed and fully handshaken before anything visible happens on
//! the client, so a failing transfer leaves the player on the old server
//! without noticing. Past that point the transfer always completes: the
//! client is masked, cleaned and brought in line with the new world, and
//! only then is the old connection closed and the new one published.
//!
//! ## Close
//!
//! [`Session::close`] runs its teardown exactly once no matter how many
//! tasks race to call it.

use crate::animation::{Animation, DimensionAnimation};
use crate::conn::{BackendConnection, ClientConnection};
use crate::discovery::Discovery;
use crate::error::{HandshakeStage, SessionError, TransferConflict};
use crate::handlers;
use crate::options::Options;
use crate::processor::Processor;
use crate::registry::SessionRegistry;
use crate::tracker::WorldStateTracker;
use crate::transport::Transport;
use log::{debug, error, info};
use parking_lot::{Mutex, RwLock};
use shared::chunk::{chunk_ring, empty_chunk};
use shared::{
    Dimension, EntityFlag, EntityMetadata, GameData, IdentityData, LevelEventType, MoveMode,
    Packet, STOP_RAIN_DATA,
};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, OwnedRwLockWriteGuard, RwLock as AsyncRwLock};

/// Radius, in chunks, of the placeholder terrain sent during a transfer.
pub const TRANSFER_CHUNK_RADIUS: i32 = 4;

/// The server a session is attached to. Address and connection are only
/// ever replaced together.
struct Backend {
    addr: String,
    conn: Arc<dyn BackendConnection>,
}

/// Clears the transferring flag when a transfer returns, however it returns.
struct TransferFlag<'a>(&'a AtomicBool);

impl Drop for TransferFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Session {
    client: Arc<dyn ClientConnection>,

    backend: Arc<AsyncRwLock<Option<Backend>>>,
    login_guard: Mutex<Option<OwnedRwLockWriteGuard<Option<Backend>>>>,

    registry: Arc<SessionRegistry>,
    discovery: Arc<dyn Discovery>,
    transport: Arc<dyn Transport>,
    options: RwLock<Options>,

    animation: RwLock<Arc<dyn Animation>>,
    processor: RwLock<Option<Arc<dyn Processor>>>,
    tracker: WorldStateTracker,

    client_runtime_id: AtomicU64,
    latency_offset: AtomicI64,
    transferring: AtomicBool,
    closed: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

impl Session {
    /// Creates a session in the pre-login state. The backend slot stays
    /// write-locked until [`login`](Self::login) returns.
    pub fn new(
        client: Arc<dyn ClientConnection>,
        registry: Arc<SessionRegistry>,
        discovery: Arc<dyn Discovery>,
        transport: Arc<dyn Transport>,
        options: Options,
    ) -> Arc<Self> {
        let backend = Arc::new(AsyncRwLock::new(None));
        // A lock nobody else has seen yet is always free.
        let login_guard = Arc::clone(&backend).try_write_owned().ok();
        let (shutdown_tx, _) = watch::channel(false);

        Arc::new(Self {
            client,
            backend,
            login_guard: Mutex::new(login_guard),
            registry,
            discovery,
            transport,
            options: RwLock::new(options),
            animation: RwLock::new(Arc::new(DimensionAnimation)),
            processor: RwLock::new(None),
            tracker: WorldStateTracker::new(),
            client_runtime_id: AtomicU64::new(0),
            latency_offset: AtomicI64::new(0),
            transferring: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            shutdown_tx,
        })
    }

    /// Connects the player to its first server.
    ///
    /// On success the background tasks are running and the session is
    /// registered. On failure nothing is registered and the caller is
    /// expected to terminate the client connection.
    pub async fn login(self: &Arc<Self>) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::AlreadyClosed);
        }
        let mut slot = self
            .login_guard
            .lock()
            .take()
            .ok_or(SessionError::AlreadyLoggedIn)?;

        let identity = self.client.identity();
        let addr = match self.discovery.discover(self.client.as_ref()).await {
            Ok(addr) => addr,
            Err(e) => {
                debug!("Failed to discover a server for {}: {}", identity.display_name, e);
                return Err(SessionError::Discovery(e));
            }
        };

        let conn = self.dial(&addr).await?;
        self.handshake(&conn).await?;

        if self.is_closed() {
            let _ = conn.close().await;
            return Err(SessionError::AlreadyClosed);
        }

        let data = conn.game_data();
        if let Err(e) = self.client.start_game(data.clone()).await {
            let _ = conn.close().await;
            if self.is_closed() {
                return Err(SessionError::AlreadyClosed);
            }
            error!("Failed to start game for {}: {}", identity.display_name, e);
            return Err(SessionError::Client(e));
        }
        self.client_runtime_id
            .store(data.entity_runtime_id, Ordering::Release);

        *slot = Some(Backend {
            addr: addr.clone(),
            conn,
        });

        // A close that raced us is parked on the slot lock and will release
        // the connection we just published.
        if self.is_closed() {
            return Err(SessionError::AlreadyClosed);
        }

        self.send_metadata(true).await;
        handlers::spawn(self);
        self.registry.add(&identity.xuid, Arc::clone(self));

        info!("Successfully logged in {} on {}", identity.display_name, addr);
        Ok(())
    }

    /// Moves the player to the server at `addr` without disconnecting it.
    ///
    /// Failures up to and including the new server's handshake leave the
    /// session on its current server, untouched.
    pub async fn transfer(&self, addr: &str) -> Result<(), SessionError> {
        if self
            .transferring
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(TransferConflict::InProgress.into());
        }
        let _transferring = TransferFlag(&self.transferring);

        let mut slot = self.backend.write().await;
        let current_addr = match slot.as_ref() {
            Some(backend) if !self.is_closed() => backend.addr.clone(),
            _ => return Err(SessionError::AlreadyClosed),
        };
        if current_addr == addr {
            return Err(TransferConflict::AlreadyConnected(addr.to_string()).into());
        }

        if let Some(processor) = self.processor() {
            if !processor.pre_transfer(addr) {
                debug!("Processor vetoed transfer to {}", addr);
                return Err(SessionError::TransferRejected(addr.to_string()));
            }
        }

        let conn = self.dial(addr).await?;

        self.send_metadata(true).await;
        if let Err(e) = self.handshake(&conn).await {
            self.send_metadata(false).await;
            return Err(e);
        }

        // Nothing below may abort: the client is about to see the new world.
        let data = conn.game_data();
        let animation = self.animation();
        let client = self.client.as_ref();

        animation.play(client, &data).await;
        self.send_empty_chunks(&data, animation.loading_dimension(&data))
            .await;

        self.tracker
            .clear_effects(client, self.client_runtime_id())
            .await;
        self.tracker.clear_entities(client).await;
        self.tracker.clear_boss_bars(client).await;
        self.tracker.clear_players(client).await;
        self.tracker.clear_scoreboards(client).await;

        self.replay_world(&data).await;
        animation.clear(client, &data).await;

        if let Some(old) = slot.take() {
            let _ = old.conn.close().await;
        }
        *slot = Some(Backend {
            addr: addr.to_string(),
            conn,
        });

        if let Some(processor) = self.processor() {
            processor.post_transfer(addr);
        }

        debug!(
            "Transferred session for {} from {} to {}",
            self.identity().display_name,
            current_addr,
            addr
        );
        Ok(())
    }

    /// Sends the player a disconnect screen with `message`, then closes.
    pub async fn disconnect(&self, message: &str) {
        self.write_client(Packet::Disconnect {
            message: message.to_string(),
        })
        .await;
        let _ = self.close().await;
    }

    /// Tears the session down. Only the first call does anything; later calls
    /// return [`SessionError::AlreadyClosed`].
    pub async fn close(&self) -> Result<(), SessionError> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SessionError::AlreadyClosed);
        }
        self.shutdown_tx.send_replace(true);

        let processor = self.processor.write().take();
        if let Some(processor) = processor {
            processor.on_disconnect();
        }

        let _ = self.client.close().await;

        // A session that never logged in still owns its construction guard.
        let guard = self.login_guard.lock().take();
        let mut slot = match guard {
            Some(guard) => guard,
            None => Arc::clone(&self.backend).write_owned().await,
        };
        if let Some(backend) = slot.take() {
            let _ = backend.conn.close().await;
        }
        self.tracker.reset();

        let identity = self.identity();
        self.registry.remove_session(&identity.xuid, self);
        drop(slot);

        info!("Closed session for {}", identity.display_name);
        Ok(())
    }

    pub fn animation(&self) -> Arc<dyn Animation> {
        Arc::clone(&self.animation.read())
    }

    pub fn set_animation(&self, animation: Arc<dyn Animation>) {
        *self.animation.write() = animation;
    }

    pub fn processor(&self) -> Option<Arc<dyn Processor>> {
        self.processor.read().clone()
    }

    pub fn set_processor(&self, processor: Option<Arc<dyn Processor>>) {
        *self.processor.write() = processor;
    }

    pub fn options(&self) -> Options {
        self.options.read().clone()
    }

    pub fn set_options(&self, options: Options) {
        *self.options.write() = options;
    }

    /// End-to-end latency in milliseconds: the client's own latency plus the
    /// last measured latency between the proxy and the current server.
    pub fn latency(&self) -> i64 {
        self.client.latency().as_millis() as i64 + self.latency_offset.load(Ordering::Relaxed)
    }

    pub fn client(&self) -> &Arc<dyn ClientConnection> {
        &self.client
    }

    pub fn identity(&self) -> &IdentityData {
        self.client.identity()
    }

    /// Connection to the current server; `None` before login and after close.
    pub async fn server(&self) -> Option<Arc<dyn BackendConnection>> {
        self.backend
            .read()
            .await
            .as_ref()
            .map(|backend| Arc::clone(&backend.conn))
    }

    /// Address of the current server; `None` before login and after close.
    pub async fn server_addr(&self) -> Option<String> {
        self.backend
            .read()
            .await
            .as_ref()
            .map(|backend| backend.addr.clone())
    }

    pub fn tracker(&self) -> &WorldStateTracker {
        &self.tracker
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub(crate) fn set_latency_offset(&self, millis: i64) {
        self.latency_offset.store(millis, Ordering::Relaxed);
    }

    /// Whether `conn` is still the published server connection.
    pub(crate) async fn is_current(&self, conn: &Arc<dyn BackendConnection>) -> bool {
        self.backend
            .read()
            .await
            .as_ref()
            .is_some_and(|backend| Arc::ptr_eq(&backend.conn, conn))
    }

    fn client_runtime_id(&self) -> u64 {
        self.client_runtime_id.load(Ordering::Acquire)
    }

    async fn dial(&self, addr: &str) -> Result<Arc<dyn BackendConnection>, SessionError> {
        self.transport.dial(addr).await.map_err(|source| {
            error!("Failed to dial server {}: {}", addr, source);
            SessionError::Dial {
                addr: addr.to_string(),
                source,
            }
        })
    }

    /// Runs connect then spawn on a fresh connection, closing it on failure.
    async fn handshake(&self, conn: &Arc<dyn BackendConnection>) -> Result<(), SessionError> {
        let token = self.options().token;

        let result = match conn.connect(self.identity(), &token).await {
            Ok(()) => conn
                .spawn()
                .await
                .map_err(|source| (HandshakeStage::Spawn, source)),
            Err(source) => Err((HandshakeStage::Connect, source)),
        };

        if let Err((stage, source)) = result {
            error!("Failed to start {} sequence: {}", stage, source);
            let _ = conn.close().await;
            return Err(SessionError::Handshake { stage, source });
        }
        Ok(())
    }

    /// Pins the client-side player entity while a server negotiates it, so
    /// the client does not simulate movement the server would overrule.
    async fn send_metadata(&self, no_ai: bool) {
        let mut metadata = EntityMetadata::new();
        if no_ai {
            metadata.set_flag(EntityFlag::NoAi);
        }
        metadata.set_flag(EntityFlag::Breathing);
        metadata.set_flag(EntityFlag::HasGravity);

        self.write_client(Packet::SetActorData {
            runtime_id: self.client_runtime_id(),
            metadata,
        })
        .await;
    }

    /// Covers the new spawn with air while the client sits in `dimension`.
    async fn send_empty_chunks(&self, data: &GameData, dimension: Dimension) {
        let payload = empty_chunk(dimension);
        let center = data.player_position.chunk_pos();

        for position in chunk_ring(center, TRANSFER_CHUNK_RADIUS) {
            self.write_client(Packet::LevelChunk {
                dimension,
                position,
                sub_chunk_count: 1,
                payload: payload.clone(),
            })
            .await;
        }
    }

    /// Brings the client's view of the world in line with the new server.
    async fn replay_world(&self, data: &GameData) {
        self.write_client(Packet::MovePlayer {
            runtime_id: self.client_runtime_id(),
            position: data.player_position,
            pitch: data.pitch,
            yaw: data.yaw,
            head_yaw: data.yaw,
            mode: MoveMode::Reset,
        })
        .await;

        self.write_client(Packet::LevelEvent {
            event: LevelEventType::StopRaining,
            data: STOP_RAIN_DATA,
        })
        .await;
        self.write_client(Packet::LevelEvent {
            event: LevelEventType::StopThunderstorm,
            data: 0,
        })
        .await;

        self.write_client(Packet::SetDifficulty {
            difficulty: data.difficulty,
        })
        .await;
        self.write_client(Packet::SetPlayerGameType {
            game_mode: data.game_mode,
        })
        .await;
        self.write_client(Packet::GameRulesChanged {
            rules: data.game_rules.clone(),
        })
        .await;
    }

    async fn write_client(&self, packet: Packet) {
        let name = packet.name();
        if let Err(e) = self.client.write_packet(packet).await {
            debug!(
                "Failed to write {} to {}: {}",
                name,
                self.identity().display_name,
                e
            );
        }
    }
}
