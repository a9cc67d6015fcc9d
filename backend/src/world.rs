//! A minimal world server speaking the backend side of the handshake.

use log::{debug, error, info, warn};
use rand::Rng;
use shared::codec::{self, CodecError};
use shared::{
    BossEventType, Difficulty, Dimension, GameData, GameMode, GameRule, GameRuleValue,
    IdentityData, Packet, PlayStatus, Vec3,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::time::timeout;

/// Chat prefix asking the server to move the player elsewhere.
pub const TRANSFER_COMMAND: &str = "/transfer ";

#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("unexpected {got} packet while waiting for {expected}")]
    Unexpected {
        expected: &'static str,
        got: &'static str,
    },
    #[error("login rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone)]
pub struct WorldConfig {
    pub world_name: String,
    pub dimension: Dimension,
    pub spawn: Vec3,
    pub game_mode: GameMode,
    pub difficulty: Difficulty,
    /// Token logins must present; any token is accepted when unset.
    pub token: Option<String>,
    /// Rejects every login with this message when set.
    pub reject_logins: Option<String>,
    pub handshake_timeout: Duration,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            world_name: "world".to_string(),
            dimension: Dimension::Overworld,
            spawn: Vec3::new(0.5, 64.0, 0.5),
            game_mode: GameMode::Survival,
            difficulty: Difficulty::Normal,
            token: None,
            reject_logins: None,
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

impl WorldConfig {
    fn game_data(&self, runtime_id: u64) -> GameData {
        GameData {
            world_name: self.world_name.clone(),
            entity_unique_id: runtime_id as i64,
            entity_runtime_id: runtime_id,
            player_position: self.spawn,
            pitch: 0.0,
            yaw: 0.0,
            dimension: self.dimension,
            difficulty: self.difficulty,
            game_mode: self.game_mode,
            game_rules: vec![GameRule {
                name: "showcoordinates".to_string(),
                value: GameRuleValue::Bool(true),
            }],
        }
    }

    fn check_login(&self, token: &str) -> Result<(), WorldError> {
        if let Some(reason) = &self.reject_logins {
            return Err(WorldError::Rejected(reason.clone()));
        }
        match &self.token {
            Some(expected) if expected != token => {
                Err(WorldError::Rejected("invalid token".to_string()))
            }
            _ => Ok(()),
        }
    }
}

pub struct WorldServer {
    listener: TcpListener,
    config: Arc<WorldConfig>,
}

impl WorldServer {
    pub async fn bind(addr: &str, config: WorldConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(
            "World {} listening on {}",
            config.world_name,
            listener.local_addr()?
        );

        Ok(WorldServer {
            listener,
            config: Arc::new(config),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts players until the task is dropped.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let config = Arc::clone(&self.config);
                    tokio::spawn(async move {
                        if let Err(e) = serve(stream, &config).await {
                            warn!("Player from {} left {}: {}", peer, config.world_name, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

fn runtime_id() -> u64 {
    rand::thread_rng().gen_range(1..=u32::MAX as u64)
}

async fn read_timeout<S>(
    stream: &mut S,
    config: &WorldConfig,
    expected: &'static str,
) -> Result<Packet, WorldError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    timeout(config.handshake_timeout, codec::read_packet(stream))
        .await
        .map_err(|_| WorldError::Timeout(expected))?
        .map_err(WorldError::from)
}

/// Runs one player from login until the connection ends. A clean
/// disconnect returns `Ok`.
pub async fn serve<S>(mut stream: S, config: &WorldConfig) -> Result<(), WorldError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (identity, token) = match read_timeout(&mut stream, config, "Login").await? {
        Packet::Login { identity, token } => (identity, token),
        other => {
            return Err(WorldError::Unexpected {
                expected: "Login",
                got: other.name(),
            })
        }
    };
    if let Err(e) = config.check_login(&token) {
        let _ = codec::write_packet(
            &mut stream,
            &Packet::Disconnect {
                message: e.to_string(),
            },
        )
        .await;
        return Err(e);
    }

    let runtime_id = runtime_id();
    codec::write_packet(&mut stream, &Packet::StartGame(config.game_data(runtime_id))).await?;

    match read_timeout(&mut stream, config, "RequestSpawn").await? {
        Packet::RequestSpawn => {}
        other => {
            return Err(WorldError::Unexpected {
                expected: "RequestSpawn",
                got: other.name(),
            })
        }
    }
    codec::write_packet(
        &mut stream,
        &Packet::PlayStatus {
            status: PlayStatus::PlayerSpawn,
        },
    )
    .await?;
    info!("{} joined {}", identity.display_name, config.world_name);

    for packet in welcome(config, &identity, runtime_id) {
        codec::write_packet(&mut stream, &packet).await?;
    }

    loop {
        let packet = match codec::read_packet(&mut stream).await {
            Ok(packet) => packet,
            Err(CodecError::Closed) => {
                info!("{} left {}", identity.display_name, config.world_name);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(reply) = respond(config, &identity, packet) {
            codec::write_packet(&mut stream, &reply).await?;
        }
    }
}

/// World state every joining player gets, so a transfer has something to
/// clean up.
fn welcome(config: &WorldConfig, identity: &IdentityData, runtime_id: u64) -> Vec<Packet> {
    let guide_id = runtime_id as i64 + 1;
    vec![
        Packet::Text {
            source: config.world_name.clone(),
            message: format!("Welcome to {}, {}", config.world_name, identity.display_name),
        },
        Packet::AddActor {
            unique_id: guide_id,
            runtime_id: guide_id as u64,
            entity_type: "minecraft:villager".to_string(),
            position: config.spawn,
        },
        Packet::BossEvent {
            boss_id: guide_id,
            event: BossEventType::Show,
            title: config.world_name.clone(),
        },
        Packet::SetDisplayObjective {
            display_slot: "sidebar".to_string(),
            objective_name: format!("{}-info", config.world_name),
            display_name: config.world_name.clone(),
        },
    ]
}

fn respond(config: &WorldConfig, identity: &IdentityData, packet: Packet) -> Option<Packet> {
    match packet {
        Packet::Latency {
            timestamp,
            response: false,
        } => Some(Packet::Latency {
            timestamp,
            response: true,
        }),
        Packet::Text { message, .. } => match message.strip_prefix(TRANSFER_COMMAND) {
            Some(address) => Some(Packet::Transfer {
                address: address.trim().to_string(),
            }),
            None => Some(Packet::Text {
                source: config.world_name.clone(),
                message: format!("{}: {}", identity.display_name, message),
            }),
        },
        other => {
            debug!("Ignoring {} from {}", other.name(), identity.display_name);
            None
        }
    }
}
