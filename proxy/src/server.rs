//! Upstream server connections over TCP.

use crate::conn::BackendConnection;
use crate::error::ConnError;
use crate::framed::FramedStream;
use async_trait::async_trait;
use log::debug;
use shared::{GameData, IdentityData, Packet, PlayStatus};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Connection to one world server.
///
/// The handshake is two round trips: `Login` answered by `StartGame`, then
/// `RequestSpawn` answered by `PlayStatus::PlayerSpawn`. A `Disconnect` at
/// either stage is a rejection.
pub struct TcpBackendConnection {
    stream: FramedStream,
    game_data: OnceLock<GameData>,
    handshake_timeout: Duration,
}

impl TcpBackendConnection {
    pub fn new(stream: TcpStream, handshake_timeout: Duration) -> Result<Self, ConnError> {
        Ok(Self {
            stream: FramedStream::new(stream)?,
            game_data: OnceLock::new(),
            handshake_timeout,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.stream.peer_addr()
    }

    /// Reads the next handshake reply, which must be `expected`.
    async fn expect(&self, expected: &'static str) -> Result<Packet, ConnError> {
        let packet = timeout(self.handshake_timeout, self.stream.read())
            .await
            .map_err(|_| ConnError::Timeout(expected))??;

        match packet {
            Packet::Disconnect { message } => Err(ConnError::Rejected(message)),
            packet if packet.name() == expected => Ok(packet),
            other => Err(ConnError::Unexpected {
                expected,
                got: other.name(),
            }),
        }
    }
}

#[async_trait]
impl BackendConnection for TcpBackendConnection {
    async fn connect(&self, identity: &IdentityData, token: &str) -> Result<(), ConnError> {
        self.stream
            .write(&Packet::Login {
                identity: identity.clone(),
                token: token.to_string(),
            })
            .await?;

        if let Packet::StartGame(data) = self.expect("StartGame").await? {
            debug!(
                "Received world '{}' from {}",
                data.world_name,
                self.peer_addr()
            );
            let _ = self.game_data.set(data);
        }
        Ok(())
    }

    async fn spawn(&self) -> Result<(), ConnError> {
        self.stream.write(&Packet::RequestSpawn).await?;

        match self.expect("PlayStatus").await? {
            Packet::PlayStatus {
                status: PlayStatus::PlayerSpawn,
            } => Ok(()),
            Packet::PlayStatus { status } => {
                Err(ConnError::Rejected(format!("spawn answered with {:?}", status)))
            }
            other => Err(ConnError::Unexpected {
                expected: "PlayStatus",
                got: other.name(),
            }),
        }
    }

    fn game_data(&self) -> GameData {
        self.game_data.get().cloned().unwrap_or_default()
    }

    async fn read_packet(&self) -> Result<Packet, ConnError> {
        self.stream.read().await
    }

    async fn write_packet(&self, packet: Packet) -> Result<(), ConnError> {
        self.stream.write(&packet).await
    }

    async fn close(&self) -> Result<(), ConnError> {
        self.stream.close().await
    }
}
