//! Downstream player connections accepted by the proxy listener.

use crate::conn::ClientConnection;
use crate::error::ConnError;
use crate::framed::FramedStream;
use crate::utils::millis_since;
use async_trait::async_trait;
use log::debug;
use shared::{GameData, IdentityData, Packet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// A logged-in player reached over TCP.
///
/// The player's latency is measured from the echoes it sends back for the
/// session's latency probes; those echoes are consumed here and never reach
/// the session.
pub struct TcpClientConnection {
    identity: IdentityData,
    stream: FramedStream,
    latency_ms: AtomicU64,
}

impl TcpClientConnection {
    /// Waits for the player's login on a freshly accepted stream.
    pub async fn accept(stream: TcpStream, login_timeout: Duration) -> Result<Self, ConnError> {
        let stream = FramedStream::new(stream)?;

        let packet = timeout(login_timeout, stream.read())
            .await
            .map_err(|_| ConnError::Timeout("Login"))??;

        match packet {
            Packet::Login { identity, .. } => {
                debug!(
                    "Client {} logged in as {}",
                    stream.peer_addr(),
                    identity.display_name
                );
                Ok(Self {
                    identity,
                    stream,
                    latency_ms: AtomicU64::new(0),
                })
            }
            other => {
                let _ = stream.close().await;
                Err(ConnError::Unexpected {
                    expected: "Login",
                    got: other.name(),
                })
            }
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.stream.peer_addr()
    }
}

#[async_trait]
impl ClientConnection for TcpClientConnection {
    fn identity(&self) -> &IdentityData {
        &self.identity
    }

    fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms.load(Ordering::Relaxed))
    }

    async fn start_game(&self, data: GameData) -> Result<(), ConnError> {
        self.stream.write(&Packet::StartGame(data)).await
    }

    async fn read_packet(&self) -> Result<Packet, ConnError> {
        loop {
            match self.stream.read().await? {
                Packet::Latency {
                    timestamp,
                    response: true,
                } => {
                    self.latency_ms
                        .store(millis_since(timestamp) as u64, Ordering::Relaxed);
                }
                packet => return Ok(packet),
            }
        }
    }

    async fn write_packet(&self, packet: Packet) -> Result<(), ConnError> {
        self.stream.write(&packet).await
    }

    async fn close(&self) -> Result<(), ConnError> {
        self.stream.close().await
    }
}
