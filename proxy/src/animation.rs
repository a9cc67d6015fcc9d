//! Visual masking played around a transfer.
//!
//! `play` runs right after the new server accepted the player and before any
//! world state is replaced; `clear` runs once the client has been brought in
//! line with the new server. Client write failures are ignored: by the time
//! an animation runs the transfer can no longer be aborted.

use crate::conn::ClientConnection;
use async_trait::async_trait;
use shared::{Dimension, GameData, Packet, PlayStatus};

#[async_trait]
pub trait Animation: Send + Sync {
    async fn play(&self, client: &dyn ClientConnection, data: &GameData);

    async fn clear(&self, client: &dyn ClientConnection, data: &GameData);

    /// Dimension the client is in between `play` and `clear`. Placeholder
    /// chunks are sent for this dimension.
    fn loading_dimension(&self, data: &GameData) -> Dimension {
        data.dimension
    }
}

/// Hides the swap behind a dimension change loading screen.
///
/// The client is sent to a dimension other than the destination one, which
/// makes it drop its loaded terrain and show the loading screen, then sent
/// back to the destination dimension at the new spawn point.
#[derive(Debug, Default, Clone, Copy)]
pub struct DimensionAnimation;

impl DimensionAnimation {
    fn intermediate(target: Dimension) -> Dimension {
        match target {
            Dimension::Nether => Dimension::Overworld,
            _ => Dimension::Nether,
        }
    }
}

#[async_trait]
impl Animation for DimensionAnimation {
    async fn play(&self, client: &dyn ClientConnection, data: &GameData) {
        let _ = client
            .write_packet(Packet::ChangeDimension {
                dimension: Self::intermediate(data.dimension),
                position: data.player_position,
            })
            .await;
    }

    fn loading_dimension(&self, data: &GameData) -> Dimension {
        Self::intermediate(data.dimension)
    }

    async fn clear(&self, client: &dyn ClientConnection, data: &GameData) {
        let _ = client
            .write_packet(Packet::ChangeDimension {
                dimension: data.dimension,
                position: data.player_position,
            })
            .await;
        let _ = client
            .write_packet(Packet::StopSound {
                name: String::new(),
                stop_all: true,
            })
            .await;
        let _ = client
            .write_packet(Packet::PlayStatus {
                status: PlayStatus::PlayerSpawn,
            })
            .await;
    }
}

/// Swaps servers without any masking.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAnimation;

#[async_trait]
impl Animation for NoAnimation {
    async fn play(&self, _client: &dyn ClientConnection, _data: &GameData) {}

    async fn clear(&self, _client: &dyn ClientConnection, _data: &GameData) {}
}
