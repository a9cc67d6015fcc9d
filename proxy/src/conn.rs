//! Connection abstractions the session is written against.
//!
//! A session never touches sockets directly. It talks to the downstream
//! player through a [`ClientConnection`] and to the current upstream server
//! through a [`BackendConnection`]; the TCP implementations live in
//! [`crate::client`] and [`crate::server`].

use crate::error::ConnError;
use async_trait::async_trait;
use shared::{GameData, IdentityData, Packet};
use std::time::Duration;

/// The stable link to the downstream player.
#[async_trait]
pub trait ClientConnection: Send + Sync {
    /// Identity the player logged in with.
    fn identity(&self) -> &IdentityData;

    /// Round-trip time measured between the proxy and the player.
    fn latency(&self) -> Duration;

    /// Sends the world start to the player. Called once, during login.
    async fn start_game(&self, data: GameData) -> Result<(), ConnError>;

    async fn read_packet(&self) -> Result<Packet, ConnError>;

    async fn write_packet(&self, packet: Packet) -> Result<(), ConnError>;

    /// Closes the link. Pending and later reads fail with
    /// [`ConnError::Closed`].
    async fn close(&self) -> Result<(), ConnError>;
}

/// A handshake-capable connection to one upstream server.
#[async_trait]
pub trait BackendConnection: Send + Sync {
    /// Logs the player in on the server and waits for its world start.
    async fn connect(&self, identity: &IdentityData, token: &str) -> Result<(), ConnError>;

    /// Requests the spawn and waits until the server confirms it.
    async fn spawn(&self) -> Result<(), ConnError>;

    /// World start received during [`connect`](Self::connect); default
    /// values before that.
    fn game_data(&self) -> GameData;

    async fn read_packet(&self) -> Result<Packet, ConnError>;

    async fn write_packet(&self, packet: Packet) -> Result<(), ConnError>;

    /// Closes the connection. Pending and later reads fail with
    /// [`ConnError::Closed`].
    async fn close(&self) -> Result<(), ConnError>;
}
