//! # Seamless Transfer Proxy Library
//!
//! This library sits between players and a fleet of game servers. A player
//! connects to the proxy once; the proxy logs the player in on a server and
//! can later move the player to another server without the client ever
//! seeing a disconnect.
//!
//! ## Core Responsibilities
//!
//! ### Session Management
//! Each connected player gets a [`session::Session`] that owns:
//! - The stable connection to the player
//! - The replaceable connection to the current server
//! - A cache of transient world state the server created on the client
//! - Hook slots for transfer animations and business-logic processors
//!
//! ### Seamless Transfers
//! A transfer dials and fully handshakes the next server while the player is
//! still on the old one. Only once the new server accepted the player does
//! the client get masked, cleaned of the old server's entities, effects,
//! boss bars, player list entries and scoreboards, and moved to the new
//! spawn point. A transfer that fails before that point is invisible to the
//! player.
//!
//! ### Packet Forwarding
//! Every session runs two packet pumps (server to player, player to server)
//! and a latency probe. The pumps survive transfers: they always resolve the
//! current server again instead of holding on to a connection.
//!
//! ## Module Organization
//!
//! ### Session (`session`, `handlers`, `registry`)
//! Login, transfer and close of a single player, the background tasks, and
//! the process-wide index of logged-in players.
//!
//! ### Connections (`conn`, `client`, `server`, `framed`, `transport`)
//! The connection traits sessions are written against and their TCP
//! implementations using the length-prefixed codec from `shared`.
//!
//! ### Hooks (`discovery`, `animation`, `processor`, `tracker`)
//! Pluggable first-server selection, transfer masking, packet and lifecycle
//! callbacks, and the world-state cache cleared on every transfer.
//!
//! ### Front Door (`proxy`)
//! The TCP listener that turns accepted connections into sessions.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use proxy::discovery::StaticDiscovery;
//! use proxy::options::Options;
//! use proxy::proxy::Proxy;
//! use proxy::transport::TcpTransport;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let proxy = Proxy::bind(
//!         "0.0.0.0:19132",
//!         Arc::new(StaticDiscovery::new("127.0.0.1:19133")),
//!         Arc::new(TcpTransport::default()),
//!         Options::default(),
//!     )
//!     .await?;
//!     let registry = proxy.registry();
//!     tokio::spawn(Arc::new(proxy).run());
//!
//!     // Later, move a player somewhere else:
//!     if let Some(session) = registry.session("2535416") {
//!         session.transfer("127.0.0.1:19134").await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod animation;
pub mod client;
pub mod conn;
pub mod discovery;
pub mod error;
pub mod framed;
mod handlers;
pub mod options;
pub mod processor;
pub mod proxy;
pub mod registry;
pub mod server;
pub mod session;
pub mod tracker;
pub mod transport;
pub mod utils;

#[cfg(test)]
mod mock;
