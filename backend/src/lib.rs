//! # Demo World Server Library
//!
//! This library provides a small upstream server for the proxy to log
//! players into. It implements exactly the server side of the proxy's
//! handshake and enough gameplay surface to exercise seamless transfers
//! end to end.
//!
//! ## Handshake
//!
//! 1. The player (through the proxy) sends `Login` with its identity and the
//!    proxy token. A configured token must match, otherwise the server
//!    answers with `Disconnect`.
//! 2. The server answers with `StartGame`, carrying a fresh runtime id, the
//!    world's dimension, spawn point, difficulty, game mode and rules.
//! 3. The player sends `RequestSpawn`; the server confirms with
//!    `PlayStatus::PlayerSpawn`.
//!
//! ## Gameplay Surface
//!
//! After spawning, every player receives a welcome message, a guide entity,
//! a boss bar and a sidebar objective. These are exactly the kinds of world
//! state the proxy has to remove from the client when the player leaves for
//! another server.
//!
//! While connected the server:
//! - Answers latency probes with an echo of their timestamp
//! - Turns chat messages of the form `/transfer <address>` into a
//!   `Transfer` request for the proxy
//! - Echoes every other chat message back to the player
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use backend::world::{WorldConfig, WorldServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = WorldConfig {
//!         world_name: "lobby".to_string(),
//!         ..WorldConfig::default()
//!     };
//!     let server = WorldServer::bind("127.0.0.1:19133", config).await?;
//!     server.run().await;
//!     Ok(())
//! }
//! ```

pub mod world;
