//! Picking the first server a new player is sent to.

use crate::conn::ClientConnection;
use crate::error::DiscoveryError;
use async_trait::async_trait;
use rand::seq::SliceRandom;

#[async_trait]
pub trait Discovery: Send + Sync {
    async fn discover(&self, client: &dyn ClientConnection) -> Result<String, DiscoveryError>;
}

/// Always answers with the same server.
pub struct StaticDiscovery {
    addr: String,
}

impl StaticDiscovery {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn discover(&self, _client: &dyn ClientConnection) -> Result<String, DiscoveryError> {
        Ok(self.addr.clone())
    }
}

/// Spreads players uniformly over a fixed pool of servers.
pub struct RandomDiscovery {
    addrs: Vec<String>,
}

impl RandomDiscovery {
    pub fn new(addrs: Vec<String>) -> Self {
        Self { addrs }
    }
}

#[async_trait]
impl Discovery for RandomDiscovery {
    async fn discover(&self, _client: &dyn ClientConnection) -> Result<String, DiscoveryError> {
        self.addrs
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or(DiscoveryError::NoServers)
    }
}
