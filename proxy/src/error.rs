//! Error types for sessions and the collaborators they drive.

use shared::codec::CodecError;
use std::fmt;

/// Failure of a single client or backend connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnError {
    #[error("connection closed")]
    Closed,
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("rejected by remote: {0}")]
    Rejected(String),
    #[error("unexpected {got} packet while waiting for {expected}")]
    Unexpected {
        expected: &'static str,
        got: &'static str,
    },
    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid address {0}")]
    InvalidAddress(String),
    #[error("timed out dialing {0}")]
    Timeout(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Conn(#[from] ConnError),
}

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("no servers available")]
    NoServers,
    #[error("{0}")]
    Other(String),
}

/// Which half of the backend handshake failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStage {
    Connect,
    Spawn,
}

impl fmt::Display for HandshakeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeStage::Connect => f.write_str("connection"),
            HandshakeStage::Spawn => f.write_str("spawn"),
        }
    }
}

/// Why a transfer could not start.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferConflict {
    #[error("already transferring")]
    InProgress,
    #[error("already connected to {0}")]
    AlreadyConnected(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to discover a server: {0}")]
    Discovery(#[source] DiscoveryError),
    #[error("failed to dial {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: TransportError,
    },
    #[error("failed to start {stage} sequence: {source}")]
    Handshake {
        stage: HandshakeStage,
        #[source]
        source: ConnError,
    },
    #[error("failed to start game for client: {0}")]
    Client(#[source] ConnError),
    #[error(transparent)]
    TransferConflict(#[from] TransferConflict),
    #[error("transfer to {0} rejected by processor")]
    TransferRejected(String),
    #[error("session already closed")]
    AlreadyClosed,
    #[error("session already logged in")]
    AlreadyLoggedIn,
}
