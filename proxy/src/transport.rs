//! Dialing upstream servers.

use crate::conn::BackendConnection;
use crate::error::TransportError;
use crate::server::TcpBackendConnection;
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Opens backend connections by address.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn dial(&self, addr: &str) -> Result<Arc<dyn BackendConnection>, TransportError>;
}

/// Plain TCP transport.
pub struct TcpTransport {
    dial_timeout: Duration,
    handshake_timeout: Duration,
}

impl TcpTransport {
    pub fn new(dial_timeout: Duration, handshake_timeout: Duration) -> Self {
        Self {
            dial_timeout,
            handshake_timeout,
        }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(10))
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn dial(&self, addr: &str) -> Result<Arc<dyn BackendConnection>, TransportError> {
        let valid = addr
            .rsplit_once(':')
            .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
        if !valid {
            return Err(TransportError::InvalidAddress(addr.to_string()));
        }

        let stream = timeout(self.dial_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TransportError::Timeout(addr.to_string()))??;
        debug!("Dialed {}", addr);

        let conn = TcpBackendConnection::new(stream, self.handshake_timeout)?;
        Ok(Arc::new(conn))
    }
}
