//! TCP front door: accepts players and hands each one to a fresh session.

use crate::animation::{Animation, DimensionAnimation};
use crate::client::TcpClientConnection;
use crate::conn::ClientConnection;
use crate::discovery::Discovery;
use crate::options::Options;
use crate::registry::SessionRegistry;
use crate::session::Session;
use crate::transport::Transport;
use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

/// How long a freshly accepted connection may take to send its login.
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Proxy {
    listener: TcpListener,
    registry: Arc<SessionRegistry>,
    discovery: Arc<dyn Discovery>,
    transport: Arc<dyn Transport>,
    options: Options,
    animation: Arc<dyn Animation>,
    login_timeout: Duration,
}

impl Proxy {
    pub async fn bind(
        addr: &str,
        discovery: Arc<dyn Discovery>,
        transport: Arc<dyn Transport>,
        options: Options,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Proxy listening on {}", listener.local_addr()?);

        Ok(Proxy {
            listener,
            registry: Arc::new(SessionRegistry::new()),
            discovery,
            transport,
            options,
            animation: Arc::new(DimensionAnimation),
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
        })
    }

    /// Animation installed on every new session.
    pub fn with_animation(mut self, animation: Arc<dyn Animation>) -> Self {
        self.animation = animation;
        self
    }

    pub fn with_login_timeout(mut self, login_timeout: Duration) -> Self {
        self.login_timeout = login_timeout;
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Accepts connections until the task is dropped.
    pub async fn run(self: Arc<Self>) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let proxy = Arc::clone(&self);
                    tokio::spawn(async move {
                        proxy.handle_connection(stream, peer).await;
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let client = match TcpClientConnection::accept(stream, self.login_timeout).await {
            Ok(client) => Arc::new(client),
            Err(e) => {
                warn!("Dropped connection from {}: {}", peer, e);
                return;
            }
        };
        info!(
            "{} ({}) connected from {}",
            client.identity().display_name,
            client.identity().xuid,
            peer
        );

        let session = Session::new(
            client,
            Arc::clone(&self.registry),
            Arc::clone(&self.discovery),
            Arc::clone(&self.transport),
            self.options.clone(),
        );
        session.set_animation(Arc::clone(&self.animation));

        if let Err(e) = session.login().await {
            error!("Login of {} failed: {}", session.identity().display_name, e);
            session.disconnect(&e.to_string()).await;
        }
    }
}
