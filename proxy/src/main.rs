use clap::{Parser, ValueEnum};
use log::{error, info, warn};
use proxy::animation::{Animation, DimensionAnimation, NoAnimation};
use proxy::discovery::{Discovery, RandomDiscovery, StaticDiscovery};
use proxy::options::Options;
use proxy::proxy::Proxy;
use proxy::registry::SessionRegistry;
use proxy::transport::TcpTransport;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AnimationKind {
    /// Hide transfers behind a dimension change loading screen
    Dimension,
    /// Swap servers without masking
    None,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to accept players on
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to accept players on
    #[arg(short, long, default_value = "19132")]
    port: u16,

    /// Server new players are sent to; repeat to spread players randomly
    #[arg(short, long = "server", default_value = "127.0.0.1:19133")]
    servers: Vec<String>,

    /// Token presented to servers on every login
    #[arg(short, long, default_value = "")]
    token: String,

    /// Milliseconds between latency probes
    #[arg(short, long, default_value = "3000")]
    latency_interval: u64,

    /// Transfer animation
    #[arg(short, long, value_enum, default_value = "dimension")]
    animation: AnimationKind,

    /// Seconds to wait for a server to accept a TCP connection
    #[arg(long, default_value = "5")]
    dial_timeout: u64,

    /// Seconds to wait for each step of a server's login handshake
    #[arg(long, default_value = "10")]
    handshake_timeout: u64,
}

/// Main-method of the proxy.
/// Parses command-line arguments, then runs the listener and the console until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let discovery: Arc<dyn Discovery> = match args.servers.as_slice() {
        [single] => Arc::new(StaticDiscovery::new(single.clone())),
        _ => Arc::new(RandomDiscovery::new(args.servers.clone())),
    };
    let animation: Arc<dyn Animation> = match args.animation {
        AnimationKind::Dimension => Arc::new(DimensionAnimation),
        AnimationKind::None => Arc::new(NoAnimation),
    };
    let transport = TcpTransport::new(
        Duration::from_secs(args.dial_timeout),
        Duration::from_secs(args.handshake_timeout),
    );
    let options = Options {
        token: args.token,
        latency_interval_ms: args.latency_interval,
    };

    let address = format!("{}:{}", args.host, args.port);
    let proxy = Proxy::bind(&address, discovery, Arc::new(transport), options)
        .await?
        .with_animation(animation);
    let registry = proxy.registry();

    info!("Sending new players to {}", args.servers.join(", "));
    info!("Console commands: list, transfer <player> <address>");

    let proxy_handle = tokio::spawn(Arc::new(proxy).run());
    // Stdin may be closed when detached; the console then just ends.
    tokio::spawn(run_console(registry));

    // Handle shutdown gracefully
    tokio::select! {
        result = proxy_handle => {
            if let Err(e) = result {
                error!("Proxy task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}

/// Reads operator commands from stdin until it closes.
async fn run_console(registry: Arc<SessionRegistry>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["list"] => {
                for session in registry.sessions() {
                    let server = session.server_addr().await.unwrap_or_default();
                    info!(
                        "{} ({}) on {}, {}ms",
                        session.identity().display_name,
                        session.identity().xuid,
                        server,
                        session.latency()
                    );
                }
            }
            ["transfer", player, addr] => {
                let session = registry.session(player).or_else(|| {
                    registry
                        .sessions()
                        .into_iter()
                        .find(|s| s.identity().display_name == *player)
                });
                let Some(session) = session else {
                    warn!("No player named {}", player);
                    continue;
                };

                let addr = addr.to_string();
                tokio::spawn(async move {
                    let name = &session.identity().display_name;
                    match session.transfer(&addr).await {
                        Ok(()) => info!("Transferred {} to {}", name, addr),
                        Err(e) => warn!("Transfer of {} to {} failed: {}", name, addr, e),
                    }
                });
            }
            [] => {}
            _ => warn!("Unknown command: {}", line),
        }
    }
}
