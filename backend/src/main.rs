use backend::world::{WorldConfig, WorldServer};
use clap::Parser;
use log::info;
use shared::{Difficulty, Dimension, GameMode, Vec3};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to accept the proxy on
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to accept the proxy on
    #[arg(short, long, default_value = "19133")]
    port: u16,

    /// Name shown to players
    #[arg(short, long, default_value = "world")]
    world: String,

    /// overworld, nether or end
    #[arg(short, long, default_value = "overworld")]
    dimension: Dimension,

    /// survival, creative, adventure or spectator
    #[arg(short, long, default_value = "survival")]
    game_mode: GameMode,

    /// peaceful, easy, normal or hard
    #[arg(long, default_value = "normal")]
    difficulty: Difficulty,

    /// Spawn point as three numbers
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], default_values_t = [0.5, 64.0, 0.5])]
    spawn: Vec<f32>,

    /// Token the proxy must present; any token is accepted when omitted
    #[arg(short, long)]
    token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let spawn = match args.spawn.as_slice() {
        [x, y, z] => Vec3::new(*x, *y, *z),
        _ => return Err("spawn needs exactly three coordinates".into()),
    };
    let config = WorldConfig {
        world_name: args.world,
        dimension: args.dimension,
        spawn,
        game_mode: args.game_mode,
        difficulty: args.difficulty,
        token: args.token,
        ..WorldConfig::default()
    };

    let address = format!("{}:{}", args.host, args.port);
    let server = WorldServer::bind(&address, config).await?;

    tokio::select! {
        _ = server.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
