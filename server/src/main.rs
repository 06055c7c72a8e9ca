use clap::{Parser, ValueEnum};
use log::info;
use pong_server::config::ServerConfig;
use pong_server::network::Server;
use pong_server::BoxError;
use pong_shared::{AuthorityMode, DEFAULT_PORT};
use std::time::Duration;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Server runs physics; clients send only their paddle
    ServerAuthoritative,
    /// Left client runs physics; server relays by sync counter
    ClientAuthoritative,
}

impl From<ModeArg> for AuthorityMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::ServerAuthoritative => AuthorityMode::ServerAuthoritative,
            ModeArg::ClientAuthoritative => AuthorityMode::ClientAuthoritative,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Playfield width sent to clients
    #[arg(long, default_value = "640")]
    width: u32,

    /// Playfield height sent to clients
    #[arg(long, default_value = "480")]
    height: u32,

    /// Simulation ticks per second
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,

    /// Seconds a player may stay silent before losing its seat
    #[arg(long, default_value = "5")]
    idle_timeout: u64,

    /// Which side owns the ball and score
    #[arg(short, long, value_enum, default_value_t = ModeArg::ServerAuthoritative)]
    mode: ModeArg,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        screen_width: args.width,
        screen_height: args.height,
        tick_rate: args.tick_rate,
        mode: args.mode.into(),
        idle_timeout: Duration::from_secs(args.idle_timeout),
    };

    let server = Server::new(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
