use clap::Parser;
use log::info;
use pong_client::config::{ClientConfig, Latency};
use pong_client::error::ClientError;
use pong_client::network::Client;
use pong_shared::DEFAULT_PORT;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,

    /// Simulate network latency (round trip) in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Random extra delay per packet, up to this many milliseconds
    #[arg(short = 'j', long, default_value = "0")]
    jitter: u64,

    /// Frames per second of the local loop
    #[arg(short = 'f', long, default_value = "60")]
    frame_rate: u32,
}

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ClientConfig {
        server: args.server,
        latency: Latency::new(args.fake_ping, args.jitter),
        frame_rate: args.frame_rate,
    };

    info!("Starting client...");
    let mut client = Client::connect(&config).await?;

    tokio::select! {
        result = client.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, leaving the match");
        }
    }

    Ok(())
}
