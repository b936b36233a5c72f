use clap::Parser;
use log::info;
use std::time::Duration;
use versus_server::{MatchServer, RoomConfig, ServerConfig};
use versus_shared::{DEFAULT_PORT, INITIAL_TIME_SECONDS, SCORE_PER_POP};

#[derive(Parser, Debug)]
#[command(author, version, about = "Authoritative server for two-player typing races")]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Seconds each player starts with
    #[arg(long, default_value_t = INITIAL_TIME_SECONDS)]
    initial_time: u32,

    /// Milliseconds between clock ticks
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    tick_ms: u64,

    /// Score awarded per popped word
    #[arg(long, default_value_t = SCORE_PER_POP)]
    score_per_pop: u32,

    /// Milliseconds a single line may take to reach a player before they are dropped
    #[arg(long, default_value_t = 5000, value_parser = clap::value_parser!(u64).range(1..))]
    write_timeout_ms: u64,

    /// Seconds a connection may take to send JOIN
    #[arg(long, default_value_t = 10)]
    join_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ServerConfig {
        room: RoomConfig {
            initial_time_seconds: args.initial_time,
            tick_interval: Duration::from_millis(args.tick_ms),
            score_per_pop: args.score_per_pop,
            write_timeout: Duration::from_millis(args.write_timeout_ms),
        },
        join_timeout: Duration::from_secs(args.join_timeout_secs),
    };
    info!("Starting match server with {:?}", config);

    let address = format!("{}:{}", args.host, args.port);
    let server = MatchServer::bind(&address, config).await?;

    tokio::select! {
        _ = server.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
