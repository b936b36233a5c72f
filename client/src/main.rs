use clap::Parser;
use log::{info, warn};
use std::sync::Arc;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use versus_client::{
    run_practice, MatchClient, PopResult, PracticeConfig, VersusSession, WordField,
};
use versus_shared::{Outcome, Winner, INITIAL_TIME_SECONDS};

const DEFAULT_WORDS: &[&str] = &[
    "apple", "breeze", "candle", "dragon", "ember", "forest", "glacier", "harbor", "island",
    "jungle",
];

#[derive(Parser, Debug)]
#[command(author, version, about = "Terminal client for two-player typing races")]
struct Args {
    /// Server address to connect to
    #[arg(short, long, default_value = "127.0.0.1:5555")]
    server: String,

    /// Name shown to the server
    #[arg(short, long, default_value = "player")]
    nickname: String,

    /// Practice alone without a server
    #[arg(long)]
    solo: bool,

    /// Seconds on the clock in practice mode
    #[arg(long, default_value_t = INITIAL_TIME_SECONDS)]
    initial_time: u32,

    /// Comma separated words for the local field
    #[arg(short, long, value_delimiter = ',')]
    words: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let field = if args.words.is_empty() {
        WordField::new(DEFAULT_WORDS.iter().copied())
    } else {
        WordField::new(args.words.iter().map(String::as_str))
    };
    println!("Words: {}", field.remaining().join(" "));

    if args.solo {
        let config = PracticeConfig {
            initial_time_seconds: args.initial_time,
            ..PracticeConfig::default()
        };
        let summary = run_practice(BufReader::new(stdin()), field, config).await;
        match summary.winner {
            Winner::P1 => println!("Cleared! Score {}", summary.p1.score),
            _ => println!("Time's up. Score {}", summary.p1.score),
        }
        println!("Accuracy {:.0}%", summary.p1.accuracy() * 100.0);
        return Ok(());
    }

    info!("Connecting to {} as {}", args.server, args.nickname);
    let client = Arc::new(MatchClient::connect(&args.server, &args.nickname).await?);
    let (done_tx, mut done_rx) = watch::channel(None::<Outcome>);

    let receiver = {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            let mut session = VersusSession::new();
            loop {
                let event = match client.next_message().await {
                    Ok(Some(message)) => session.apply(message),
                    Ok(None) => session.on_closed(),
                    Err(e) => {
                        warn!("Lost connection to server: {}", e);
                        session.on_closed()
                    }
                };
                if let Some(event) = event {
                    println!("{}", event);
                }
                if session.is_over() {
                    let _ = done_tx.send(session.outcome());
                    break;
                }
            }
        })
    };

    play_versus(&client, field, &mut done_rx).await?;

    client.close().await;
    let _ = receiver.await;
    Ok(())
}

async fn play_versus(
    client: &MatchClient,
    mut field: WordField,
    done_rx: &mut watch::Receiver<Option<Outcome>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(stdin()).lines();

    loop {
        tokio::select! {
            _ = done_rx.changed() => return Ok(()),
            line = lines.next_line() => {
                let Some(line) = line? else {
                    // Keep listening for the result after stdin closes.
                    let _ = done_rx.changed().await;
                    return Ok(());
                };
                let word = line.trim();
                if word.is_empty() {
                    continue;
                }
                match field.try_pop(word) {
                    PopResult::Popped { cleared } => {
                        client.send_pop(word).await?;
                        if cleared {
                            client.send_finish().await?;
                        }
                    }
                    PopResult::Miss => {
                        println!("No balloon says {:?}", word);
                        client.send_miss().await?;
                    }
                }
            }
        }
    }
}
