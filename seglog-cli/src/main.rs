//! # Seglog CLI
//!
//! Command-line driver for a running seglog server (or the balancer in
//! front of one).

use anyhow::Result;
use clap::Parser;

use seglog_api::RemoteClient;
use seglog_core::Error;

#[derive(Parser)]
#[command(name = "seglog")]
#[command(about = "Seglog - segmented append-only key/value store")]
struct Cli {
    /// Server base URL
    #[arg(long, default_value = "http://localhost:8083")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Store a value under a key
    Put { key: String, value: String },
    /// Read the value of a key
    Get { key: String },
    /// Delete a key
    Delete { key: String },
    /// Show server-side store statistics
    Stats,
    /// Check server health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = RemoteClient::connect(&cli.endpoint).await?;

    match cli.command {
        Commands::Put { key, value } => {
            client.put(&key, &value).await?;
            println!("ok");
        }
        Commands::Get { key } => match client.get(&key).await {
            Ok(value) => println!("{value}"),
            Err(Error::NotFound) => {
                eprintln!("key {key:?} not found");
                std::process::exit(1);
            }
            Err(e) => return Err(e.into()),
        },
        Commands::Delete { key } => {
            client.delete(&key).await?;
            println!("ok");
        }
        Commands::Stats => {
            let stats = client.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Health => {
            println!("ok");
        }
    }

    Ok(())
}
