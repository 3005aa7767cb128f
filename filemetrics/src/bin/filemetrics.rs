use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use filemetrics::{Collector, FileCollector};

#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the namespace patterns a configuration can produce
    Discover {
        #[clap(short, long, required = true)]
        config: PathBuf,
    },
    /// Collect metrics, one JSON object per line
    Collect {
        #[clap(short, long, required = true)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let collector = FileCollector::new();

    match args.command {
        Command::Discover { config } => {
            let namespaces = collector
                .discover(&config)
                .with_context(|| format!("couldn't load {}", config.display()))?;
            for namespace in namespaces.iter() {
                println!("{}", namespace);
            }
        }
        Command::Collect { config } => {
            let metrics = collector
                .collect(&config)
                .with_context(|| format!("couldn't load {}", config.display()))?;
            for metric in metrics.iter() {
                println!("{}", serde_json::to_string(metric)?);
            }
        }
    }

    Ok(())
}
