mod cache;
mod config;
mod http;
mod lifecycle;
mod net;
mod notify;
mod platform;
mod router;
mod strategy;
mod worker;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use cache::{CachePartitionStore, SqliteStore};
use http::{Request, RequestMode};
use net::{HttpNetwork, Network};
use platform::{LoggingPlatform, Platform};
use worker::Worker;

#[derive(Parser, Debug)]
#[command(name = "offcache")]
#[command(about = "Offline-first caching proxy for a web application shell")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/offcache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Precache the static manifest and activate the configured version
  Install,
  /// Delete stale cache partitions and take over clients
  Activate,
  /// Resolve a URL through the router and retrieval strategies
  Get {
    url: String,

    /// Treat the request as a top-level navigation
    #[arg(long)]
    navigate: bool,
  },
  /// List cache partitions
  Partitions,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  let config = config::Config::load(args.config.as_deref())?;

  let store: Arc<dyn CachePartitionStore> = Arc::new(SqliteStore::open()?);
  let network: Arc<dyn Network> = Arc::new(HttpNetwork::new(&config.origin)?);
  let platform: Arc<dyn Platform> = Arc::new(LoggingPlatform);
  let mut worker = Worker::new(&config, Arc::clone(&store), network, platform)?;

  match args.command {
    Command::Install => {
      worker.install().await?;
      // install sets skip-waiting, so the new version goes live immediately
      worker.activate().await?;
    }
    Command::Activate => {
      worker.activate().await?;
    }
    Command::Get { url, navigate } => {
      let mode = if navigate {
        RequestMode::Navigate
      } else {
        RequestMode::Subresource
      };
      let request = Request::get(url).with_mode(mode);

      let response = worker.handle_fetch(&request).await?;

      println!("{} {}", response.status, response.reason);
      for (name, value) in &response.headers {
        println!("{}: {}", name, value);
      }
      println!();
      std::io::stdout().write_all(&response.body)?;
    }
    Command::Partitions => {
      for name in store.list_partitions()? {
        println!("{}", name);
      }
    }
  }

  Ok(())
}
