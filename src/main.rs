mod cache;
mod commands;
mod config;
mod context;
mod error;
mod logging;
mod remote;
mod roadmap;
mod sync;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "roadmap")]
#[command(about = "Edit learning roadmaps locally and mirror them to a document store")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/roadmap/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Keep everything local, even if a remote is configured
  #[arg(long, global = true)]
  offline: bool,

  /// Also write logs to a daily-rolling file in this directory
  #[arg(long, global = true)]
  log_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = logging::init(args.log_dir.as_deref())?;

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;
  if args.offline {
    config.remote.enabled = false;
  }

  let ctx = context::AppContext::from_config(&config)?;
  let outcome = commands::execute(&ctx, args.command).await;

  // Local writes are already committed; give queued remote writes a chance
  // to land before the process exits, whatever the command's outcome.
  let counts = ctx.shutdown(config.sync.shutdown_grace()).await;
  if counts.dropped > 0 {
    tracing::warn!(
      dropped = counts.dropped,
      "some changes were not mirrored to the remote store"
    );
  }

  outcome
}
