//! sift — process entrypoint: index/watch a workspace, and a thin client
//! for the running watcher's LLM-lock control plane.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sift_core::Config;

mod commands;
mod control_plane;
mod logging;
mod providers;

use commands::{cmd_config_init, cmd_config_show, cmd_index, cmd_lock_set, cmd_lock_status, cmd_watch};

#[derive(Parser)]
#[command(name = "sift")]
#[command(about = "Indexes a workspace into a searchable knowledge base for a coding agent")]
struct Cli {
  /// Workspace root to operate on (default: current directory)
  #[arg(long, global = true)]
  path: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a single recursive scan of the workspace to completion
  Index,
  /// Run a startup scan, then watch the workspace for changes
  Watch {
    /// Address the LLM-lock control plane listens on
    #[arg(long, default_value = "127.0.0.1:7890")]
    control_addr: SocketAddr,
  },
  /// Control-plane client for the LLM lock exposed by a running `watch`
  Lock {
    #[command(subcommand)]
    command: LockCommand,
  },
  /// Inspect or initialize the project configuration
  Config {
    #[command(subcommand)]
    command: ConfigCommand,
  },
}

#[derive(Subcommand)]
enum LockCommand {
  /// Set (or clear) the lock
  Set {
    #[arg(long)]
    locked: bool,
    #[arg(long, default_value_t = 300.0)]
    ttl_seconds: f64,
    #[arg(long, default_value = "http://127.0.0.1:7890")]
    url: String,
  },
  /// Read the current lock state
  Status {
    #[arg(long, default_value = "http://127.0.0.1:7890")]
    url: String,
  },
}

#[derive(Subcommand)]
enum ConfigCommand {
  /// Print the effective configuration as TOML
  Show,
  /// Write a `.sift/config.toml` template for this workspace
  Init {
    #[arg(long)]
    force: bool,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  let root = match cli.path {
    Some(path) => path,
    None => std::env::current_dir()?,
  };
  let config = Config::load_for_project(&root)?;
  let _guard = logging::init(&config.log);

  match cli.command {
    Commands::Index => cmd_index(config).await,
    Commands::Watch { control_addr } => cmd_watch(config, control_addr).await,
    Commands::Lock { command } => match command {
      LockCommand::Set { locked, ttl_seconds, url } => cmd_lock_set(&url, locked, ttl_seconds).await,
      LockCommand::Status { url } => cmd_lock_status(&url).await,
    },
    Commands::Config { command } => match command {
      ConfigCommand::Show => cmd_config_show(&config),
      ConfigCommand::Init { force } => cmd_config_init(&root, force),
    },
  }
}
