use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod commands;
pub mod config;
pub mod device;
pub mod pipeline;
pub mod session;
pub mod utils;
mod tui;

use crate::commands::connect::ConnectArgs;

/// uartterm - A serial terminal for UART-over-USB devices.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None, args_conflicts_with_subcommands = true)]
pub struct Cli {
  #[command(subcommand)]
  command: Option<Commands>,
  #[command(flatten)]
  connect: ConnectArgs,
}

#[derive(Debug, Subcommand)]
enum Commands {
  /// Open the terminal UI and connect (the default)
  Connect(ConnectArgs),
  /// List serial ports
  Ports,
  /// Print the embedded default configuration
  Defaults,
}

pub fn parse() -> Cli {
  Cli::parse()
}

pub fn run() -> Result<()> {
  let cli = parse();
  let cwd = std::env::current_dir()?;

  match cli.command {
    Some(Commands::Connect(args)) => commands::connect::run(&cwd, &args),
    Some(Commands::Ports) => {
      utils::log::init_stderr_logger();
      commands::ports::run()
    }
    Some(Commands::Defaults) => commands::defaults::run(),
    None => commands::connect::run(&cwd, &cli.connect),
  }
}
