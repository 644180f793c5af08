//! Command-line interface for kelp.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Kelp - a small dynamically typed scripting language
#[derive(Parser)]
#[command(name = "kelp")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
  #[command(subcommand)]
  pub command: Option<Commands>,

  /// File to run (when no subcommand is specified)
  pub file: Option<PathBuf>,

  /// Extra stdlib files or directories preloaded before the script
  #[arg(long = "stdlib", value_name = "PATH", global = true)]
  pub stdlib: Vec<PathBuf>,

  /// Where uncaught errors are appended
  #[arg(long = "crash-log", value_name = "PATH", global = true)]
  pub crash_log: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
  /// Parse a kelp file (and its preloads) without running it
  Check {
    /// Path to the kelp file
    file: PathBuf,
  },
}

impl Cli {
  /// Resolve the actual command to run
  pub fn resolve_command(&self) -> ResolvedCommand {
    match &self.command {
      Some(Commands::Check { file }) => ResolvedCommand::Check { file: file.clone() },
      None => match &self.file {
        Some(file) => ResolvedCommand::Run { file: file.clone() },
        None => ResolvedCommand::Repl,
      },
    }
  }
}

/// Resolved command after processing CLI arguments
pub enum ResolvedCommand {
  Run { file: PathBuf },
  Check { file: PathBuf },
  Repl,
}
