use std::error::Error;

use clap::Parser;

use kelp_lang::cli::{Cli, ResolvedCommand};
use kelp_lang::error::HostError;
use kelp_lang::{repl, Config, Runner};

fn main() {
  let cli = Cli::parse();

  let mut config = Config::default();
  config.stdlib_paths.extend(cli.stdlib.iter().cloned());
  if let Some(path) = &cli.crash_log {
    config.crash_log_path = path.clone();
  }

  let code = match cli.resolve_command() {
    ResolvedCommand::Run { file } => exit_code(Runner::new(config).run_file(&file)),
    ResolvedCommand::Check { file } => exit_code(Runner::new(config).check_file(&file)),
    ResolvedCommand::Repl => {
      repl::start(config);
      0
    }
  };
  std::process::exit(code);
}

/// Host errors are fatal: print the whole cause chain and exit non-zero.
fn exit_code(result: Result<i32, HostError>) -> i32 {
  match result {
    Ok(code) => code,
    Err(err) => {
      eprintln!("error: {err}");
      let mut cause = err.source();
      while let Some(inner) = cause {
        eprintln!("  caused by: {inner}");
        cause = inner.source();
      }
      1
    }
  }
}
