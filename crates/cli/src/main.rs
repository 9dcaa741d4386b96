//! `open-sourcer` - publish an internal package on a dedicated branch.

mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use open_sourcer_lib::consts::DEFAULT_REMOTE;

use crate::output::OutputFormat;

/// Strip internal metadata from a package and commit it on a branch for the public remote
#[derive(Parser)]
#[command(name = "open-sourcer")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Package directory (default: current directory)
  #[arg(short = 'C', long = "dir", value_name = "PATH")]
  dir: Option<PathBuf>,

  /// Remote whose URL is written to `repository.url`
  #[arg(long, default_value = DEFAULT_REMOTE)]
  remote: String,

  /// Rename `@namespace/package` to `namespace-package`
  #[arg(long)]
  unscope_name: bool,

  /// Undo branch and file changes if a step fails
  #[arg(long)]
  rollback_on_failure: bool,

  /// Output format
  #[arg(short, long, value_enum, default_value_t)]
  output: OutputFormat,

  /// Enable verbose output
  #[arg(short, long)]
  verbose: bool,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  // Initialize logging
  let filter = if cli.verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  cmd::cmd_open_source(
    cmd::OpenSourceArgs {
      dir: cli.dir,
      remote: cli.remote,
      unscope_name: cli.unscope_name,
      rollback_on_failure: cli.rollback_on_failure,
    },
    cli.output,
  )
}
