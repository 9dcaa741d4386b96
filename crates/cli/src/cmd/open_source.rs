//! Implementation of the `open-sourcer` command.
//!
//! Runs the open-source procedure on a package directory and reports the
//! branch to push.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::debug;

use open_sourcer_lib::git::StagedChange;
use open_sourcer_lib::{OpenSourceOptions, Outcome, Report, open_source};

use crate::output::{
  OutputFormat, print_error, print_info, print_json, print_stat, print_success, symbols, truncate_hash,
};

/// Command-line arguments for a run.
pub struct OpenSourceArgs {
  pub dir: Option<PathBuf>,
  pub remote: String,
  pub unscope_name: bool,
  pub rollback_on_failure: bool,
}

impl OpenSourceArgs {
  /// Resolve the package directory, defaulting to the current directory.
  fn into_options(self) -> Result<OpenSourceOptions> {
    let dir = match self.dir {
      Some(dir) => dir,
      None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    let root = dunce::canonicalize(&dir).with_context(|| format!("Package directory not found: {}", dir.display()))?;
    debug!(root = %root.display(), "resolved package directory");

    Ok(OpenSourceOptions {
      root,
      remote: self.remote,
      unscope_name: self.unscope_name,
      rollback_on_failure: self.rollback_on_failure,
    })
  }
}

/// Execute the open-source command.
///
/// A repository with staged changes is reported and left untouched; this is
/// not treated as a failure.
///
/// # Errors
///
/// Returns an error if any step of the procedure fails.
pub fn cmd_open_source(args: OpenSourceArgs, format: OutputFormat) -> Result<()> {
  let options = args.into_options()?;
  let outcome = open_source(&options).context("An error occurred while open-sourcing")?;

  if format.is_json() {
    return print_json(&outcome);
  }

  match outcome {
    Outcome::Aborted { staged } => print_aborted(&staged),
    Outcome::Completed(report) => print_report(&report),
  }

  Ok(())
}

fn print_aborted(staged: &[StagedChange]) {
  print_error("Your repository contains staged changes, aborting.");
  for change in staged {
    eprintln!("  {} {} ({})", symbols::MODIFY, change.path, change.kind.as_str());
  }
}

fn print_report(report: &Report) {
  print_success(&format!("Committed version {} on \"{}\"", report.version, report.branch));
  print_stat("Commit", truncate_hash(&report.commit));
  if let Some(url) = &report.repository_url {
    print_stat("Repository", url);
  }
  if let Some(previous) = &report.renamed_from {
    print_stat("Renamed from", previous);
  }
  for field in &report.cleared_fields {
    println!("  {} {}", symbols::REMOVE, field);
  }
  for file in &report.removed_files {
    println!("  {} {}", symbols::REMOVE, file);
  }

  println!();
  print_info(&format!(
    "Done! You can now push the \"{}\" branch to the \"{}\" remote and open a pull request.",
    report.branch, report.remote
  ));
  print_info("You can also publish this module to npm using \"npm run publish\".");
}
