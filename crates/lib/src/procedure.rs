//! The open-source procedure.
//!
//! Turns an internal package into its public form on a dedicated branch:
//!
//! 1. open the repository rooted at the package directory
//! 2. refuse to run when anything is staged
//! 3. load `package.json5`
//! 4. derive the branch name `task_open-source_v<version>`
//! 5. create that branch at HEAD and check it out
//! 6. take `repository.url` from the public remote, when it has a URL
//! 7. clear the internal-only manifest fields
//! 8. delete `.npmrc` if present
//! 9. delete `package.json5`
//! 10. write `package.json`
//! 11. stage `package.json` and unstage both deleted files
//! 12. write the tree and commit `Open-sourced version <version>.`
//! 13. report the branch to push
//!
//! Every step after the staged-changes gate propagates its error; without
//! `rollback_on_failure` whatever ran before the failure stays in place.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::consts::{BRANCH_PREFIX, DEFAULT_REMOTE, NPMRC, PACKAGE_JSON, PACKAGE_JSON5};
use crate::git::{GitError, IndexEdit, Repo, StagedChange};
use crate::manifest::{Manifest, ManifestError};
use crate::rollback::{Checkpoint, CheckpointError};

/// Errors that can occur while open-sourcing a package.
#[derive(Debug, Error)]
pub enum OpenSourceError {
  #[error(transparent)]
  Git(#[from] GitError),

  #[error(transparent)]
  Manifest(#[from] ManifestError),

  #[error(transparent)]
  Checkpoint(#[from] CheckpointError),

  #[error("failed to remove {}: {source}", path.display())]
  RemoveFile { path: PathBuf, source: io::Error },
}

/// Options for a run.
#[derive(Debug, Clone)]
pub struct OpenSourceOptions {
  /// Package directory; also the root of its git repository.
  pub root: PathBuf,
  /// Remote whose URL becomes `repository.url`.
  pub remote: String,
  /// Rewrite `@namespace/package` to `namespace-package`.
  pub unscope_name: bool,
  /// Undo branch, index and file changes when a step fails.
  pub rollback_on_failure: bool,
}

impl Default for OpenSourceOptions {
  fn default() -> Self {
    Self {
      root: PathBuf::from("."),
      remote: DEFAULT_REMOTE.to_string(),
      unscope_name: false,
      rollback_on_failure: false,
    }
  }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
  pub branch: String,
  pub version: String,
  pub commit: String,
  /// The public remote URL written to `repository.url`, if one was found.
  pub repository_url: Option<String>,
  /// Remote the branch should be pushed to.
  pub remote: String,
  /// Manifest fields that were present and cleared, as display paths.
  pub cleared_fields: Vec<String>,
  /// Files removed from the working tree and the index.
  pub removed_files: Vec<String>,
  /// The previous name, when `unscope_name` rewrote it.
  pub renamed_from: Option<String>,
}

/// Result of [`open_source`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
  /// Nothing was changed because the index has staged changes.
  Aborted { staged: Vec<StagedChange> },
  /// The branch and commit were created.
  Completed(Report),
}

/// Name of the branch created for `version`.
pub fn branch_name(version: &str) -> String {
  format!("{BRANCH_PREFIX}{version}")
}

/// Run the open-source procedure on the package at `options.root`.
///
/// # Errors
///
/// Returns an error if the repository or manifest cannot be read, or if any
/// step after the staged-changes check fails. A repository with staged
/// changes is not an error: it yields [`Outcome::Aborted`].
pub fn open_source(options: &OpenSourceOptions) -> Result<Outcome, OpenSourceError> {
  let root = options.root.as_path();
  let repo = Repo::open(root)?;

  let staged = repo.staged_changes()?;
  if !staged.is_empty() {
    warn!(count = staged.len(), "repository has staged changes, aborting");
    return Ok(Outcome::Aborted { staged });
  }

  let manifest = Manifest::load(&root.join(PACKAGE_JSON5))?;

  let mut checkpoint = if options.rollback_on_failure {
    Some(Checkpoint::capture(&repo, root, &[PACKAGE_JSON5, NPMRC, PACKAGE_JSON])?)
  } else {
    None
  };

  match publish(&repo, options, manifest, checkpoint.as_mut()) {
    Ok(report) => {
      info!(branch = %report.branch, commit = %report.commit, "open-sourced package");
      Ok(Outcome::Completed(report))
    }
    Err(err) => {
      if let Some(checkpoint) = checkpoint {
        warn!(error = %err, "open-sourcing failed, rolling back");
        checkpoint.restore(&repo);
      }
      Err(err)
    }
  }
}

/// Steps 4 to 12.
fn publish(
  repo: &Repo,
  options: &OpenSourceOptions,
  mut manifest: Manifest,
  checkpoint: Option<&mut Checkpoint>,
) -> Result<Report, OpenSourceError> {
  let root = options.root.as_path();
  let version = manifest.version().to_string();
  let branch_name = branch_name(&version);

  info!(branch = %branch_name, "creating and checking out branch");
  repo.check_identity()?;
  let parent = repo.head_commit_id()?;
  let branch = repo.create_branch(&branch_name, parent)?;
  if let Some(checkpoint) = checkpoint {
    checkpoint.track_branch(branch.clone());
  }
  repo.checkout_branch(&branch)?;

  info!("updating package data");
  let repository_url = repo.remote_url(&options.remote)?;
  match &repository_url {
    Some(url) => {
      manifest.set_repository_url(url.as_str());
      info!(url = %url, "repository url set");
    }
    None => debug!(remote = %options.remote, "no public remote url, keeping repository url"),
  }

  let renamed_from = if options.unscope_name {
    let previous = manifest.unscope_name().map_err(ManifestError::from)?;
    if previous.is_some() {
      info!(name = manifest.name(), "unscoped package name");
    }
    previous
  } else {
    None
  };

  let cleared_fields = manifest
    .clear_internal_fields()
    .into_iter()
    .map(|field| field.to_string())
    .collect::<Vec<_>>();
  debug!(fields = ?cleared_fields, "cleared internal fields");

  let mut removed_files = Vec::new();
  info!("removing {NPMRC} file");
  if remove_file(&root.join(NPMRC), true)? {
    removed_files.push(NPMRC.to_string());
  }
  info!("removing {PACKAGE_JSON5} file");
  remove_file(&root.join(PACKAGE_JSON5), false)?;
  removed_files.push(PACKAGE_JSON5.to_string());

  info!("creating modified {PACKAGE_JSON} file");
  let json = manifest.write(&root.join(PACKAGE_JSON))?;

  info!("tracking {PACKAGE_JSON} file");
  let blob = repo.write_blob(json.as_bytes())?;
  let edits = [
    IndexEdit::Upsert {
      path: PACKAGE_JSON.to_string(),
      blob,
    },
    IndexEdit::Remove {
      path: PACKAGE_JSON5.to_string(),
    },
    IndexEdit::Remove {
      path: NPMRC.to_string(),
    },
  ];
  repo.update_index(&edits)?;

  info!("committing changes");
  let tree = repo.write_tree(parent, &edits)?;
  let commit = repo.commit(&format!("Open-sourced version {version}."), tree, parent)?;

  Ok(Report {
    branch: branch.name,
    version,
    commit: commit.to_string(),
    repository_url,
    remote: options.remote.clone(),
    cleared_fields,
    removed_files,
    renamed_from,
  })
}

/// Delete `path`; returns whether it existed. A missing file is an error
/// unless `optional`.
fn remove_file(path: &Path, optional: bool) -> Result<bool, OpenSourceError> {
  match fs::remove_file(path) {
    Ok(()) => Ok(true),
    Err(e) if optional && e.kind() == io::ErrorKind::NotFound => {
      debug!(path = %path.display(), "file not present, skipping");
      Ok(false)
    }
    Err(e) => Err(OpenSourceError::RemoveFile {
      path: path.to_path_buf(),
      source: e,
    }),
  }
}
