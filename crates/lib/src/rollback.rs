//! Restore point for a failed run.
//!
//! A [`Checkpoint`] records where HEAD points, the raw bytes of the index file,
//! and the contents of the files the procedure rewrites (symlinks are kept as
//! links). Restoring it puts those back and deletes the branch the run created.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::git::{Branch, GitError, HeadState, Repo};

/// Errors that can occur while recording a checkpoint.
#[derive(Debug, Error)]
pub enum CheckpointError {
  #[error("failed to read {} for checkpoint: {source}", path.display())]
  Read { path: PathBuf, source: io::Error },

  #[error(transparent)]
  Git(#[from] GitError),
}

#[derive(Debug)]
enum Saved {
  File(Vec<u8>),
  Symlink(PathBuf),
  Missing,
}

#[derive(Debug)]
struct SavedFile {
  path: PathBuf,
  saved: Saved,
}

impl SavedFile {
  /// Record `path`; returns `None` for directories and other special files.
  fn capture(path: PathBuf) -> Result<Option<Self>, CheckpointError> {
    let to_error = |path: &Path, source: io::Error| CheckpointError::Read {
      path: path.to_path_buf(),
      source,
    };

    let saved = match fs::symlink_metadata(&path) {
      Ok(metadata) if metadata.is_symlink() => Saved::Symlink(fs::read_link(&path).map_err(|e| to_error(&path, e))?),
      Ok(metadata) if metadata.is_file() => Saved::File(fs::read(&path).map_err(|e| to_error(&path, e))?),
      Ok(_) => return Ok(None),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Saved::Missing,
      Err(e) => return Err(to_error(&path, e)),
    };
    Ok(Some(Self { path, saved }))
  }

  fn restore(&self) -> io::Result<()> {
    match &self.saved {
      Saved::File(content) => {
        remove_if_symlink(&self.path)?;
        fs::write(&self.path, content)
      }
      Saved::Symlink(target) => {
        remove_if_exists(&self.path)?;
        symlink(target, &self.path)
      }
      Saved::Missing => remove_if_exists(&self.path),
    }
  }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
  match fs::remove_file(path) {
    Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
    _ => Ok(()),
  }
}

fn remove_if_symlink(path: &Path) -> io::Result<()> {
  match fs::symlink_metadata(path) {
    Ok(metadata) if metadata.is_symlink() => fs::remove_file(path),
    _ => Ok(()),
  }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
  std::os::windows::fs::symlink_file(target, link)
}

/// Repository and working-tree state recorded before the first mutation.
#[derive(Debug)]
pub struct Checkpoint {
  head: HeadState,
  index: SavedFile,
  files: Vec<SavedFile>,
  branch: Option<Branch>,
}

impl Checkpoint {
  /// Record HEAD, the index, and the given files (relative to `root`).
  pub fn capture(repo: &Repo, root: &Path, files: &[&str]) -> Result<Self, CheckpointError> {
    let head = repo.head_state()?;
    let index = SavedFile::capture(repo.index_path())?.unwrap_or(SavedFile {
      path: repo.index_path(),
      saved: Saved::Missing,
    });

    let mut saved = Vec::with_capacity(files.len());
    for file in files {
      if let Some(file) = SavedFile::capture(root.join(file))? {
        saved.push(file);
      }
    }

    Ok(Self {
      head,
      index,
      files: saved,
      branch: None,
    })
  }

  /// Remember the branch created by the run so restoring deletes it.
  pub fn track_branch(&mut self, branch: Branch) {
    self.branch = Some(branch);
  }

  /// Put everything back.
  ///
  /// Each step is attempted even if an earlier one failed; failures are logged.
  /// Returns `true` when every step succeeded.
  pub fn restore(self, repo: &Repo) -> bool {
    let mut clean = true;

    for file in self.files.iter().chain(std::iter::once(&self.index)) {
      if let Err(e) = file.restore() {
        warn!(path = %file.path.display(), error = %e, "failed to restore file");
        clean = false;
      }
    }

    if let Some(branch) = &self.branch {
      if let Err(e) = repo.restore_head(&self.head) {
        warn!(error = %e, "failed to restore HEAD");
        clean = false;
      } else if let Err(e) = repo.delete_branch(branch) {
        warn!(branch = %branch.name, error = %e, "failed to delete branch");
        clean = false;
      }
    }

    if clean {
      info!("rolled back to the state before the run");
    }
    clean
  }
}
