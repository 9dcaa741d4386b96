//! Git operations used by the open-source procedure.
//!
//! [`Repo`] wraps a `gix::Repository` rooted at the package directory and
//! exposes only what the procedure needs:
//! - a snapshot of staged changes
//! - the HEAD commit, its tree, and the configured default signature
//! - branch creation and checkout, plus the inverse operations for rollback
//! - remote URL lookup
//! - index staging and tree/commit writing
//!
//! Branch checkout only moves `HEAD`: the new branch always starts at the
//! current HEAD commit, so the working tree is already correct.

mod status;

use std::path::{Path, PathBuf};

use gix::ObjectId;
use gix::bstr::BStr;
use gix::index::entry::{Flags, Mode, Stat};
use gix::object::tree::EntryKind;
use gix::refs::transaction::{Change, LogChange, PreviousValue, RefEdit, RefLog};
use gix::refs::{FullName, Target};
use gix::remote::Direction;
use thiserror::Error;
use tracing::debug;

pub use status::{ChangeKind, StagedChange};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur during git operations.
#[derive(Debug, Error)]
pub enum GitError {
  /// No repository could be opened at the given path.
  #[error("failed to open repository at '{}': {source}", path.display())]
  Open {
    path: PathBuf,
    #[source]
    source: Box<gix::open::Error>,
  },

  /// HEAD does not resolve to a commit (or its tree).
  #[error("failed to resolve HEAD: {0}")]
  Head(#[source] BoxError),

  /// Neither `user.name`/`user.email` nor the committer environment is configured.
  #[error("no default signature configured; set user.name and user.email")]
  MissingIdentity,

  /// The configured identity could not be parsed.
  #[error("invalid default signature: {0}")]
  Identity(#[source] BoxError),

  /// Reading or writing the index failed.
  #[error("failed to update index: {0}")]
  Index(#[source] BoxError),

  /// Creating the branch failed, for example because it already exists.
  #[error("failed to create branch '{name}': {source}")]
  CreateBranch {
    name: String,
    #[source]
    source: BoxError,
  },

  /// Pointing HEAD at a reference failed.
  #[error("failed to update HEAD to '{target}': {source}")]
  UpdateHead {
    target: String,
    #[source]
    source: BoxError,
  },

  /// Deleting a branch failed.
  #[error("failed to delete branch '{name}': {source}")]
  DeleteBranch {
    name: String,
    #[source]
    source: BoxError,
  },

  /// The remote exists but its configuration is invalid.
  #[error("failed to read remote '{name}': {source}")]
  Remote {
    name: String,
    #[source]
    source: BoxError,
  },

  /// Writing a blob or tree object failed.
  #[error("failed to write object: {0}")]
  WriteObject(#[source] BoxError),

  /// Writing the commit or moving HEAD to it failed.
  #[error("failed to create commit: {0}")]
  Commit(#[source] BoxError),
}

/// A local branch created by the procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
  /// Short name, e.g. `task_open-source_v1.2.3`.
  pub name: String,
  /// Full reference name, e.g. `refs/heads/task_open-source_v1.2.3`.
  pub full_name: FullName,
}

/// Where HEAD points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadState {
  /// HEAD is a symbolic reference (possibly to an unborn branch).
  Branch(FullName),
  /// HEAD points directly at a commit.
  Detached(ObjectId),
}

impl HeadState {
  fn describe(&self) -> String {
    match self {
      HeadState::Branch(name) => name.as_bstr().to_string(),
      HeadState::Detached(id) => id.to_string(),
    }
  }
}

/// A change applied to both the index and the commit tree.
///
/// Paths are relative to the repository root and name top-level files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEdit {
  /// Add or replace `path` with the given blob.
  Upsert { path: String, blob: ObjectId },
  /// Drop `path`; a no-op when it is not tracked.
  Remove { path: String },
}

impl IndexEdit {
  fn path(&self) -> &str {
    match self {
      IndexEdit::Upsert { path, .. } | IndexEdit::Remove { path } => path,
    }
  }
}

/// A git repository rooted at a package directory.
pub struct Repo {
  inner: gix::Repository,
}

impl Repo {
  /// Open the repository whose working tree is rooted at `path`.
  ///
  /// Parent directories are not searched.
  pub fn open(path: &Path) -> Result<Self, GitError> {
    let inner = gix::open(path).map_err(|e| GitError::Open {
      path: path.to_path_buf(),
      source: Box::new(e),
    })?;
    debug!(path = %path.display(), "opened repository");
    Ok(Self { inner })
  }

  /// Path of the index file.
  pub fn index_path(&self) -> PathBuf {
    self.inner.index_path()
  }

  /// The commit HEAD points at.
  pub fn head_commit_id(&self) -> Result<ObjectId, GitError> {
    let commit = self.inner.head_commit().map_err(|e| GitError::Head(Box::new(e)))?;
    Ok(commit.id)
  }

  fn tree_of(&self, commit: ObjectId) -> Result<ObjectId, GitError> {
    let commit = self
      .inner
      .find_commit(commit)
      .map_err(|e| GitError::Head(Box::new(e)))?;
    let tree = commit.tree_id().map_err(|e| GitError::Head(Box::new(e)))?;
    Ok(tree.detach())
  }

  /// Where HEAD currently points.
  pub fn head_state(&self) -> Result<HeadState, GitError> {
    let head = self.inner.head().map_err(|e| GitError::Head(Box::new(e)))?;
    Ok(match head.kind {
      gix::head::Kind::Symbolic(reference) => HeadState::Branch(reference.name),
      gix::head::Kind::Unborn(name) => HeadState::Branch(name),
      gix::head::Kind::Detached { target, .. } => HeadState::Detached(target),
    })
  }

  /// Paths whose index entries differ from the HEAD tree.
  pub fn staged_changes(&self) -> Result<Vec<StagedChange>, GitError> {
    let head_tree = self.tree_of(self.head_commit_id()?)?;
    let head = self
      .inner
      .index_from_tree(&head_tree)
      .map_err(|e| GitError::Index(Box::new(e)))?;
    let index = self.inner.index_or_empty().map_err(|e| GitError::Index(Box::new(e)))?;

    let changes = status::diff(&status::entries(&head), &status::entries(&index));
    debug!(count = changes.len(), "computed staged changes");
    Ok(changes)
  }

  /// Ensure a default signature is configured and readable.
  pub fn check_identity(&self) -> Result<(), GitError> {
    self.default_signature().map(|_| ())
  }

  fn default_signature(&self) -> Result<gix::actor::SignatureRef<'_>, GitError> {
    self
      .inner
      .committer()
      .ok_or(GitError::MissingIdentity)?
      .map_err(|e| GitError::Identity(Box::new(e)))
  }

  /// Create `refs/heads/<name>` at `target`.
  ///
  /// Fails if the branch already exists. The reflog entry reads
  /// `Created <name> on HEAD` and is signed with the default signature.
  pub fn create_branch(&self, name: &str, target: ObjectId) -> Result<Branch, GitError> {
    let full_name = format!("refs/heads/{name}");
    let to_error = |source: BoxError| GitError::CreateBranch {
      name: name.to_string(),
      source,
    };

    // A ref edit onto an identical existing value succeeds, so check explicitly.
    let existing = self
      .inner
      .try_find_reference(full_name.as_str())
      .map_err(|e| to_error(Box::new(e)))?;
    if existing.is_some() {
      return Err(to_error("a branch with this name already exists".into()));
    }

    let reference = self
      .inner
      .reference(
        full_name.as_str(),
        target,
        PreviousValue::MustNotExist,
        format!("Created {name} on HEAD"),
      )
      .map_err(|e| to_error(Box::new(e)))?;

    debug!(branch = name, %target, "created branch");
    Ok(Branch {
      name: name.to_string(),
      full_name: reference.detach().name,
    })
  }

  /// Make `branch` the current branch.
  pub fn checkout_branch(&self, branch: &Branch) -> Result<(), GitError> {
    let previous = self.head_state()?;
    let message = format!("checkout: moving from {} to {}", previous.describe(), branch.name);
    self.set_head(Target::Symbolic(branch.full_name.clone()), message)?;
    debug!(branch = %branch.name, "checked out branch");
    Ok(())
  }

  /// Point HEAD back at a previously recorded state.
  pub fn restore_head(&self, state: &HeadState) -> Result<(), GitError> {
    let target = match state {
      HeadState::Branch(name) => Target::Symbolic(name.clone()),
      HeadState::Detached(id) => Target::Object(*id),
    };
    self.set_head(target, format!("rollback: moving to {}", state.describe()))
  }

  fn set_head(&self, target: Target, message: String) -> Result<(), GitError> {
    let describe = match &target {
      Target::Symbolic(name) => name.as_bstr().to_string(),
      Target::Object(id) => id.to_string(),
    };
    let to_error = |source: BoxError| GitError::UpdateHead {
      target: describe.clone(),
      source,
    };

    let head: FullName = "HEAD".try_into().map_err(|e| to_error(Box::new(e)))?;
    self
      .inner
      .edit_reference(RefEdit {
        change: Change::Update {
          log: LogChange {
            mode: RefLog::AndReference,
            force_create_reflog: false,
            message: message.into(),
          },
          expected: PreviousValue::Any,
          new: target,
        },
        name: head,
        deref: false,
      })
      .map_err(|e| to_error(Box::new(e)))?;
    Ok(())
  }

  /// Delete a branch created earlier in the run.
  pub fn delete_branch(&self, branch: &Branch) -> Result<(), GitError> {
    self
      .inner
      .edit_reference(RefEdit {
        change: Change::Delete {
          expected: PreviousValue::MustExist,
          log: RefLog::AndReference,
        },
        name: branch.full_name.clone(),
        deref: false,
      })
      .map_err(|e| GitError::DeleteBranch {
        name: branch.name.clone(),
        source: Box::new(e),
      })?;
    debug!(branch = %branch.name, "deleted branch");
    Ok(())
  }

  /// URL of the remote `name`, preferring its fetch URL over its push URL.
  ///
  /// Returns `None` when the remote does not exist or has no URL.
  pub fn remote_url(&self, name: &str) -> Result<Option<String>, GitError> {
    let remote = match self.inner.try_find_remote(name) {
      None => {
        debug!(remote = name, "remote not configured");
        return Ok(None);
      }
      Some(remote) => remote.map_err(|e| GitError::Remote {
        name: name.to_string(),
        source: Box::new(e),
      })?,
    };

    let url = remote
      .url(Direction::Fetch)
      .or_else(|| remote.url(Direction::Push))
      .map(|url| url.to_bstring().to_string());
    Ok(url)
  }

  /// Store `content` as a blob.
  pub fn write_blob(&self, content: &[u8]) -> Result<ObjectId, GitError> {
    let id = self
      .inner
      .write_blob(content)
      .map_err(|e| GitError::WriteObject(Box::new(e)))?;
    Ok(id.detach())
  }

  /// Reload the index from disk, apply `edits`, and write it back.
  ///
  /// The cached tree extension is dropped since it no longer matches the entries.
  pub fn update_index(&self, edits: &[IndexEdit]) -> Result<(), GitError> {
    let mut index = self.inner.open_index().map_err(|e| GitError::Index(Box::new(e)))?;

    for edit in edits {
      let path = BStr::new(edit.path());
      match edit {
        IndexEdit::Remove { .. } => {
          index.remove_entries(|_, entry_path, _| entry_path == path);
        }
        IndexEdit::Upsert { blob, .. } => match index.entry_index_by_path(path) {
          Ok(position) => {
            let entry = &mut index.entries_mut()[position];
            entry.id = *blob;
            entry.stat = Stat::default();
          }
          Err(_) => {
            index.dangerously_push_entry(Stat::default(), *blob, Flags::empty(), Mode::FILE, path);
            index.sort_entries();
          }
        },
      }
      debug!(path = edit.path(), "updated index entry");
    }

    index.remove_tree();
    index
      .write(gix::index::write::Options::default())
      .map_err(|e| GitError::Index(Box::new(e)))?;
    Ok(())
  }

  /// Write the tree of `commit` with `edits` applied.
  ///
  /// When the index matched `commit` before the edits, this is the tree of the
  /// updated index.
  pub fn write_tree(&self, commit: ObjectId, edits: &[IndexEdit]) -> Result<ObjectId, GitError> {
    let base = self.tree_of(commit)?;
    let mut editor = self
      .inner
      .edit_tree(base)
      .map_err(|e| GitError::WriteObject(Box::new(e)))?;

    for edit in edits {
      let result = match edit {
        IndexEdit::Upsert { path, blob } => editor.upsert(path.as_str(), EntryKind::Blob, *blob),
        IndexEdit::Remove { path } => editor.remove(path.as_str()),
      };
      result.map_err(|e| GitError::WriteObject(Box::new(e)))?;
    }

    let tree = editor.write().map_err(|e| GitError::WriteObject(Box::new(e)))?;
    Ok(tree.detach())
  }

  /// Commit `tree` on top of `parent` and advance the branch HEAD points to.
  ///
  /// The default signature is used as both author and committer.
  pub fn commit(&self, message: &str, tree: ObjectId, parent: ObjectId) -> Result<ObjectId, GitError> {
    let signature = self.default_signature()?;
    let id = self
      .inner
      .commit_as(signature, signature, "HEAD", message, tree, [parent])
      .map_err(|e| GitError::Commit(Box::new(e)))?;
    debug!(commit = %id, "created commit");
    Ok(id.detach())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::{self, FixtureRepo};

  fn fixture() -> FixtureRepo {
    FixtureRepo::new(&[("README.md", "# pkg\n"), ("index.js", "module.exports = 1;\n")])
  }

  #[test]
  fn open_fails_outside_a_repository() {
    let temp = tempfile::TempDir::new().unwrap();
    let result = Repo::open(temp.path());
    assert!(matches!(result, Err(GitError::Open { .. })));
  }

  #[test]
  fn clean_repository_has_no_staged_changes() {
    let fixture = fixture();
    fixture.write_file("untracked.txt", "scratch");
    fixture.write_file("index.js", "module.exports = 2;\n");

    let repo = Repo::open(fixture.path()).unwrap();
    assert!(repo.staged_changes().unwrap().is_empty());
  }

  #[test]
  fn staged_files_are_reported() {
    let fixture = fixture();
    fixture.stage_file("new.txt", "new");
    fixture.stage_file("index.js", "module.exports = 3;\n");

    let repo = Repo::open(fixture.path()).unwrap();
    let changes = repo.staged_changes().unwrap();
    assert_eq!(
      changes,
      vec![
        StagedChange {
          path: "index.js".to_string(),
          kind: ChangeKind::Modified
        },
        StagedChange {
          path: "new.txt".to_string(),
          kind: ChangeKind::Added
        },
      ]
    );
  }

  #[test]
  fn create_branch_refuses_existing_name() {
    let fixture = fixture();
    let repo = Repo::open(fixture.path()).unwrap();
    let head = repo.head_commit_id().unwrap();

    let branch = repo.create_branch("feature", head).unwrap();
    assert_eq!(branch.full_name.as_bstr().to_string(), "refs/heads/feature");

    let err = repo.create_branch("feature", head).unwrap_err();
    assert!(matches!(err, GitError::CreateBranch { .. }));
    assert!(err.to_string().contains("already exists"));
  }

  #[test]
  fn create_branch_refuses_existing_name_at_another_commit() {
    let fixture = fixture();
    let repo = Repo::open(fixture.path()).unwrap();
    let parent = repo.head_commit_id().unwrap();

    let blob = repo.write_blob(b"{}").unwrap();
    let edits = [IndexEdit::Upsert {
      path: "package.json".to_string(),
      blob,
    }];
    repo.update_index(&edits).unwrap();
    let tree = repo.write_tree(parent, &edits).unwrap();
    let head = repo.commit("Add manifest.", tree, parent).unwrap();

    repo.create_branch("feature", parent).unwrap();
    let err = repo.create_branch("feature", head).unwrap_err();
    assert!(matches!(err, GitError::CreateBranch { .. }));
  }

  #[test]
  fn checkout_and_restore_head() {
    let fixture = fixture();
    let repo = Repo::open(fixture.path()).unwrap();
    let original = repo.head_state().unwrap();
    let head = repo.head_commit_id().unwrap();

    let branch = repo.create_branch("feature", head).unwrap();
    repo.checkout_branch(&branch).unwrap();
    assert_eq!(repo.head_state().unwrap(), HeadState::Branch(branch.full_name.clone()));
    assert_eq!(repo.head_commit_id().unwrap(), head);

    repo.restore_head(&original).unwrap();
    repo.delete_branch(&branch).unwrap();
    assert_eq!(repo.head_state().unwrap(), original);
    assert!(!testutil::branch_exists(fixture.path(), "feature"));
  }

  #[test]
  fn remote_url_prefers_fetch_url() {
    let fixture = fixture();
    fixture.add_remote("github", Some("https://example.com/org/repo.git"), Some("git@example.com:org/repo.git"));

    let repo = Repo::open(fixture.path()).unwrap();
    assert_eq!(
      repo.remote_url("github").unwrap().as_deref(),
      Some("https://example.com/org/repo.git")
    );
  }

  #[test]
  fn remote_url_falls_back_to_push_url() {
    let fixture = fixture();
    fixture.add_remote("github", None, Some("https://example.com/org/push.git"));

    let repo = Repo::open(fixture.path()).unwrap();
    assert_eq!(
      repo.remote_url("github").unwrap().as_deref(),
      Some("https://example.com/org/push.git")
    );
  }

  #[test]
  fn missing_remote_has_no_url() {
    let fixture = fixture();
    let repo = Repo::open(fixture.path()).unwrap();
    assert_eq!(repo.remote_url("github").unwrap(), None);
  }

  #[test]
  fn index_tree_and_commit_agree() {
    let fixture = fixture();
    let repo = Repo::open(fixture.path()).unwrap();
    let parent = repo.head_commit_id().unwrap();

    let blob = repo.write_blob(b"{}").unwrap();
    let edits = vec![
      IndexEdit::Upsert {
        path: "package.json".to_string(),
        blob,
      },
      IndexEdit::Remove {
        path: "README.md".to_string(),
      },
      IndexEdit::Remove {
        path: "missing.txt".to_string(),
      },
    ];

    repo.update_index(&edits).unwrap();
    let tree = repo.write_tree(parent, &edits).unwrap();
    let commit = repo.commit("Update files.", tree, parent).unwrap();

    assert_eq!(repo.head_commit_id().unwrap(), commit);
    assert_eq!(testutil::index_paths(fixture.path()), ["index.js", "package.json"]);
    assert_eq!(testutil::head_tree_paths(fixture.path()), ["index.js", "package.json"]);
    assert!(repo.staged_changes().unwrap().is_empty());
  }
}
