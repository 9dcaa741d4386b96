//! Staged-change detection.
//!
//! A change is staged when the index differs from the tree of the HEAD
//! commit. Untracked files and unstaged edits live only in the working tree
//! and are not reported.

use std::collections::BTreeMap;

use gix::ObjectId;
use gix::bstr::BString;
use gix::index::entry::Mode;
use serde::Serialize;

/// How a staged path differs from HEAD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
  Added,
  Modified,
  Deleted,
}

impl ChangeKind {
  pub fn as_str(self) -> &'static str {
    match self {
      ChangeKind::Added => "added",
      ChangeKind::Modified => "modified",
      ChangeKind::Deleted => "deleted",
    }
  }
}

/// One path whose index entry differs from HEAD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedChange {
  pub path: String,
  pub kind: ChangeKind,
}

type Entries = BTreeMap<BString, (ObjectId, Mode)>;

pub(super) fn entries(state: &gix::index::State) -> Entries {
  state
    .entries()
    .iter()
    .map(|entry| (entry.path(state).to_owned(), (entry.id, entry.mode)))
    .collect()
}

/// Compare the current index against the HEAD tree, both flattened to
/// `path -> (id, mode)`.
pub(super) fn diff(head: &Entries, index: &Entries) -> Vec<StagedChange> {
  let mut changes = Vec::new();

  for (path, entry) in index {
    let kind = match head.get(path) {
      None => ChangeKind::Added,
      Some(base) if base != entry => ChangeKind::Modified,
      Some(_) => continue,
    };
    changes.push(StagedChange {
      path: path.to_string(),
      kind,
    });
  }

  for path in head.keys().filter(|path| !index.contains_key(*path)) {
    changes.push(StagedChange {
      path: path.to_string(),
      kind: ChangeKind::Deleted,
    });
  }

  changes.sort_by(|a, b| a.path.cmp(&b.path));
  changes
}
