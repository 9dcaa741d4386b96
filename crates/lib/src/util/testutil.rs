//! Test utilities for open-sourcer.
//!
//! [`FixtureRepo`] creates a git repository in a temporary directory with an
//! initial commit, a matching index, and a configured identity. The free
//! functions inspect a repository after the procedure ran.

use std::fs;
use std::io::Write;
use std::path::Path;

use gix::ObjectId;
use gix::object::tree::EntryKind;
use tempfile::TempDir;

use crate::git::{IndexEdit, Repo};

const IDENTITY: &str = "[user]\n\tname = Open Sourcer Tests\n\temail = tests@example.com\n";

/// An internal package manifest with every field the procedure touches.
pub const INTERNAL_MANIFEST: &str = r#"// Internal manifest
{
  name: "@ns/pkg",
  version: "1.2.3",
  description: "Test package",
  repository: {
    type: "git",
    url: "git@git.internal:ns/pkg.git",
  },
  publishConfig: {
    registry: "https://npm.internal/",
  },
  scripts: {
    test: "jest",
    "open-source": "open-sourcer",
  },
  devDependencies: {
    "@novivia/open-sourcer": "^1.0.0",
    jest: "^20.0.0",
  },
}
"#;

/// Registry configuration found next to internal manifests.
pub const NPMRC_CONTENT: &str = "registry=https://npm.internal/\n";

/// A git repository in a temporary directory.
pub struct FixtureRepo {
  temp: TempDir,
}

impl FixtureRepo {
  /// Create a repository whose first commit contains `files`.
  pub fn new(files: &[(&str, &str)]) -> Self {
    let temp = TempDir::new().expect("create temp dir");
    gix::init(temp.path()).expect("init repository");
    append(&temp.path().join(".git").join("config"), IDENTITY);

    let repo = gix::open(temp.path()).expect("open repository");
    let mut editor = repo.empty_tree().edit().expect("edit empty tree");
    for (path, content) in files {
      fs::write(temp.path().join(path), content).expect("write fixture file");
      let blob = repo.write_blob(content.as_bytes()).expect("write blob").detach();
      editor.upsert(*path, EntryKind::Blob, blob).expect("add tree entry");
    }
    let tree = editor.write().expect("write tree").detach();

    repo
      .commit("HEAD", "Initial commit", tree, gix::commit::NO_PARENT_IDS)
      .expect("create initial commit");
    let mut index = repo.index_from_tree(&tree).expect("index from tree");
    index.write(Default::default()).expect("write index");

    Self { temp }
  }

  /// A repository holding an internal package: manifest, `.npmrc`, and source.
  pub fn internal_package() -> Self {
    Self::new(&[
      ("package.json5", INTERNAL_MANIFEST),
      (".npmrc", NPMRC_CONTENT),
      ("index.js", "module.exports = 1;\n"),
    ])
  }

  pub fn path(&self) -> &Path {
    self.temp.path()
  }

  /// Write a file in the working tree without touching the index.
  pub fn write_file(&self, path: &str, content: &str) {
    fs::write(self.path().join(path), content).expect("write file");
  }

  /// Write a file and stage it.
  pub fn stage_file(&self, path: &str, content: &str) {
    self.write_file(path, content);
    let repo = Repo::open(self.path()).expect("open repository");
    let blob = repo.write_blob(content.as_bytes()).expect("write blob");
    repo
      .update_index(&[IndexEdit::Upsert {
        path: path.to_string(),
        blob,
      }])
      .expect("stage file");
  }

  /// Configure a remote with optional fetch and push URLs.
  pub fn add_remote(&self, name: &str, url: Option<&str>, push_url: Option<&str>) {
    let mut section = format!("[remote \"{name}\"]\n");
    if let Some(url) = url {
      section.push_str(&format!("\turl = {url}\n\tfetch = +refs/heads/*:refs/remotes/{name}/*\n"));
    }
    if let Some(push_url) = push_url {
      section.push_str(&format!("\tpushurl = {push_url}\n"));
    }
    append(&self.path().join(".git").join("config"), &section);
  }
}

fn append(path: &Path, content: &str) {
  let mut file = fs::OpenOptions::new()
    .append(true)
    .open(path)
    .expect("open file for append");
  file.write_all(content.as_bytes()).expect("append to file");
}

fn open(path: &Path) -> gix::Repository {
  gix::open(path).expect("open repository")
}

/// Whether `refs/heads/<name>` exists.
pub fn branch_exists(path: &Path, name: &str) -> bool {
  open(path)
    .try_find_reference(format!("refs/heads/{name}").as_str())
    .expect("look up reference")
    .is_some()
}

/// Short name of the branch HEAD points to, if any.
pub fn head_branch(path: &Path) -> Option<String> {
  let repo = open(path);
  let name = repo.head_name().expect("read HEAD")?;
  let full = name.as_bstr().to_string();
  Some(full.strip_prefix("refs/heads/").unwrap_or(&full).to_string())
}

/// Sorted paths tracked by the index.
pub fn index_paths(path: &Path) -> Vec<String> {
  let index = open(path).open_index().expect("open index");
  let mut paths: Vec<String> = index.entries().iter().map(|entry| entry.path(&index).to_string()).collect();
  paths.sort();
  paths
}

/// Sorted top-level entry names of the HEAD commit's tree.
pub fn head_tree_paths(path: &Path) -> Vec<String> {
  let repo = open(path);
  let tree = repo.head_commit().expect("HEAD commit").tree().expect("HEAD tree");
  let decoded = tree.decode().expect("decode tree");
  let mut paths: Vec<String> = decoded.entries.iter().map(|entry| entry.filename.to_string()).collect();
  paths.sort();
  paths
}

/// Message and parent ids of the HEAD commit.
pub fn head_commit(path: &Path) -> (String, Vec<ObjectId>) {
  let repo = open(path);
  let commit = repo.head_commit().expect("HEAD commit");
  let message = commit.message_raw().expect("commit message").to_string();
  let parents = commit.parent_ids().map(|id| id.detach()).collect();
  (message, parents)
}
