//! open-sourcer-lib: prepare an internal package for publication.
//!
//! This crate provides the pieces of the open-source workflow:
//! - `Manifest`: the package descriptor, loaded from relaxed JSON and cleaned of
//!   internal-only fields
//! - `Repo`: the git operations the workflow needs (status, branches, index, commits)
//! - `open_source`: the ordered procedure tying both together
//! - `Checkpoint`: optional restore point used to undo a failed run

pub mod consts;
pub mod git;
pub mod manifest;
pub mod procedure;
pub mod rollback;
pub mod util;

pub use procedure::{OpenSourceError, OpenSourceOptions, Outcome, Report, branch_name, open_source};
