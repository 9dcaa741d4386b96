//! Shared utilities.
//!
//! Test helpers for building throwaway git repositories.

#[cfg(any(test, feature = "test-fixtures"))]
pub mod testutil;
