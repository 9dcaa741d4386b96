//! The package manifest.
//!
//! Internal packages describe themselves in `package.json5`; the public
//! repository gets a strict `package.json` derived from it with every
//! internal-only field removed.

mod name;
mod types;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

pub use name::{NameError, PackageName};
pub use types::*;

/// Errors that can occur while loading or writing a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("failed to read manifest {}: {source}", path.display())]
  Read { path: PathBuf, source: std::io::Error },

  #[error("failed to parse manifest: {0}")]
  Parse(#[source] json5::Error),

  #[error("manifest field '{0}' is missing")]
  MissingField(&'static str),

  #[error("manifest field '{0}' must be a string")]
  NotAString(&'static str),

  #[error("failed to serialize manifest: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("serialized manifest is not valid UTF-8: {0}")]
  Encoding(#[source] std::string::FromUtf8Error),

  #[error("failed to write manifest {}: {source}", path.display())]
  Write { path: PathBuf, source: std::io::Error },

  #[error(transparent)]
  Name(#[from] NameError),
}

impl Manifest {
  /// Read and parse a relaxed-JSON manifest file.
  pub fn load(path: &Path) -> Result<Self, ManifestError> {
    let source = fs::read_to_string(path).map_err(|e| ManifestError::Read {
      path: path.to_path_buf(),
      source: e,
    })?;
    let manifest = Self::from_json5(&source)?;
    debug!(path = %path.display(), name = manifest.name(), version = manifest.version(), "loaded manifest");
    Ok(manifest)
  }

  /// Parse a manifest from relaxed-JSON text.
  pub fn from_json5(source: &str) -> Result<Self, ManifestError> {
    let fields = json5::from_str(source).map_err(ManifestError::Parse)?;
    Self::from_fields(fields)
  }

  /// Serialize to strict JSON and write it to `path`, returning the text written.
  ///
  /// The file is written without a trailing newline.
  pub fn write(&self, path: &Path) -> Result<String, ManifestError> {
    let json = self.to_json()?;
    fs::write(path, &json).map_err(|e| ManifestError::Write {
      path: path.to_path_buf(),
      source: e,
    })?;
    debug!(path = %path.display(), "wrote manifest");
    Ok(json)
  }
}
