//! Package name parsing.
//!
//! npm package names are either plain (`left-pad`) or scoped to an
//! organization (`@novivia/open-sourcer`). Scoped names can be flattened into
//! a plain name (`novivia-open-sourcer`) for registries that do not know the
//! scope.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors produced while parsing a package name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
  #[error("package name is empty")]
  Empty,

  #[error("scoped package name '{0}' has no '/' separator")]
  MissingSeparator(String),

  #[error("scoped package name '{0}' has an empty scope or package segment")]
  EmptySegment(String),

  #[error("package name '{0}' contains an unexpected '/'")]
  UnexpectedSeparator(String),
}

/// A parsed package name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageName {
  /// `@namespace/name`
  Scoped { namespace: String, name: String },
  /// `name`
  Unscoped { name: String },
}

impl PackageName {
  /// The name without its scope.
  pub fn name(&self) -> &str {
    match self {
      PackageName::Scoped { name, .. } | PackageName::Unscoped { name } => name,
    }
  }

  /// The scope, if any.
  pub fn namespace(&self) -> Option<&str> {
    match self {
      PackageName::Scoped { namespace, .. } => Some(namespace),
      PackageName::Unscoped { .. } => None,
    }
  }

  /// Flatten a scoped name into `namespace-name`; plain names are returned as-is.
  pub fn unscoped(&self) -> String {
    match self {
      PackageName::Scoped { namespace, name } => format!("{namespace}-{name}"),
      PackageName::Unscoped { name } => name.clone(),
    }
  }
}

impl FromStr for PackageName {
  type Err = NameError;

  fn from_str(input: &str) -> Result<Self, Self::Err> {
    if input.is_empty() {
      return Err(NameError::Empty);
    }

    let Some(scoped) = input.strip_prefix('@') else {
      if input.contains('/') {
        return Err(NameError::UnexpectedSeparator(input.to_string()));
      }
      return Ok(PackageName::Unscoped {
        name: input.to_string(),
      });
    };

    let (namespace, name) = scoped
      .split_once('/')
      .ok_or_else(|| NameError::MissingSeparator(input.to_string()))?;

    if namespace.is_empty() || name.is_empty() {
      return Err(NameError::EmptySegment(input.to_string()));
    }
    if name.contains('/') {
      return Err(NameError::UnexpectedSeparator(input.to_string()));
    }

    Ok(PackageName::Scoped {
      namespace: namespace.to_string(),
      name: name.to_string(),
    })
  }
}

impl fmt::Display for PackageName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PackageName::Scoped { namespace, name } => write!(f, "@{namespace}/{name}"),
      PackageName::Unscoped { name } => f.write_str(name),
    }
  }
}
