//! Fixed names used by the open-source procedure.

/// Relaxed-JSON manifest kept in the internal repository.
pub const PACKAGE_JSON5: &str = "package.json5";

/// Strict-JSON manifest written for the public repository.
pub const PACKAGE_JSON: &str = "package.json";

/// Internal npm registry configuration.
pub const NPMRC: &str = ".npmrc";

/// Remote the public manifest URL is taken from.
pub const DEFAULT_REMOTE: &str = "github";

/// Prefix of the branch created for each run; the manifest version is appended.
pub const BRANCH_PREFIX: &str = "task_open-source_v";

/// Script entry that only makes sense inside the internal repository.
pub const OPEN_SOURCE_SCRIPT: &str = "open-source";

/// Development dependency on this tool itself.
pub const OPEN_SOURCER_PACKAGE: &str = "@novivia/open-sourcer";

/// Indentation width of the written manifest.
pub const JSON_INDENT: usize = 2;
