//! Manifest types.
//!
//! The manifest keeps every field of the source file in its original order so
//! the public `package.json` reads like the internal one. Only a handful of
//! fields are interpreted:
//! - `name` and `version`, which must be strings
//! - `repository.url`, which may be replaced by the public remote URL
//! - the [`InternalField`]s, which are cleared before publication

use std::fmt;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};

use super::{ManifestError, NameError, PackageName};
use crate::consts::{JSON_INDENT, OPEN_SOURCE_SCRIPT, OPEN_SOURCER_PACKAGE};

const NAME: &str = "name";
const VERSION: &str = "version";
const REPOSITORY: &str = "repository";
const URL: &str = "url";

/// A package manifest.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Manifest {
  fields: Map<String, Value>,
}

/// Manifest entries that only make sense inside the internal repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InternalField {
  /// Top-level `publishConfig`, pointing at the internal registry.
  PublishConfig,
  /// `scripts["open-source"]`, the script that runs this tool.
  OpenSourceScript,
  /// `devDependencies["@novivia/open-sourcer"]`, this tool itself.
  OpenSourcerDevDependency,
}

impl InternalField {
  /// Every internal field, in the order they are cleared.
  pub const ALL: [InternalField; 3] = [
    InternalField::PublishConfig,
    InternalField::OpenSourceScript,
    InternalField::OpenSourcerDevDependency,
  ];

  /// Parent object key (if nested) and the key to clear.
  fn location(self) -> (Option<&'static str>, &'static str) {
    match self {
      InternalField::PublishConfig => (None, "publishConfig"),
      InternalField::OpenSourceScript => (Some("scripts"), OPEN_SOURCE_SCRIPT),
      InternalField::OpenSourcerDevDependency => (Some("devDependencies"), OPEN_SOURCER_PACKAGE),
    }
  }
}

impl fmt::Display for InternalField {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.location() {
      (None, key) => f.write_str(key),
      (Some(parent), key) => write!(f, "{parent}[\"{key}\"]"),
    }
  }
}

impl Manifest {
  /// Build a manifest from already-parsed fields.
  ///
  /// # Errors
  ///
  /// Returns an error if `name` or `version` is missing or not a string.
  pub fn from_fields(mut fields: Map<String, Value>) -> Result<Self, ManifestError> {
    for key in [NAME, VERSION] {
      match fields.get(key) {
        Some(Value::String(_)) => {}
        Some(_) => return Err(ManifestError::NotAString(key)),
        None => return Err(ManifestError::MissingField(key)),
      }
    }
    fields.values_mut().for_each(integral_floats_to_integers);
    Ok(Self { fields })
  }

  /// All fields, in source order.
  pub fn fields(&self) -> &Map<String, Value> {
    &self.fields
  }

  /// Look up a top-level field.
  pub fn get(&self, key: &str) -> Option<&Value> {
    self.fields.get(key)
  }

  pub fn name(&self) -> &str {
    self.string_field(NAME)
  }

  pub fn version(&self) -> &str {
    self.string_field(VERSION)
  }

  fn string_field(&self, key: &str) -> &str {
    // Presence and type are checked in `from_fields`.
    self.fields.get(key).and_then(Value::as_str).unwrap_or_default()
  }

  /// Parse `name` into its scope and package parts.
  pub fn package_name(&self) -> Result<PackageName, NameError> {
    self.name().parse()
  }

  /// Rewrite a scoped `name` (`@namespace/package`) to `namespace-package`.
  ///
  /// Returns the previous name when it changed.
  pub fn unscope_name(&mut self) -> Result<Option<String>, NameError> {
    let parsed = self.package_name()?;
    let unscoped = parsed.unscoped();
    if unscoped == self.name() {
      return Ok(None);
    }
    let previous = self.fields.insert(NAME.to_string(), Value::String(unscoped));
    Ok(previous.and_then(|value| value.as_str().map(str::to_string)))
  }

  /// The repository URL, from either `repository.url` or the string shorthand.
  pub fn repository_url(&self) -> Option<&str> {
    match self.fields.get(REPOSITORY)? {
      Value::String(url) => Some(url),
      Value::Object(repository) => repository.get(URL).and_then(Value::as_str),
      _ => None,
    }
  }

  /// Point `repository.url` at `url`.
  ///
  /// Other keys of an existing `repository` object (such as `type`) are kept.
  /// A missing or shorthand `repository` is replaced by `{ "url": url }`.
  pub fn set_repository_url(&mut self, url: impl Into<String>) {
    let url = Value::String(url.into());
    match self.fields.get_mut(REPOSITORY) {
      Some(Value::Object(repository)) => {
        repository.insert(URL.to_string(), url);
      }
      _ => {
        let mut repository = Map::new();
        repository.insert(URL.to_string(), url);
        self.fields.insert(REPOSITORY.to_string(), Value::Object(repository));
      }
    }
  }

  /// Whether `field` is currently set.
  pub fn has(&self, field: InternalField) -> bool {
    match field.location() {
      (None, key) => self.fields.contains_key(key),
      (Some(parent), key) => self
        .fields
        .get(parent)
        .and_then(Value::as_object)
        .is_some_and(|object| object.contains_key(key)),
    }
  }

  /// Remove `field`, returning whether it was present.
  ///
  /// Clearing an absent field, or one whose parent is missing or not an
  /// object, does nothing.
  pub fn clear(&mut self, field: InternalField) -> bool {
    match field.location() {
      (None, key) => self.fields.shift_remove(key).is_some(),
      (Some(parent), key) => self
        .fields
        .get_mut(parent)
        .and_then(Value::as_object_mut)
        .is_some_and(|object| object.shift_remove(key).is_some()),
    }
  }

  /// Clear every [`InternalField`], returning the ones that were present.
  pub fn clear_internal_fields(&mut self) -> Vec<InternalField> {
    InternalField::ALL
      .into_iter()
      .filter(|field| self.clear(*field))
      .collect()
  }

  /// Serialize to strict JSON with the manifest indentation.
  pub fn to_json(&self) -> Result<String, ManifestError> {
    let indent = b" ".repeat(JSON_INDENT);
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(&indent));
    self.serialize(&mut serializer).map_err(ManifestError::Serialize)?;
    String::from_utf8(buf).map_err(ManifestError::Encoding)
  }
}

/// Rewrite floats with no fractional part (`1.0`, `1e3`) as integers so they
/// are written as `1` and `1000`.
fn integral_floats_to_integers(value: &mut Value) {
  match value {
    Value::Number(number) if number.is_f64() => {
      let integer = number
        .as_f64()
        .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
        .map(|f| f as i64);
      if let Some(integer) = integer {
        *value = Value::from(integer);
      }
    }
    Value::Array(items) => items.iter_mut().for_each(integral_floats_to_integers),
    Value::Object(object) => object.values_mut().for_each(integral_floats_to_integers),
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const INTERNAL: &str = r#"
    // Internal manifest
    {
      name: "@ns/pkg",
      version: "1.2.3",
      description: 'A package',
      repository: {
        type: "git",
        url: "git@git.internal:ns/pkg.git",
      },
      publishConfig: {
        registry: "https://npm.internal/",
      },
      scripts: {
        build: "babel src -d lib",
        "open-source": "open-sourcer",
      },
      devDependencies: {
        "@novivia/open-sourcer": "^1.0.0",
        babel: "^6.0.0",
      },
    }
  "#;

  fn internal() -> Manifest {
    Manifest::from_json5(INTERNAL).unwrap()
  }

  #[test]
  fn parses_relaxed_json() {
    let manifest = internal();
    assert_eq!(manifest.name(), "@ns/pkg");
    assert_eq!(manifest.version(), "1.2.3");
    assert_eq!(manifest.get("description"), Some(&Value::from("A package")));
    assert_eq!(manifest.repository_url(), Some("git@git.internal:ns/pkg.git"));
  }

  #[test]
  fn requires_name_and_version() {
    let err = Manifest::from_json5(r#"{ name: "pkg" }"#).unwrap_err();
    assert!(matches!(err, ManifestError::MissingField("version")));

    let err = Manifest::from_json5(r#"{ name: 1, version: "1.0.0" }"#).unwrap_err();
    assert!(matches!(err, ManifestError::NotAString("name")));
  }

  #[test]
  fn rejects_invalid_syntax() {
    let err = Manifest::from_json5("{ name: ").unwrap_err();
    assert!(matches!(err, ManifestError::Parse(_)));

    let err = Manifest::from_json5("[1, 2]").unwrap_err();
    assert!(matches!(err, ManifestError::Parse(_)));
  }

  #[test]
  fn clears_internal_fields() {
    let mut manifest = internal();
    let cleared = manifest.clear_internal_fields();

    assert_eq!(cleared, InternalField::ALL.to_vec());
    for field in InternalField::ALL {
      assert!(!manifest.has(field), "{field} should be cleared");
    }
    assert_eq!(manifest.fields()["scripts"]["build"], "babel src -d lib");
    assert_eq!(manifest.fields()["devDependencies"]["babel"], "^6.0.0");
  }

  #[test]
  fn clearing_absent_fields_is_a_noop() {
    let mut manifest = Manifest::from_json5(r#"{ name: "pkg", version: "1.0.0", scripts: "not an object" }"#).unwrap();
    let before = manifest.clone();

    assert!(manifest.clear_internal_fields().is_empty());
    assert_eq!(manifest, before);
  }

  #[test]
  fn output_is_the_same_with_or_without_publish_config() {
    let mut with = internal();
    let mut without = internal();
    without.clear(InternalField::PublishConfig);

    with.clear_internal_fields();
    without.clear_internal_fields();

    assert_eq!(with.to_json().unwrap(), without.to_json().unwrap());
  }

  #[test]
  fn set_repository_url_keeps_other_keys() {
    let mut manifest = internal();
    manifest.set_repository_url("https://example.com/org/repo.git");

    assert_eq!(manifest.repository_url(), Some("https://example.com/org/repo.git"));
    assert_eq!(manifest.fields()["repository"]["type"], "git");
  }

  #[test]
  fn set_repository_url_creates_missing_repository() {
    let mut manifest = Manifest::from_json5(r#"{ name: "pkg", version: "1.0.0" }"#).unwrap();
    assert_eq!(manifest.repository_url(), None);

    manifest.set_repository_url("https://example.com/org/repo.git");
    assert_eq!(
      manifest.get("repository"),
      Some(&serde_json::json!({ "url": "https://example.com/org/repo.git" }))
    );
  }

  #[test]
  fn set_repository_url_replaces_shorthand() {
    let mut manifest =
      Manifest::from_json5(r#"{ name: "pkg", version: "1.0.0", repository: "github:org/repo" }"#).unwrap();
    assert_eq!(manifest.repository_url(), Some("github:org/repo"));

    manifest.set_repository_url("https://example.com/org/repo.git");
    assert_eq!(manifest.fields()["repository"]["url"], "https://example.com/org/repo.git");
  }

  #[test]
  fn unscope_name_rewrites_scoped_names() {
    let mut manifest = internal();
    assert_eq!(manifest.unscope_name().unwrap(), Some("@ns/pkg".to_string()));
    assert_eq!(manifest.name(), "ns-pkg");

    assert_eq!(manifest.unscope_name().unwrap(), None);
    assert_eq!(manifest.name(), "ns-pkg");
  }

  #[test]
  fn unscope_name_rejects_malformed_scope() {
    let mut manifest = Manifest::from_json5(r#"{ name: "@broken", version: "1.0.0" }"#).unwrap();
    assert!(matches!(manifest.unscope_name(), Err(NameError::MissingSeparator(_))));
  }

  #[test]
  fn to_json_preserves_order_and_indentation() {
    let mut manifest = internal();
    manifest.clear_internal_fields();
    let json = manifest.to_json().unwrap();

    assert!(json.starts_with("{\n  \"name\": \"@ns/pkg\",\n  \"version\": \"1.2.3\","));
    assert!(!json.ends_with('\n'));

    let keys: Vec<&str> = manifest.fields().keys().map(String::as_str).collect();
    assert_eq!(keys, ["name", "version", "description", "repository", "scripts", "devDependencies"]);

    let reparsed: Value = serde_json::from_str(&json).unwrap();
    assert!(reparsed.get("publishConfig").is_none());
  }

  #[test]
  fn integral_numbers_are_written_without_fraction() {
    let manifest =
      Manifest::from_json5(r#"{ name: "pkg", version: "1.0.0", f: 1.0, e: 1e3, half: 0.5, n: [2.0, { z: -0.0 }] }"#)
        .unwrap();
    let json = manifest.to_json().unwrap();

    assert!(json.contains("\"f\": 1,"));
    assert!(json.contains("\"e\": 1000,"));
    assert!(json.contains("\"half\": 0.5,"));
    assert!(json.contains("\"z\": 0"));
    assert_eq!(manifest.fields()["n"][0], Value::from(2));
  }

  #[test]
  fn display_names_the_field_path() {
    assert_eq!(InternalField::PublishConfig.to_string(), "publishConfig");
    assert_eq!(InternalField::OpenSourceScript.to_string(), "scripts[\"open-source\"]");
    assert_eq!(
      InternalField::OpenSourcerDevDependency.to_string(),
      "devDependencies[\"@novivia/open-sourcer\"]"
    );
  }
}
