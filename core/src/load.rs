//! Reading schemas and data documents from disk.
//!
//! Files ending in `.json` are parsed as JSON; anything else as YAML. Both
//! end up as a [`serde_json::Value`] with key order preserved.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::schema::{CompileError, Schema};

/// Errors raised while loading a document.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parsing failure.
    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// YAML parsing failure.
    #[error("invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The document parsed but is not a valid schema.
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Reads a JSON or YAML document.
pub fn load_value(path: impl AsRef<Path>) -> Result<Value, LoadError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    debug!(path = %path.display(), json = is_json, "loading document");

    if is_json {
        serde_json::from_str(&text).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        })
    } else {
        serde_yaml::from_str(&text).map_err(|source| LoadError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Reads and compiles a schema file.
///
/// # Examples
///
/// ```no_run
/// let schema = argschema_core::load_schema("resize.schema.yaml").unwrap();
/// println!("{} tags", schema.tag_map().len());
/// ```
pub fn load_schema(path: impl AsRef<Path>) -> Result<Schema, LoadError> {
    let raw = load_value(path)?;
    Ok(Schema::compile(&raw)?)
}

impl Schema {
    /// Compiles a schema written in YAML.
    ///
    /// # Examples
    ///
    /// ```
    /// use argschema_core::Schema;
    ///
    /// let schema = Schema::from_yaml_str(
    ///     "
    /// title: greet
    /// properties:
    ///   name:
    ///     type: string
    ///     x-alias: -n
    /// ",
    /// )
    /// .unwrap();
    /// assert!(schema.tag_map().contains("-n"));
    /// ```
    pub fn from_yaml_str(text: &str) -> Result<Self, LoadError> {
        let raw: Value = serde_yaml::from_str(text).map_err(|source| LoadError::Yaml {
            path: PathBuf::from("<string>"),
            source,
        })?;
        Ok(Self::compile(&raw)?)
    }

    /// Compiles a schema written in JSON.
    pub fn from_json_str(text: &str) -> Result<Self, LoadError> {
        let raw: Value = serde_json::from_str(text).map_err(|source| LoadError::Json {
            path: PathBuf::from("<string>"),
            source,
        })?;
        Ok(Self::compile(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("s.yaml");
        let json = dir.path().join("s.json");
        fs::write(&yaml, "properties:\n  n: {type: integer, default: 1}\n").unwrap();
        fs::write(&json, r#"{"properties": {"n": {"type": "integer"}}}"#).unwrap();

        assert!(load_schema(&yaml).unwrap().tag_map().contains("--n"));
        assert!(load_schema(&json).unwrap().tag_map().contains("--n"));
    }

    #[test]
    fn test_yaml_keeps_property_order() {
        let yaml = "properties:\n  zz: {type: string}\n  aa: {type: string}\n";
        let schema = Schema::from_yaml_str(yaml).unwrap();
        let names: Vec<_> = schema.root().properties.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["zz", "aa"]);
    }

    #[test]
    fn test_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{").unwrap();

        let err = load_value(&broken).unwrap_err();
        assert!(matches!(err, LoadError::Json { .. }));
        assert!(err.to_string().contains("broken.json"));

        let missing = load_value(dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(missing, LoadError::Io { .. }));
    }

    #[test]
    fn test_compile_errors_pass_through() {
        let err = Schema::from_json_str(r#"{"type": "object"}"#).unwrap_err();
        assert!(matches!(err, LoadError::Compile(CompileError::MissingProperties { .. })));
    }
}
