//! Argument tokenizer: command-line tokens to a raw configuration object.
//!
//! Tokens are consumed left to right. Each group starts with a tag known to
//! the [`TagMap`] and greedily takes every following token up to the next
//! known tag. Scalar tags accept zero values (meaning `true`) or one value;
//! array tags store all of their values. A repeated tag overwrites the
//! previous occurrence.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::tags::TagMap;

/// Errors raised while tokenizing command-line arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A token in tag position is not a known tag.
    #[error("unknown flag: {0}")]
    UnknownFlag(String),
    /// A value cannot be converted to the declared item type.
    #[error("invalid value '{value}' for {tag}: expected {expected}")]
    InvalidValue {
        tag: String,
        value: String,
        expected: &'static str,
    },
    /// A scalar tag was followed by several values.
    #[error("{tag} takes a single value, got {count}")]
    TooManyValues { tag: String, count: usize },
}

/// Tokenizes `tokens` into a configuration object.
///
/// # Errors
///
/// Fails on the first unknown tag, unconvertible value, or scalar tag with
/// more than one value.
///
/// # Examples
///
/// ```
/// use argschema_core::{Schema, tokenize};
/// use serde_json::json;
///
/// let schema = Schema::compile(&json!({
///     "properties": {
///         "name": {"type": "string"},
///         "verbose": {"type": "boolean"},
///         "sizes": {"type": "array", "items": {"type": "integer"}}
///     }
/// }))
/// .unwrap();
///
/// let tokens = ["--name", "alice", "--verbose", "--sizes", "1", "2"];
/// let config = tokenize(tokens.as_slice(), schema.tag_map()).unwrap();
/// assert_eq!(config, json!({"name": "alice", "verbose": true, "sizes": [1, 2]}));
/// ```
pub fn tokenize<S: AsRef<str>>(tokens: &[S], tags: &TagMap) -> Result<Value, ParseError> {
    let mut config = Map::new();
    let mut rest = tokens.iter().map(AsRef::as_ref).peekable();

    while let Some(tag) = rest.next() {
        let mapper = tags
            .get(tag)
            .ok_or_else(|| ParseError::UnknownFlag(tag.to_string()))?;

        let mut values = Vec::new();
        while let Some(raw) = rest.next_if(|next| !tags.contains(next)) {
            let value = mapper
                .item
                .coerce(raw)
                .ok_or_else(|| ParseError::InvalidValue {
                    tag: tag.to_string(),
                    value: raw.to_string(),
                    expected: mapper.item.name(),
                })?;
            values.push(value);
        }

        let value = if mapper.is_array {
            Value::Array(values)
        } else {
            match values.len() {
                0 => Value::Bool(true),
                1 => values.pop().unwrap_or(Value::Null),
                count => {
                    return Err(ParseError::TooManyValues {
                        tag: tag.to_string(),
                        count,
                    });
                }
            }
        };

        debug!(tag, path = %mapper.path.join("."), "consumed flag");
        insert_at_path(&mut config, &mapper.path, value);
    }

    Ok(Value::Object(config))
}

/// Inserts `value` at `path`, creating intermediate mappings as needed.
///
/// An intermediate that exists but is not a mapping is replaced.
pub fn insert_at_path(target: &mut Map<String, Value>, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut current = target;
    for key in parents {
        let slot = current
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        current = next;
    }
    current.insert(last.clone(), value);
}

/// Reads the value stored at `path`, if any.
pub fn value_at_path<'v>(value: &'v Value, path: &[String]) -> Option<&'v Value> {
    path.iter().try_fold(value, |current, key| current.get(key))
}

/// Re-serializes a configuration object into tag/value tokens.
///
/// Only locations that some tag maps to are emitted, each under its
/// canonical tag. A scalar `true` is emitted as a bare tag.
pub fn to_tokens(config: &Value, tags: &TagMap) -> Vec<String> {
    let mut tokens = Vec::new();
    for mapper in tags.canonical() {
        let Some(value) = value_at_path(config, &mapper.path) else {
            continue;
        };
        tokens.push(mapper.tag.clone());
        match value {
            Value::Bool(true) if !mapper.is_array => {}
            Value::Array(items) => tokens.extend(items.iter().map(scalar_token)),
            other => tokens.push(scalar_token(other)),
        }
    }
    tokens
}

fn scalar_token(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Which help rendering was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpKind {
    /// `--help` / `-h`: full help.
    Help,
    /// `--usage`: compact usage.
    Usage,
}

/// A help or usage request found among the tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelpRequest {
    pub kind: HelpKind,
    pub level: u32,
}

/// Looks for `--help`, `-h` or `--usage` anywhere in `tokens`.
///
/// The token following the flag selects the help level when it is a
/// non-negative integer; otherwise the level is 0.
///
/// # Examples
///
/// ```
/// use argschema_core::{HelpKind, find_help};
///
/// let request = find_help(&["--name", "x", "-h", "2"]).unwrap();
/// assert_eq!(request.kind, HelpKind::Help);
/// assert_eq!(request.level, 2);
///
/// assert!(find_help(&["--name", "x"]).is_none());
/// ```
pub fn find_help<S: AsRef<str>>(tokens: &[S]) -> Option<HelpRequest> {
    let (index, kind) = tokens
        .iter()
        .enumerate()
        .find_map(|(i, token)| match token.as_ref() {
            "--help" | "-h" => Some((i, HelpKind::Help)),
            "--usage" => Some((i, HelpKind::Usage)),
            _ => None,
        })?;

    let level = tokens
        .get(index + 1)
        .and_then(|next| next.as_ref().parse::<u32>().ok())
        .unwrap_or(0);

    Some(HelpRequest { kind, level })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::Schema;

    fn schema() -> Schema {
        Schema::compile(&json!({
            "properties": {
                "name": {"type": "string", "x-alias": "-n"},
                "count": {"type": "integer"},
                "ratio": {"type": "number"},
                "verbose": {"type": "boolean"},
                "files": {"type": "array", "items": {"type": "string"}},
                "group": {"type": "object", "properties": {
                    "size": {"type": "integer"},
                    "label": {"type": "string"}
                }}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_scalar_without_value_is_true() {
        let schema = schema();
        let config = tokenize(&["--verbose"], schema.tag_map()).unwrap();
        assert_eq!(config, json!({"verbose": true}));
    }

    #[test]
    fn test_nested_paths_are_created() {
        let schema = schema();
        let config = tokenize(
            &["--group-size", "3", "--group-label", "x", "-n", "bob"],
            schema.tag_map(),
        )
        .unwrap();
        assert_eq!(
            config,
            json!({"group": {"size": 3, "label": "x"}, "name": "bob"})
        );
    }

    #[test]
    fn test_array_collects_until_next_tag() {
        let schema = schema();
        let tokens = ["--files", "a", "b", "c", "--count", "1"];
        let config = tokenize(tokens.as_slice(), schema.tag_map()).unwrap();
        assert_eq!(config, json!({"files": ["a", "b", "c"], "count": 1}));

        let config = tokenize(&["--files"], schema.tag_map()).unwrap();
        assert_eq!(config, json!({"files": []}));
    }

    #[test]
    fn test_last_occurrence_wins() {
        let schema = schema();
        let config = tokenize(&["--count", "1", "--count", "2"], schema.tag_map()).unwrap();
        assert_eq!(config, json!({"count": 2}));
    }

    #[test]
    fn test_unknown_flag_is_reported() {
        let schema = schema();
        let err = tokenize(&["--nope"], schema.tag_map()).unwrap_err();
        assert_eq!(err, ParseError::UnknownFlag("--nope".to_string()));

        // a leading value is in tag position too
        let err = tokenize(&["alice"], schema.tag_map()).unwrap_err();
        assert_eq!(err, ParseError::UnknownFlag("alice".to_string()));
    }

    #[test]
    fn test_coercion_failure_is_reported() {
        let schema = schema();
        let err = tokenize(&["--count", "many"], schema.tag_map()).unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidValue {
                tag: "--count".to_string(),
                value: "many".to_string(),
                expected: "integer",
            }
        );
    }

    #[test]
    fn test_scalar_with_two_values_is_rejected() {
        let schema = schema();
        let err = tokenize(&["--name", "a", "b"], schema.tag_map()).unwrap_err();
        assert!(matches!(err, ParseError::TooManyValues { count: 2, .. }));
    }

    #[test]
    fn test_insert_replaces_scalar_intermediate() {
        let mut map = Map::new();
        map.insert("a".to_string(), json!(1));
        insert_at_path(&mut map, &["a".to_string(), "b".to_string()], json!(2));
        assert_eq!(Value::Object(map), json!({"a": {"b": 2}}));
    }

    #[test]
    fn test_tokens_round_trip() {
        let schema = schema();
        let input = [
            "--name", "alice", "--ratio", "0.5", "--verbose", "--files", "x", "y", "--group-size",
            "4",
        ];
        let config = tokenize(&input, schema.tag_map()).unwrap();
        let tokens = to_tokens(&config, schema.tag_map());
        let again = tokenize(tokens.as_slice(), schema.tag_map()).unwrap();
        assert_eq!(config, again);
    }

    #[test]
    fn test_find_help_variants() {
        assert_eq!(
            find_help(&["--usage"]),
            Some(HelpRequest {
                kind: HelpKind::Usage,
                level: 0
            })
        );
        assert_eq!(find_help(&["-h", "oops"]).map(|r| r.level), Some(0));
        assert_eq!(find_help(&["--help", "3"]).map(|r| r.level), Some(3));
    }
}
