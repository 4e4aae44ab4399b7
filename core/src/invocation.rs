//! Check and action invocations declared in `x-check` / `x-action`.
//!
//! A declaration is either a bare capability name or a one-entry mapping
//! from the name to its arguments:
//!
//! ```yaml
//! x-action:
//!   - MakeList
//!   - Convert: [int]
//!   - MakeDir: {mode: 0o755, exist_ok: true}
//! ```
//!
//! Declarations are parsed once, when the schema is compiled, into
//! [`Invocation`] values.

use serde_json::{Map, Value};

use crate::capability::CapabilityError;
use crate::schema::CompileError;

/// Arguments attached to an [`Invocation`].
///
/// # Examples
///
/// ```
/// use argschema_core::Arguments;
/// use serde_json::json;
///
/// let args = Arguments::Positional(vec![json!("int")]);
/// assert_eq!(args.param(0, "dtype"), Some(&json!("int")));
///
/// let args = Arguments::Keyword(json!({"dtype": "float"}).as_object().unwrap().clone());
/// assert_eq!(args.param(0, "dtype"), Some(&json!("float")));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Arguments {
    /// Bare name, no arguments.
    #[default]
    None,
    /// Positional arguments, in declaration order.
    Positional(Vec<Value>),
    /// Keyword arguments.
    Keyword(Map<String, Value>),
}

impl Arguments {
    /// Returns parameter number `index`, or the keyword argument `name`.
    pub fn param(&self, index: usize, name: &str) -> Option<&Value> {
        match self {
            Self::None => None,
            Self::Positional(values) => values.get(index),
            Self::Keyword(map) => map.get(name),
        }
    }

    /// Number of arguments supplied.
    pub fn len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Positional(values) => values.len(),
            Self::Keyword(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rejects arguments that do not bind to one of `params`.
    pub fn expect_params(&self, capability: &str, params: &[&str]) -> Result<(), CapabilityError> {
        match self {
            Self::None => Ok(()),
            Self::Positional(values) if values.len() > params.len() => {
                Err(CapabilityError::invalid_arguments(
                    capability,
                    format!(
                        "takes at most {} argument(s), got {}",
                        params.len(),
                        values.len()
                    ),
                ))
            }
            Self::Positional(_) => Ok(()),
            Self::Keyword(map) => match map.keys().find(|k| !params.contains(&k.as_str())) {
                Some(unexpected) => Err(CapabilityError::invalid_arguments(
                    capability,
                    format!("unexpected keyword argument '{unexpected}'"),
                )),
                None => Ok(()),
            },
        }
    }

    /// Like [`param`](Self::param), but fails when the parameter is missing.
    pub fn required(
        &self,
        capability: &str,
        index: usize,
        name: &str,
    ) -> Result<&Value, CapabilityError> {
        self.param(index, name).ok_or_else(|| {
            CapabilityError::invalid_arguments(capability, format!("missing argument '{name}'"))
        })
    }
}

/// A named capability together with the arguments it is constructed with.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub name: String,
    pub arguments: Arguments,
}

impl Invocation {
    /// Creates an invocation without arguments.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Arguments::None,
        }
    }

    pub fn with_arguments(mut self, arguments: Arguments) -> Self {
        self.arguments = arguments;
        self
    }
}

/// Parses the value of an `x-check` / `x-action` key.
///
/// Accepts a single declaration or a list of declarations.
pub(crate) fn parse_invocations(
    value: &Value,
    key: &'static str,
    path: &str,
) -> Result<Vec<Invocation>, CompileError> {
    match value {
        Value::Array(entries) => entries
            .iter()
            .map(|entry| parse_invocation(entry, key, path))
            .collect(),
        single => Ok(vec![parse_invocation(single, key, path)?]),
    }
}

fn parse_invocation(
    entry: &Value,
    key: &'static str,
    path: &str,
) -> Result<Invocation, CompileError> {
    let invalid = |reason: String| CompileError::InvalidInvocation {
        path: path.to_string(),
        key,
        reason,
    };

    match entry {
        Value::String(name) => Ok(Invocation::named(name.clone())),
        Value::Object(map) if map.len() == 1 => {
            let Some((name, args)) = map.iter().next() else {
                return Err(invalid("empty mapping".to_string()));
            };
            let arguments = match args {
                Value::Null => Arguments::None,
                Value::Array(values) => Arguments::Positional(values.clone()),
                Value::Object(kwargs) => Arguments::Keyword(kwargs.clone()),
                scalar => Arguments::Positional(vec![scalar.clone()]),
            };
            Ok(Invocation::named(name.clone()).with_arguments(arguments))
        }
        Value::Object(map) => Err(invalid(format!(
            "expected a name or a one-entry mapping, got a {}-entry mapping",
            map.len()
        ))),
        other => Err(invalid(format!(
            "expected a name or a one-entry mapping, got {}",
            json_kind(other)
        ))),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_bare_name_has_no_arguments() {
        let parsed = parse_invocations(&json!("SetTrue"), "x-action", "flag").unwrap();
        assert_eq!(parsed, vec![Invocation::named("SetTrue")]);
    }

    #[test]
    fn test_mapping_with_sequence_is_positional() {
        let parsed = parse_invocations(&json!([{"Convert": ["int"]}]), "x-action", "n").unwrap();
        assert_eq!(
            parsed[0].arguments,
            Arguments::Positional(vec![json!("int")])
        );
    }

    #[test]
    fn test_mapping_with_mapping_is_keyword() {
        let parsed =
            parse_invocations(&json!({"MakeDir": {"exist_ok": false}}), "x-action", "out").unwrap();
        assert_eq!(parsed[0].name, "MakeDir");
        assert_eq!(parsed[0].arguments.param(1, "exist_ok"), Some(&json!(false)));
    }

    #[test]
    fn test_scalar_argument_is_single_positional() {
        let parsed = parse_invocations(&json!({"Convert": "float"}), "x-action", "n").unwrap();
        assert_eq!(parsed[0].arguments.param(0, "dtype"), Some(&json!("float")));
    }

    #[test]
    fn test_rejects_multi_entry_mapping() {
        let err = parse_invocations(&json!([{"A": [], "B": []}]), "x-check", "p").unwrap_err();
        assert!(matches!(err, CompileError::InvalidInvocation { key: "x-check", .. }));
    }

    #[test]
    fn test_rejects_non_string_entry() {
        let err = parse_invocations(&json!([3]), "x-check", "p").unwrap_err();
        assert!(err.to_string().contains("a number"));
    }

    #[test]
    fn test_expect_params_rejects_extra_arguments() {
        let args = Arguments::Positional(vec![json!(1), json!(2)]);
        assert!(args.expect_params("SetValue", &["value"]).is_err());

        let args = Arguments::Keyword(json!({"colour": 1}).as_object().unwrap().clone());
        assert!(args.expect_params("SetValue", &["value"]).is_err());
    }
}
