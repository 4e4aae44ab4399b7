//! Compiled schema model.
//!
//! A schema arrives as a JSON-Schema-shaped [`serde_json::Value`] (usually
//! read from YAML) carrying a few private extension keys:
//!
//! | key            | meaning                                              |
//! |----------------|------------------------------------------------------|
//! | `x-alias`      | extra command-line tags (string or list)             |
//! | `x-simpletag`  | do not prefix nested property names onto tags        |
//! | `x-help`       | help level at which the property becomes visible    |
//! | `x-check`      | checks to run on user-supplied values                |
//! | `x-action`     | actions to apply to user-supplied values             |
//!
//! [`Schema::compile`] turns it into a tree of [`SchemaNode`]s once, so the
//! tokenizer, the validation pipeline and the help renderer never
//! re-interpret raw extension values.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::invocation::{Invocation, json_kind, parse_invocations};
use crate::tags::{TagMap, compile_tag_map};

/// Keywords the validation pipeline handles itself; they are stripped from
/// the per-node structural validator.
///
/// `required` is checked once defaults are in place, and `default` values
/// are validated when they are inserted.
const PIPELINE_KEYWORDS: &[&str] = &["required", "default"];

/// Keywords that never assert anything.
const ANNOTATION_KEYWORDS: &[&str] = &[
    "$schema",
    "$id",
    "$comment",
    "title",
    "description",
    "examples",
    "definitions",
    "$defs",
];

/// Errors raised while compiling a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A schema node is not a mapping.
    #[error("schema node at {path} must be a mapping, got {found}")]
    NotAMapping { path: String, found: &'static str },
    /// An object-typed node does not declare `properties`.
    #[error("object schema at {path} has no properties")]
    MissingProperties { path: String },
    /// The `type` keyword names an unknown type.
    #[error("unknown type '{ty}' at {path}")]
    UnknownType { path: String, ty: String },
    /// An extension key holds a value of the wrong shape.
    #[error("invalid {key} at {path}: {reason}")]
    InvalidExtension {
        path: String,
        key: &'static str,
        reason: String,
    },
    /// An `x-check` / `x-action` entry is malformed.
    #[error("invalid {key} entry at {path}: {reason}")]
    InvalidInvocation {
        path: String,
        key: &'static str,
        reason: String,
    },
    /// The structural part of a node is not a valid JSON Schema.
    #[error("invalid schema at {path}: {message}")]
    InvalidSchema { path: String, message: String },
    /// Two properties resolve to the same command-line tag.
    #[error("tag {tag} is bound to both {first} and {second}")]
    DuplicateTag {
        tag: String,
        first: String,
        second: String,
    },
}

/// JSON Schema `type` names understood by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaType {
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,
    Null,
    /// No `type` keyword.
    #[default]
    Untyped,
}

impl SchemaType {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "object" => Self::Object,
            "array" => Self::Array,
            "string" => Self::String,
            "number" => Self::Number,
            "integer" => Self::Integer,
            "boolean" => Self::Boolean,
            "null" => Self::Null,
            "" => Self::Untyped,
            _ => return None,
        })
    }

    /// The JSON Schema spelling of this type (empty when untyped).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Null => "null",
            Self::Untyped => "",
        }
    }
}

/// One compiled node of a schema tree.
#[derive(Debug)]
pub struct SchemaNode {
    /// Declared types, in declaration order. Empty when untyped.
    pub types: Vec<SchemaType>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub default: Option<Value>,
    pub enum_values: Option<Vec<Value>>,
    pub items: Option<Box<SchemaNode>>,
    /// Child properties, in declaration order.
    pub properties: Vec<(String, SchemaNode)>,
    pub required: Vec<String>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub aliases: Vec<String>,
    pub simple_tag: Option<bool>,
    pub help_level: Option<u32>,
    pub checks: Vec<Invocation>,
    pub actions: Vec<Invocation>,
    validator: Option<jsonschema::Validator>,
}

impl SchemaNode {
    /// The first declared non-null type.
    pub fn primary_type(&self) -> SchemaType {
        self.types
            .iter()
            .copied()
            .find(|ty| *ty != SchemaType::Null)
            .unwrap_or_default()
    }

    pub fn is_object(&self) -> bool {
        self.primary_type() == SchemaType::Object
    }

    pub fn is_array(&self) -> bool {
        self.types.contains(&SchemaType::Array)
    }

    /// Looks up a direct child property.
    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, node)| node)
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// Runs the structural assertions of this node (not its children)
    /// against `value`, returning one message per violation.
    pub fn structural_errors(&self, value: &Value) -> Vec<String> {
        match &self.validator {
            Some(validator) => validator
                .iter_errors(value)
                .map(|error| error.to_string())
                .collect(),
            None => Vec::new(),
        }
    }
}

/// A compiled schema: the node tree plus its command-line tag map.
///
/// # Examples
///
/// ```
/// use argschema_core::Schema;
/// use serde_json::json;
///
/// let schema = Schema::compile(&json!({
///     "properties": {
///         "group": {"type": "object", "properties": {"size": {"type": "integer"}}}
///     }
/// }))
/// .unwrap();
///
/// let mapper = schema.tag_map().get("--group-size").unwrap();
/// assert_eq!(mapper.path, vec!["group", "size"]);
/// ```
#[derive(Debug)]
pub struct Schema {
    raw: Value,
    root: SchemaNode,
    tags: TagMap,
}

impl Schema {
    /// Compiles a raw schema document.
    ///
    /// # Errors
    ///
    /// Returns a [`CompileError`] when the document is malformed, when a
    /// structural sub-schema is rejected by the JSON Schema validator, or
    /// when two properties resolve to the same tag.
    pub fn compile(raw: &Value) -> Result<Self, CompileError> {
        let context = RootContext::new(raw);
        let root = compile_node(raw, "", &context, true)?;
        let tags = compile_tag_map(&root)?;
        debug!(tags = tags.len(), "compiled schema");
        Ok(Self {
            raw: raw.clone(),
            root,
            tags,
        })
    }

    pub fn root(&self) -> &SchemaNode {
        &self.root
    }

    /// The document this schema was compiled from.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn tag_map(&self) -> &TagMap {
        &self.tags
    }

    pub fn title(&self) -> &str {
        self.root.title.as_deref().unwrap_or_default()
    }

    pub fn description(&self) -> &str {
        self.root.description.as_deref().unwrap_or_default()
    }
}

/// Renders a dotted node path for error messages.
pub(crate) fn display_path(path: &str) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.to_string()
    }
}

/// Document-wide keywords every node's validator may need.
struct RootContext<'a> {
    dialect: Option<&'a Value>,
    definitions: Vec<(&'static str, &'a Value)>,
}

impl<'a> RootContext<'a> {
    fn new(raw: &'a Value) -> Self {
        let definitions = ["definitions", "$defs"]
            .into_iter()
            .filter_map(|key| raw.get(key).map(|value| (key, value)))
            .collect();
        Self {
            dialect: raw.get("$schema"),
            definitions,
        }
    }
}

fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}

fn compile_node(
    raw: &Value,
    path: &str,
    root: &RootContext<'_>,
    require_properties: bool,
) -> Result<SchemaNode, CompileError> {
    let Value::Object(map) = raw else {
        return Err(CompileError::NotAMapping {
            path: display_path(path),
            found: json_kind(raw),
        });
    };

    let types = parse_types(map.get("type"), path)?;
    let invalid_extension = |key: &'static str, reason: &str| CompileError::InvalidExtension {
        path: display_path(path),
        key,
        reason: reason.to_string(),
    };

    let mut properties = Vec::new();
    match map.get("properties") {
        Some(Value::Object(props)) => {
            for (name, child) in props {
                let node = compile_node(child, &child_path(path, name), root, true)?;
                properties.push((name.clone(), node));
            }
        }
        Some(_) => {
            return Err(CompileError::InvalidSchema {
                path: display_path(path),
                message: "properties must be a mapping".to_string(),
            });
        }
        None => {
            let is_object = types.iter().any(|ty| *ty == SchemaType::Object);
            if require_properties && (is_object || path.is_empty()) {
                return Err(CompileError::MissingProperties {
                    path: display_path(path),
                });
            }
        }
    }

    let items = match map.get("items") {
        Some(items @ Value::Object(_)) => Some(Box::new(compile_node(
            items,
            &format!("{}[]", display_path(path)),
            root,
            false,
        )?)),
        _ => None,
    };

    let aliases = match map.get("x-alias") {
        None => Vec::new(),
        Some(Value::String(alias)) => vec![alias.clone()],
        Some(Value::Array(list)) => list
            .iter()
            .map(|alias| {
                alias
                    .as_str()
                    .map(String::from)
                    .ok_or_else(|| invalid_extension("x-alias", "aliases must be strings"))
            })
            .collect::<Result<_, _>>()?,
        Some(_) => return Err(invalid_extension("x-alias", "expected a string or a list")),
    };

    let simple_tag = match map.get("x-simpletag") {
        None => None,
        Some(Value::Bool(flag)) => Some(*flag),
        Some(_) => return Err(invalid_extension("x-simpletag", "expected a boolean")),
    };

    let help_level = match map.get("x-help") {
        None => None,
        Some(level) => Some(
            level
                .as_u64()
                .and_then(|l| u32::try_from(l).ok())
                .ok_or_else(|| invalid_extension("x-help", "expected a non-negative integer"))?,
        ),
    };

    let checks = match map.get("x-check") {
        Some(value) => parse_invocations(value, "x-check", &display_path(path))?,
        None => Vec::new(),
    };
    let actions = match map.get("x-action") {
        Some(value) => parse_invocations(value, "x-action", &display_path(path))?,
        None => Vec::new(),
    };

    let required = map
        .get("required")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    Ok(SchemaNode {
        types,
        title: map.get("title").and_then(Value::as_str).map(String::from),
        description: map
            .get("description")
            .and_then(Value::as_str)
            .map(String::from),
        default: map.get("default").cloned(),
        enum_values: map.get("enum").and_then(Value::as_array).cloned(),
        items,
        properties,
        required,
        min_items: map.get("minItems").and_then(Value::as_u64),
        max_items: map.get("maxItems").and_then(Value::as_u64),
        aliases,
        simple_tag,
        help_level,
        checks,
        actions,
        validator: build_validator(map, path, root)?,
    })
}

fn parse_types(raw: Option<&Value>, path: &str) -> Result<Vec<SchemaType>, CompileError> {
    let unknown = |ty: &str| CompileError::UnknownType {
        path: display_path(path),
        ty: ty.to_string(),
    };
    match raw {
        None => Ok(Vec::new()),
        Some(Value::String(name)) => match SchemaType::parse(name).ok_or_else(|| unknown(name))? {
            SchemaType::Untyped => Ok(Vec::new()),
            ty => Ok(vec![ty]),
        },
        Some(Value::Array(names)) => names
            .iter()
            .map(|name| {
                name.as_str()
                    .and_then(SchemaType::parse)
                    .ok_or_else(|| unknown(&name.to_string()))
            })
            .collect(),
        Some(other) => Err(unknown(&other.to_string())),
    }
}

/// Builds the structural validator of one node.
///
/// The node keeps every JSON Schema keyword except the pipeline's own.
/// Declared property schemas and an object-form `items` schema are
/// replaced by `true`: the pipeline descends into them itself, while
/// keywords such as `additionalProperties` still see which keys are
/// declared. The root's `definitions`/`$defs` are attached so `$ref`
/// targets resolve; a reference that still does not resolve fails
/// compilation.
fn build_validator(
    map: &Map<String, Value>,
    path: &str,
    root: &RootContext<'_>,
) -> Result<Option<jsonschema::Validator>, CompileError> {
    let mut shallow = Map::new();
    for (key, value) in map {
        if PIPELINE_KEYWORDS.contains(&key.as_str()) || key.starts_with("x-") {
            continue;
        }
        let value = match (key.as_str(), value) {
            ("properties", Value::Object(props)) => Value::Object(
                props
                    .keys()
                    .map(|name| (name.clone(), Value::Bool(true)))
                    .collect(),
            ),
            ("items", Value::Object(_)) => Value::Bool(true),
            _ => value.clone(),
        };
        shallow.insert(key.clone(), value);
    }

    let asserts = shallow.iter().any(|(key, value)| match key.as_str() {
        "properties" => false,
        "items" => *value != Value::Bool(true),
        other => !ANNOTATION_KEYWORDS.contains(&other),
    });
    if !asserts {
        return Ok(None);
    }

    if shallow.contains_key("$ref") || shallow.values().any(contains_ref) {
        for (key, definitions) in &root.definitions {
            shallow
                .entry(key.to_string())
                .or_insert_with(|| (*definitions).clone());
        }
    }
    if let Some(dialect) = root.dialect {
        shallow.insert("$schema".to_string(), dialect.clone());
    }

    jsonschema::validator_for(&Value::Object(shallow))
        .map(Some)
        .map_err(|error| CompileError::InvalidSchema {
            path: display_path(path),
            message: error.to_string(),
        })
}

fn contains_ref(value: &Value) -> bool {
    match value {
        Value::Object(map) => map
            .iter()
            .any(|(key, child)| key == "$ref" || contains_ref(child)),
        Value::Array(items) => items.iter().any(contains_ref),
        _ => false,
    }
}
