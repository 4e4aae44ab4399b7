//! Validation pipeline: structural validation, checks, actions and defaults.
//!
//! A configuration object is walked twice against the compiled schema. The
//! first walk runs checks and actions on the values the user supplied; the
//! second fills defaults. At every object level the order is:
//!
//! 1. structural validation of the node, then descent into present
//!    properties (and array items);
//! 2. checks on present properties;
//! 3. actions on present properties;
//! 4. defaults for absent properties, each inserted value validated by the
//!    same descent;
//! 5. `required` properties.
//!
//! Every step works on a private copy. A step that reports errors discards
//! its copy and stops the later steps of that level, so a failed action
//! never leaves a half-transformed object behind.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::capability::Capabilities;
use crate::schema::{Schema, SchemaNode};

/// Which user-value and default passes to run. Structural validation
/// always runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Passes {
    pub checks: bool,
    pub actions: bool,
    pub defaults: bool,
}

impl Passes {
    pub const ALL: Self = Self {
        checks: true,
        actions: true,
        defaults: true,
    };
    /// Checks and actions only.
    pub const USER_VALUES: Self = Self {
        checks: true,
        actions: true,
        defaults: false,
    };
    pub const DEFAULTS: Self = Self {
        checks: false,
        actions: false,
        defaults: true,
    };
    /// Structural validation only.
    pub const NONE: Self = Self {
        checks: false,
        actions: false,
        defaults: false,
    };
}

impl Default for Passes {
    fn default() -> Self {
        Self::ALL
    }
}

/// One step of an [`InstancePath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Location of a value inside a configuration object, rendered as
/// `$.group.files[2]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstancePath(Vec<PathSegment>);

impl InstancePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    fn key(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.to_string()));
        Self(segments)
    }

    fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }
}

impl fmt::Display for InstancePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.0 {
            match segment {
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// What produced a [`ValidationError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Type, enum, required and other JSON Schema assertions.
    Structural,
    /// A check rejected the value.
    Check { name: String },
    /// An action failed to transform the value.
    Action { name: String },
    /// A capability could not be looked up or constructed.
    Capability { name: String },
}

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {message}")]
pub struct ValidationError {
    pub path: InstancePath,
    pub kind: ValidationErrorKind,
    pub message: String,
}

impl ValidationError {
    fn new(path: &InstancePath, kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            path: path.clone(),
            kind,
            message: message.into(),
        }
    }
}

/// The ordered, non-empty list of failures of a populate request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", summarize(.errors))]
pub struct PopulateError {
    pub errors: Vec<ValidationError>,
}

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

type Outcome<T> = Result<T, Vec<ValidationError>>;

/// Validates and completes configuration objects against one schema.
///
/// # Examples
///
/// ```
/// use argschema_core::{Capabilities, Populator, Schema};
/// use serde_json::json;
///
/// let schema = Schema::compile(&json!({
///     "properties": {
///         "name": {"type": "string"},
///         "count": {"type": "integer", "default": 1}
///     }
/// }))
/// .unwrap();
/// let caps = Capabilities::builtin();
///
/// let config = Populator::new(&schema, &caps).populate(json!({"name": "alice"})).unwrap();
/// assert_eq!(config, json!({"name": "alice", "count": 1}));
///
/// let err = Populator::new(&schema, &caps).populate(json!({"count": "x"})).unwrap_err();
/// assert_eq!(err.errors.len(), 1);
/// assert!(err.to_string().starts_with("$.count: "));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Populator<'a> {
    schema: &'a Schema,
    capabilities: &'a Capabilities,
    passes: Passes,
}

impl<'a> Populator<'a> {
    pub fn new(schema: &'a Schema, capabilities: &'a Capabilities) -> Self {
        Self {
            schema,
            capabilities,
            passes: Passes::ALL,
        }
    }

    pub fn with_passes(mut self, passes: Passes) -> Self {
        self.passes = passes;
        self
    }

    /// Validates `instance` and returns its completed form.
    ///
    /// # Errors
    ///
    /// Returns every failure of the first step that failed.
    pub fn populate(&self, instance: Value) -> Result<Value, PopulateError> {
        self.run(&instance)
    }

    /// Like [`populate`](Self::populate), but replaces `instance` with the
    /// completed value. On failure `instance` is left untouched.
    pub fn populate_in_place(&self, instance: &mut Value) -> Result<(), PopulateError> {
        *instance = self.run(instance)?;
        Ok(())
    }

    fn run(&self, instance: &Value) -> Result<Value, PopulateError> {
        let root = self.schema.root();
        let path = InstancePath::root();
        let user = Passes {
            defaults: false,
            ..self.passes
        };

        let mut current = None;
        if user != Passes::NONE || !self.passes.defaults {
            let walk = Walk {
                capabilities: self.capabilities,
                passes: user,
                check_required: !self.passes.defaults,
            };
            current = Some(walk.visit(root, instance, &path).map_err(fail)?);
        }
        if self.passes.defaults {
            let walk = Walk {
                capabilities: self.capabilities,
                passes: Passes::DEFAULTS,
                check_required: true,
            };
            let input = current.as_ref().unwrap_or(instance);
            current = Some(walk.visit(root, input, &path).map_err(fail)?);
        }
        Ok(current.unwrap_or_else(|| instance.clone()))
    }
}

fn fail(errors: Vec<ValidationError>) -> PopulateError {
    debug!(errors = errors.len(), "populate failed");
    PopulateError { errors }
}

/// Runs every pass on `instance` with a fresh [`Populator`].
pub fn populate(
    instance: Value,
    schema: &Schema,
    capabilities: &Capabilities,
) -> Result<Value, PopulateError> {
    Populator::new(schema, capabilities).populate(instance)
}

struct Walk<'a> {
    capabilities: &'a Capabilities,
    passes: Passes,
    check_required: bool,
}

impl Walk<'_> {
    fn visit(&self, node: &SchemaNode, value: &Value, path: &InstancePath) -> Outcome<Value> {
        let errors: Vec<_> = node
            .structural_errors(value)
            .into_iter()
            .map(|message| ValidationError::new(path, ValidationErrorKind::Structural, message))
            .collect();
        if !errors.is_empty() {
            return Err(errors);
        }

        match value {
            Value::Object(map) if !node.properties.is_empty() || !node.required.is_empty() => {
                self.visit_object(node, map, path).map(Value::Object)
            }
            Value::Array(items) => match &node.items {
                Some(item_node) => self.visit_items(item_node, items, path),
                None => Ok(value.clone()),
            },
            _ => Ok(value.clone()),
        }
    }

    fn visit_items(
        &self,
        node: &SchemaNode,
        items: &[Value],
        path: &InstancePath,
    ) -> Outcome<Value> {
        let mut errors = Vec::new();
        let mut visited = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match self.visit(node, item, &path.index(index)) {
                Ok(value) => visited.push(value),
                Err(mut item_errors) => errors.append(&mut item_errors),
            }
        }
        if errors.is_empty() {
            Ok(Value::Array(visited))
        } else {
            Err(errors)
        }
    }

    fn visit_object(
        &self,
        node: &SchemaNode,
        map: &Map<String, Value>,
        path: &InstancePath,
    ) -> Outcome<Map<String, Value>> {
        let mut staged = map.clone();
        let mut errors = Vec::new();
        for (name, child) in &node.properties {
            let Some(current) = map.get(name) else {
                continue;
            };
            match self.visit(child, current, &path.key(name)) {
                Ok(value) => {
                    staged.insert(name.clone(), value);
                }
                Err(mut child_errors) => errors.append(&mut child_errors),
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        if self.passes.checks {
            self.run_checks(node, &staged, path)?;
        }
        if self.passes.actions {
            staged = self.run_actions(node, staged, path)?;
        }
        if self.passes.defaults {
            staged = self.fill_defaults(node, staged, path)?;
        }
        if self.check_required {
            check_required(node, &staged, path)?;
        }
        Ok(staged)
    }

    fn run_checks(
        &self,
        node: &SchemaNode,
        map: &Map<String, Value>,
        path: &InstancePath,
    ) -> Outcome<()> {
        let mut errors = Vec::new();
        for (name, child) in &node.properties {
            let Some(value) = map.get(name) else {
                continue;
            };
            let path = path.key(name);
            for invocation in &child.checks {
                let name = invocation.name.clone();
                let result = match self.capabilities.checks.instantiate(invocation) {
                    Ok(check) => check
                        .check(value)
                        .map_err(|e| (ValidationErrorKind::Check { name }, e)),
                    Err(e) => Err((ValidationErrorKind::Capability { name }, e)),
                };
                if let Err((kind, error)) = result {
                    debug!(path = %path, check = %invocation.name, "check failed");
                    errors.push(ValidationError::new(&path, kind, error.to_string()));
                }
            }
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    fn run_actions(
        &self,
        node: &SchemaNode,
        mut map: Map<String, Value>,
        path: &InstancePath,
    ) -> Outcome<Map<String, Value>> {
        let mut errors = Vec::new();
        for (name, child) in &node.properties {
            if child.actions.is_empty() {
                continue;
            }
            let Some(value) = map.get(name).cloned() else {
                continue;
            };
            match self.apply_actions(child, value, &path.key(name)) {
                Ok(value) => {
                    map.insert(name.clone(), value);
                }
                Err(error) => errors.push(error),
            }
        }
        if errors.is_empty() { Ok(map) } else { Err(errors) }
    }

    /// Threads `value` through the property's actions; stops at the first
    /// failure.
    fn apply_actions(
        &self,
        node: &SchemaNode,
        mut value: Value,
        path: &InstancePath,
    ) -> Result<Value, ValidationError> {
        for invocation in &node.actions {
            let name = invocation.name.clone();
            let action = self
                .capabilities
                .actions
                .instantiate(invocation)
                .map_err(|e| {
                    let kind = ValidationErrorKind::Capability { name: name.clone() };
                    ValidationError::new(path, kind, e.to_string())
                })?;
            value = action.apply(value).map_err(|e| {
                debug!(path = %path, action = %name, "action failed");
                let kind = ValidationErrorKind::Action { name: name.clone() };
                ValidationError::new(path, kind, e.to_string())
            })?;
        }
        Ok(value)
    }

    fn fill_defaults(
        &self,
        node: &SchemaNode,
        mut map: Map<String, Value>,
        path: &InstancePath,
    ) -> Outcome<Map<String, Value>> {
        let mut droppable = Vec::new();
        let mut errors = Vec::new();
        for (name, child) in &node.properties {
            if map.contains_key(name) {
                continue;
            }
            let inserted = match &child.default {
                Some(default) => default.clone(),
                None if child.is_object() => {
                    droppable.push(name.as_str());
                    Value::Object(Map::new())
                }
                None => continue,
            };
            match self.visit(child, &inserted, &path.key(name)) {
                Ok(value) => {
                    map.insert(name.clone(), value);
                }
                Err(mut default_errors) => errors.append(&mut default_errors),
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        for name in droppable {
            if map.get(name).and_then(Value::as_object).is_some_and(Map::is_empty) {
                map.shift_remove(name);
            }
        }
        Ok(map)
    }
}

fn check_required(node: &SchemaNode, map: &Map<String, Value>, path: &InstancePath) -> Outcome<()> {
    let errors: Vec<_> = node
        .required
        .iter()
        .filter(|name| !map.contains_key(name.as_str()))
        .map(|name| {
            ValidationError::new(
                path,
                ValidationErrorKind::Structural,
                format!("\"{name}\" is a required property"),
            )
        })
        .collect();
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
