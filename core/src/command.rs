//! Command dispatch tree.
//!
//! A [`Command`] owns an optional schema and named subcommands. Running it
//! on command-line tokens descends into subcommands named by the leading
//! tokens, answers help, usage and version requests, and otherwise parses
//! and validates the remaining tokens into a configuration object.

use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::capability::Capabilities;
use crate::error::Result;
use crate::help::{HelpCommand, HelpStyle};
use crate::populate::Populator;
use crate::schema::Schema;
use crate::tags::parse_bool;
use crate::tokenize::{HelpKind, find_help, insert_at_path, tokenize};

/// What a command run produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Rendered full help.
    Help(String),
    /// Rendered usage line.
    Usage(String),
    /// The version string.
    Version(String),
    /// A validated configuration object for the command at `command_path`.
    Config {
        command_path: Vec<String>,
        config: Value,
    },
}

/// A named command with an optional schema and subcommands.
///
/// # Examples
///
/// ```
/// use argschema_core::{Capabilities, Command, Outcome, Schema};
/// use serde_json::json;
///
/// let build = Schema::compile(&json!({
///     "properties": {"jobs": {"type": "integer", "default": 1}}
/// }))
/// .unwrap();
/// let tool = Command::new("tool")
///     .with_version("1.2.0")
///     .with_subcommand(Command::new("build").with_schema(build));
/// let caps = Capabilities::builtin();
///
/// let outcome = tool.run(&["build", "--jobs", "4"], &caps).unwrap();
/// assert_eq!(
///     outcome,
///     Outcome::Config {
///         command_path: vec!["tool".into(), "build".into()],
///         config: json!({"jobs": 4}),
///     }
/// );
///
/// assert_eq!(tool.run(&["-V"], &caps).unwrap(), Outcome::Version("1.2.0".into()));
/// ```
#[derive(Debug)]
pub struct Command {
    name: String,
    title: String,
    schema: Option<Schema>,
    version: Option<String>,
    subcommands: Vec<Command>,
    style: HelpStyle,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: String::new(),
            schema: None,
            version: None,
            subcommands: Vec::new(),
            style: HelpStyle::default(),
        }
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Title used when the schema has none.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_subcommand(mut self, subcommand: Command) -> Self {
        self.subcommands.push(subcommand);
        self
    }

    pub fn with_style(mut self, style: HelpStyle) -> Self {
        self.style = style;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn find_subcommand(&self, name: &str) -> Option<&Command> {
        self.subcommands.iter().find(|sub| sub.name == name)
    }

    fn title(&self) -> &str {
        match &self.schema {
            Some(schema) if !schema.title().is_empty() => schema.title(),
            _ => &self.title,
        }
    }

    /// Help document of this command, shown under `command_path`.
    pub fn help(&self, command_path: &[String]) -> HelpCommand {
        let name = if command_path.is_empty() {
            self.name.clone()
        } else {
            command_path.join(" ")
        };
        let help = match &self.schema {
            Some(schema) => HelpCommand::from_schema(name, schema),
            None => HelpCommand::new(name),
        };
        help.with_title(self.title())
            .with_version(self.version.is_some())
            .with_subcommands(
                self.subcommands
                    .iter()
                    .map(|sub| (sub.name.clone(), sub.title().to_string()))
                    .collect(),
            )
    }

    /// Dispatches `tokens`.
    ///
    /// # Errors
    ///
    /// Fails when the tokens do not parse or the resulting object does not
    /// validate.
    pub fn run<S: AsRef<str>>(&self, tokens: &[S], capabilities: &Capabilities) -> Result<Outcome> {
        let mut command = self;
        let mut command_path = vec![self.name.clone()];
        let mut rest = tokens;
        while let Some((first, tail)) = rest.split_first() {
            let Some(sub) = command.find_subcommand(first.as_ref()) else {
                break;
            };
            command = sub;
            command_path.push(sub.name.clone());
            rest = tail;
        }
        debug!(command = %command_path.join(" "), tokens = rest.len(), "dispatching");

        if let Some(request) = find_help(rest) {
            let help = command.help(&command_path);
            let style = &command.style;
            return Ok(match request.kind {
                HelpKind::Help => Outcome::Help(help.render_help_with(request.level, style)),
                HelpKind::Usage => Outcome::Usage(help.render_usage_with(request.level, style)),
            });
        }

        if let Some(version) = &command.version {
            if rest.iter().any(|t| matches!(t.as_ref(), "-V" | "--version")) {
                return Ok(Outcome::Version(version.clone()));
            }
        }

        let config = command.parse(rest)?;
        let config = command.populate(config, capabilities)?;
        Ok(Outcome::Config {
            command_path,
            config,
        })
    }

    /// Tokenizes without validating. Commands without a schema use
    /// [`default_parse`].
    pub fn parse<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Value> {
        match &self.schema {
            Some(schema) => Ok(tokenize(tokens, schema.tag_map())?),
            None => Ok(default_parse(tokens)),
        }
    }

    /// Validates structured data directly, bypassing tokenization. Without
    /// a schema the value is returned unchanged.
    pub fn populate(&self, value: Value, capabilities: &Capabilities) -> Result<Value> {
        match &self.schema {
            Some(schema) => Ok(Populator::new(schema, capabilities).populate(value)?),
            None => Ok(value),
        }
    }
}

/// Permissive parser for commands without a schema.
///
/// `--a-b` starts a group whose values land at path `[a, b]`. Values are
/// read as integers, floats, booleans or strings, in that order of
/// preference. A group with no value stores `null`, one value stores it
/// as is, more values store a sequence. Values before the first flag are
/// ignored.
///
/// # Examples
///
/// ```
/// use argschema_core::default_parse;
/// use serde_json::json;
///
/// let config = default_parse(&[
///     "--out-dir", "build", "--jobs", "4", "--sizes", "1", "2.5", "--dry",
/// ]);
/// assert_eq!(
///     config,
///     json!({"out": {"dir": "build"}, "jobs": 4, "sizes": [1, 2.5], "dry": null})
/// );
/// ```
pub fn default_parse<S: AsRef<str>>(tokens: &[S]) -> Value {
    let mut config = Map::new();
    let mut key: Option<Vec<String>> = None;
    let mut values = Vec::new();

    for token in tokens.iter().map(AsRef::as_ref) {
        if let Some(flag) = token.strip_prefix("--") {
            if let Some(path) = key.take() {
                store(&mut config, &path, std::mem::take(&mut values));
            }
            key = Some(flag.split('-').map(String::from).collect());
        } else if key.is_some() {
            values.push(guess_value(token));
        } else {
            debug!(token, "ignoring value before the first flag");
        }
    }
    if let Some(path) = key {
        store(&mut config, &path, values);
    }

    Value::Object(config)
}

fn store(config: &mut Map<String, Value>, path: &[String], mut values: Vec<Value>) {
    let value = match values.len() {
        0 => Value::Null,
        1 => values.pop().unwrap_or(Value::Null),
        _ => Value::Array(values),
    };
    insert_at_path(config, path, value);
}

fn guess_value(raw: &str) -> Value {
    if let Ok(int) = raw.parse::<i64>() {
        return Value::from(int);
    }
    if let Some(float) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(float);
    }
    match parse_bool(raw) {
        Some(flag) => Value::Bool(flag),
        None => Value::String(raw.to_string()),
    }
}
