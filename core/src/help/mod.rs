//! Leveled help documents built from a schema.
//!
//! The document mirrors the schema's object nesting: object properties
//! become [`Group`]s, every other property becomes a [`HelpOption`]. Each
//! entry carries a help level (`x-help`, inherited from the enclosing
//! group) and is only shown when the requested level reaches it. Rendering
//! lives in [`render`].
//!
//! # Examples
//!
//! ```
//! use argschema_core::{HelpCommand, Schema};
//! use serde_json::json;
//!
//! let schema = Schema::compile(&json!({
//!     "title": "Resize images",
//!     "properties": {
//!         "size": {"type": "integer", "default": 256, "description": "Output size"},
//!         "tuning": {"type": "object", "x-help": 1, "properties": {
//!             "quality": {"type": "number", "default": 0.9}
//!         }}
//!     }
//! }))
//! .unwrap();
//!
//! let help = HelpCommand::from_schema("resize", &schema);
//! assert_eq!(help.max_level(), 1);
//!
//! let basic = help.render_help(0);
//! assert!(basic.contains("--size"));
//! assert!(!basic.contains("--tuning-quality"));
//! assert!(help.render_help(1).contains("--tuning-quality"));
//! ```

pub mod render;

use serde_json::Value;

use crate::schema::{Schema, SchemaNode, SchemaType};
use crate::walk::WalkContext;

pub use render::HelpStyle;

/// Value type shown in the second column of an option row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionType {
    /// Accepted scalar type names, e.g. `["int"]`. Empty means any.
    Scalar(Vec<String>),
    /// Allowed values.
    Enum(Vec<String>),
}

impl OptionType {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self::Scalar(vec![name.into()])
    }

    fn from_types(types: &[SchemaType]) -> Self {
        Self::Scalar(types.iter().map(|ty| scalar_name(*ty).to_string()).collect())
    }

    fn from_enum(values: &[Value]) -> Self {
        Self::Enum(values.iter().map(display_value).collect())
    }

    /// `int`, `str|float`, `{fast, slow}`.
    pub fn render(&self) -> String {
        match self {
            Self::Scalar(names) if names.is_empty() => "any".to_string(),
            Self::Scalar(names) => names.join("|"),
            Self::Enum(values) => format!("{{{}}}", values.join(", ")),
        }
    }
}

fn scalar_name(ty: SchemaType) -> &'static str {
    match ty {
        SchemaType::Number => "float",
        SchemaType::Integer => "int",
        SchemaType::String => "str",
        SchemaType::Boolean => "bool",
        SchemaType::Untyped => "any",
        other => other.as_str(),
    }
}

/// Strings unquoted, everything else as compact JSON.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One flag with its value type and description.
#[derive(Debug, Clone, PartialEq)]
pub struct HelpOption {
    /// Aliases first, long tag last.
    pub tags: Vec<String>,
    pub value_type: OptionType,
    pub description: String,
    pub level: u32,
    pub default: Option<Value>,
    pub min_items: u64,
    /// `None` when unbounded.
    pub max_items: Option<u64>,
    pub required: bool,
}

impl HelpOption {
    pub fn new(tags: Vec<String>, value_type: OptionType) -> Self {
        Self {
            tags,
            value_type,
            description: String::new(),
            level: 0,
            default: None,
            min_items: 1,
            max_items: Some(1),
            required: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Number of values accepted after the flag.
    pub fn with_arity(mut self, min_items: u64, max_items: Option<u64>) -> Self {
        self.min_items = min_items;
        self.max_items = max_items;
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn is_visible(&self, level: u32) -> bool {
        self.level <= level
    }

    pub fn takes_value(&self) -> bool {
        self.max_items != Some(0)
    }

    fn is_multiple(&self) -> bool {
        self.max_items.is_none_or(|max| max > 1)
    }

    /// Second column: `[int]`, `str ...`, `[float] ... (< 3)`.
    pub fn type_column(&self) -> String {
        let mut column = self.value_type.render();
        if self.min_items == 0 {
            column = format!("[{column}]");
        }
        if self.is_multiple() {
            column.push_str(" ...");
            if let Some(max) = self.max_items {
                column.push_str(&format!(" (< {max})"));
            }
        }
        column
    }

    /// Third column: the description with whitespace collapsed, followed
    /// by the default value.
    pub fn description_column(&self) -> String {
        let mut column = self.description.split_whitespace().collect::<Vec<_>>().join(" ");
        if let Some(default) = &self.default {
            if !column.is_empty() {
                column.push(' ');
            }
            column.push_str(&format!("(default: {})", display_value(default)));
        }
        column
    }

    /// The three text columns of this option, or `None` when hidden at
    /// `level`.
    pub fn columns(&self, level: u32) -> Option<[String; 3]> {
        self.is_visible(level)
            .then(|| [self.tags.join(", "), self.type_column(), self.description_column()])
    }

    /// Usage fragment: `--size <int>`, `[--verbose]`, `[--files <str>...]`.
    pub fn synopsis(&self) -> String {
        let tag = self.tags.last().map(String::as_str).unwrap_or_default();
        let mut fragment = tag.to_string();
        if self.takes_value() {
            fragment.push_str(&format!(" <{}>", self.value_type.render()));
            if self.is_multiple() {
                fragment.push_str("...");
            }
        }
        if self.required {
            fragment
        } else {
            format!("[{fragment}]")
        }
    }
}

/// A child of a [`Group`].
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Group(Group),
    Option(HelpOption),
}

/// A titled, leveled list of options and nested groups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    pub title: String,
    pub description: String,
    pub level: u32,
    pub entries: Vec<Entry>,
}

impl Group {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn with_entries(mut self, entries: Vec<Entry>) -> Self {
        self.entries = entries;
        self
    }

    pub fn add_option(mut self, option: HelpOption) -> Self {
        self.entries.push(Entry::Option(option));
        self
    }

    pub fn add_group(mut self, group: Group) -> Self {
        self.entries.push(Entry::Group(group));
        self
    }

    pub fn is_visible(&self, level: u32) -> bool {
        self.level <= level
    }

    /// Highest level of the group and everything below it.
    pub fn max_level(&self) -> u32 {
        self.entries
            .iter()
            .map(|entry| match entry {
                Entry::Group(group) => group.max_level(),
                Entry::Option(option) => option.level,
            })
            .fold(self.level, u32::max)
    }

    /// Every option of the group and its nested groups, in document order.
    pub fn options(&self) -> Vec<&HelpOption> {
        let mut options = Vec::new();
        self.collect_options(&mut options);
        options
    }

    fn collect_options<'a>(&'a self, into: &mut Vec<&'a HelpOption>) {
        for entry in &self.entries {
            match entry {
                Entry::Group(group) => group.collect_options(into),
                Entry::Option(option) => into.push(option),
            }
        }
    }
}

/// Help for one command: title, description and its option tree.
#[derive(Debug, Clone, PartialEq)]
pub struct HelpCommand {
    /// Program or subcommand name used in the usage line.
    pub name: String,
    pub title: String,
    pub description: String,
    pub level: u32,
    pub has_version: bool,
    pub options: Group,
    /// `(name, title)` of each subcommand.
    pub subcommands: Vec<(String, String)>,
}

impl HelpCommand {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: String::new(),
            description: String::new(),
            level: 0,
            has_version: false,
            options: Group::default(),
            subcommands: Vec::new(),
        }
    }

    /// Builds the help document of a compiled schema.
    pub fn from_schema(name: impl Into<String>, schema: &Schema) -> Self {
        let root = schema.root();
        let ctx = WalkContext::root(root);
        let options = Group::default()
            .with_level(ctx.level)
            .with_entries(entries(root, &ctx));

        Self::new(name)
            .with_title(schema.title())
            .with_description(schema.description())
            .with_level(ctx.level)
            .with_options(options)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    /// Whether `-V, --version` is listed.
    pub fn with_version(mut self, has_version: bool) -> Self {
        self.has_version = has_version;
        self
    }

    pub fn with_options(mut self, options: Group) -> Self {
        self.options = options;
        self
    }

    pub fn add_option(mut self, option: HelpOption) -> Self {
        self.options.entries.push(Entry::Option(option));
        self
    }

    pub fn with_subcommands(mut self, subcommands: Vec<(String, String)>) -> Self {
        self.subcommands = subcommands;
        self
    }

    pub fn max_level(&self) -> u32 {
        self.options.max_level()
    }

    /// The synthesized `-h, --help` group.
    pub fn help_group(&self) -> Group {
        let max_level = self.max_level();
        let mut description = "Display this help.".to_string();
        let values = match max_level {
            0 => None,
            1 => Some("Value 1 shows".to_string()),
            2 => Some("Values in {1, 2} show".to_string()),
            3 => Some("Values in {1, 2, 3} show".to_string()),
            n => Some(format!("Values in 1..{n} show")),
        };
        if let Some(values) = values {
            description.push_str(&format!(" {values} more advanced options."));
        }
        let value_type = OptionType::scalar(if max_level == 0 { "bool" } else { "int" });

        Group::new("help").with_description("Display help").add_option(
            HelpOption::new(vec!["-h".to_string(), "--help".to_string()], value_type)
                .with_description(description)
                .with_arity(0, Some(1)),
        )
    }

    /// The synthesized `-V, --version` group.
    pub fn version_group(&self) -> Group {
        Group::new("version").with_description("Display version").add_option(
            HelpOption::new(
                vec!["-V".to_string(), "--version".to_string()],
                OptionType::scalar("bool"),
            )
            .with_description("Display the software version")
            .with_arity(0, Some(1)),
        )
    }
}

fn entries(node: &SchemaNode, ctx: &WalkContext) -> Vec<Entry> {
    node.properties
        .iter()
        .map(|(name, child)| {
            let child_ctx = ctx.enter(name, child);
            if child.is_object() {
                Entry::Group(
                    Group::new(name.clone())
                        .with_description(child.description.clone().unwrap_or_default())
                        .with_level(child_ctx.level)
                        .with_entries(entries(child, &child_ctx)),
                )
            } else {
                Entry::Option(option(child, &child_ctx).with_required(node.is_required(name)))
            }
        })
        .collect()
}

fn option(node: &SchemaNode, ctx: &WalkContext) -> HelpOption {
    let mut tags = node.aliases.clone();
    let long = ctx.long_tag();
    if !tags.contains(&long) {
        tags.push(long);
    }

    let (value_type, min, max) = if let Some(values) = &node.enum_values {
        (OptionType::from_enum(values), 1, Some(1))
    } else if node.is_array() {
        let value_type = match &node.items {
            Some(items) => match &items.enum_values {
                Some(values) => OptionType::from_enum(values),
                None => OptionType::from_types(&items.types),
            },
            None => OptionType::Scalar(Vec::new()),
        };
        (value_type, node.min_items.unwrap_or(0), node.max_items)
    } else if node.primary_type() == SchemaType::Boolean
        && node.default == Some(Value::Bool(false))
    {
        (OptionType::from_types(&node.types), 0, Some(0))
    } else {
        (OptionType::from_types(&node.types), 1, Some(1))
    };

    let mut option = HelpOption::new(tags, value_type)
        .with_description(node.description.clone().unwrap_or_default())
        .with_level(ctx.level)
        .with_arity(min, max);
    if let Some(default) = &node.default {
        option = option.with_default(default.clone());
    }
    option
}
