//! Schema-driven command-line parsing, validation and help.
//!
//! One JSON-Schema-shaped document drives three things:
//!
//! - a command-line tokenizer: the [`TagMap`] compiled from the schema maps
//!   flags such as `--group-size` to paths in a nested configuration
//!   object ([`tokenize`]);
//! - a validation pipeline ([`Populator`]) that runs structural
//!   validation, then the schema's `x-check` checks and `x-action`
//!   actions on user-supplied values, then fills defaults, committing each
//!   step only when it succeeds;
//! - a leveled help and usage renderer ([`HelpCommand`]).
//!
//! Checks and actions are named capabilities looked up in an explicit
//! [`Capabilities`] value. [`Command`] ties everything together into a
//! dispatch tree with subcommands.
//!
//! # Example
//!
//! ```
//! use argschema_core::*;
//! use serde_json::json;
//!
//! let schema = Schema::compile(&json!({
//!     "title": "Greeter",
//!     "properties": {
//!         "name": {"type": "string", "x-alias": "-n"},
//!         "count": {"type": "integer", "default": 1},
//!         "loud": {"type": "boolean", "default": false, "x-help": 1}
//!     }
//! }))
//! .unwrap();
//! let caps = Capabilities::builtin();
//!
//! let raw = tokenize(&["-n", "alice"], schema.tag_map()).unwrap();
//! let config = Populator::new(&schema, &caps).populate(raw).unwrap();
//! assert_eq!(config, json!({"name": "alice", "count": 1, "loud": false}));
//!
//! let help = HelpCommand::from_schema("greet", &schema).render_help(0);
//! assert!(help.contains("-n, --name"));
//! assert!(!help.contains("--loud"));
//! ```

pub mod capability;
mod command;
mod error;
pub mod help;
mod invocation;
mod load;
mod populate;
mod schema;
mod tags;
mod tokenize;
mod walk;

pub use capability::{
    Action, Capabilities, CapabilityError, Check, Constructor, Registry, RegistryError, RegistryKey,
};
pub use command::{Command, Outcome, default_parse};
pub use error::{Error, Result};
pub use help::{Entry, Group, HelpCommand, HelpOption, HelpStyle, OptionType};
pub use invocation::{Arguments, Invocation};
pub use load::{LoadError, load_schema, load_value};
pub use populate::{
    InstancePath, Passes, PathSegment, PopulateError, Populator, ValidationError,
    ValidationErrorKind, populate,
};
pub use schema::{CompileError, Schema, SchemaNode, SchemaType};
pub use tags::{ArgMapper, ItemKind, TagMap, compile_tag_map};
pub use tokenize::{
    HelpKind, HelpRequest, ParseError, find_help, insert_at_path, to_tokens, tokenize,
    value_at_path,
};
