//! Named check and action capabilities.
//!
//! Schemas refer to capabilities by name (`x-check: FileExists`). A
//! [`Registry`] binds each name to a constructor that builds a capability
//! instance from the [`Arguments`] given in the schema. [`Capabilities`]
//! bundles the check and action registries and is passed by reference to
//! the validation pipeline; nothing here is global.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use argschema_core::{Action, Arguments, Capabilities, CapabilityError};
//! use serde_json::Value;
//!
//! struct Upper;
//!
//! impl Action for Upper {
//!     fn apply(&self, value: Value) -> Result<Value, CapabilityError> {
//!         match value {
//!             Value::String(s) => Ok(Value::String(s.to_uppercase())),
//!             other => Ok(other),
//!         }
//!     }
//! }
//!
//! let mut caps = Capabilities::builtin();
//! caps.actions
//!     .register_fn("Upper", |_: &Arguments| Ok(Box::new(Upper) as Box<dyn Action>))
//!     .unwrap();
//! assert!(caps.actions.has("Upper"));
//! let again = caps
//!     .actions
//!     .register_fn("Upper", |_: &Arguments| Ok(Box::new(Upper) as Box<dyn Action>));
//! assert!(again.is_err());
//! ```

pub mod actions;
pub mod checks;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::invocation::{Arguments, Invocation};

/// Errors from registry bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The name is already bound; unregister it first.
    #[error("a {kind} named '{name}' is already registered")]
    AlreadyRegistered { kind: &'static str, name: String },
    /// No capability is bound to the name.
    #[error("no {kind} named '{name}'")]
    NotFound { kind: &'static str, name: String },
}

/// Errors raised by capabilities, or while building them.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The schema passed arguments the capability cannot bind.
    #[error("invalid arguments for {capability}: {reason}")]
    InvalidArguments { capability: String, reason: String },
    /// A check rejected the value, or an action could not transform it.
    #[error("{0}")]
    Failed(String),
    /// Filesystem failure in an action.
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl CapabilityError {
    pub fn invalid_arguments(capability: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            capability: capability.to_string(),
            reason: reason.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A validation capability: inspects a value without modifying it.
pub trait Check: Send + Sync {
    /// Returns `Ok(())` when the value passes.
    fn check(&self, value: &Value) -> Result<(), CapabilityError>;
}

/// A transformation capability: maps a value to its replacement.
pub trait Action: Send + Sync {
    fn apply(&self, value: Value) -> Result<Value, CapabilityError>;
}

/// Builds a capability instance from schema arguments.
pub type Constructor<T> = Arc<dyn Fn(&Arguments) -> Result<Box<T>, CapabilityError> + Send + Sync>;

/// Identifies a registry entry by name or by constructor identity.
pub enum RegistryKey<'a, T: ?Sized + 'static> {
    Name(&'a str),
    Constructor(&'a Constructor<T>),
}

impl<'a, T: ?Sized + 'static> From<&'a str> for RegistryKey<'a, T> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

impl<'a, T: ?Sized + 'static> From<&'a String> for RegistryKey<'a, T> {
    fn from(name: &'a String) -> Self {
        Self::Name(name)
    }
}

impl<'a, T: ?Sized + 'static> From<&'a Constructor<T>> for RegistryKey<'a, T> {
    fn from(constructor: &'a Constructor<T>) -> Self {
        Self::Constructor(constructor)
    }
}

/// Name to constructor table for one kind of capability.
///
/// All lookups are O(1)-ish map operations; identity scans are linear.
pub struct Registry<T: ?Sized + 'static> {
    kind: &'static str,
    entries: BTreeMap<String, Constructor<T>>,
}

impl<T: ?Sized + 'static> Registry<T> {
    /// Creates an empty registry. `kind` names the capability kind in
    /// error messages.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    /// Binds `name` to `constructor`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyRegistered`] if `name` is bound.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        constructor: Constructor<T>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered {
                kind: self.kind,
                name,
            });
        }
        self.entries.insert(name, constructor);
        Ok(())
    }

    /// Convenience wrapper around [`register`](Self::register) for closures
    /// and functions.
    pub fn register_fn<F>(
        &mut self,
        name: impl Into<String>,
        constructor: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&Arguments) -> Result<Box<T>, CapabilityError> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(constructor))
    }

    /// Removes an entry by name or by constructor identity.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for an unknown name. Removing an
    /// unknown constructor is not an error.
    pub fn unregister<'a>(
        &mut self,
        key: impl Into<RegistryKey<'a, T>>,
    ) -> Result<(), RegistryError> {
        match key.into() {
            RegistryKey::Name(name) => self
                .entries
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| RegistryError::NotFound {
                    kind: self.kind,
                    name: name.to_string(),
                }),
            RegistryKey::Constructor(constructor) => {
                let found = self
                    .entries
                    .iter()
                    .find(|(_, bound)| Arc::ptr_eq(bound, constructor))
                    .map(|(name, _)| name.clone());
                if let Some(name) = found {
                    self.entries.remove(&name);
                }
                Ok(())
            }
        }
    }

    /// Returns the constructor bound to `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if `name` is not bound.
    pub fn lookup(&self, name: &str) -> Result<&Constructor<T>, RegistryError> {
        self.entries.get(name).ok_or_else(|| RegistryError::NotFound {
            kind: self.kind,
            name: name.to_string(),
        })
    }

    /// Whether a name or constructor is registered.
    pub fn has<'a>(&self, key: impl Into<RegistryKey<'a, T>>) -> bool {
        match key.into() {
            RegistryKey::Name(name) => self.entries.contains_key(name),
            RegistryKey::Constructor(constructor) => {
                self.entries.values().any(|bound| Arc::ptr_eq(bound, constructor))
            }
        }
    }

    /// Looks up and constructs the capability an invocation names.
    pub fn instantiate(&self, invocation: &Invocation) -> Result<Box<T>, CapabilityError> {
        let constructor = self.lookup(&invocation.name)?;
        constructor(&invocation.arguments)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: ?Sized + 'static> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("names", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The check and action registries used by the validation pipeline.
#[derive(Debug)]
pub struct Capabilities {
    pub checks: Registry<dyn Check>,
    pub actions: Registry<dyn Action>,
}

impl Capabilities {
    /// Registries with nothing registered.
    pub fn empty() -> Self {
        Self {
            checks: Registry::new("check"),
            actions: Registry::new("action"),
        }
    }

    /// Registries holding the built-in checks and actions.
    pub fn builtin() -> Self {
        let mut caps = Self::empty();
        caps.register_builtins().expect("built-in capability names are unique");
        caps
    }

    /// Registers the built-in checks and actions.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyRegistered`] if a built-in name is
    /// already bound.
    pub fn register_builtins(&mut self) -> Result<(), RegistryError> {
        for (name, constructor) in checks::builtins() {
            self.checks.register(name, constructor)?;
        }
        for (name, constructor) in actions::builtins() {
            self.actions.register(name, constructor)?;
        }
        Ok(())
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Applies `f` to a scalar, or to every element of a (nested) sequence.
pub(crate) fn for_each_scalar(
    value: &Value,
    f: &dyn Fn(&Value) -> Result<(), CapabilityError>,
) -> Result<(), CapabilityError> {
    match value {
        Value::Array(items) => items.iter().try_for_each(|item| for_each_scalar(item, f)),
        scalar => f(scalar),
    }
}

/// Maps `f` over a scalar, or over every element of a (nested) sequence.
pub(crate) fn map_scalars(
    value: Value,
    f: &dyn Fn(Value) -> Result<Value, CapabilityError>,
) -> Result<Value, CapabilityError> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| map_scalars(item, f))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        scalar => f(scalar),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct AlwaysFails;

    impl Check for AlwaysFails {
        fn check(&self, _: &Value) -> Result<(), CapabilityError> {
            Err(CapabilityError::failed("nope"))
        }
    }

    fn always_fails(_: &Arguments) -> Result<Box<dyn Check>, CapabilityError> {
        Ok(Box::new(AlwaysFails))
    }

    #[test]
    fn test_builtin_registries_are_populated() {
        let caps = Capabilities::builtin();
        let checks: Vec<_> = caps.checks.names().collect();
        assert_eq!(checks, vec!["DirExists", "FileExists", "PathExists"]);
        for name in [
            "Convert", "SetValue", "SetTrue", "SetFalse", "OpenFile", "MakeDir", "MakeList",
            "MakeTuple", "MakeDict",
        ] {
            assert!(caps.actions.has(name), "{name}");
        }
    }

    #[test]
    fn test_builtins_go_through_register() {
        let mut caps = Capabilities::empty();
        caps.checks.register_fn("FileExists", always_fails).unwrap();
        let err = caps.register_builtins().unwrap_err();
        assert_eq!(
            err,
            RegistryError::AlreadyRegistered {
                kind: "check",
                name: "FileExists".to_string()
            }
        );

        let mut caps = Capabilities::builtin();
        assert!(matches!(
            caps.register_builtins(),
            Err(RegistryError::AlreadyRegistered { kind: "check", .. })
        ));
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry: Registry<dyn Check> = Registry::new("check");
        registry.register_fn("Fails", always_fails).unwrap();
        let err = registry.register_fn("Fails", always_fails).unwrap_err();
        assert_eq!(
            err,
            RegistryError::AlreadyRegistered {
                kind: "check",
                name: "Fails".to_string()
            }
        );
    }

    #[test]
    fn test_unregister_by_name_and_identity() {
        let mut registry: Registry<dyn Check> = Registry::new("check");
        let constructor: Constructor<dyn Check> = Arc::new(always_fails);
        registry.register("A", constructor.clone()).unwrap();
        registry.register_fn("B", always_fails).unwrap();

        assert!(registry.has(&constructor));
        registry.unregister(&constructor).unwrap();
        assert!(!registry.has("A"));
        // unknown identity is silently ignored
        registry.unregister(&constructor).unwrap();

        registry.unregister("B").unwrap();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.unregister("B"),
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_lookup_missing_name_fails() {
        let registry: Registry<dyn Action> = Registry::new("action");
        let err = registry.lookup("Nope").err().unwrap();
        assert_eq!(err.to_string(), "no action named 'Nope'");
    }

    #[test]
    fn test_instantiate_runs_constructor() {
        let mut registry: Registry<dyn Check> = Registry::new("check");
        registry.register_fn("Fails", always_fails).unwrap();
        let check = registry.instantiate(&Invocation::named("Fails")).unwrap();
        assert_eq!(check.check(&json!(1)).unwrap_err().to_string(), "nope");
    }
}
