//! Built-in checks.
//!
//! Each check accepts a path or a (nested) sequence of paths and passes only
//! if every path passes.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use super::{CapabilityError, Check, Constructor, for_each_scalar};
use crate::invocation::{Arguments, json_kind};

/// Passes when the value names an existing regular file.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileExists;

/// Passes when the value names an existing directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirExists;

/// Passes when the value names an existing file or directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathExists;

impl Check for FileExists {
    fn check(&self, value: &Value) -> Result<(), CapabilityError> {
        each_path(value, Path::is_file, "File does not exist")
    }
}

impl Check for DirExists {
    fn check(&self, value: &Value) -> Result<(), CapabilityError> {
        each_path(value, Path::is_dir, "Directory does not exist")
    }
}

impl Check for PathExists {
    fn check(&self, value: &Value) -> Result<(), CapabilityError> {
        each_path(value, Path::exists, "Path does not exist")
    }
}

fn each_path(value: &Value, test: fn(&Path) -> bool, message: &str) -> Result<(), CapabilityError> {
    for_each_scalar(value, &|item: &Value| match item {
        Value::String(path) if test(Path::new(path)) => Ok(()),
        Value::String(path) => Err(CapabilityError::failed(format!("{message}: {path}"))),
        other => Err(CapabilityError::failed(format!(
            "expected a path, got {}",
            json_kind(other)
        ))),
    })
}

fn no_arguments<C: Check + Default + 'static>(name: &'static str) -> Constructor<dyn Check> {
    Arc::new(move |args: &Arguments| {
        args.expect_params(name, &[])?;
        Ok(Box::new(C::default()) as Box<dyn Check>)
    })
}

pub(crate) fn builtins() -> Vec<(&'static str, Constructor<dyn Check>)> {
    vec![
        ("FileExists", no_arguments::<FileExists>("FileExists")),
        ("DirExists", no_arguments::<DirExists>("DirExists")),
        ("PathExists", no_arguments::<PathExists>("PathExists")),
    ]
}
