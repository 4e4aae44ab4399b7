//! Crate-level error type.
//!
//! Every concern has its own error enum; [`Error`] unifies them for entry
//! points that cross concerns, such as [`Command::run`](crate::Command::run).

use thiserror::Error;

use crate::capability::{CapabilityError, RegistryError};
use crate::load::LoadError;
use crate::populate::PopulateError;
use crate::schema::CompileError;
use crate::tokenize::ParseError;

/// Errors from compiling, parsing, validating or loading.
#[derive(Debug, Error)]
pub enum Error {
    /// The schema document is malformed.
    #[error("invalid schema: {0}")]
    Compile(#[from] CompileError),

    /// Command-line tokens do not match the schema.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The configuration object failed validation.
    #[error("validation failed:\n{0}")]
    Populate(#[from] PopulateError),

    /// Registry bookkeeping failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A capability could not be built or run outside of a populate call.
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// A schema or data file could not be read.
    #[error(transparent)]
    Load(#[from] LoadError),
}

impl Error {
    /// Whether the error stems from user input rather than the schema or
    /// the environment.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::Populate(_))
    }
}

/// Convenience alias for results with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
