//! Registry error types.

use preview_core::{FieldId, FieldIdError};
use thiserror::Error;

/// Registry error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Operation on a field that was never registered.
    #[error("unknown binding: {0}")]
    UnknownBinding(FieldId),

    /// The field identifier could not be parsed.
    #[error("invalid field id: {0}")]
    InvalidField(#[from] FieldIdError),
}
