#![forbid(unsafe_code)]

//! Node-level errors.

use std::fmt;

use crate::field::FieldName;
use crate::value::FieldKind;

/// Errors raised by schema construction and node field access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The node's schema declares no field with this name.
    UnknownField(FieldName),
    /// A value of the wrong kind was written to (or requested from) a field.
    TypeMismatch {
        field: FieldName,
        expected: FieldKind,
        found: FieldKind,
    },
    /// A schema declared the same field name twice.
    DuplicateField(FieldName),
    /// A handler is already registered for this field.
    DuplicateHandler(FieldName),
    /// A command with this name is already registered.
    DuplicateCommand(String),
    /// A schema tried to redeclare a built-in field.
    ReservedField(FieldName),
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownField(name) => write!(f, "unknown field '{name}'"),
            Self::TypeMismatch {
                field,
                expected,
                found,
            } => write!(
                f,
                "field '{field}' holds {expected} values, got {found}"
            ),
            Self::DuplicateField(name) => write!(f, "field '{name}' declared twice"),
            Self::DuplicateHandler(name) => {
                write!(f, "a handler for field '{name}' is already registered")
            }
            Self::DuplicateCommand(name) => {
                write!(f, "a command named '{name}' is already registered")
            }
            Self::ReservedField(name) => write!(f, "field '{name}' is built in"),
        }
    }
}

impl std::error::Error for StateError {}

/// Result alias for node-level operations.
pub type StateResult<T> = Result<T, StateError>;
