//! Identifier validation errors

use thiserror::Error;

/// A malformed job component or batch id
///
/// Raised before any work begins, so an invalid identifier never produces
/// a partial side effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// The component was empty
    #[error("invalid {field} identifier: must not be empty")]
    Empty { field: &'static str },

    /// The component contained a character outside `[A-Za-z0-9_.-]`
    #[error("invalid {field} identifier {value:?}: character {character:?} is not allowed")]
    InvalidCharacter {
        field: &'static str,
        value: String,
        character: char,
    },

    /// The component names a relative directory (`.` or `..`)
    #[error("invalid {field} identifier {value:?}: reserved name")]
    Reserved { field: &'static str, value: String },
}

impl IdentifierError {
    /// Name of the offending field (`model`, `task`, `technique` or `batch`)
    pub fn field(&self) -> &'static str {
        match self {
            Self::Empty { field }
            | Self::InvalidCharacter { field, .. }
            | Self::Reserved { field, .. } => field,
        }
    }
}
