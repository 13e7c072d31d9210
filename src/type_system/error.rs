//! Defines the error types for the type system module.
use thiserror::Error;

/// Raised when annotation text cannot be read as a descriptor.
///
// Compilation itself never fails; only turning text into a descriptor can.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of annotation '{0}'")]
    UnexpectedEnd(String),
    #[error("unexpected '{found}' at offset {offset} in annotation '{text}'")]
    Unexpected {
        found: char,
        offset: usize,
        text: String,
    },
    #[error("invalid literal '{0}'")]
    InvalidLiteral(String),
}
