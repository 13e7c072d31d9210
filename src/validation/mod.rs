//! Checks runtime values against compiled rules.
//!
//! The walk builds no path while a value conforms; the path to the first offending
//! element is assembled only on the way back out of a failure.

pub use self::error::{Mismatch, PathSegment, Subject, TypeViolation, ValuePath};
pub use self::validator::{matches, validate, validate_all};

// --- MODULE DECLARATIONS ---
mod error;
mod validator;
