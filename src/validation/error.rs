//! Defines the error types for the validation module.
use serde::Serialize;
use smallvec::SmallVec;
use std::fmt;
use thiserror::Error;

/// One step from a container down to the element that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PathSegment {
    /// Position in a list, tuple or set (iteration order).
    Index(usize),
    /// The dict key itself failed; holds the key's repr.
    Key(String),
    /// The value stored under a dict key failed; holds the key's repr.
    Entry(String),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(i) => write!(f, "[{}]", i),
            PathSegment::Key(k) => write!(f, "<key {}>", k),
            PathSegment::Entry(k) => write!(f, "[{}]", k),
        }
    }
}

/// Location of a mismatch inside a value, outermost segment first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValuePath(pub SmallVec<[PathSegment; 4]>);

impl ValuePath {
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for segment in &self.0 {
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

/// The first point at which a value failed its rule.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("at {path}: expected {expected}, got {actual}")]
pub struct Mismatch {
    pub path: ValuePath,
    /// Label of the rule that failed at `path`.
    pub expected: String,
    /// Runtime type name of the value found at `path`.
    pub actual: String,
}

/// What a type violation is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Subject {
    Argument(String),
    Return,
    Variable(String),
    Attribute(String),
}

impl Subject {
    pub fn name(&self) -> &str {
        match self {
            Subject::Argument(n) | Subject::Variable(n) | Subject::Attribute(n) => n,
            Subject::Return => "return",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Argument(n) => write!(f, "Argument '{}'", n),
            Subject::Return => f.write_str("Return value"),
            Subject::Variable(n) => write!(f, "Variable '{}'", n),
            Subject::Attribute(n) => write!(f, "Attribute '{}'", n),
        }
    }
}

/// A value broke a declared or inferred type contract.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{subject} expected {expected}, got {actual} ({repr}){}", detail(.mismatch))]
pub struct TypeViolation {
    pub subject: Subject,
    /// Declared (or inferred) label of the whole subject.
    pub expected: String,
    /// Runtime type name of the whole subject value.
    pub actual: String,
    /// Repr of the offending value.
    pub repr: String,
    /// Innermost failure, when it lies below the top level.
    pub mismatch: Option<Mismatch>,
}

fn detail(mismatch: &Option<Mismatch>) -> String {
    match mismatch {
        Some(m) if !m.path.is_root() => format!("; {}", m),
        _ => String::new(),
    }
}
