use crate::validation::TypeViolation;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// What an access attempt tried to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessAction {
    Read,
    Write,
    Call,
}

impl fmt::Display for AccessAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessAction::Read => "read",
            AccessAction::Write => "write",
            AccessAction::Call => "call",
        })
    }
}

/// A private name was touched from outside its class lineage.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("cannot {action} private attribute '{name}' of {class} from outside its class")]
pub struct AccessViolation {
    /// Class owning the private name.
    pub class: String,
    pub name: String,
    pub action: AccessAction,
}

/// Coarse category of a [`GuardError`], stable across message wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Type,
    Access,
    Attribute,
    Unsupported,
    Call,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GuardError {
    #[error(transparent)]
    Type(#[from] TypeViolation),
    #[error(transparent)]
    Access(#[from] AccessViolation),
    #[error("'{class}' object has no attribute '{name}'")]
    MissingAttribute { class: String, name: String },
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("call failed: {0}")]
    Call(String),
}

impl GuardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GuardError::Type(_) => ErrorKind::Type,
            GuardError::Access(_) => ErrorKind::Access,
            GuardError::MissingAttribute { .. } => ErrorKind::Attribute,
            GuardError::Unsupported(_) => ErrorKind::Unsupported,
            GuardError::Call(_) => ErrorKind::Call,
        }
    }

    /// The type violation, if this is one.
    pub fn as_type(&self) -> Option<&TypeViolation> {
        match self {
            GuardError::Type(v) => Some(v),
            _ => None,
        }
    }

    /// Structured form for hosts that log or ship errors as JSON.
    pub fn diagnostic(&self) -> serde_json::Value {
        let detail = match self {
            GuardError::Type(v) => serde_json::to_value(v).ok(),
            GuardError::Access(v) => serde_json::to_value(v).ok(),
            GuardError::MissingAttribute { class, name } => {
                Some(serde_json::json!({ "class": class, "name": name }))
            }
            GuardError::Unsupported(_) | GuardError::Call(_) => None,
        };
        serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
            "detail": detail,
        })
    }
}

pub type Result<T> = std::result::Result<T, GuardError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Subject;

    fn violation() -> TypeViolation {
        TypeViolation {
            subject: Subject::Argument("b".into()),
            expected: "int".into(),
            actual: "str".into(),
            repr: "'2'".into(),
            mismatch: None,
        }
    }

    #[test]
    fn test_type_errors_are_transparent() {
        let err = GuardError::from(violation());
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(err.to_string(), "Argument 'b' expected int, got str ('2')");
        assert!(err.as_type().is_some());
    }

    #[test]
    fn test_access_message() {
        let err = GuardError::from(AccessViolation {
            class: "Cat".into(),
            name: "_secret".into(),
            action: AccessAction::Write,
        });
        assert_eq!(err.kind(), ErrorKind::Access);
        assert_eq!(
            err.to_string(),
            "cannot write private attribute '_secret' of Cat from outside its class"
        );
    }

    #[test]
    fn test_diagnostic_shape() {
        let json = GuardError::from(violation()).diagnostic();
        assert_eq!(json["kind"], "type");
        assert_eq!(json["detail"]["subject"]["kind"], "argument");
        assert_eq!(json["detail"]["subject"]["name"], "b");
        assert_eq!(json["detail"]["expected"], "int");

        let missing = GuardError::MissingAttribute { class: "Cat".into(), name: "age".into() };
        assert_eq!(missing.diagnostic()["kind"], "attribute");
        assert_eq!(GuardError::Call("boom".into()).diagnostic()["detail"], serde_json::Value::Null);
    }
}
