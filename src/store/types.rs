use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A unique, process-wide identifier for a registered class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(pub u64);

impl ClassId {
    /// Allocates a fresh identifier. Ids are never reused.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Runtime type tag of a [`Value`](super::Value).
///
/// `Exact` rules compare tags for equality, while `InstanceOf` rules also honour the
/// host subtype relation (`bool <: int`, class lineage).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    NoneType,
    Bool,
    Int,
    Float,
    Str,
    Bytes,
    List,
    Tuple,
    Set,
    Dict,
    Class { id: ClassId, name: String },
    /// A host type the value model does not describe.
    Opaque(String),
}

impl ValueType {
    /// Scalar kinds whose `InstanceOf` rule is upgraded to `Exact` after compilation.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            ValueType::NoneType
                | ValueType::Bool
                | ValueType::Int
                | ValueType::Float
                | ValueType::Str
        )
    }

    pub fn name(&self) -> &str {
        match self {
            ValueType::NoneType => "None",
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Str => "str",
            ValueType::Bytes => "bytes",
            ValueType::List => "list",
            ValueType::Tuple => "tuple",
            ValueType::Set => "set",
            ValueType::Dict => "dict",
            ValueType::Class { name, .. } | ValueType::Opaque(name) => name,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
