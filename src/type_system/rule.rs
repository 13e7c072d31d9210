//! The compiled operation tree.
use crate::store::descriptor::write_joined;
use crate::store::{Value, ValueType};
use std::fmt;

/// A compiled, tagged representation of a type descriptor.
///
/// Rules are plain immutable data: once compiled they are shared across threads
/// behind an `Arc` and read without synchronization.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// Matches everything.
    Any,
    /// `type(value) == T`; no subtype is accepted.
    Exact(ValueType),
    /// `isinstance(value, T)`.
    InstanceOf(ValueType),
    /// At least one branch matches, tried left to right.
    Union(Vec<Rule>),
    List(Box<Rule>),
    Set(Box<Rule>),
    Dict(Box<Rule>, Box<Rule>),
    /// Arity is fixed at compile time.
    TupleFixed(Vec<Rule>),
    TupleVariadic(Box<Rule>),
    /// Value equality with one member.
    Literal(Vec<Value>),
}

impl Rule {
    pub fn is_any(&self) -> bool {
        matches!(self, Rule::Any)
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        1 + match self {
            Rule::Any | Rule::Exact(_) | Rule::InstanceOf(_) | Rule::Literal(_) => 0,
            Rule::Union(rules) | Rule::TupleFixed(rules) => rules.iter().map(Rule::size).sum(),
            Rule::List(elem) | Rule::Set(elem) | Rule::TupleVariadic(elem) => elem.size(),
            Rule::Dict(k, v) => k.size() + v.size(),
        }
    }
}

/// Label derived from the rule itself, used for mismatches below the top level.
impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Any => f.write_str("Any"),
            Rule::Exact(ty) | Rule::InstanceOf(ty) => f.write_str(ty.name()),
            Rule::Union(rules) => write_joined(f, rules, " | "),
            Rule::List(elem) => write!(f, "list[{}]", elem),
            Rule::Set(elem) => write!(f, "set[{}]", elem),
            Rule::Dict(k, v) => write!(f, "dict[{}, {}]", k, v),
            Rule::TupleFixed(rules) => {
                f.write_str("tuple[")?;
                write_joined(f, rules, ", ")?;
                f.write_str("]")
            }
            Rule::TupleVariadic(elem) => write!(f, "tuple[{}, ...]", elem),
            Rule::Literal(values) => {
                f.write_str("Literal[")?;
                write_joined(f, values, ", ")?;
                f.write_str("]")
            }
        }
    }
}
