//! Declared type expectations, as handed over by the annotation source.
use super::types::ClassId;
use super::value::Value;
use std::fmt;

/// Built-in type constructors a descriptor can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
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
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::NoneType => "None",
            Builtin::Bool => "bool",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Str => "str",
            Builtin::Bytes => "bytes",
            Builtin::List => "list",
            Builtin::Tuple => "tuple",
            Builtin::Set => "set",
            Builtin::Dict => "dict",
        }
    }

    /// Looks a builtin up by any of its annotation spellings.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "None" | "NoneType" => Builtin::NoneType,
            "bool" => Builtin::Bool,
            "int" => Builtin::Int,
            "float" => Builtin::Float,
            "str" => Builtin::Str,
            "bytes" => Builtin::Bytes,
            "list" | "List" => Builtin::List,
            "tuple" | "Tuple" => Builtin::Tuple,
            "set" | "Set" => Builtin::Set,
            "dict" | "Dict" => Builtin::Dict,
            _ => return None,
        })
    }
}

/// Reference to a registered class, by identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassRef {
    pub id: ClassId,
    pub name: String,
}

/// The externally-declared type expectation of a parameter, return value or attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    Any,
    /// A bare builtin: `int`, or an unparameterized `list`.
    Builtin(Builtin),
    Class(ClassRef),
    /// A parameterized builtin: `list[int]`, `dict[str, float]`, `tuple[int, ...]`.
    Generic(Builtin, Vec<TypeDescriptor>),
    Union(Vec<TypeDescriptor>),
    Literal(Vec<Value>),
    /// `Annotated[T, ...]`; only `T` is enforced.
    Annotated(Box<TypeDescriptor>, Vec<String>),
    /// The trailing `...` of a variadic tuple.
    Ellipsis,
    /// A form the annotation source could not resolve. Never enforced.
    Unresolved(String),
}

impl TypeDescriptor {
    pub fn int() -> Self {
        TypeDescriptor::Builtin(Builtin::Int)
    }

    pub fn float() -> Self {
        TypeDescriptor::Builtin(Builtin::Float)
    }

    pub fn str() -> Self {
        TypeDescriptor::Builtin(Builtin::Str)
    }

    pub fn bool() -> Self {
        TypeDescriptor::Builtin(Builtin::Bool)
    }

    pub fn bytes() -> Self {
        TypeDescriptor::Builtin(Builtin::Bytes)
    }

    pub fn none() -> Self {
        TypeDescriptor::Builtin(Builtin::NoneType)
    }

    pub fn list_of(elem: TypeDescriptor) -> Self {
        TypeDescriptor::Generic(Builtin::List, vec![elem])
    }

    pub fn set_of(elem: TypeDescriptor) -> Self {
        TypeDescriptor::Generic(Builtin::Set, vec![elem])
    }

    pub fn dict_of(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        TypeDescriptor::Generic(Builtin::Dict, vec![key, value])
    }

    pub fn tuple_of(elems: Vec<TypeDescriptor>) -> Self {
        TypeDescriptor::Generic(Builtin::Tuple, elems)
    }

    /// `tuple[elem, ...]`
    pub fn tuple_variadic(elem: TypeDescriptor) -> Self {
        TypeDescriptor::Generic(Builtin::Tuple, vec![elem, TypeDescriptor::Ellipsis])
    }

    pub fn union(members: Vec<TypeDescriptor>) -> Self {
        TypeDescriptor::Union(members)
    }

    /// `T | None`
    pub fn optional(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Union(vec![inner, TypeDescriptor::none()])
    }

    pub fn literal<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        TypeDescriptor::Literal(values.into_iter().map(Into::into).collect())
    }

    pub fn annotated(inner: TypeDescriptor, metadata: Vec<String>) -> Self {
        TypeDescriptor::Annotated(Box::new(inner), metadata)
    }
}

impl From<Builtin> for TypeDescriptor {
    fn from(b: Builtin) -> Self {
        TypeDescriptor::Builtin(b)
    }
}

impl From<ClassRef> for TypeDescriptor {
    fn from(c: ClassRef) -> Self {
        TypeDescriptor::Class(c)
    }
}

/// Human-readable label used only in diagnostics.
impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Any => f.write_str("Any"),
            TypeDescriptor::Builtin(b) => f.write_str(b.name()),
            TypeDescriptor::Class(c) => f.write_str(&c.name),
            TypeDescriptor::Generic(b, args) if args.is_empty() => f.write_str(b.name()),
            TypeDescriptor::Generic(b, args) => {
                write!(f, "{}[", b.name())?;
                write_joined(f, args, ", ")?;
                f.write_str("]")
            }
            TypeDescriptor::Union(members) => write_joined(f, members, " | "),
            TypeDescriptor::Literal(values) => {
                f.write_str("Literal[")?;
                write_joined(f, values, ", ")?;
                f.write_str("]")
            }
            TypeDescriptor::Annotated(inner, _) => inner.fmt(f),
            TypeDescriptor::Ellipsis => f.write_str("..."),
            TypeDescriptor::Unresolved(name) => f.write_str(name),
        }
    }
}

pub(crate) fn write_joined<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    items: &[T],
    sep: &str,
) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TypeDescriptor::int(), "int")]
    #[case(TypeDescriptor::optional(TypeDescriptor::str()), "str | None")]
    #[case(TypeDescriptor::list_of(TypeDescriptor::int()), "list[int]")]
    #[case(
        TypeDescriptor::dict_of(TypeDescriptor::str(), TypeDescriptor::float()),
        "dict[str, float]"
    )]
    #[case(TypeDescriptor::tuple_variadic(TypeDescriptor::int()), "tuple[int, ...]")]
    #[case(TypeDescriptor::literal([Value::Int(1), Value::from("a")]), "Literal[1, 'a']")]
    #[case(TypeDescriptor::annotated(TypeDescriptor::bytes(), vec!["max=4".into()]), "bytes")]
    #[case(TypeDescriptor::Generic(Builtin::List, vec![]), "list")]
    fn test_labels(#[case] descriptor: TypeDescriptor, #[case] expected: &str) {
        assert_eq!(descriptor.to_string(), expected);
    }

    #[test]
    fn test_builtin_spellings() {
        assert_eq!(Builtin::from_name("NoneType"), Some(Builtin::NoneType));
        assert_eq!(Builtin::from_name("Dict"), Some(Builtin::Dict));
        assert_eq!(Builtin::from_name("Decimal"), None);
    }
}
