//! Descriptor → operation tree compilation.
use super::rule::Rule;
use crate::store::{Builtin, TypeDescriptor, ValueType};

/// Compiles a descriptor into a rule.
///
/// Total over the descriptor grammar: forms the compiler does not enforce degrade to
/// [`Rule::Any`] instead of failing. Composite shapes (union, literal, parameterized
/// generics) are recognised before falling through to the scalar form.
pub fn compile(descriptor: &TypeDescriptor) -> Rule {
    match descriptor {
        TypeDescriptor::Any => Rule::Any,
        TypeDescriptor::Annotated(inner, _) => compile(inner),
        TypeDescriptor::Union(members) => Rule::Union(members.iter().map(compile).collect()),
        TypeDescriptor::Literal(values) => Rule::Literal(values.clone()),
        TypeDescriptor::Generic(origin, args) => compile_generic(*origin, args),
        TypeDescriptor::Builtin(b) => Rule::InstanceOf(builtin_type(*b)),
        TypeDescriptor::Class(class) => Rule::InstanceOf(ValueType::Class {
            id: class.id,
            name: class.name.clone(),
        }),
        // Unknown forms must never block execution.
        TypeDescriptor::Ellipsis | TypeDescriptor::Unresolved(_) => {
            tracing::debug!(descriptor = %descriptor, "unsupported descriptor compiled to Any");
            Rule::Any
        }
    }
}

fn compile_generic(origin: Builtin, args: &[TypeDescriptor]) -> Rule {
    match (origin, args) {
        (_, []) => Rule::InstanceOf(builtin_type(origin)),
        (Builtin::List, [elem, ..]) => Rule::List(Box::new(compile(elem))),
        (Builtin::Set, [elem, ..]) => Rule::Set(Box::new(compile(elem))),
        (Builtin::Dict, [key]) => Rule::Dict(Box::new(compile(key)), Box::new(Rule::Any)),
        (Builtin::Dict, [key, value, ..]) => {
            Rule::Dict(Box::new(compile(key)), Box::new(compile(value)))
        }
        (Builtin::Tuple, [elem, TypeDescriptor::Ellipsis]) => {
            Rule::TupleVariadic(Box::new(compile(elem)))
        }
        (Builtin::Tuple, elems) => Rule::TupleFixed(elems.iter().map(compile).collect()),
        // Scalars take no parameters; keep the shape check only.
        (scalar, _) => Rule::InstanceOf(builtin_type(scalar)),
    }
}

fn builtin_type(b: Builtin) -> ValueType {
    match b {
        Builtin::NoneType => ValueType::NoneType,
        Builtin::Bool => ValueType::Bool,
        Builtin::Int => ValueType::Int,
        Builtin::Float => ValueType::Float,
        Builtin::Str => ValueType::Str,
        Builtin::Bytes => ValueType::Bytes,
        Builtin::List => ValueType::List,
        Builtin::Tuple => ValueType::Tuple,
        Builtin::Set => ValueType::Set,
        Builtin::Dict => ValueType::Dict,
    }
}

/// Second pass run by every rule-table builder: `InstanceOf(T)` becomes `Exact(T)` for
/// primitive scalars, so a `bool` never satisfies `int` and an `int` never satisfies
/// `float`. Applied through the whole tree.
pub fn specialize_primitives(rule: Rule) -> Rule {
    match rule {
        Rule::InstanceOf(ty) if ty.is_primitive() => Rule::Exact(ty),
        Rule::Union(rules) => Rule::Union(rules.into_iter().map(specialize_primitives).collect()),
        Rule::TupleFixed(rules) => {
            Rule::TupleFixed(rules.into_iter().map(specialize_primitives).collect())
        }
        Rule::List(elem) => Rule::List(Box::new(specialize_primitives(*elem))),
        Rule::Set(elem) => Rule::Set(Box::new(specialize_primitives(*elem))),
        Rule::TupleVariadic(elem) => Rule::TupleVariadic(Box::new(specialize_primitives(*elem))),
        Rule::Dict(k, v) => Rule::Dict(
            Box::new(specialize_primitives(*k)),
            Box::new(specialize_primitives(*v)),
        ),
        other => other,
    }
}

/// `compile` followed by `specialize_primitives`.
pub fn compile_strict(descriptor: &TypeDescriptor) -> Rule {
    specialize_primitives(compile(descriptor))
}
