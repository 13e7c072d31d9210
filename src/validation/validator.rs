//! Walks a value against a compiled rule.
use super::error::{Mismatch, PathSegment, ValuePath};
use crate::store::Value;
use crate::type_system::Rule;
use rayon::prelude::*;
use smallvec::SmallVec;

/// Where a walk stopped. Borrowed so that failed union branches cost no allocation.
struct Failure<'r, 'v> {
    rule: &'r Rule,
    value: &'v Value,
    // Innermost segment first; reversed when reported.
    path: SmallVec<[PathSegment; 4]>,
}

impl<'r, 'v> Failure<'r, 'v> {
    fn at(rule: &'r Rule, value: &'v Value) -> Self {
        Self { rule, value, path: SmallVec::new() }
    }

    fn within(mut self, segment: PathSegment) -> Self {
        self.path.push(segment);
        self
    }

    fn into_mismatch(self) -> Mismatch {
        let mut path = self.path;
        path.reverse();
        Mismatch {
            path: ValuePath(path),
            expected: self.rule.to_string(),
            actual: self.value.type_name().into_owned(),
        }
    }
}

/// Validates `value` against `rule`, stopping at the first non-conforming element.
pub fn validate(rule: &Rule, value: &Value) -> Result<(), Mismatch> {
    walk(rule, value).map_err(Failure::into_mismatch)
}

/// Boolean form of [`validate`].
pub fn matches(rule: &Rule, value: &Value) -> bool {
    walk(rule, value).is_ok()
}

/// Validates a batch of values in parallel; results keep the input order.
pub fn validate_all(rule: &Rule, values: &[Value]) -> Vec<Result<(), Mismatch>> {
    values.par_iter().map(|value| validate(rule, value)).collect()
}

fn ensure<'r, 'v>(ok: bool, rule: &'r Rule, value: &'v Value) -> Result<(), Failure<'r, 'v>> {
    if ok {
        Ok(())
    } else {
        Err(Failure::at(rule, value))
    }
}

fn each<'r, 'v>(elem: &'r Rule, items: &'v [Value]) -> Result<(), Failure<'r, 'v>> {
    for (i, item) in items.iter().enumerate() {
        walk(elem, item).map_err(|f| f.within(PathSegment::Index(i)))?;
    }
    Ok(())
}

fn walk<'r, 'v>(rule: &'r Rule, value: &'v Value) -> Result<(), Failure<'r, 'v>> {
    match rule {
        Rule::Any => Ok(()),
        Rule::Exact(ty) => ensure(value.is_exactly(ty), rule, value),
        Rule::InstanceOf(ty) => ensure(value.is_instance(ty), rule, value),
        // A failed union is reported as a whole, never as one of its branches.
        Rule::Union(branches) => {
            ensure(branches.iter().any(|b| walk(b, value).is_ok()), rule, value)
        }
        Rule::List(elem) => match value {
            Value::List(items) => each(elem, items),
            _ => Err(Failure::at(rule, value)),
        },
        Rule::Set(elem) => match value {
            Value::Set(items) => each(elem, items),
            _ => Err(Failure::at(rule, value)),
        },
        Rule::TupleVariadic(elem) => match value {
            Value::Tuple(items) => each(elem, items),
            _ => Err(Failure::at(rule, value)),
        },
        Rule::TupleFixed(rules) => match value {
            Value::Tuple(items) if items.len() == rules.len() => {
                for (i, (r, item)) in rules.iter().zip(items).enumerate() {
                    walk(r, item).map_err(|f| f.within(PathSegment::Index(i)))?;
                }
                Ok(())
            }
            _ => Err(Failure::at(rule, value)),
        },
        Rule::Dict(key_rule, value_rule) => match value {
            Value::Dict(entries) => {
                for (key, val) in entries {
                    walk(key_rule, key).map_err(|f| f.within(PathSegment::Key(key.to_string())))?;
                    walk(value_rule, val)
                        .map_err(|f| f.within(PathSegment::Entry(key.to_string())))?;
                }
                Ok(())
            }
            _ => Err(Failure::at(rule, value)),
        },
        // Membership uses host `==`, so `Literal[1]` admits `True` and `1.0`.
        Rule::Literal(values) => ensure(values.iter().any(|v| v.host_eq(value)), rule, value),
    }
}
