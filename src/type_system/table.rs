//! Named, compiled rules: what a guard or a shield holds per parameter, variable or attribute.
use super::compiler::compile_strict;
use super::rule::Rule;
use crate::store::{TypeDescriptor, Value, ValueType};
use crate::validation::{validate, Subject, TypeViolation};
use std::collections::HashMap;
use std::sync::Arc;

/// A compiled rule bound to the name it protects.
///
/// `label` is the user-facing form of the declaration and is what violations report as
/// "expected"; it is rendered once, at compile time.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleEntry {
    pub name: String,
    pub label: String,
    pub rule: Rule,
}

impl RuleEntry {
    /// Compiles `descriptor` with primitive specialization applied.
    pub fn compile(name: impl Into<String>, descriptor: &TypeDescriptor) -> Self {
        Self { name: name.into(), label: descriptor.to_string(), rule: compile_strict(descriptor) }
    }

    /// An exact-type rule inferred from a first observed value.
    pub fn inferred(name: impl Into<String>, ty: ValueType) -> Self {
        Self { name: name.into(), label: ty.name().to_string(), rule: Rule::Exact(ty) }
    }

    pub fn is_any(&self) -> bool {
        self.rule.is_any()
    }

    /// Checks `value`; `subject` is only invoked to build the error.
    pub fn check<F>(&self, value: &Value, subject: F) -> Result<(), TypeViolation>
    where
        F: FnOnce(String) -> Subject,
    {
        if self.rule.is_any() {
            return Ok(());
        }
        validate(&self.rule, value).map_err(|mismatch| {
            let violation = TypeViolation {
                subject: subject(self.name.clone()),
                expected: self.label.clone(),
                actual: value.type_name().into_owned(),
                repr: value.to_string(),
                mismatch: Some(mismatch),
            };
            tracing::debug!(error = %violation, "type contract violated");
            violation
        })
    }
}

/// Rules keyed by name, shared behind `Arc` so merged tables stay cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    entries: HashMap<String, Arc<RuleEntry>>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles every `(name, descriptor)` pair.
    pub fn compile_all<'a, I>(declarations: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a TypeDescriptor)>,
    {
        let entries = declarations
            .into_iter()
            .map(|(name, descriptor)| {
                (name.to_string(), Arc::new(RuleEntry::compile(name, descriptor)))
            })
            .collect();
        Self { entries }
    }

    /// Inserts an entry, returning the one it replaced.
    pub fn insert(&mut self, entry: RuleEntry) -> Option<Arc<RuleEntry>> {
        self.entries.insert(entry.name.clone(), Arc::new(entry))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<RuleEntry>> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<RuleEntry>)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }
}
