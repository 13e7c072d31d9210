//! Per-invocation local-variable ledger for strict mode.
use crate::error::{GuardError, Result};
use crate::guard::{CallArgs, Invoke};
use crate::store::Value;
use crate::type_system::RuleEntry;
use crate::validation::Subject;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
struct Local {
    /// `None` means the name was declared `Any`.
    contract: Option<Arc<RuleEntry>>,
    value: Value,
}

/// Local variables of one strict invocation, each pinned to a type contract.
///
/// A name's contract is fixed by its first store: either the declared rule of a
/// parameter or the exact runtime type of the first value. Every later store must
/// satisfy it. A frame lives exactly as long as the invocation that created it.
pub struct Frame<'g> {
    function: &'g str,
    callee: &'g dyn Invoke,
    locals: HashMap<String, Local>,
}

impl<'g> Frame<'g> {
    /// `callee` is what [`Frame::recurse`] invokes.
    pub fn new(function: &'g str, callee: &'g dyn Invoke) -> Self {
        Self { function, callee, locals: HashMap::new() }
    }

    pub fn function(&self) -> &str {
        self.function
    }

    /// Binds a parameter. A declared parameter keeps its declared rule for the whole
    /// invocation; an undeclared one is pinned to the argument's exact type.
    pub fn bind(
        &mut self,
        name: &str,
        rule: Option<&Arc<RuleEntry>>,
        declared: bool,
        value: Value,
    ) {
        let contract = if declared {
            rule.cloned()
        } else {
            Some(Arc::new(RuleEntry::inferred(name, value.value_type())))
        };
        self.locals.insert(name.to_string(), Local { contract, value });
    }

    /// Assigns a local, enforcing the type it was first bound with.
    pub fn store(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        match self.locals.get_mut(name) {
            Some(local) => {
                if let Some(contract) = &local.contract {
                    contract.check(&value, Subject::Variable).inspect_err(|e| {
                        tracing::debug!(function = self.function, error = %e, "local type drifted");
                    })?;
                }
                local.value = value;
            }
            None => {
                let contract = RuleEntry::inferred(name, value.value_type());
                self.locals.insert(
                    name.to_string(),
                    Local { contract: Some(Arc::new(contract)), value },
                );
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.locals.get(name).map(|l| &l.value)
    }

    /// Reads a local, failing when it was never assigned.
    pub fn load(&self, name: &str) -> Result<Value> {
        self.get(name).cloned().ok_or_else(|| {
            GuardError::Call(format!(
                "{}(): local variable '{}' referenced before assignment",
                self.function, name
            ))
        })
    }

    /// Label of the contract a local is pinned to.
    pub fn contract(&self, name: &str) -> Option<&str> {
        let local = self.locals.get(name)?;
        Some(local.contract.as_ref().map_or("Any", |c| c.label.as_str()))
    }

    /// Calls the function this frame belongs to; the nested call gets its own frame.
    pub fn recurse(&self, args: &CallArgs) -> Result<Value> {
        self.callee.invoke(args)
    }

    pub fn len(&self) -> usize {
        self.locals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locals.is_empty()
    }
}

impl std::fmt::Debug for Frame<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("function", &self.function)
            .field("locals", &self.locals)
            .finish()
    }
}
