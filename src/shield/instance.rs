//! Shielded instances and the method context that may touch their private state.
use super::class::{ClassDef, InitDef, MethodDef};
use crate::error::{AccessAction, AccessViolation, GuardError, Result};
use crate::guard::CallArgs;
use crate::store::{ClassId, Value};
use crate::validation::Subject;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

struct InstanceInner {
    class: Arc<ClassDef>,
    slots: RwLock<HashMap<String, Value>>,
}

/// A shared handle to one object of a shielded class.
///
/// Clones refer to the same object; equality is identity. Every assignment is
/// validated before the slot lock is taken and committed under the write lock, so a
/// rejected value never becomes visible.
#[derive(Clone)]
pub struct Instance(Arc<InstanceInner>);

impl Instance {
    pub(crate) fn new(class: Arc<ClassDef>) -> Self {
        Instance(Arc::new(InstanceInner { class, slots: RwLock::new(HashMap::new()) }))
    }

    pub fn class(&self) -> &Arc<ClassDef> {
        &self.0.class
    }

    /// Reads an attribute from outside any method.
    pub fn get(&self, name: &str) -> Result<Value> {
        self.read(None, name)
    }

    /// Assigns an attribute from outside any method.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.write(None, name, value.into())
    }

    /// Calls a method from outside any method.
    pub fn call(&self, name: &str, args: &CallArgs) -> Result<Value> {
        self.invoke(None, name, args)
    }

    /// Whether an attribute slot has been assigned.
    pub fn has(&self, name: &str) -> bool {
        self.0.slots.read().contains_key(name)
    }

    fn attribute_owner(&self, name: &str) -> ClassId {
        self.0.class.attribute(name).map_or(self.0.class.id(), |a| a.owner)
    }

    /// Private names are reachable only from a context class related to the owner.
    fn authorize(
        &self,
        ctx: Option<&ClassDef>,
        owner: ClassId,
        name: &str,
        action: AccessAction,
    ) -> Result<()> {
        let class = &self.0.class;
        if !class.config().is_private(name) {
            return Ok(());
        }
        let allowed =
            ctx.is_some_and(|ctx| ctx.is_subclass_of(owner) || class.is_subclass_of(ctx.id()));
        if allowed {
            return Ok(());
        }
        let owner_name = class.member(owner).map_or(class.name(), |c| c.name());
        let violation =
            AccessViolation { class: owner_name.to_string(), name: name.to_string(), action };
        tracing::debug!(class = class.name(), error = %violation, "private access denied");
        Err(violation.into())
    }

    fn read(&self, ctx: Option<&ClassDef>, name: &str) -> Result<Value> {
        self.authorize(ctx, self.attribute_owner(name), name, AccessAction::Read)?;
        self.0.slots.read().get(name).cloned().ok_or_else(|| GuardError::MissingAttribute {
            class: self.0.class.name().to_string(),
            name: name.to_string(),
        })
    }

    fn write(&self, ctx: Option<&ClassDef>, name: &str, value: Value) -> Result<()> {
        self.authorize(ctx, self.attribute_owner(name), name, AccessAction::Write)?;
        if let Some(attribute) = self.0.class.attribute(name) {
            attribute.entry.check(&value, Subject::Attribute).inspect_err(|e| {
                tracing::debug!(class = self.0.class.name(), error = %e, "assignment rejected");
            })?;
        }
        self.0.slots.write().insert(name.to_string(), value);
        Ok(())
    }

    fn invoke(&self, ctx: Option<&ClassDef>, name: &str, args: &CallArgs) -> Result<Value> {
        let class = &self.0.class;
        let method = class.method(name).ok_or_else(|| GuardError::MissingAttribute {
            class: class.name().to_string(),
            name: name.to_string(),
        })?;
        self.authorize(ctx, method.owner, name, AccessAction::Call)?;
        self.run_method(method, args)
    }

    fn context(&self, owner: ClassId) -> Result<&ClassDef> {
        self.0.class.member(owner).ok_or_else(|| {
            let class = self.0.class.name();
            GuardError::Call(format!("{} is not in the lineage of {}", owner.0, class))
        })
    }

    fn run_method(&self, method: &MethodDef, args: &CallArgs) -> Result<Value> {
        let this = This { ctx: self.context(method.owner)?, instance: self };
        if !self.0.class.config().guard_methods {
            return (method.body)(&this, args);
        }
        method.rules.check_call(args).inspect_err(|e| {
            tracing::debug!(method = method.rules.name(), error = %e, "call rejected");
        })?;
        let result = (method.body)(&this, args)?;
        method.rules.check_return(&result)?;
        Ok(result)
    }

    pub(crate) fn run_init(&self, init: &InitDef, args: &CallArgs) -> Result<()> {
        init.rules.check_call(args).inspect_err(|e| {
            tracing::debug!(method = init.rules.name(), error = %e, "constructor rejected");
        })?;
        let this = This { ctx: self.context(init.owner)?, instance: self };
        (init.body)(&this, args)
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Instance {
    // Never takes the slot lock.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} object at {:p}>", self.0.class.name(), Arc::as_ptr(&self.0))
    }
}

/// The executing-method context: an instance seen from inside a method of `class()`.
///
/// Grants access to private names owned by that class or its relatives.
pub struct This<'a> {
    ctx: &'a ClassDef,
    instance: &'a Instance,
}

impl<'a> This<'a> {
    pub fn instance(&self) -> &Instance {
        self.instance
    }

    /// The class whose method is executing.
    pub fn class(&self) -> &ClassDef {
        self.ctx
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        self.instance.read(Some(self.ctx), name)
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.instance.write(Some(self.ctx), name, value.into())
    }

    pub fn call(&self, name: &str, args: &CallArgs) -> Result<Value> {
        self.instance.invoke(Some(self.ctx), name, args)
    }

    /// The same context applied to another instance.
    pub fn with<'b>(&'b self, other: &'b Instance) -> This<'b> {
        This { ctx: self.ctx, instance: other }
    }

    /// Runs the constructor of the next class after this one in the instance's
    /// method resolution order.
    pub fn super_init(&self, args: &CallArgs) -> Result<()> {
        let next = self
            .instance
            .class()
            .mro()
            .skip_while(|c| c.id() != self.ctx.id())
            .skip(1)
            .find_map(|c| c.own_init());
        match next {
            Some(init) => self.instance.run_init(init, args),
            None if args.is_empty() => Ok(()),
            None => Err(GuardError::Call(format!(
                "{}: no ancestor constructor accepts arguments",
                self.ctx.name()
            ))),
        }
    }
}

impl fmt::Debug for This<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("This")
            .field("class", &self.ctx.name())
            .field("instance", self.instance)
            .finish()
    }
}
