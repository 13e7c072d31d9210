//! Shielded class definitions and their builder.
use super::instance::{Instance, This};
use super::lineage::{linearize, overlay, Owned};
use crate::config::ShieldConfig;
use crate::error::{GuardError, Result};
use crate::guard::{CallArgs, Signature, SignatureRules};
use crate::store::{ClassId, ClassRef, TypeDescriptor, Value};
use crate::type_system::{RuleEntry, RuleTable};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub type InitBody = dyn Fn(&This<'_>, &CallArgs) -> Result<()> + Send + Sync;
pub type MethodBody = dyn Fn(&This<'_>, &CallArgs) -> Result<Value> + Send + Sync;

/// An attribute rule together with the class that declared it.
#[derive(Debug, Clone)]
pub struct AttributeRule {
    pub entry: Arc<RuleEntry>,
    pub owner: ClassId,
}

impl Owned for AttributeRule {
    fn owner(&self) -> ClassId {
        self.owner
    }

    fn conflicts_with(&self, inherited: &Self) -> bool {
        self.owner != inherited.owner && self.entry.label != inherited.entry.label
    }
}

/// A method as resolved on a class; `owner` is the class whose body runs.
pub struct MethodDef {
    pub name: String,
    pub owner: ClassId,
    pub(crate) rules: Arc<SignatureRules>,
    pub(crate) body: Arc<MethodBody>,
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef").field("name", &self.name).field("owner", &self.owner).finish()
    }
}

impl Owned for Arc<MethodDef> {
    fn owner(&self) -> ClassId {
        self.owner
    }
}

/// A guarded constructor; its rules carry the injected receiver slot.
pub struct InitDef {
    pub owner: ClassId,
    pub(crate) rules: Arc<SignatureRules>,
    pub(crate) body: Arc<InitBody>,
}

impl fmt::Debug for InitDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitDef").field("owner", &self.owner).field("rules", &self.rules).finish()
    }
}

/// A registered, immutable class: its merged attribute table, methods and constructor.
pub struct ClassDef {
    id: ClassId,
    name: String,
    bases: Vec<Arc<ClassDef>>,
    /// Every ancestor, root first; excludes the class itself.
    ancestors: Vec<Arc<ClassDef>>,
    own_attributes: HashMap<String, AttributeRule>,
    own_methods: HashMap<String, Arc<MethodDef>>,
    own_init: Option<Arc<InitDef>>,
    attributes: HashMap<String, AttributeRule>,
    methods: HashMap<String, Arc<MethodDef>>,
    init: Option<Arc<InitDef>>,
    config: ShieldConfig,
}

impl ClassDef {
    pub fn id(&self) -> ClassId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bases(&self) -> &[Arc<ClassDef>] {
        &self.bases
    }

    pub fn config(&self) -> &ShieldConfig {
        &self.config
    }

    /// A descriptor naming this class, for use in other declarations.
    pub fn descriptor(&self) -> TypeDescriptor {
        TypeDescriptor::Class(ClassRef { id: self.id, name: self.name.clone() })
    }

    /// True for the class itself and for any of its ancestors' ids.
    pub fn is_subclass_of(&self, id: ClassId) -> bool {
        self.id == id || self.ancestors.iter().any(|a| a.id == id)
    }

    /// The class and its ancestors, most-derived first.
    pub fn mro(&self) -> impl Iterator<Item = &ClassDef> {
        std::iter::once(self).chain(self.ancestors.iter().rev().map(|a| a.as_ref()))
    }

    /// The class with `id` within this class's lineage.
    pub(crate) fn member(&self, id: ClassId) -> Option<&ClassDef> {
        self.mro().find(|c| c.id == id)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeRule> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttributeRule)> {
        self.attributes.iter().map(|(n, a)| (n.as_str(), a))
    }

    pub(crate) fn method(&self, name: &str) -> Option<&Arc<MethodDef>> {
        self.methods.get(name)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Whether instances run a constructor, declared here or inherited.
    pub fn has_init(&self) -> bool {
        self.init.is_some()
    }

    pub(crate) fn own_init(&self) -> Option<&Arc<InitDef>> {
        self.own_init.as_ref()
    }

    /// Creates an instance and runs the resolved constructor on it.
    pub fn construct(self: &Arc<Self>, args: &CallArgs) -> Result<Instance> {
        let instance = Instance::new(self.clone());
        match &self.init {
            Some(init) => instance.run_init(init, args)?,
            None if !args.is_empty() => {
                return Err(GuardError::Call(format!("{}() takes no arguments", self.name)))
            }
            None => {}
        }
        tracing::trace!(class = %self.name, "instance constructed");
        Ok(instance)
    }
}

impl fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDef")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("bases", &self.bases.iter().map(|b| b.name()).collect::<Vec<_>>())
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Declares a shielded class.
///
/// ```
/// use guardian_core::{CallArgs, ClassBuilder, Signature, TypeDescriptor, Value};
///
/// let cat = ClassBuilder::new("Cat")
///     .field("name", TypeDescriptor::str())
///     .field("age", TypeDescriptor::int())
///     .init(Signature::new("__init__").untyped("name").untyped("age"), |this, args| {
///         this.set("name", args.positional[0].clone())?;
///         this.set("age", args.positional[1].clone())
///     })
///     .build()
///     .unwrap();
///
/// let luna = cat.construct(&CallArgs::new().arg("Luna").arg(3)).unwrap();
/// assert_eq!(luna.get("age").unwrap(), Value::Int(3));
/// assert!(luna.set("age", 3.5).is_err());
/// ```
pub struct ClassBuilder {
    id: ClassId,
    name: String,
    bases: Vec<Arc<ClassDef>>,
    fields: Vec<(String, TypeDescriptor)>,
    init: Option<(Signature, Arc<InitBody>)>,
    methods: Vec<(String, Signature, Arc<MethodBody>)>,
    config: Option<ShieldConfig>,
}

impl ClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ClassId::next(),
            name: name.into(),
            bases: Vec::new(),
            fields: Vec::new(),
            init: None,
            methods: Vec::new(),
            config: None,
        }
    }

    pub fn id(&self) -> ClassId {
        self.id
    }

    /// A descriptor for the class being built, so fields can refer to their own class.
    pub fn reference(&self) -> TypeDescriptor {
        TypeDescriptor::Class(ClassRef { id: self.id, name: self.name.clone() })
    }

    pub fn extends(mut self, base: &Arc<ClassDef>) -> Self {
        self.bases.push(base.clone());
        self
    }

    pub fn field(mut self, name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        self.fields.push((name.into(), descriptor));
        self
    }

    pub fn init<F>(mut self, signature: Signature, body: F) -> Self
    where
        F: Fn(&This<'_>, &CallArgs) -> Result<()> + Send + Sync + 'static,
    {
        self.init = Some((signature, Arc::new(body)));
        self
    }

    pub fn method<F>(mut self, name: impl Into<String>, signature: Signature, body: F) -> Self
    where
        F: Fn(&This<'_>, &CallArgs) -> Result<Value> + Send + Sync + 'static,
    {
        self.methods.push((name.into(), signature, Arc::new(body)));
        self
    }

    /// Defaults to the first base's configuration, or [`ShieldConfig::default`].
    pub fn config(mut self, config: ShieldConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Compiles the declarations and merges them over the inherited ones.
    pub fn build(self) -> Result<Arc<ClassDef>> {
        let ClassBuilder { id, name, bases, fields, init, methods, config } = self;
        let config = config
            .or_else(|| bases.first().map(|b| b.config.clone()))
            .unwrap_or_default();
        let ancestors = linearize(&bases);

        let declared = RuleTable::compile_all(fields.iter().map(|(f, d)| (f.as_str(), d)));
        let own_attributes: HashMap<String, AttributeRule> = declared
            .iter()
            .map(|(field, entry)| {
                (field.to_string(), AttributeRule { entry: entry.clone(), owner: id })
            })
            .collect();

        let mut attributes = HashMap::new();
        let mut inherited_methods = HashMap::new();
        for ancestor in &ancestors {
            overlay(&mut attributes, &ancestor.own_attributes, &name, "attribute");
            overlay(&mut inherited_methods, &ancestor.own_methods, &name, "method");
        }
        overlay(&mut attributes, &own_attributes, &name, "attribute");

        let qualified = |member: &str, signature: &Signature| {
            let mut signature = signature.clone();
            signature.name = format!("{}.{}", name, member);
            signature
        };

        let mut own_methods = HashMap::new();
        for (method, signature, body) in &methods {
            let rules = SignatureRules::compile(&qualified(method, signature))?.with_receiver();
            let def = MethodDef {
                name: method.clone(),
                owner: id,
                rules: Arc::new(rules),
                body: body.clone(),
            };
            own_methods.insert(method.clone(), Arc::new(def));
        }
        let mut merged_methods = inherited_methods;
        overlay(&mut merged_methods, &own_methods, &name, "method");

        // Unannotated constructor parameters inherit the attribute rule of the same name.
        let own_init = match &init {
            Some((signature, body)) => {
                let signature = qualified("__init__", signature);
                let rules = SignatureRules::compile_with(&signature, |param| {
                    attributes.get(param).map(|a: &AttributeRule| a.entry.clone())
                })?
                .with_receiver();
                Some(Arc::new(InitDef { owner: id, rules: Arc::new(rules), body: body.clone() }))
            }
            None => None,
        };
        let resolved_init = own_init
            .clone()
            .or_else(|| ancestors.iter().rev().find_map(|a| a.own_init.clone()));

        tracing::trace!(
            class = %name,
            attributes = attributes.len(),
            methods = merged_methods.len(),
            "shielded class built"
        );

        Ok(Arc::new(ClassDef {
            id,
            name,
            bases,
            ancestors,
            own_attributes,
            own_methods,
            own_init,
            attributes,
            methods: merged_methods,
            init: resolved_init,
            config,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Subject;

    #[test]
    fn test_fields_compile_with_labels() {
        let cat = ClassBuilder::new("Cat")
            .field("name", TypeDescriptor::str())
            .field("toys", TypeDescriptor::list_of(TypeDescriptor::str()))
            .build()
            .unwrap();
        assert_eq!(cat.attribute("toys").unwrap().entry.label, "list[str]");
        assert_eq!(cat.attribute("name").unwrap().owner, cat.id());
        assert!(cat.attribute("age").is_none());
    }

    #[test]
    fn test_subclass_overrides_and_inherits() {
        let cat = ClassBuilder::new("Cat")
            .field("name", TypeDescriptor::str())
            .field("age", TypeDescriptor::int())
            .build()
            .unwrap();
        let old = ClassBuilder::new("OldCat")
            .extends(&cat)
            .field("age", TypeDescriptor::float())
            .build()
            .unwrap();

        assert_eq!(old.attribute("name").unwrap().owner, cat.id());
        let age = old.attribute("age").unwrap();
        assert_eq!(age.owner, old.id());
        assert_eq!(age.entry.label, "float");
        assert!(age.conflicts_with(cat.attribute("age").unwrap()));
        let name = old.attribute("name").unwrap();
        assert!(!name.conflicts_with(cat.attribute("name").unwrap()));
        assert!(old.is_subclass_of(cat.id()));
        assert!(!cat.is_subclass_of(old.id()));
        assert_eq!(old.mro().map(|c| c.name()).collect::<Vec<_>>(), vec!["OldCat", "Cat"]);
    }

    #[test]
    fn test_restating_an_inherited_rule_is_not_a_conflict() {
        let cat = ClassBuilder::new("Cat").field("age", TypeDescriptor::int()).build().unwrap();
        let kitten = ClassBuilder::new("Kitten")
            .extends(&cat)
            .field("age", TypeDescriptor::int())
            .build()
            .unwrap();
        let age = kitten.attribute("age").unwrap();
        assert_eq!(age.owner, kitten.id());
        assert!(!age.conflicts_with(cat.attribute("age").unwrap()));
    }

    #[test]
    fn test_earlier_base_wins() {
        let swimmer =
            ClassBuilder::new("Swimmer").field("speed", TypeDescriptor::float()).build().unwrap();
        let runner =
            ClassBuilder::new("Runner").field("speed", TypeDescriptor::int()).build().unwrap();
        let duck = ClassBuilder::new("Duck").extends(&swimmer).extends(&runner).build().unwrap();
        assert_eq!(duck.attribute("speed").unwrap().owner, swimmer.id());
    }

    #[test]
    fn test_self_reference() {
        let builder = ClassBuilder::new("Node");
        let node_ref = builder.reference();
        let node = builder
            .field("next", TypeDescriptor::optional(node_ref))
            .build()
            .unwrap();
        assert_eq!(node.attribute("next").unwrap().entry.label, "Node | None");

        let head = node.construct(&CallArgs::new()).unwrap();
        let tail = node.construct(&CallArgs::new()).unwrap();
        head.set("next", tail.clone()).unwrap();
        head.set("next", Value::None).unwrap();
        let err = head.set("next", 1).unwrap_err();
        assert_eq!(err.as_type().unwrap().subject, Subject::Attribute("next".into()));
    }

    #[test]
    fn test_constructor_parameters_inherit_attribute_rules() {
        let cat = ClassBuilder::new("Cat")
            .field("age", TypeDescriptor::int())
            .init(Signature::new("__init__").untyped("age"), |this, args| {
                this.set("age", args.get(0, "age").cloned().unwrap_or(Value::None))
            })
            .build()
            .unwrap();

        let err = cat.construct(&CallArgs::new().arg("3")).unwrap_err();
        let violation = err.as_type().unwrap();
        assert_eq!(violation.subject, Subject::Argument("age".into()));
        assert_eq!(violation.expected, "int");
    }

    #[test]
    fn test_no_constructor_rejects_arguments() {
        let bare = ClassBuilder::new("Bare").build().unwrap();
        assert!(bare.construct(&CallArgs::new()).is_ok());
        assert!(bare.construct(&CallArgs::new().arg(1)).is_err());
    }

    #[test]
    fn test_config_is_inherited() {
        let config = ShieldConfig { private_prefix: "p_".into(), guard_methods: false };
        let base = ClassBuilder::new("Base").config(config.clone()).build().unwrap();
        let derived = ClassBuilder::new("Derived").extends(&base).build().unwrap();
        assert_eq!(derived.config(), &config);
    }
}
