//! Declared signatures and their compiled, call-ready form.
use super::args::CallArgs;
use crate::error::{GuardError, Result};
use crate::store::{TypeDescriptor, Value};
use crate::type_system::RuleEntry;
use crate::validation::Subject;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParamKind {
    PositionalOnly,
    PositionalOrKeyword,
    VarPositional,
    KeywordOnly,
    VarKeyword,
}

impl ParamKind {
    fn is_positional(self) -> bool {
        matches!(self, ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword)
    }

    fn is_variadic(self) -> bool {
        matches!(self, ParamKind::VarPositional | ParamKind::VarKeyword)
    }
}

/// How the wrapped body produces its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flavor {
    #[default]
    Plain,
    Generator,
    Coroutine,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub annotation: Option<TypeDescriptor>,
    pub default: Option<Value>,
}

impl Param {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self { name: name.into(), kind, annotation: None, default: None }
    }

    pub fn annotate(mut self, descriptor: TypeDescriptor) -> Self {
        self.annotation = Some(descriptor);
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// A callable's declared parameters, return annotation and flavor.
///
/// ```
/// use guardian_core::{Signature, TypeDescriptor};
///
/// let add = Signature::new("add")
///     .param("a", TypeDescriptor::int())
///     .param("b", TypeDescriptor::int())
///     .returns(TypeDescriptor::int());
/// assert_eq!(add.params.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signature {
    pub name: String,
    pub params: Vec<Param>,
    pub returns: Option<TypeDescriptor>,
    pub flavor: Flavor,
}

impl Signature {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn with(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// An annotated positional-or-keyword parameter.
    pub fn param(self, name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        self.with(Param::new(name, ParamKind::PositionalOrKeyword).annotate(descriptor))
    }

    /// An unannotated positional-or-keyword parameter.
    pub fn untyped(self, name: impl Into<String>) -> Self {
        self.with(Param::new(name, ParamKind::PositionalOrKeyword))
    }

    pub fn keyword_only(self, name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        self.with(Param::new(name, ParamKind::KeywordOnly).annotate(descriptor))
    }

    /// `*name: T`, each extra positional argument must match `T`.
    pub fn var_args(self, name: impl Into<String>, descriptor: Option<TypeDescriptor>) -> Self {
        let param = Param::new(name, ParamKind::VarPositional);
        self.with(match descriptor {
            Some(d) => param.annotate(d),
            None => param,
        })
    }

    /// `**name: T`, each extra keyword argument must match `T`.
    pub fn var_kwargs(self, name: impl Into<String>, descriptor: Option<TypeDescriptor>) -> Self {
        let param = Param::new(name, ParamKind::VarKeyword);
        self.with(match descriptor {
            Some(d) => param.annotate(d),
            None => param,
        })
    }

    pub fn returns(mut self, descriptor: TypeDescriptor) -> Self {
        self.returns = Some(descriptor);
        self
    }

    pub fn flavor(mut self, flavor: Flavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// Rejects orderings and duplicates a host would refuse to define.
    fn validate_layout(&self) -> Result<()> {
        let mut last = ParamKind::PositionalOnly;
        let mut seen: Vec<&str> = Vec::with_capacity(self.params.len());
        for param in &self.params {
            if param.kind < last || (param.kind == last && param.kind.is_variadic()) {
                return Err(GuardError::Unsupported(format!(
                    "{}(): parameter '{}' is out of order",
                    self.name, param.name
                )));
            }
            if seen.contains(&param.name.as_str()) {
                return Err(GuardError::Unsupported(format!(
                    "{}(): duplicate parameter '{}'",
                    self.name, param.name
                )));
            }
            seen.push(&param.name);
            last = param.kind;
        }
        Ok(())
    }
}

/// One named parameter after compilation.
#[derive(Debug, Clone)]
pub(crate) struct ParamRule {
    pub(crate) name: String,
    pub(crate) kind: ParamKind,
    /// `None` when unannotated or when the annotation compiled to `Any`.
    pub(crate) rule: Option<Arc<RuleEntry>>,
    /// Declared by annotation or inherited from a fallback rule.
    pub(crate) declared: bool,
    pub(crate) default: Option<Value>,
}

/// A parameter bound to its value for one invocation.
#[derive(Debug)]
pub struct Binding<'a> {
    pub name: &'a str,
    pub rule: Option<&'a Arc<RuleEntry>>,
    /// False when the parameter carries no declaration at all.
    pub declared: bool,
    pub value: Value,
}

/// Compiled rules for one signature, aligned for positional lookup.
///
/// Built once when the callable is wrapped, immutable afterwards.
#[derive(Debug, Clone)]
pub struct SignatureRules {
    name: String,
    flavor: Flavor,
    /// Named parameters in declaration order; positional ones come first.
    params: Vec<ParamRule>,
    positional_count: usize,
    keywords: HashMap<String, usize>,
    var_positional: Option<(String, Option<Arc<RuleEntry>>)>,
    var_keyword: Option<(String, Option<Arc<RuleEntry>>)>,
    returns: Option<Arc<RuleEntry>>,
    /// Leading positional slots filled by the receiver rather than by call arguments.
    receiver: usize,
}

impl SignatureRules {
    pub fn compile(signature: &Signature) -> Result<Self> {
        Self::compile_with(signature, |_| None)
    }

    /// Compiles `signature`; an unannotated parameter takes the rule `fallback` returns
    /// for its name, if any.
    pub fn compile_with<F>(signature: &Signature, fallback: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<Arc<RuleEntry>>,
    {
        signature.validate_layout()?;

        // (rule, declared); a declared rule that compiled to `Any` is dropped but remembered.
        type Slot = (Option<Arc<RuleEntry>>, bool);
        let entry = |name: &str, annotation: &Option<TypeDescriptor>| -> Slot {
            match annotation {
                Some(descriptor) => {
                    let entry = RuleEntry::compile(name, descriptor);
                    ((!entry.is_any()).then(|| Arc::new(entry)), true)
                }
                None => match fallback(name) {
                    Some(e) => ((!e.is_any()).then_some(e), true),
                    None => (None, false),
                },
            }
        };

        let mut rules = SignatureRules {
            name: signature.name.clone(),
            flavor: signature.flavor,
            params: Vec::new(),
            positional_count: 0,
            keywords: HashMap::new(),
            var_positional: None,
            var_keyword: None,
            returns: signature
                .returns
                .as_ref()
                .map(|d| RuleEntry::compile("return", d))
                .filter(|e| !e.is_any())
                .map(Arc::new),
            receiver: 0,
        };

        for param in &signature.params {
            let (rule, declared) = entry(&param.name, &param.annotation);
            match param.kind {
                ParamKind::VarPositional => rules.var_positional = Some((param.name.clone(), rule)),
                ParamKind::VarKeyword => rules.var_keyword = Some((param.name.clone(), rule)),
                kind => {
                    if kind.is_positional() {
                        rules.positional_count += 1;
                    }
                    if kind != ParamKind::PositionalOnly {
                        rules.keywords.insert(param.name.clone(), rules.params.len());
                    }
                    rules.params.push(ParamRule {
                        name: param.name.clone(),
                        kind,
                        rule,
                        declared,
                        default: param.default.clone(),
                    });
                }
            }
        }
        Ok(rules)
    }

    /// Injects a permissive leading `self` slot so positional rules stay aligned when the
    /// receiver is supplied separately from the call arguments.
    pub fn with_receiver(mut self) -> Self {
        self.params.insert(
            0,
            ParamRule {
                name: "self".to_string(),
                kind: ParamKind::PositionalOnly,
                rule: None,
                declared: false,
                default: None,
            },
        );
        self.positional_count += 1;
        for index in self.keywords.values_mut() {
            *index += 1;
        }
        self.receiver += 1;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn has_return_rule(&self) -> bool {
        self.returns.is_some()
    }

    /// Names of the parameters filled positionally by call arguments, in order.
    pub fn positional_names(&self) -> impl Iterator<Item = &str> {
        self.params[self.receiver..self.positional_count].iter().map(|p| p.name.as_str())
    }

    fn call_error(&self, message: String) -> GuardError {
        GuardError::Call(format!("{}() {}", self.name, message))
    }

    /// Validates every argument that has a rule, and the shape of the call itself.
    pub fn check_call(&self, args: &CallArgs) -> Result<()> {
        let accepts = self.positional_count - self.receiver;

        for (i, value) in args.positional.iter().enumerate() {
            if i < accepts {
                if let Some(rule) = &self.params[self.receiver + i].rule {
                    rule.check(value, Subject::Argument)?;
                }
                continue;
            }
            match &self.var_positional {
                Some((_, Some(rule))) => rule.check(value, Subject::Argument)?,
                Some((_, None)) => {}
                None => {
                    return Err(self.call_error(format!(
                        "takes {} positional arguments but {} were given",
                        accepts,
                        args.positional.len()
                    )))
                }
            }
        }

        for (name, value) in &args.keywords {
            match self.keywords.get(name) {
                Some(&index) => {
                    if self.params[index].kind.is_positional()
                        && index - self.receiver < args.positional.len()
                    {
                        return Err(
                            self.call_error(format!("got multiple values for argument '{}'", name))
                        );
                    }
                    if let Some(rule) = &self.params[index].rule {
                        rule.check(value, |_| Subject::Argument(name.clone()))?;
                    }
                }
                None => match &self.var_keyword {
                    Some((_, Some(rule))) => {
                        rule.check(value, |_| Subject::Argument(name.clone()))?
                    }
                    Some((_, None)) => {}
                    None => {
                        return Err(self
                            .call_error(format!("got an unexpected keyword argument '{}'", name)))
                    }
                },
            }
        }

        for (index, param) in self.params.iter().enumerate().skip(self.receiver) {
            let supplied = (param.kind.is_positional()
                && index - self.receiver < args.positional.len())
                || args.keyword(&param.name).is_some();
            if !supplied && param.default.is_none() {
                return Err(
                    self.call_error(format!("missing required argument: '{}'", param.name))
                );
            }
        }
        Ok(())
    }

    pub fn check_return(&self, value: &Value) -> Result<()> {
        if let Some(rule) = &self.returns {
            rule.check(value, |_| Subject::Return)?;
        }
        Ok(())
    }

    /// Resolves every parameter to its value for this call. Assumes `check_call` passed.
    ///
    /// Extra positional arguments are collected into a tuple and extra keywords into a
    /// dict, under the variadic parameter names.
    pub fn bind(&self, args: &CallArgs) -> Vec<Binding<'_>> {
        let mut bindings = Vec::with_capacity(self.params.len() + 2);
        for (index, param) in self.params.iter().enumerate().skip(self.receiver) {
            let positional = (index - self.receiver < args.positional.len()
                && param.kind.is_positional())
            .then(|| &args.positional[index - self.receiver]);
            let value = positional.or_else(|| args.keyword(&param.name)).or(param.default.as_ref());
            if let Some(value) = value {
                bindings.push(Binding {
                    name: &param.name,
                    rule: param.rule.as_ref(),
                    declared: param.declared,
                    value: value.clone(),
                });
            }
        }

        let accepts = self.positional_count - self.receiver;
        if let Some((name, _)) = &self.var_positional {
            let extra = args.positional.iter().skip(accepts).cloned();
            bindings.push(Binding {
                name,
                rule: None,
                declared: false,
                value: Value::Tuple(extra.collect()),
            });
        }
        if let Some((name, _)) = &self.var_keyword {
            let extra = args
                .keywords
                .iter()
                .filter(|(k, _)| !self.keywords.contains_key(k))
                .map(|(k, v)| (Value::Str(k.clone()), v.clone()));
            bindings.push(Binding {
                name,
                rule: None,
                declared: false,
                value: Value::Dict(extra.collect()),
            });
        }
        bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn add() -> SignatureRules {
        SignatureRules::compile(
            &Signature::new("add")
                .param("a", TypeDescriptor::int())
                .param("b", TypeDescriptor::int())
                .returns(TypeDescriptor::int()),
        )
        .unwrap()
    }

    #[test]
    fn test_positional_rules_are_aligned() {
        let rules = add();
        assert_eq!(rules.positional_names().collect::<Vec<_>>(), vec!["a", "b"]);
        let err = rules.check_call(&CallArgs::new().arg(1).arg("2")).unwrap_err();
        let violation = err.as_type().unwrap();
        assert_eq!(violation.subject, Subject::Argument("b".into()));
        assert_eq!(violation.expected, "int");
        assert_eq!(violation.actual, "str");
    }

    #[test]
    fn test_keywords_are_checked_by_name() {
        let rules = add();
        assert!(rules.check_call(&CallArgs::new().arg(1).kwarg("b", 2)).is_ok());
        let err = rules.check_call(&CallArgs::new().kwarg("b", 2.5).kwarg("a", 1)).unwrap_err();
        assert_eq!(err.as_type().unwrap().subject.name(), "b");
    }

    #[test]
    fn test_call_shape_errors() {
        let rules = add();
        let too_many = rules.check_call(&CallArgs::new().arg(1).arg(2).arg(3)).unwrap_err();
        assert_eq!(too_many.kind(), ErrorKind::Call);
        assert_eq!(
            too_many.to_string(),
            "call failed: add() takes 2 positional arguments but 3 were given"
        );

        let unknown = rules.check_call(&CallArgs::new().arg(1).arg(2).kwarg("c", 3)).unwrap_err();
        assert!(unknown.to_string().contains("unexpected keyword argument 'c'"));

        let twice = rules.check_call(&CallArgs::new().arg(1).arg(2).kwarg("a", 3)).unwrap_err();
        assert!(twice.to_string().contains("multiple values for argument 'a'"));

        let missing = rules.check_call(&CallArgs::new().arg(1)).unwrap_err();
        assert!(missing.to_string().contains("missing required argument: 'b'"));
    }

    #[test]
    fn test_variadics_check_each_extra() {
        let rules = SignatureRules::compile(
            &Signature::new("total")
                .param("first", TypeDescriptor::int())
                .var_args("rest", Some(TypeDescriptor::int()))
                .var_kwargs("options", Some(TypeDescriptor::str())),
        )
        .unwrap();
        let ok = CallArgs::new().arg(1).arg(2).arg(3).kwarg("mode", "fast");
        assert!(rules.check_call(&ok).is_ok());

        let bad_extra = CallArgs::new().arg(1).arg(2).arg("3");
        let err = rules.check_call(&bad_extra).unwrap_err();
        assert_eq!(err.as_type().unwrap().subject.name(), "rest");

        let bad_kw = CallArgs::new().arg(1).kwarg("mode", 1);
        let err = rules.check_call(&bad_kw).unwrap_err();
        assert_eq!(err.as_type().unwrap().subject.name(), "mode");

        let bound = rules.bind(&ok);
        assert_eq!(bound[1].name, "rest");
        assert_eq!(bound[1].value, Value::tuple([2, 3]));
        assert_eq!(bound[2].value, Value::dict([("mode", "fast")]));
    }

    #[test]
    fn test_positional_only_rejects_keyword() {
        let x = Param::new("x", ParamKind::PositionalOnly).annotate(TypeDescriptor::int());
        let rules = SignatureRules::compile(&Signature::new("f").with(x)).unwrap();
        assert!(rules.check_call(&CallArgs::new().arg(1)).is_ok());
        assert!(rules.check_call(&CallArgs::new().kwarg("x", 1)).is_err());
    }

    #[test]
    fn test_defaults_fill_missing_arguments() {
        let rules = SignatureRules::compile(
            &Signature::new("greet")
                .param("name", TypeDescriptor::str())
                .with(Param::new("times", ParamKind::PositionalOrKeyword).default_value(1)),
        )
        .unwrap();
        let args = CallArgs::new().arg("Luna");
        assert!(rules.check_call(&args).is_ok());
        let bound = rules.bind(&args);
        assert_eq!(bound[1].value, Value::Int(1));
        assert!(bound[1].rule.is_none());
    }

    #[test]
    fn test_receiver_shifts_alignment() {
        let sig = Signature::new("__init__").param("age", TypeDescriptor::int());
        let rules = SignatureRules::compile(&sig).unwrap().with_receiver();
        assert_eq!(rules.positional_names().collect::<Vec<_>>(), vec!["age"]);
        assert!(rules.check_call(&CallArgs::new().arg(3)).is_ok());
        assert!(rules.check_call(&CallArgs::new().kwarg("age", 3)).is_ok());
        assert!(rules.check_call(&CallArgs::new().arg(3.5)).is_err());
    }

    #[test]
    fn test_fallback_applies_to_unannotated_only() {
        let attribute = Arc::new(RuleEntry::compile("age", &TypeDescriptor::int()));
        let rules = SignatureRules::compile_with(
            &Signature::new("__init__").untyped("age").param("name", TypeDescriptor::str()),
            |name| (name == "age").then(|| attribute.clone()),
        )
        .unwrap();
        assert!(rules.check_call(&CallArgs::new().arg("3").arg("Luna")).is_err());
        assert!(rules.check_call(&CallArgs::new().arg(3).arg("Luna")).is_ok());
    }

    #[test]
    fn test_layout_is_validated() {
        let out_of_order = Signature::new("f")
            .keyword_only("k", TypeDescriptor::int())
            .param("p", TypeDescriptor::int());
        let err = SignatureRules::compile(&out_of_order).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);

        let duplicate = Signature::new("f").untyped("x").untyped("x");
        assert!(SignatureRules::compile(&duplicate).is_err());
    }

    #[test]
    fn test_return_rule() {
        let rules = add();
        assert!(rules.check_return(&Value::Int(3)).is_ok());
        let err = rules.check_return(&Value::from("3")).unwrap_err();
        assert_eq!(err.as_type().unwrap().subject, Subject::Return);
        assert_eq!(err.to_string(), "Return value expected int, got str ('3')");
    }
}
