//! The call-boundary guard.
use super::args::CallArgs;
use super::signature::{Signature, SignatureRules};
use crate::config::GuardConfig;
use crate::error::Result;
use crate::store::Value;
use std::sync::Arc;

/// The fast-invocation seam: anything that can be called with [`CallArgs`].
pub trait Invoke: Send + Sync {
    fn invoke(&self, args: &CallArgs) -> Result<Value>;
}

impl<F> Invoke for F
where
    F: Fn(&CallArgs) -> Result<Value> + Send + Sync,
{
    fn invoke(&self, args: &CallArgs) -> Result<Value> {
        self(args)
    }
}

/// A callable wrapped with argument and return validation.
///
/// ```
/// use guardian_core::{CallArgs, Guard, Signature, TypeDescriptor, Value};
///
/// let sig = Signature::new("add")
///     .param("a", TypeDescriptor::int())
///     .param("b", TypeDescriptor::int())
///     .returns(TypeDescriptor::int());
/// let add = Guard::new(&sig, |args: &CallArgs| {
///     let a = args.positional[0].as_int().unwrap_or(0);
///     let b = args.positional[1].as_int().unwrap_or(0);
///     Ok(Value::Int(a + b))
/// })
/// .unwrap();
///
/// assert_eq!(add.call(&CallArgs::new().arg(1).arg(2)).unwrap(), Value::Int(3));
/// assert!(add.call(&CallArgs::new().arg(1).arg("2")).is_err());
/// ```
#[derive(Clone)]
pub struct Guard {
    rules: Arc<SignatureRules>,
    body: Arc<dyn Invoke>,
    config: GuardConfig,
}

impl Guard {
    pub fn new<I: Invoke + 'static>(signature: &Signature, body: I) -> Result<Self> {
        Self::with_config(signature, body, GuardConfig::default())
    }

    pub fn with_config<I: Invoke + 'static>(
        signature: &Signature,
        body: I,
        config: GuardConfig,
    ) -> Result<Self> {
        let rules = SignatureRules::compile(signature)?;
        Ok(Self::from_rules(Arc::new(rules), Arc::new(body), config))
    }

    /// Wraps `body` with rules compiled elsewhere.
    pub fn from_rules(
        rules: Arc<SignatureRules>,
        body: Arc<dyn Invoke>,
        config: GuardConfig,
    ) -> Self {
        tracing::trace!(
            function = rules.name(),
            check_return = config.check_return,
            "guard created"
        );
        Self { rules, body, config }
    }

    pub fn name(&self) -> &str {
        self.rules.name()
    }

    pub fn rules(&self) -> &SignatureRules {
        &self.rules
    }

    pub fn config(&self) -> GuardConfig {
        self.config
    }

    /// Validates arguments, invokes the body, then validates the result.
    ///
    /// The body is never entered when an argument fails; a failing result is discarded.
    pub fn call(&self, args: &CallArgs) -> Result<Value> {
        self.rules.check_call(args).inspect_err(|e| {
            tracing::debug!(function = self.name(), error = %e, "call rejected");
        })?;
        let result = self.body.invoke(args)?;
        if self.config.check_return {
            self.rules.check_return(&result).inspect_err(|e| {
                tracing::debug!(function = self.name(), error = %e, "return rejected");
            })?;
        }
        Ok(result)
    }
}

impl Invoke for Guard {
    fn invoke(&self, args: &CallArgs) -> Result<Value> {
        self.call(args)
    }
}

impl std::fmt::Debug for Guard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guard").field("rules", &self.rules).field("config", &self.config).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, GuardError};
    use crate::store::TypeDescriptor;
    use crate::type_system::parse;
    use crate::validation::Subject;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn int_add() -> Signature {
        Signature::new("add")
            .param("a", TypeDescriptor::int())
            .param("b", TypeDescriptor::int())
            .returns(TypeDescriptor::int())
    }

    fn sum(args: &CallArgs) -> Result<Value> {
        let mut total = 0;
        for v in args.positional.iter().chain(args.keywords.iter().map(|(_, v)| v)) {
            total += v.as_int().ok_or_else(|| GuardError::Call("not an int".into()))?;
        }
        Ok(Value::Int(total))
    }

    #[test]
    fn test_add_rejects_string_argument() {
        let add = Guard::new(&int_add(), sum).unwrap();
        assert_eq!(add.call(&CallArgs::new().arg(1).arg(2)).unwrap(), Value::Int(3));

        let err = add.call(&CallArgs::new().arg(1).arg("2")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        let violation = err.as_type().unwrap();
        assert_eq!(violation.subject, Subject::Argument("b".into()));
        assert_eq!(violation.expected, "int");
        assert_eq!(violation.actual, "str");
    }

    #[test]
    fn test_body_not_entered_on_bad_argument() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let add = Guard::new(&int_add(), move |args: &CallArgs| {
            seen.fetch_add(1, Ordering::SeqCst);
            sum(args)
        })
        .unwrap();
        assert!(add.call(&CallArgs::new().arg(true).arg(1)).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(add.call(&CallArgs::new().arg(2).arg(1)).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_optional_and_union_parameters() {
        let sig = Signature::new("describe")
            .param("name", parse("str | None").unwrap())
            .param("size", parse("Union[int, float]").unwrap());
        let describe = Guard::new(&sig, |_: &CallArgs| Ok(Value::None)).unwrap();

        assert!(describe.call(&CallArgs::new().arg(Value::None).arg(1.5)).is_ok());
        assert!(describe.call(&CallArgs::new().arg("x").arg(2)).is_ok());
        let err = describe.call(&CallArgs::new().arg(3).arg(2)).unwrap_err();
        assert_eq!(err.as_type().unwrap().expected, "str | None");
    }

    #[test]
    fn test_nested_containers() {
        let rows = parse("list[dict[str, int | float]]").unwrap();
        let sig = Signature::new("ingest").param("rows", rows);
        let ingest = Guard::new(&sig, |args: &CallArgs| {
            let count = args.positional[0].as_items().map_or(0, |r| r.len());
            Ok(Value::Int(count as i64))
        })
        .unwrap();

        let first = Value::dict([("a", Value::Int(1))]);
        let good = Value::list([first.clone(), Value::dict([("b", Value::Float(2.0))])]);
        assert_eq!(ingest.call(&CallArgs::new().arg(good)).unwrap(), Value::Int(2));

        let bad = Value::list([first, Value::dict([("b", Value::from("2"))])]);
        let err = ingest.call(&CallArgs::new().arg(bad)).unwrap_err();
        let violation = err.as_type().unwrap();
        assert_eq!(violation.expected, "list[dict[str, int | float]]");
        assert_eq!(violation.mismatch.as_ref().unwrap().path.to_string(), "[1]['b']");
    }

    #[test]
    fn test_return_value_is_enforced() {
        let liar = Guard::new(&int_add(), |_: &CallArgs| Ok(Value::from("three"))).unwrap();
        let err = liar.call(&CallArgs::new().arg(1).arg(2)).unwrap_err();
        assert_eq!(err.as_type().unwrap().subject, Subject::Return);
    }

    #[test]
    fn test_return_check_can_be_disabled() {
        let config = GuardConfig { check_return: false };
        let three = |_: &CallArgs| -> Result<Value> { Ok(Value::from("three")) };
        let liar = Guard::with_config(&int_add(), three, config).unwrap();
        assert_eq!(liar.call(&CallArgs::new().arg(1).arg(2)).unwrap(), Value::from("three"));
    }

    #[test]
    fn test_unannotated_parameters_pass_through() {
        let callback = parse("Callable[[int], int]").unwrap();
        let sig = Signature::new("echo").untyped("x").param("y", callback);
        let echo = Guard::new(&sig, |args: &CallArgs| Ok(args.positional[0].clone())).unwrap();
        let out = echo.call(&CallArgs::new().arg(Value::Bytes(b"raw".to_vec())).arg(0)).unwrap();
        assert_eq!(out, Value::Bytes(b"raw".to_vec()));
    }

    #[test]
    fn test_body_errors_propagate() {
        let sig = Signature::new("fail");
        let fail = Guard::new(&sig, |_: &CallArgs| Err(GuardError::Call("boom".into()))).unwrap();
        assert_eq!(fail.call(&CallArgs::new()).unwrap_err().kind(), ErrorKind::Call);
    }

    #[test]
    fn test_guards_compose_through_invoke() {
        let inner = Guard::new(&int_add(), sum).unwrap();
        let sig = Signature::new("outer").var_args("args", None).returns(TypeDescriptor::int());
        let outer = Guard::new(&sig, inner).unwrap();
        assert_eq!(outer.call(&CallArgs::new().arg(4).arg(5)).unwrap(), Value::Int(9));
        assert!(outer.call(&CallArgs::new().arg(4).arg(5.0)).is_err());
    }
}
