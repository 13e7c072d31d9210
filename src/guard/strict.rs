//! Strict mode: boundary checks plus type-stable locals.
use super::args::CallArgs;
use super::boundary::Invoke;
use super::signature::{Flavor, Signature, SignatureRules};
use crate::compute::{Engine, Frame, Program};
use crate::config::GuardConfig;
use crate::error::{GuardError, Result};
use crate::store::Value;
use std::sync::Arc;

type NativeBody = dyn Fn(&mut Frame<'_>) -> Result<Value> + Send + Sync;

/// What a strict guard runs once the arguments are bound.
#[derive(Clone)]
pub enum StrictBody {
    /// An instrumented closure; every local assignment goes through [`Frame::store`].
    Native(Arc<NativeBody>),
    /// A bytecode script; every `Store` instruction is observed.
    Script(Arc<Program>),
}

impl std::fmt::Debug for StrictBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrictBody::Native(_) => f.write_str("Native(..)"),
            StrictBody::Script(program) => f.debug_tuple("Script").field(program).finish(),
        }
    }
}

/// A guard that also pins every local variable to the type it was first given.
///
/// Each invocation, recursive ones included, runs against its own fresh [`Frame`].
#[derive(Clone, Debug)]
pub struct StrictGuard {
    rules: Arc<SignatureRules>,
    body: StrictBody,
    config: GuardConfig,
}

impl StrictGuard {
    pub fn native<F>(signature: &Signature, body: F) -> Result<Self>
    where
        F: Fn(&mut Frame<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        Self::with_config(signature, StrictBody::Native(Arc::new(body)), GuardConfig::default())
    }

    pub fn script(signature: &Signature, program: Program) -> Result<Self> {
        Self::with_config(signature, StrictBody::Script(Arc::new(program)), GuardConfig::default())
    }

    /// Generator and coroutine bodies suspend mid-invocation, so their locals cannot be
    /// traced to a single frame; they are refused here.
    pub fn with_config(
        signature: &Signature,
        body: StrictBody,
        config: GuardConfig,
    ) -> Result<Self> {
        if signature.flavor != Flavor::Plain {
            return Err(GuardError::Unsupported(format!(
                "strict mode does not support {:?} functions ({})",
                signature.flavor, signature.name
            )));
        }
        let rules = SignatureRules::compile(signature)?;
        tracing::trace!(
            function = %signature.name,
            check_return = config.check_return,
            "strict guard created"
        );
        Ok(Self { rules: Arc::new(rules), body, config })
    }

    pub fn name(&self) -> &str {
        self.rules.name()
    }

    pub fn rules(&self) -> &SignatureRules {
        &self.rules
    }

    pub fn call(&self, args: &CallArgs) -> Result<Value> {
        self.rules.check_call(args).inspect_err(|e| {
            tracing::debug!(function = self.name(), error = %e, "call rejected");
        })?;

        let mut frame = Frame::new(self.rules.name(), self);
        for binding in self.rules.bind(args) {
            frame.bind(binding.name, binding.rule, binding.declared, binding.value);
        }

        let result = match &self.body {
            StrictBody::Native(body) => body(&mut frame),
            StrictBody::Script(program) => Engine::run(program, &mut frame),
        }?;

        if self.config.check_return {
            self.rules.check_return(&result).inspect_err(|e| {
                tracing::debug!(function = self.name(), error = %e, "return rejected");
            })?;
        }
        Ok(result)
    }
}

impl Invoke for StrictGuard {
    fn invoke(&self, args: &CallArgs) -> Result<Value> {
        self.call(args)
    }
}
