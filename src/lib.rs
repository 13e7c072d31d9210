//! Runtime contract enforcement.
//!
//! Declared types are compiled once into [`Rule`] trees and checked against dynamic
//! [`Value`]s: at a callable's boundary ([`Guard`]), on every local store inside it
//! ([`StrictGuard`]), and on every attribute assignment of a shielded object
//! ([`ClassBuilder`], [`Instance`]).

pub mod compute;
pub mod config;
pub mod error;
pub mod guard;
pub mod shield;
pub mod store;
pub mod type_system;
pub mod validation;

#[cfg(feature = "python")]
mod bindings {
    pub mod python;
}

pub use config::{GuardConfig, ShieldConfig};
pub use error::{AccessAction, AccessViolation, ErrorKind, GuardError, Result};
pub use guard::{
    CallArgs, Flavor, Guard, Invoke, Param, ParamKind, Signature, StrictBody, StrictGuard,
};
pub use shield::{ClassBuilder, ClassDef, Instance, This};
pub use store::{Builtin, ClassId, Opaque, TypeDescriptor, Value, ValueType};
pub use type_system::{compile, compile_strict, parse, parse_with, Rule, RuleEntry};
pub use validation::{matches, validate, validate_all, Mismatch, Subject, TypeViolation};

// --- Python Module Definition ---
/// Defines the `guardian._core` Python module.
#[cfg(feature = "python")]
#[pyo3::pymodule]
fn _core(m: &pyo3::Bound<'_, pyo3::types::PyModule>) -> pyo3::PyResult<()> {
    bindings::python::register(m)
}
