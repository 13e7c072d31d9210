use crate::store::{Opaque, Value};
use crate::type_system::{parse, RuleEntry};
use crate::validation::{matches, Subject};
use pyo3::create_exception;
use pyo3::exceptions::{PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{
    PyBool, PyBytes, PyDict, PyFloat, PyFrozenSet, PyInt, PyList, PySet, PyString, PyTuple,
};

create_exception!(_core, GuardianTypeError, PyTypeError);

/// Converts a Python object into the crate's value model.
///
/// Scalars are matched by exact type, so subclasses such as `IntEnum` members become
/// [`Opaque`] and never satisfy an exact `int` rule. Anything else the model has no
/// shape for is also carried as [`Opaque`].
fn to_value(obj: &Bound<'_, PyAny>) -> PyResult<Value> {
    if obj.is_none() {
        return Ok(Value::None);
    }
    if obj.is_exact_instance_of::<PyBool>() {
        return Ok(Value::Bool(obj.extract()?));
    }
    if obj.is_exact_instance_of::<PyInt>() {
        return Ok(match obj.extract::<i64>() {
            Ok(i) => Value::Int(i),
            Err(_) => Value::BigInt(obj.str()?.extract()?),
        });
    }
    if obj.is_exact_instance_of::<PyFloat>() {
        return Ok(Value::Float(obj.extract()?));
    }
    if obj.is_exact_instance_of::<PyString>() {
        return Ok(Value::Str(obj.extract()?));
    }
    if obj.is_exact_instance_of::<PyBytes>() {
        return Ok(Value::Bytes(obj.extract()?));
    }
    if obj.is_instance_of::<PyList>() {
        return Ok(Value::List(items(obj)?));
    }
    if obj.is_instance_of::<PyTuple>() {
        return Ok(Value::Tuple(items(obj)?));
    }
    if obj.is_instance_of::<PySet>() || obj.is_instance_of::<PyFrozenSet>() {
        return Ok(Value::Set(items(obj)?));
    }
    if obj.is_instance_of::<PyDict>() {
        let mut entries = Vec::new();
        for pair in obj.call_method0("items")?.try_iter()? {
            let (key, value): (Bound<'_, PyAny>, Bound<'_, PyAny>) = pair?.extract()?;
            entries.push((to_value(&key)?, to_value(&value)?));
        }
        return Ok(Value::Dict(entries));
    }
    let type_name = obj.get_type().name()?.to_string();
    Ok(Value::Opaque(Opaque::new(type_name, obj.as_ptr() as usize)))
}

fn items(obj: &Bound<'_, PyAny>) -> PyResult<Vec<Value>> {
    obj.try_iter()?.map(|item| to_value(&item?)).collect()
}

/// A compiled type rule exposed to Python.
#[pyclass(name = "Rule", frozen)]
pub struct PyRule {
    entry: RuleEntry,
}

#[pymethods]
impl PyRule {
    #[getter]
    fn label(&self) -> String {
        self.entry.label.clone()
    }

    fn matches(&self, obj: &Bound<'_, PyAny>) -> PyResult<bool> {
        Ok(matches(&self.entry.rule, &to_value(obj)?))
    }

    /// Raises `GuardianTypeError` when `obj` does not conform.
    fn validate(&self, obj: &Bound<'_, PyAny>) -> PyResult<()> {
        let value = to_value(obj)?;
        self.entry
            .check(&value, Subject::Argument)
            .map_err(|violation| GuardianTypeError::new_err(violation.to_string()))
    }

    fn __repr__(&self) -> String {
        format!("Rule({})", self.entry.label)
    }
}

/// Compiles annotation text such as `"list[dict[str, int | None]]"`.
#[pyfunction]
fn compile(text: &str) -> PyResult<PyRule> {
    let descriptor = parse(text).map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok(PyRule { entry: RuleEntry::compile("value", &descriptor) })
}

pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyRule>()?;
    m.add_function(wrap_pyfunction!(compile, m)?)?;
    m.add("GuardianTypeError", m.py().get_type::<GuardianTypeError>())?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
