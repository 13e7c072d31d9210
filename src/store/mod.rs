//! The data model: runtime values, their type tags and declared type descriptors.
pub mod descriptor;
pub mod types;
pub mod value;

pub use descriptor::{Builtin, ClassRef, TypeDescriptor};
pub use types::{ClassId, ValueType};
pub use value::{Opaque, Value};
