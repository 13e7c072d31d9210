//! Call-boundary enforcement.
//!
//! A `Signature` is compiled once into `SignatureRules`; a `Guard` checks arguments and
//! the return value on every call, and a `StrictGuard` additionally runs its body against
//! a per-invocation `Frame` that pins each local to a single type.

pub use self::args::CallArgs;
pub use self::boundary::{Guard, Invoke};
pub use self::signature::{Binding, Flavor, Param, ParamKind, Signature, SignatureRules};
pub use self::strict::{StrictBody, StrictGuard};

// --- MODULE DECLARATIONS ---
mod args;
mod boundary;
mod signature;
mod strict;
