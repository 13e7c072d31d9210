//! Turns declared types into compiled rules.
//!
//! Annotation text is parsed into a `TypeDescriptor`, which the compiler lowers into a
//! `Rule` tree once, at decoration time. Call-time code only ever sees the compiled form.

pub use self::compiler::{compile, compile_strict, specialize_primitives};
pub use self::error::ParseError;
pub use self::parser::{parse, parse_with};
pub use self::rule::Rule;
pub use self::table::{RuleEntry, RuleTable};

// --- MODULE DECLARATIONS ---
mod compiler;
mod error;
mod parser;
mod rule;
mod table;
