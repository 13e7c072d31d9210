//! The attribute shield: classes whose attribute assignments are validated and whose
//! private names are sealed to the class lineage.

pub use self::class::{AttributeRule, ClassBuilder, ClassDef, InitBody, MethodBody};
pub use self::instance::{Instance, This};

// --- MODULE DECLARATIONS ---
mod class;
mod instance;
mod lineage;
