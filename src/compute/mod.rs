//! Strict-mode execution: the local-variable frame and a small bytecode interpreter
//! whose every store is observed by that frame.

pub use self::bytecode::{BinaryOp, Instr, Label, Program, ProgramBuilder};
pub use self::engine::Engine;
pub use self::frame::Frame;

// --- MODULE DECLARATIONS ---
mod bytecode;
mod engine;
mod frame;
