//! Instruction set and program layout for strict-mode scripts.
use crate::error::{GuardError, Result};
use crate::guard::Invoke;
use crate::store::Value;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
        }
    }
}

/// One stack-machine instruction. Operands index the program's side tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instr {
    /// Push `constants[i]`.
    Const(u32),
    /// Push the local `names[i]`.
    Load(u32),
    /// Pop into the local `names[i]`; this is the store strict mode observes.
    Store(u32),
    Binary(BinaryOp),
    Jump(u32),
    /// Pop; jump when the value is falsy.
    JumpIfFalse(u32),
    /// Pop `argc` arguments and call the running function again.
    Recurse(u8),
    /// Pop `argc` arguments and call `callees[callee]`.
    Call { callee: u32, argc: u8 },
    /// Pop and return; an empty stack returns `None`.
    Return,
}

/// A validated script: code plus the constant, name and callee tables it indexes.
///
/// Every operand is checked once when the program is assembled, so the engine can
/// index the tables directly.
#[derive(Clone, Default)]
pub struct Program {
    pub(crate) code: Vec<Instr>,
    pub(crate) constants: Vec<Value>,
    pub(crate) names: Vec<String>,
    pub(crate) callees: Vec<Arc<dyn Invoke>>,
}

impl Program {
    /// Assembles a program from raw parts, rejecting any out-of-range operand.
    pub fn from_parts(
        code: Vec<Instr>,
        constants: Vec<Value>,
        names: Vec<String>,
        callees: Vec<Arc<dyn Invoke>>,
    ) -> Result<Self> {
        let program = Self { code, constants, names, callees };
        program.validate_layout()?;
        Ok(program)
    }

    fn validate_layout(&self) -> Result<()> {
        let check = |pc: usize, index: u32, len: usize, what: &str| -> Result<()> {
            if (index as usize) < len {
                Ok(())
            } else {
                Err(GuardError::Unsupported(format!(
                    "instruction {} refers to {} {} but only {} exist",
                    pc, what, index, len
                )))
            }
        };
        for (pc, instr) in self.code.iter().enumerate() {
            match *instr {
                Instr::Const(i) => check(pc, i, self.constants.len(), "constant")?,
                Instr::Load(i) | Instr::Store(i) => check(pc, i, self.names.len(), "name")?,
                // Jumping to one past the end falls off the program.
                Instr::Jump(t) | Instr::JumpIfFalse(t) => {
                    check(pc, t, self.code.len() + 1, "target")?
                }
                Instr::Call { callee, .. } => check(pc, callee, self.callees.len(), "callee")?,
                Instr::Binary(_) | Instr::Recurse(_) | Instr::Return => {}
            }
        }
        Ok(())
    }

    pub fn code(&self) -> &[Instr] {
        &self.code
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("code", &self.code)
            .field("constants", &self.constants)
            .field("names", &self.names)
            .field("callees", &self.callees.len())
            .finish()
    }
}

/// A forward-referenceable jump target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// Emits instructions, interning constants and names, and patches labels on build.
#[derive(Default)]
pub struct ProgramBuilder {
    code: Vec<Instr>,
    constants: Vec<Value>,
    names: Vec<String>,
    callees: Vec<Arc<dyn Invoke>>,
    labels: Vec<Option<u32>>,
    // (instruction index, label) pairs to patch.
    fixups: Vec<(usize, Label)>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn name_index(&mut self, name: &str) -> u32 {
        match self.names.iter().position(|n| n == name) {
            Some(i) => i as u32,
            None => {
                self.names.push(name.to_string());
                (self.names.len() - 1) as u32
            }
        }
    }

    pub fn constant(&mut self, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        let index = match self.constants.iter().position(|c| *c == value) {
            Some(i) => i,
            None => {
                self.constants.push(value);
                self.constants.len() - 1
            }
        };
        self.code.push(Instr::Const(index as u32));
        self
    }

    pub fn load(&mut self, name: &str) -> &mut Self {
        let index = self.name_index(name);
        self.code.push(Instr::Load(index));
        self
    }

    pub fn store(&mut self, name: &str) -> &mut Self {
        let index = self.name_index(name);
        self.code.push(Instr::Store(index));
        self
    }

    pub fn binary(&mut self, op: BinaryOp) -> &mut Self {
        self.code.push(Instr::Binary(op));
        self
    }

    /// A new, not yet placed label.
    pub fn label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Places `label` at the next instruction.
    pub fn place(&mut self, label: Label) -> &mut Self {
        if let Some(slot) = self.labels.get_mut(label.0) {
            *slot = Some(self.code.len() as u32);
        }
        self
    }

    pub fn jump(&mut self, label: Label) -> &mut Self {
        self.fixups.push((self.code.len(), label));
        self.code.push(Instr::Jump(0));
        self
    }

    pub fn jump_if_false(&mut self, label: Label) -> &mut Self {
        self.fixups.push((self.code.len(), label));
        self.code.push(Instr::JumpIfFalse(0));
        self
    }

    pub fn recurse(&mut self, argc: u8) -> &mut Self {
        self.code.push(Instr::Recurse(argc));
        self
    }

    pub fn call(&mut self, callee: Arc<dyn Invoke>, argc: u8) -> &mut Self {
        self.callees.push(callee);
        let index = (self.callees.len() - 1) as u32;
        self.code.push(Instr::Call { callee: index, argc });
        self
    }

    pub fn ret(&mut self) -> &mut Self {
        self.code.push(Instr::Return);
        self
    }

    /// Resolves labels and validates the result.
    pub fn build(&mut self) -> Result<Program> {
        let mut code = std::mem::take(&mut self.code);
        for &(pc, label) in &self.fixups {
            let target = self
                .labels
                .get(label.0)
                .copied()
                .flatten()
                .ok_or_else(|| {
                    GuardError::Unsupported(format!("label {} was never placed", label.0))
                })?;
            code[pc] = match code[pc] {
                Instr::JumpIfFalse(_) => Instr::JumpIfFalse(target),
                _ => Instr::Jump(target),
            };
        }
        self.fixups.clear();
        self.labels.clear();
        Program::from_parts(
            code,
            std::mem::take(&mut self.constants),
            std::mem::take(&mut self.names),
            std::mem::take(&mut self.callees),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_builder_interns_and_patches() {
        let mut b = ProgramBuilder::new();
        let done = b.label();
        b.load("n").constant(1).binary(BinaryOp::Le).jump_if_false(done);
        b.constant(1).ret();
        b.place(done).load("n").ret();
        let program = b.build().unwrap();

        assert_eq!(program.names, vec!["n".to_string()]);
        assert_eq!(program.constants, vec![Value::Int(1)]);
        assert_eq!(program.code()[3], Instr::JumpIfFalse(6));
        assert_eq!(program.len(), 8);
    }

    #[test]
    fn test_unplaced_label_is_rejected() {
        let mut b = ProgramBuilder::new();
        let nowhere = b.label();
        b.jump(nowhere);
        assert_eq!(b.build().unwrap_err().kind(), ErrorKind::Unsupported);
    }

    #[test]
    fn test_out_of_range_operands_are_rejected() {
        let bad_const = Program::from_parts(vec![Instr::Const(0)], vec![], vec![], vec![]);
        assert!(bad_const.is_err());

        let bad_jump = Program::from_parts(vec![Instr::Jump(2)], vec![], vec![], vec![]);
        assert!(bad_jump.unwrap_err().to_string().contains("target 2"));

        let end_jump = Program::from_parts(vec![Instr::Jump(1)], vec![], vec![], vec![]);
        assert!(end_jump.is_ok());

        let code = vec![Instr::Call { callee: 0, argc: 0 }];
        let bad_callee = Program::from_parts(code, vec![], vec![], vec![]);
        assert!(bad_callee.is_err());
    }
}
