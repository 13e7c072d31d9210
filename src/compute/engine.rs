//! The stack interpreter behind script bodies.
use super::bytecode::{BinaryOp, Instr, Program};
use super::frame::Frame;
use crate::error::{GuardError, Result};
use crate::guard::CallArgs;
use crate::store::Value;
use smallvec::SmallVec;
use std::cmp::Ordering;

pub struct Engine;

impl Engine {
    /// Executes `program` against `frame`. Every `Store` goes through [`Frame::store`].
    ///
    /// Falling off the end of the code returns `None`.
    pub fn run(program: &Program, frame: &mut Frame<'_>) -> Result<Value> {
        let mut stack: SmallVec<[Value; 8]> = SmallVec::new();
        let mut pc = 0usize;

        // Operands were range-checked when the program was assembled.
        while let Some(&instr) = program.code.get(pc) {
            pc += 1;
            match instr {
                Instr::Const(i) => stack.push(program.constants[i as usize].clone()),
                Instr::Load(i) => stack.push(frame.load(&program.names[i as usize])?),
                Instr::Store(i) => {
                    let value = pop(&mut stack, frame)?;
                    frame.store(&program.names[i as usize], value)?;
                }
                Instr::Binary(op) => {
                    let rhs = pop(&mut stack, frame)?;
                    let lhs = pop(&mut stack, frame)?;
                    stack.push(binary(op, &lhs, &rhs)?);
                }
                Instr::Jump(target) => pc = target as usize,
                Instr::JumpIfFalse(target) => {
                    if !pop(&mut stack, frame)?.truthy() {
                        pc = target as usize;
                    }
                }
                Instr::Recurse(argc) => {
                    let args = pop_args(&mut stack, argc, frame)?;
                    stack.push(frame.recurse(&args)?);
                }
                Instr::Call { callee, argc } => {
                    let args = pop_args(&mut stack, argc, frame)?;
                    stack.push(program.callees[callee as usize].invoke(&args)?);
                }
                Instr::Return => return Ok(stack.pop().unwrap_or(Value::None)),
            }
        }
        Ok(Value::None)
    }
}

fn pop(stack: &mut SmallVec<[Value; 8]>, frame: &Frame<'_>) -> Result<Value> {
    stack
        .pop()
        .ok_or_else(|| GuardError::Call(format!("{}(): stack underflow", frame.function())))
}

fn pop_args(stack: &mut SmallVec<[Value; 8]>, argc: u8, frame: &Frame<'_>) -> Result<CallArgs> {
    let argc = argc as usize;
    if stack.len() < argc {
        return Err(GuardError::Call(format!("{}(): stack underflow", frame.function())));
    }
    let split = stack.len() - argc;
    Ok(stack.drain(split..).collect())
}

enum Number {
    Int(i64),
    Float(f64),
}

fn number(value: &Value) -> Option<Number> {
    match value {
        Value::Bool(b) => Some(Number::Int(*b as i64)),
        Value::Int(i) => Some(Number::Int(*i)),
        Value::Float(x) => Some(Number::Float(*x)),
        _ => None,
    }
}

fn as_f64(n: &Number) -> f64 {
    match *n {
        Number::Int(i) => i as f64,
        Number::Float(x) => x,
    }
}

fn unsupported(op: BinaryOp, lhs: &Value, rhs: &Value) -> GuardError {
    GuardError::Call(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        lhs.type_name(),
        rhs.type_name()
    ))
}

fn overflow() -> GuardError {
    GuardError::Call("integer overflow".to_string())
}

/// Longest sequence, in elements or bytes, that repetition may produce.
const MAX_REPEAT_LEN: usize = 1 << 28;

/// How many copies `seq * n` makes; negative counts give none.
fn repeat_count(len: usize, n: i64) -> Result<usize> {
    if n <= 0 || len == 0 {
        return Ok(0);
    }
    let times = usize::try_from(n).unwrap_or(usize::MAX);
    match len.checked_mul(times) {
        Some(total) if total <= MAX_REPEAT_LEN => Ok(times),
        _ => Err(GuardError::Call("repeated sequence too large".to_string())),
    }
}

/// Host arithmetic: int/float promotion, sequence concatenation and repetition,
/// true division, and ordering comparisons.
fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(lhs.host_eq(rhs))),
        BinaryOp::Ne => return Ok(Value::Bool(!lhs.host_eq(rhs))),
        // Script arithmetic is 64-bit.
        _ if matches!(lhs, Value::BigInt(_)) || matches!(rhs, Value::BigInt(_)) => {
            return Err(overflow())
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(lhs, rhs).ok_or_else(|| unsupported(op, lhs, rhs))?;
            return Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }));
        }
        _ => {}
    }

    if let (Some(a), Some(b)) = (number(lhs), number(rhs)) {
        return arithmetic(op, a, b);
    }

    match (op, lhs, rhs) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
        (BinaryOp::Add, Value::List(a), Value::List(b)) => {
            Ok(Value::List(a.iter().chain(b).cloned().collect()))
        }
        (BinaryOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            Ok(Value::Tuple(a.iter().chain(b).cloned().collect()))
        }
        (BinaryOp::Mul, Value::Str(s), Value::Int(n))
        | (BinaryOp::Mul, Value::Int(n), Value::Str(s)) => {
            Ok(Value::Str(s.repeat(repeat_count(s.len(), *n)?)))
        }
        (BinaryOp::Mul, Value::List(items), Value::Int(n))
        | (BinaryOp::Mul, Value::Int(n), Value::List(items)) => {
            let times = repeat_count(items.len(), *n)?;
            let mut repeated = Vec::with_capacity(items.len() * times);
            for _ in 0..times {
                repeated.extend(items.iter().cloned());
            }
            Ok(Value::List(repeated))
        }
        _ => Err(unsupported(op, lhs, rhs)),
    }
}

fn arithmetic(op: BinaryOp, a: Number, b: Number) -> Result<Value> {
    if let BinaryOp::Div = op {
        let divisor = as_f64(&b);
        if divisor == 0.0 {
            return Err(GuardError::Call("division by zero".to_string()));
        }
        return Ok(Value::Float(as_f64(&a) / divisor));
    }
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => {
            let result = match op {
                BinaryOp::Add => x.checked_add(y),
                BinaryOp::Sub => x.checked_sub(y),
                _ => x.checked_mul(y),
            };
            result.map(Value::Int).ok_or_else(overflow)
        }
        (a, b) => {
            let (x, y) = (as_f64(&a), as_f64(&b));
            Ok(Value::Float(match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                _ => x * y,
            }))
        }
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (number(lhs), number(rhs)) {
        return match (a, b) {
            (Number::Int(x), Number::Int(y)) => Some(x.cmp(&y)),
            (a, b) => as_f64(&a).partial_cmp(&as_f64(&b)),
        };
    }
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::ProgramBuilder;
    use crate::error::ErrorKind;
    use rstest::rstest;

    fn noop(_: &CallArgs) -> Result<Value> {
        Ok(Value::None)
    }

    #[rstest]
    #[case(BinaryOp::Add, Value::Int(2), Value::Int(3), Value::Int(5))]
    #[case(BinaryOp::Add, Value::Int(2), Value::Float(0.5), Value::Float(2.5))]
    #[case(BinaryOp::Add, Value::Bool(true), Value::Int(1), Value::Int(2))]
    #[case(BinaryOp::Div, Value::Int(7), Value::Int(2), Value::Float(3.5))]
    #[case(BinaryOp::Mul, Value::from("ab"), Value::Int(2), Value::from("abab"))]
    #[case(BinaryOp::Add, Value::from("a"), Value::from("b"), Value::from("ab"))]
    #[case(BinaryOp::Add, Value::list([1]), Value::list([2]), Value::list([1, 2]))]
    #[case(BinaryOp::Eq, Value::Int(1), Value::Float(1.0), Value::Bool(true))]
    #[case(BinaryOp::Lt, Value::from("a"), Value::from("b"), Value::Bool(true))]
    #[case(BinaryOp::Ge, Value::Int(3), Value::Float(3.5), Value::Bool(false))]
    #[case(BinaryOp::Eq, Value::Int((1 << 53) + 1), Value::Int(1 << 53), Value::Bool(false))]
    #[case(BinaryOp::Ne, Value::Bool(true), Value::Int(1), Value::Bool(false))]
    #[case(BinaryOp::Mul, Value::list([1, 2]), Value::Int(2), Value::list([1, 2, 1, 2]))]
    #[case(BinaryOp::Mul, Value::Int(-3), Value::from("ab"), Value::from(""))]
    #[case(BinaryOp::Mul, Value::from(""), Value::Int(i64::MAX), Value::from(""))]
    #[case(BinaryOp::Mul, Value::List(vec![]), Value::Int(i64::MAX), Value::List(vec![]))]
    fn test_host_arithmetic(
        #[case] op: BinaryOp,
        #[case] lhs: Value,
        #[case] rhs: Value,
        #[case] expected: Value,
    ) {
        assert_eq!(binary(op, &lhs, &rhs).unwrap(), expected);
    }

    #[test]
    fn test_arithmetic_errors() {
        let zero = binary(BinaryOp::Div, &Value::Int(1), &Value::Int(0)).unwrap_err();
        assert_eq!(zero.to_string(), "call failed: division by zero");

        let mixed = binary(BinaryOp::Add, &Value::Int(1), &Value::from("2")).unwrap_err();
        assert_eq!(
            mixed.to_string(),
            "call failed: unsupported operand type(s) for +: 'int' and 'str'"
        );

        assert!(binary(BinaryOp::Mul, &Value::Int(i64::MAX), &Value::Int(2)).is_err());
        let big = Value::BigInt("9223372036854775808".into());
        let wide = binary(BinaryOp::Add, &big, &Value::Int(1)).unwrap_err();
        assert_eq!(wide.to_string(), "call failed: integer overflow");

        let huge = Value::Int(i64::MAX);
        let text = binary(BinaryOp::Mul, &Value::from("ab"), &huge).unwrap_err();
        assert_eq!(text.to_string(), "call failed: repeated sequence too large");
        let items = binary(BinaryOp::Mul, &huge, &Value::list([1, 2, 3])).unwrap_err();
        assert_eq!(items.to_string(), "call failed: repeated sequence too large");
    }

    #[test]
    fn test_loop_sums_through_stores() {
        // total = 0; i = 0; while i < 4: total = total + i; i = i + 1
        let mut b = ProgramBuilder::new();
        let (top, done) = (b.label(), b.label());
        b.constant(0).store("total").constant(0).store("i");
        b.place(top).load("i").constant(4).binary(BinaryOp::Lt).jump_if_false(done);
        b.load("total").load("i").binary(BinaryOp::Add).store("total");
        b.load("i").constant(1).binary(BinaryOp::Add).store("i").jump(top);
        b.place(done).load("total").ret();
        let program = b.build().unwrap();

        let mut frame = Frame::new("sum", &noop);
        assert_eq!(Engine::run(&program, &mut frame).unwrap(), Value::Int(6));
        assert_eq!(frame.get("i"), Some(&Value::Int(4)));
    }

    #[test]
    fn test_store_drift_aborts_script() {
        let mut b = ProgramBuilder::new();
        b.constant(1).store("y").constant("a").store("y").constant(99).ret();
        let program = b.build().unwrap();

        let mut frame = Frame::new("drift", &noop);
        let err = Engine::run(&program, &mut frame).unwrap_err();
        assert_eq!(err.to_string(), "Variable 'y' expected int, got str ('a')");
    }

    #[test]
    fn test_falling_off_the_end_returns_none() {
        let mut b = ProgramBuilder::new();
        b.constant(1).store("x");
        let program = b.build().unwrap();
        let mut frame = Frame::new("f", &noop);
        assert_eq!(Engine::run(&program, &mut frame).unwrap(), Value::None);
    }

    #[test]
    fn test_stack_underflow_is_an_error() {
        let code = vec![Instr::Binary(BinaryOp::Add)];
        let program = Program::from_parts(code, vec![], vec![], vec![]).unwrap();
        let mut frame = Frame::new("f", &noop);
        assert_eq!(Engine::run(&program, &mut frame).unwrap_err().kind(), ErrorKind::Call);
    }

    #[test]
    fn test_call_passes_arguments_in_order() {
        let mut b = ProgramBuilder::new();
        let subtract = std::sync::Arc::new(|args: &CallArgs| {
            let a = args.positional[0].as_int().unwrap_or(0);
            let b = args.positional[1].as_int().unwrap_or(0);
            Ok(Value::Int(a - b))
        });
        b.constant(10).constant(3).call(subtract, 2).ret();
        let program = b.build().unwrap();
        let mut frame = Frame::new("f", &noop);
        assert_eq!(Engine::run(&program, &mut frame).unwrap(), Value::Int(7));
    }
}
