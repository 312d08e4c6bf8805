use std::collections::BTreeMap;
use std::rc::Rc;

use crate::code::{read_u16, read_u8, Op};
use crate::compiler::Bytecode;
use crate::object::builtins::BUILTINS;
use crate::object::{Closure, CompiledFunction, HashPair, Kind, Object};

pub const STACK_SIZE: usize = 2048;
pub const GLOBALS_SIZE: usize = 65536;
pub const MAX_FRAMES: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error("stack overflow")]
    StackOverflow,
    #[error("unknown opcode: {op}")]
    UnknownOpcode { op: u8 },
    #[error("unsupported types for binary operation: {left} {right}")]
    UnsupportedBinaryTypes { left: Kind, right: Kind },
    #[error("unknown string operator: {op}")]
    UnknownStringOperator { op: &'static str },
    #[error("unknown operator: {op} ({left} {right})")]
    UnknownOperator { op: &'static str, left: Kind, right: Kind },
    #[error("unsupported type for negation: {kind}")]
    UnsupportedNegation { kind: Kind },
    #[error("division by zero")]
    DivisionByZero,
    #[error("calling non-closure and non-builtin")]
    NotCallable,
    #[error("wrong number of arguments: want={want}, got={got}")]
    WrongArgumentCount { want: usize, got: usize },
    #[error("unusable as hash key: {kind}")]
    UnusableHashKey { kind: Kind },
    #[error("index operator not supported: {kind}")]
    IndexNotSupported { kind: Kind },
    #[error("constant {index} is not a function")]
    NotAFunction { index: usize },
}

type Result<T> = std::result::Result<T, VmError>;

/// One call record: the closure being run, its instruction pointer, and
/// the stack offset below which its locals live.
struct Frame {
    closure: Rc<Closure>,
    ip: usize,
    base_pointer: usize,
}

pub struct Vm {
    constants: Vec<Object>,
    stack: Vec<Object>,
    /// Next free stack slot; the top of stack is `stack[sp - 1]`.
    sp: usize,
    globals: Vec<Object>,
    frames: Vec<Frame>,
}

impl Vm {
    pub fn new(bytecode: Bytecode) -> Self {
        Vm::new_with_globals(bytecode, vec![Object::Null; GLOBALS_SIZE])
    }

    /// Reuse an existing globals vector, so REPL lines keep their `let`
    /// bindings across VM instances.
    pub fn new_with_globals(bytecode: Bytecode, globals: Vec<Object>) -> Self {
        let main_fn = Rc::new(CompiledFunction {
            instructions: bytecode.instructions,
            num_locals: 0,
            num_parameters: 0,
        });
        let main_closure = Rc::new(Closure { func: main_fn, free: Vec::new() });
        Vm {
            constants: bytecode.constants,
            stack: vec![Object::Null; STACK_SIZE],
            sp: 0,
            globals,
            frames: vec![Frame { closure: main_closure, ip: 0, base_pointer: 0 }],
        }
    }

    /// Hand the globals vector back for the next REPL line.
    pub fn into_globals(self) -> Vec<Object> {
        self.globals
    }

    /// The value most recently popped off the stack: what an expression
    /// statement evaluated to.
    pub fn last_popped(&self) -> Object {
        self.stack[self.sp].clone()
    }

    pub fn run(&mut self) -> Result<()> {
        loop {
            let (func, ip) = {
                let Some(frame) = self.frames.last() else { break };
                (Rc::clone(&frame.closure.func), frame.ip)
            };
            let ins = &func.instructions;
            if ip >= ins.len() {
                if self.frames.len() <= 1 {
                    break;
                }
                self.frames.pop();
                continue;
            }

            let op = Op::from_u8(ins[ip]).ok_or(VmError::UnknownOpcode { op: ins[ip] })?;
            // Step past the whole instruction up front; jumps and calls
            // overwrite or push below.
            self.set_ip(ip + op.instruction_len());

            match op {
                Op::Constant => {
                    let idx = read_u16(ins, ip + 1) as usize;
                    self.push(self.constants[idx].clone())?;
                }
                Op::Add | Op::Sub | Op::Mul | Op::Div => {
                    self.execute_binary_operation(op)?;
                }
                Op::Pop => {
                    self.pop();
                }
                Op::True => self.push(Object::Bool(true))?,
                Op::False => self.push(Object::Bool(false))?,
                Op::Null => self.push(Object::Null)?,
                Op::Equal | Op::NotEqual | Op::GreaterThan => {
                    self.execute_comparison(op)?;
                }
                Op::Bang => {
                    let operand = self.pop();
                    self.push(Object::Bool(!operand.is_truthy()))?;
                }
                Op::Minus => {
                    let operand = self.pop();
                    match operand {
                        Object::Int(value) => self.push(Object::Int(value.wrapping_neg()))?,
                        other => {
                            return Err(VmError::UnsupportedNegation { kind: other.kind() })
                        }
                    }
                }
                Op::Jump => {
                    let target = read_u16(ins, ip + 1) as usize;
                    self.set_ip(target);
                }
                Op::JumpNotTruthy => {
                    let target = read_u16(ins, ip + 1) as usize;
                    let condition = self.pop();
                    if !condition.is_truthy() {
                        self.set_ip(target);
                    }
                }
                Op::SetGlobal => {
                    let idx = read_u16(ins, ip + 1) as usize;
                    let value = self.pop();
                    self.globals[idx] = value;
                }
                Op::GetGlobal => {
                    let idx = read_u16(ins, ip + 1) as usize;
                    self.push(self.globals[idx].clone())?;
                }
                Op::SetLocal => {
                    let idx = read_u8(ins, ip + 1) as usize;
                    let base = self.current_base_pointer();
                    let value = self.pop();
                    self.stack[base + idx] = value;
                }
                Op::GetLocal => {
                    let idx = read_u8(ins, ip + 1) as usize;
                    let base = self.current_base_pointer();
                    self.push(self.stack[base + idx].clone())?;
                }
                Op::GetBuiltin => {
                    let idx = read_u8(ins, ip + 1) as usize;
                    self.push(Object::Builtin(BUILTINS[idx]))?;
                }
                Op::GetFree => {
                    let idx = read_u8(ins, ip + 1) as usize;
                    let value = {
                        let Some(frame) = self.frames.last() else { break };
                        frame.closure.free[idx].clone()
                    };
                    self.push(value)?;
                }
                Op::CurrentClosure => {
                    let closure = {
                        let Some(frame) = self.frames.last() else { break };
                        Rc::clone(&frame.closure)
                    };
                    self.push(Object::Closure(closure))?;
                }
                Op::Array => {
                    let count = read_u16(ins, ip + 1) as usize;
                    let elements = self.stack[self.sp - count..self.sp].to_vec();
                    self.sp -= count;
                    self.push(Object::array(elements))?;
                }
                Op::Hash => {
                    let count = read_u16(ins, ip + 1) as usize;
                    let hash = self.build_hash(self.sp - count, self.sp)?;
                    self.sp -= count;
                    self.push(hash)?;
                }
                Op::Index => {
                    let index = self.pop();
                    let left = self.pop();
                    self.execute_index_expression(left, index)?;
                }
                Op::Call => {
                    let num_args = read_u8(ins, ip + 1) as usize;
                    self.execute_call(num_args)?;
                }
                Op::ReturnValue => {
                    let return_value = self.pop();
                    if !self.pop_frame_onto(return_value)? {
                        break;
                    }
                }
                Op::Return => {
                    if !self.pop_frame_onto(Object::Null)? {
                        break;
                    }
                }
                Op::Closure => {
                    let const_index = read_u16(ins, ip + 1) as usize;
                    let num_free = read_u8(ins, ip + 3) as usize;
                    self.push_closure(const_index, num_free)?;
                }
            }
        }
        Ok(())
    }

    // ---- Frame plumbing ----

    fn set_ip(&mut self, ip: usize) {
        if let Some(frame) = self.frames.last_mut() {
            frame.ip = ip;
        }
    }

    fn current_base_pointer(&self) -> usize {
        self.frames.last().map(|f| f.base_pointer).unwrap_or(0)
    }

    /// Tear down the current frame, discard its locals and arguments, and
    /// leave `value` where the callee used to sit. Returns false when the
    /// main frame itself returned, which ends the program.
    fn pop_frame_onto(&mut self, value: Object) -> Result<bool> {
        let frame = match self.frames.pop() {
            Some(frame) => frame,
            None => return Ok(false),
        };
        if self.frames.is_empty() {
            // Top-level `return`: expose the value and stop.
            self.stack[self.sp] = value;
            return Ok(false);
        }
        self.sp = frame.base_pointer - 1;
        self.push(value)?;
        Ok(true)
    }

    // ---- Stack ----

    fn push(&mut self, obj: Object) -> Result<()> {
        if self.sp >= STACK_SIZE {
            return Err(VmError::StackOverflow);
        }
        self.stack[self.sp] = obj;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> Object {
        self.sp -= 1;
        self.stack[self.sp].clone()
    }

    // ---- Operations ----

    fn execute_binary_operation(&mut self, op: Op) -> Result<()> {
        let right = self.pop();
        let left = self.pop();
        match (&left, &right) {
            (Object::Int(l), Object::Int(r)) => {
                let result = match op {
                    Op::Add => l.wrapping_add(*r),
                    Op::Sub => l.wrapping_sub(*r),
                    Op::Mul => l.wrapping_mul(*r),
                    Op::Div => {
                        if *r == 0 {
                            return Err(VmError::DivisionByZero);
                        }
                        l.wrapping_div(*r)
                    }
                    _ => unreachable!("dispatched on arithmetic opcodes only"),
                };
                self.push(Object::Int(result))
            }
            (Object::Str(l), Object::Str(r)) => {
                if op != Op::Add {
                    return Err(VmError::UnknownStringOperator { op: op.def().name });
                }
                self.push(Object::str(format!("{}{}", l, r)))
            }
            _ => Err(VmError::UnsupportedBinaryTypes {
                left: left.kind(),
                right: right.kind(),
            }),
        }
    }

    fn execute_comparison(&mut self, op: Op) -> Result<()> {
        let right = self.pop();
        let left = self.pop();
        let result = match op {
            Op::Equal => left == right,
            Op::NotEqual => left != right,
            Op::GreaterThan => match (&left, &right) {
                (Object::Int(l), Object::Int(r)) => l > r,
                _ => {
                    return Err(VmError::UnknownOperator {
                        op: ">",
                        left: left.kind(),
                        right: right.kind(),
                    })
                }
            },
            _ => unreachable!("dispatched on comparison opcodes only"),
        };
        self.push(Object::Bool(result))
    }

    fn build_hash(&self, start: usize, end: usize) -> Result<Object> {
        let mut pairs = BTreeMap::new();
        let mut i = start;
        while i < end {
            let key = self.stack[i].clone();
            let value = self.stack[i + 1].clone();
            let hash_key = key
                .hash_key()
                .ok_or(VmError::UnusableHashKey { kind: key.kind() })?;
            pairs.insert(hash_key, HashPair { key, value });
            i += 2;
        }
        Ok(Object::Hash(Rc::new(pairs)))
    }

    fn execute_index_expression(&mut self, left: Object, index: Object) -> Result<()> {
        match (&left, &index) {
            (Object::Array(elements), Object::Int(idx)) => {
                let element = usize::try_from(*idx)
                    .ok()
                    .and_then(|i| elements.get(i))
                    .cloned()
                    .unwrap_or(Object::Null);
                self.push(element)
            }
            (Object::Hash(pairs), _) => {
                let hash_key = index
                    .hash_key()
                    .ok_or(VmError::UnusableHashKey { kind: index.kind() })?;
                let value = pairs
                    .get(&hash_key)
                    .map(|pair| pair.value.clone())
                    .unwrap_or(Object::Null);
                self.push(value)
            }
            _ => Err(VmError::IndexNotSupported { kind: left.kind() }),
        }
    }

    fn execute_call(&mut self, num_args: usize) -> Result<()> {
        let callee = self.stack[self.sp - 1 - num_args].clone();
        match callee {
            Object::Closure(closure) => self.call_closure(closure, num_args),
            Object::Builtin(builtin) => {
                let args = &self.stack[self.sp - num_args..self.sp];
                let result = (builtin.func)(args);
                self.sp -= num_args + 1;
                self.push(result)
            }
            _ => Err(VmError::NotCallable),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, num_args: usize) -> Result<()> {
        if num_args != closure.func.num_parameters {
            return Err(VmError::WrongArgumentCount {
                want: closure.func.num_parameters,
                got: num_args,
            });
        }
        if self.frames.len() >= MAX_FRAMES {
            return Err(VmError::StackOverflow);
        }
        let base_pointer = self.sp - num_args;
        let num_locals = closure.func.num_locals;
        if base_pointer + num_locals > STACK_SIZE {
            return Err(VmError::StackOverflow);
        }
        self.frames.push(Frame { closure, ip: 0, base_pointer });
        // Arguments already sit in the first parameter slots; reserve the
        // remaining local slots above them.
        self.sp = base_pointer + num_locals;
        Ok(())
    }

    fn push_closure(&mut self, const_index: usize, num_free: usize) -> Result<()> {
        let constant = self.constants[const_index].clone();
        let Object::CompiledFunction(func) = constant else {
            return Err(VmError::NotAFunction { index: const_index });
        };
        let free = self.stack[self.sp - num_free..self.sp].to_vec();
        self.sp -= num_free;
        self.push(Object::Closure(Rc::new(Closure { func, free })))
    }
}
