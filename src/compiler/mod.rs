pub mod symbol_table;

use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::{Block, Expr, InfixOp, PrefixOp, Program, Stmt};
use crate::code::{make, Instructions, Op};
use crate::object::builtins::BUILTINS;
use crate::object::{CompiledFunction, Object};
use symbol_table::{Scope, Symbol, SymbolTable};

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("undefined variable: {name}")]
    UndefinedVariable { name: String },
}

type Result<T> = std::result::Result<T, CompileError>;

/// The compiler's output: the main scope's instruction stream plus the
/// constant pool both it and every nested function index into.
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Object>,
}

#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: Op,
    position: usize,
}

/// Per-function emission state. The compiler keeps one active scope and a
/// stack of suspended enclosing ones; function literals push and pop.
#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Instructions,
    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,
}

pub struct Compiler {
    constants: Vec<Object>,
    symbol_table: Rc<RefCell<SymbolTable>>,
    scope: CompilationScope,
    enclosing: Vec<CompilationScope>,
}

impl Compiler {
    pub fn new() -> Self {
        let symbol_table = SymbolTable::new();
        for (i, builtin) in BUILTINS.iter().enumerate() {
            symbol_table.borrow_mut().define_builtin(i, builtin.name);
        }
        Compiler {
            constants: Vec::new(),
            symbol_table,
            scope: CompilationScope::default(),
            enclosing: Vec::new(),
        }
    }

    /// Resume with an existing symbol table and constant pool, so REPL
    /// lines see the bindings of the lines before them.
    pub fn new_with_state(
        symbol_table: Rc<RefCell<SymbolTable>>,
        constants: Vec<Object>,
    ) -> Self {
        Compiler {
            constants,
            symbol_table,
            scope: CompilationScope::default(),
            enclosing: Vec::new(),
        }
    }

    pub fn compile(&mut self, program: &Program) -> Result<()> {
        for stmt in &program.statements {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.scope.instructions.clone(),
            constants: self.constants.clone(),
        }
    }

    // ---- Statements ----

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Expr { value } => {
                self.compile_expr(value)?;
                self.emit(Op::Pop, &[]);
            }
            Stmt::Let { name, value } => {
                // Define before compiling the value: the right-hand side
                // may mention the name it is being bound to.
                let symbol = self.symbol_table.borrow_mut().define(name);
                self.compile_expr(value)?;
                match symbol.scope {
                    Scope::Global => self.emit(Op::SetGlobal, &[symbol.index]),
                    _ => self.emit(Op::SetLocal, &[symbol.index]),
                };
            }
            Stmt::Return { value } => {
                self.compile_expr(value)?;
                self.emit(Op::ReturnValue, &[]);
            }
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &Block) -> Result<()> {
        for stmt in &block.statements {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    // ---- Expressions ----

    fn compile_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Int(value) => {
                let idx = self.add_constant(Object::Int(*value));
                self.emit(Op::Constant, &[idx]);
            }
            Expr::Str(value) => {
                let idx = self.add_constant(Object::str(value.clone()));
                self.emit(Op::Constant, &[idx]);
            }
            Expr::Bool(true) => {
                self.emit(Op::True, &[]);
            }
            Expr::Bool(false) => {
                self.emit(Op::False, &[]);
            }
            Expr::Ident(name) => {
                let symbol = self.symbol_table.borrow_mut().resolve(name);
                match symbol {
                    Some(symbol) => self.load_symbol(&symbol),
                    None => {
                        return Err(CompileError::UndefinedVariable { name: name.clone() })
                    }
                }
            }
            Expr::Prefix { op, right } => {
                self.compile_expr(right)?;
                match op {
                    PrefixOp::Bang => self.emit(Op::Bang, &[]),
                    PrefixOp::Minus => self.emit(Op::Minus, &[]),
                };
            }
            Expr::Infix { op: InfixOp::Lt, left, right } => {
                // `a < b` is `b > a` with the operands swapped at compile
                // time; the VM only knows GreaterThan.
                self.compile_expr(right)?;
                self.compile_expr(left)?;
                self.emit(Op::GreaterThan, &[]);
            }
            Expr::Infix { op, left, right } => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                match op {
                    InfixOp::Add => self.emit(Op::Add, &[]),
                    InfixOp::Sub => self.emit(Op::Sub, &[]),
                    InfixOp::Mul => self.emit(Op::Mul, &[]),
                    InfixOp::Div => self.emit(Op::Div, &[]),
                    InfixOp::Eq => self.emit(Op::Equal, &[]),
                    InfixOp::NotEq => self.emit(Op::NotEqual, &[]),
                    InfixOp::Gt => self.emit(Op::GreaterThan, &[]),
                    InfixOp::Lt => unreachable!("handled above"),
                };
            }
            Expr::If { condition, consequence, alternative } => {
                self.compile_expr(condition)?;
                // Placeholder target, patched once the consequence length
                // is known.
                let jump_not_truthy = self.emit(Op::JumpNotTruthy, &[9999]);

                self.compile_block(consequence)?;
                self.keep_branch_value();

                let jump = self.emit(Op::Jump, &[9999]);
                let after_consequence = self.scope.instructions.len();
                self.change_operand(jump_not_truthy, after_consequence);

                match alternative {
                    Some(alternative) => {
                        self.compile_block(alternative)?;
                        self.keep_branch_value();
                    }
                    None => {
                        self.emit(Op::Null, &[]);
                    }
                }
                let after_alternative = self.scope.instructions.len();
                self.change_operand(jump, after_alternative);
            }
            Expr::Array(elements) => {
                for element in elements {
                    self.compile_expr(element)?;
                }
                self.emit(Op::Array, &[elements.len()]);
            }
            Expr::Hash(pairs) => {
                // Source-text order of keys is whatever the program wrote;
                // sort by rendered key so emission is deterministic.
                let mut sorted: Vec<&(Expr, Expr)> = pairs.iter().collect();
                sorted.sort_by_key(|(key, _)| key.to_string());
                for (key, value) in sorted {
                    self.compile_expr(key)?;
                    self.compile_expr(value)?;
                }
                self.emit(Op::Hash, &[pairs.len() * 2]);
            }
            Expr::Index { left, index } => {
                self.compile_expr(left)?;
                self.compile_expr(index)?;
                self.emit(Op::Index, &[]);
            }
            Expr::Fn { name, parameters, body } => {
                self.compile_function(name.as_deref(), parameters, body)?;
            }
            Expr::Call { function, arguments } => {
                self.compile_expr(function)?;
                for argument in arguments {
                    self.compile_expr(argument)?;
                }
                self.emit(Op::Call, &[arguments.len()]);
            }
        }
        Ok(())
    }

    fn compile_function(
        &mut self,
        name: Option<&str>,
        parameters: &[String],
        body: &Block,
    ) -> Result<()> {
        self.enter_scope();

        if let Some(name) = name {
            self.symbol_table.borrow_mut().define_function_name(name);
        }
        for parameter in parameters {
            self.symbol_table.borrow_mut().define(parameter);
        }

        self.compile_block(body)?;

        // An expression in tail position becomes the return value; a body
        // that ends any other way returns null.
        if self.last_instruction_is(Op::Pop) {
            self.replace_last_pop_with_return();
        }
        if !self.last_instruction_is(Op::ReturnValue) {
            self.emit(Op::Return, &[]);
        }

        let (free_symbols, num_locals) = {
            let table = self.symbol_table.borrow();
            (table.free_symbols.clone(), table.num_definitions)
        };
        let instructions = self.leave_scope();

        // Push each captured value in the enclosing scope; OpClosure pops
        // them into the closure's free vector.
        for free in &free_symbols {
            self.load_symbol(free);
        }

        let func = CompiledFunction {
            instructions,
            num_locals,
            num_parameters: parameters.len(),
        };
        let idx = self.add_constant(Object::CompiledFunction(Rc::new(func)));
        self.emit(Op::Closure, &[idx, free_symbols.len()]);
        Ok(())
    }

    /// An `if` branch must leave exactly one value behind. A branch
    /// ending in an expression statement keeps it by dropping the `Pop`;
    /// a branch that ends any other way (empty, or ending in `let`) has
    /// nothing on the stack and evaluates to null. A branch that returns
    /// never falls through, so it needs no value.
    fn keep_branch_value(&mut self) {
        if self.last_instruction_is(Op::Pop) {
            self.remove_last_pop();
        } else if !self.last_instruction_is(Op::ReturnValue) {
            self.emit(Op::Null, &[]);
        }
    }

    fn load_symbol(&mut self, symbol: &Symbol) {
        match symbol.scope {
            Scope::Global => self.emit(Op::GetGlobal, &[symbol.index]),
            Scope::Local => self.emit(Op::GetLocal, &[symbol.index]),
            Scope::Builtin => self.emit(Op::GetBuiltin, &[symbol.index]),
            Scope::Free => self.emit(Op::GetFree, &[symbol.index]),
            Scope::Function => self.emit(Op::CurrentClosure, &[]),
        };
    }

    // ---- Emission ----

    fn add_constant(&mut self, obj: Object) -> usize {
        self.constants.push(obj);
        self.constants.len() - 1
    }

    fn emit(&mut self, op: Op, operands: &[usize]) -> usize {
        let position = self.scope.instructions.len();
        self.scope.instructions.extend(make(op, operands));
        self.scope.previous_instruction = self.scope.last_instruction;
        self.scope.last_instruction = Some(EmittedInstruction { opcode: op, position });
        position
    }

    fn last_instruction_is(&self, op: Op) -> bool {
        self.scope
            .last_instruction
            .map_or(false, |emitted| emitted.opcode == op)
    }

    fn remove_last_pop(&mut self) {
        if let Some(last) = self.scope.last_instruction {
            self.scope.instructions.truncate(last.position);
            self.scope.last_instruction = self.scope.previous_instruction;
            self.scope.previous_instruction = None;
        }
    }

    fn replace_last_pop_with_return(&mut self) {
        if let Some(last) = self.scope.last_instruction {
            self.replace_instruction(last.position, make(Op::ReturnValue, &[]));
            self.scope.last_instruction =
                Some(EmittedInstruction { opcode: Op::ReturnValue, position: last.position });
        }
    }

    /// Overwrite the bytes of one instruction in place. Only valid for a
    /// replacement of identical layout; this is the back-patching
    /// primitive.
    fn replace_instruction(&mut self, position: usize, new_instruction: Instructions) {
        let target = &mut self.scope.instructions[position..position + new_instruction.len()];
        target.copy_from_slice(&new_instruction);
    }

    fn change_operand(&mut self, position: usize, operand: usize) {
        if let Some(op) = Op::from_u8(self.scope.instructions[position]) {
            self.replace_instruction(position, make(op, &[operand]));
        }
    }

    // ---- Scope management ----

    fn enter_scope(&mut self) {
        self.enclosing.push(std::mem::take(&mut self.scope));
        self.symbol_table = SymbolTable::new_enclosed(Rc::clone(&self.symbol_table));
    }

    /// Pop the active scope and return its finished instruction stream.
    fn leave_scope(&mut self) -> Instructions {
        let done = std::mem::replace(
            &mut self.scope,
            self.enclosing.pop().unwrap_or_default(),
        );
        let outer = self.symbol_table.borrow().outer.clone();
        if let Some(outer) = outer {
            self.symbol_table = outer;
        }
        done.instructions
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}
