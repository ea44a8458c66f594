//! Single-pass lowering of function definitions to MASM32 procedures.
//!
//! Every expression leaves its value in `eax`. Parameters sit above the saved
//! frame pointer at `[ebp+8]`, `[ebp+12]`, ... and locals are carved out below
//! it by `push eax` the first time they are assigned, so slot order follows
//! first assignment rather than declaration.

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use crate::ast::{
    BinaryOperator, Constant, Expression, FunctionDef, Module, Statement, UnaryOperator,
};

pub type CodegenResult<T> = Result<T, CodegenError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodegenError {
    #[error("Variable '{name}' is used before assignment in function '{function}'")]
    UnboundVariable { name: String, function: String },
}

const WORD_SIZE: i32 = 4;
const FIRST_PARAM_OFFSET: i32 = 8;
const FIRST_LOCAL_OFFSET: i32 = -4;

/// Variable-to-offset bindings of one function compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    slots: FxHashMap<String, i32>,
    next_slot: i32,
}

impl Frame {
    pub fn new(params: &[String]) -> Self {
        let mut slots = FxHashMap::default();
        for (index, param) in params.iter().enumerate() {
            slots.insert(param.clone(), FIRST_PARAM_OFFSET + index as i32 * WORD_SIZE);
        }
        Self {
            slots,
            next_slot: FIRST_LOCAL_OFFSET,
        }
    }

    pub fn offset(&self, name: &str) -> Option<i32> {
        self.slots.get(name).copied()
    }

    fn bind_local(&mut self, name: &str) -> i32 {
        let offset = self.next_slot;
        self.slots.insert(name.to_string(), offset);
        self.next_slot -= WORD_SIZE;
        offset
    }

    pub fn local_count(&self) -> usize {
        ((FIRST_LOCAL_OFFSET - self.next_slot) / WORD_SIZE) as usize
    }
}

fn slot(offset: i32) -> String {
    format!("DWORD PTR [ebp{offset:+}]")
}

struct FunctionCompiler<'f> {
    function: &'f FunctionDef,
    frame: Frame,
    output: String,
    depth: usize,
}

impl<'f> FunctionCompiler<'f> {
    fn new(function: &'f FunctionDef) -> Self {
        Self {
            function,
            frame: Frame::new(&function.params),
            output: String::new(),
            depth: 0,
        }
    }

    fn compile(mut self) -> CodegenResult<(String, Frame)> {
        let function = self.function;
        let name = &function.name;
        self.output.push_str(&format!("\n{name} PROC\n"));
        self.push_line("push ebp");
        self.push_line("mov ebp, esp");
        for statement in &function.body {
            self.emit_statement(statement)?;
        }
        self.emit_epilogue();
        self.output.push_str(&format!("{name} ENDP\n"));

        debug!(
            function = %name,
            params = function.params.len(),
            locals = self.frame.local_count(),
            "compiled function"
        );
        Ok((self.output, self.frame))
    }

    fn emit_statement(&mut self, statement: &Statement) -> CodegenResult<()> {
        match statement {
            Statement::Assign { target, value } => {
                self.emit_expression(value)?;
                match self.frame.offset(target) {
                    Some(offset) => self.push_line(&format!("mov {}, eax", slot(offset))),
                    None => {
                        self.frame.bind_local(target);
                        self.push_line("push eax");
                    }
                }
            }
            Statement::Return(value) => {
                self.emit_expression(value)?;
                self.emit_epilogue();
            }
        }
        Ok(())
    }

    fn emit_expression(&mut self, expr: &Expression) -> CodegenResult<()> {
        match expr {
            Expression::Constant(constant) => {
                let value = match constant {
                    Constant::Int(value) => *value,
                    Constant::Float(value) => value.trunc() as i64,
                    Constant::Char(value) => i64::from(u32::from(*value)),
                };
                self.push_line(&format!("mov eax, {value}"));
            }
            Expression::Identifier(name) => {
                let offset =
                    self.frame
                        .offset(name)
                        .ok_or_else(|| CodegenError::UnboundVariable {
                            name: name.clone(),
                            function: self.function.name.clone(),
                        })?;
                self.push_line(&format!("mov eax, {}", slot(offset)));
            }
            Expression::BinaryOp { left, op, right } => {
                self.emit_expression(left)?;
                self.push_line("push eax");
                self.emit_expression(right)?;
                self.push_line("mov ebx, eax");
                self.push_line("pop eax");
                match op {
                    BinaryOperator::Add => self.push_line("add eax, ebx"),
                    BinaryOperator::Sub => self.push_line("sub eax, ebx"),
                    BinaryOperator::Mul => {
                        self.push_line("xor edx, edx");
                        self.push_line("mul ebx");
                    }
                    BinaryOperator::Rem => {
                        self.push_line("xor edx, edx");
                        self.push_line("div ebx");
                        self.push_line("mov eax, edx");
                    }
                }
            }
            Expression::UnaryOp { op, operand } => {
                self.emit_expression(operand)?;
                match op {
                    UnaryOperator::Not => {
                        self.push_line(".if eax == 0");
                        self.nested(|this| {
                            this.push_line("mov eax, 1");
                            Ok(())
                        })?;
                        self.push_line(".else");
                        self.nested(|this| {
                            this.push_line("mov eax, 0");
                            Ok(())
                        })?;
                        self.push_line(".endif");
                    }
                }
            }
            Expression::Ternary {
                if_true,
                if_false,
                condition,
            } => {
                self.emit_expression(condition)?;
                self.push_line(".if eax == 0");
                self.nested(|this| this.emit_expression(if_false))?;
                self.push_line(".else");
                self.nested(|this| this.emit_expression(if_true))?;
                self.push_line(".endif");
            }
            Expression::Call { name, args } => {
                for arg in args.iter().rev() {
                    self.emit_expression(arg)?;
                    self.push_line("push eax");
                }
                self.push_line(&format!("call {name}"));
                if !args.is_empty() {
                    self.push_line(&format!("add esp, {}", args.len() as i32 * WORD_SIZE));
                }
            }
        }
        Ok(())
    }

    fn emit_epilogue(&mut self) {
        self.push_line("mov esp, ebp");
        self.push_line("pop ebp");
        self.push_line("ret");
    }

    fn nested(
        &mut self,
        body: impl FnOnce(&mut Self) -> CodegenResult<()>,
    ) -> CodegenResult<()> {
        self.depth += 1;
        let result = body(self);
        self.depth -= 1;
        result
    }

    fn push_line(&mut self, line: &str) {
        for _ in 0..=self.depth {
            self.output.push_str("    ");
        }
        self.output.push_str(line);
        self.output.push('\n');
    }
}

/// Compiles one function into a `PROC`/`ENDP` block, returning the frame it
/// ended with.
pub fn compile_function_with_frame(function: &FunctionDef) -> CodegenResult<(String, Frame)> {
    FunctionCompiler::new(function).compile()
}

pub fn compile_function(function: &FunctionDef) -> CodegenResult<String> {
    compile_function_with_frame(function).map(|(code, _)| code)
}

/// Compiles every function of the module in source order.
pub fn generate_functions(module: &Module) -> CodegenResult<String> {
    let mut output = String::new();
    for function in &module.functions {
        output.push_str(&compile_function(function)?);
    }
    Ok(output)
}
