//! Syntax tree produced by the parser and consumed by the code generator.
//!
//! The node set is closed: every pass matches exhaustively on these enums.

use std::fmt;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Constant {
    Int(i64),
    /// Kept as written; truncated only when emitted.
    Float(f64),
    Char(char),
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Constant(Constant),
    Identifier(String),
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
    Ternary {
        if_true: Box<Expression>,
        if_false: Box<Expression>,
        condition: Box<Expression>,
    },
    Call {
        name: String,
        args: Vec<Expression>,
    },
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Rem,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UnaryOperator {
    Not,
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Rem => "%",
        })
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOperator::Not => f.write_str("not"),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Statement {
    Assign { target: String, value: Expression },
    Return(Expression),
}

#[derive(Debug, PartialEq, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Statement>,
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Module {
    pub functions: Vec<FunctionDef>,
}

impl Module {
    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.iter().find(|function| function.name == name)
    }
}
