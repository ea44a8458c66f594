//! Compiles a small indentation-sensitive, Python-like language into MASM32
//! assembly.
//!
//! The pipeline is `lexer` -> `parser` -> `codegen` -> `emitter`; [`compile`]
//! runs all of it on a source string.

pub mod ast;
pub mod codegen;
pub mod emitter;
pub mod lexer;
pub mod parser;
pub mod token;

use anyhow::{Context, Result};

pub use emitter::{EmitError, EmitOptions, generate, generate_with};
pub use parser::{ParseError, parse};

pub fn compile(source: &str) -> Result<String> {
    compile_with(source, &EmitOptions::default())
}

pub fn compile_with(source: &str, options: &EmitOptions) -> Result<String> {
    let module = parse(source).context("Parsing source")?;
    let output = generate_with(&module, options).context("Generating assembly")?;
    Ok(output)
}
