//! Wraps generated procedures into a complete MASM32 program.
//!
//! The header, entry sequence and footer are what the masm32 toolchain
//! expects and are reproduced byte for byte.

use thiserror::Error;
use tracing::debug;

use crate::ast::Module;
use crate::codegen::{CodegenError, generate_functions};

pub const ENTRY_POINT: &str = "main";

pub const HEADER: &str = concat!(
    ".386\n",
    ".model flat, stdcall\n",
    "option casemap:none\n",
    "include C://masm32/include/masm32rt.inc \n",
    "main PROTO\n",
    ".data\n",
    ".code\n",
);

pub const FOOTER: &str = "\n\nEND start";

pub const DEFAULT_CAPTION: &str = "Lab5";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmitError {
    #[error("No entry point has been found.")]
    NoEntryPoint,
    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitOptions {
    /// Title of the message box that displays the value returned by `main`.
    pub caption: String,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            caption: DEFAULT_CAPTION.to_string(),
        }
    }
}

/// Program entry: calls `main`, shows `eax` in a message box and exits.
pub fn entry_sequence(options: &EmitOptions) -> String {
    format!(
        "\nstart:\n    invoke {ENTRY_POINT}\n    fn MessageBox,0,str$(eax), \"{}\" ,MB_OK\n    invoke ExitProcess, 0\n    ",
        options.caption
    )
}

pub fn has_entry_point(module: &Module) -> bool {
    module.function(ENTRY_POINT).is_some()
}

pub fn generate(module: &Module) -> Result<String, EmitError> {
    generate_with(module, &EmitOptions::default())
}

pub fn generate_with(module: &Module, options: &EmitOptions) -> Result<String, EmitError> {
    if !has_entry_point(module) {
        return Err(EmitError::NoEntryPoint);
    }

    let body = generate_functions(module)?;
    let entry = entry_sequence(options);

    let mut output =
        String::with_capacity(HEADER.len() + body.len() + entry.len() + FOOTER.len());
    output.push_str(HEADER);
    output.push_str(&body);
    output.push_str(&entry);
    output.push_str(FOOTER);

    debug!(
        functions = module.functions.len(),
        bytes = output.len(),
        "emitted program"
    );
    Ok(output)
}
