use std::fs;
use std::io::{self, Read};

use anyhow::{Context, Result, anyhow, bail};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pymasm::{EmitOptions, lexer, parser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Emit {
    Asm,
    Tokens,
    Ast,
}

impl Emit {
    fn from_name(name: &str) -> Result<Self> {
        match name {
            "asm" => Ok(Emit::Asm),
            "tokens" => Ok(Emit::Tokens),
            "ast" => Ok(Emit::Ast),
            _ => bail!("Unknown emit kind '{name}' (expected asm, tokens or ast)"),
        }
    }
}

struct Args {
    emit: Emit,
    options: EmitOptions,
    input_path: Option<String>,
    output_path: Option<String>,
}

fn flag_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next()
        .ok_or_else(|| anyhow!("Missing value after {flag}"))
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut parsed = Args {
        emit: Emit::Asm,
        options: EmitOptions::default(),
        input_path: None,
        output_path: None,
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--emit" | "-e" => parsed.emit = Emit::from_name(&flag_value(&mut args, &arg)?)?,
            "--caption" => parsed.options.caption = flag_value(&mut args, &arg)?,
            "--output" | "-o" => parsed.output_path = Some(flag_value(&mut args, &arg)?),
            _ => {
                if parsed.input_path.is_some() {
                    bail!("Only one input file is supported");
                }
                parsed.input_path = Some(arg);
            }
        }
    }

    Ok(parsed)
}

fn render(source: &str, args: &Args) -> Result<String> {
    match args.emit {
        Emit::Tokens => {
            let tokens = lexer::tokenize(source)?;
            let mut output = String::new();
            for token in tokens {
                output.push_str(&format!("{}: {}\n", token.span.line, token));
            }
            Ok(output)
        }
        Emit::Ast => {
            let module = parser::parse(source)?;
            Ok(format!("{module:#?}\n"))
        }
        Emit::Asm => pymasm::compile_with(source, &args.options),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = parse_args()?;

    let source = if let Some(path) = &args.input_path {
        fs::read_to_string(path).with_context(|| format!("Reading {path}"))?
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Reading stdin")?;
        buffer
    };

    let output = render(&source, &args)?;

    match &args.output_path {
        Some(path) => {
            fs::write(path, &output).with_context(|| format!("Writing {path}"))?;
            info!(path = %path, bytes = output.len(), "wrote output");
        }
        None => print!("{output}"),
    }
    Ok(())
}
