//! `pexc` — a thin demonstration front-end around `pex_core`.
//!
//! The real source parser is out of scope for this crate, so this binary
//! reads a JSON-serialized [`pex_core::ast::Module`] directly (the shape a
//! parser would hand the core), grounded in
//! `examples/original_source/pex-compile/pex_compile/__main__.py`'s
//! `argparse` shape: a positional source path and an `-o`/`--output` flag.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use pex_core::ast::Module;
use pex_core::{compile_module, container, linker};

#[derive(Parser)]
#[command(name = "pexc", about = "Compile a JSON-serialized AST into PEX bytecode")]
struct Cli {
    /// Path to a JSON-serialized `pex_core::ast::Module`.
    source: PathBuf,

    /// Where to write the linked PEX container. Defaults to `<source>.pex`.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the linked code's instruction count and content hash instead
    /// of writing a container.
    #[arg(long)]
    dump: bool,
}

fn run(cli: Cli) -> Result<(), String> {
    let text = fs::read_to_string(&cli.source)
        .map_err(|e| format!("reading {}: {e}", cli.source.display()))?;
    let module: Module =
        serde_json::from_str(&text).map_err(|e| format!("parsing AST JSON: {e}"))?;

    let code = compile_module(&module).map_err(|e| format!("lowering failed: {e}"))?;
    let linked = linker::link(code).map_err(|e| format!("linking failed: {e}"))?;

    if cli.dump {
        println!("instructions: {}", linked.instruction_count());
        println!("content hash: {}", linked.content_hash());
        print!("{}", linker::disassemble(&linked));
        return Ok(());
    }

    let bytes = container::build(&[linked]).map_err(|e| format!("encoding failed: {e}"))?;
    let output = cli
        .output
        .unwrap_or_else(|| cli.source.with_extension("pex"));
    fs::write(&output, bytes).map_err(|e| format!("writing {}: {e}", output.display()))?;
    println!("wrote {}", output.display());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("pexc: {message}");
            ExitCode::FAILURE
        }
    }
}
