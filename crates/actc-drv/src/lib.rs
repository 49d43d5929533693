//! actc-drv - Compiler driver.
//!
//! Orchestrates the pipeline: read source, tokenize, parse, emit, and
//! execute. The stages are strictly sequential; each consumes the full
//! output of the one before it, and the whole run aborts on the first
//! error. Warnings accumulate in a [`Handler`] and are printed to stderr
//! without failing the build.

use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write};

use anyhow::{bail, Context};

use actc_emit::ProgramImage;
use actc_lex::{tokenize, DefineStack};
use actc_par::Parser;
use actc_util::{CompileResult, Handler};
use actc_vm::{ExecResult, Vm};

/// Compiles source text into a program image.
///
/// The define stack starts empty; preprocessing that would populate it is
/// an external concern.
pub fn compile(source: &str, filename: &str, handler: &mut Handler) -> CompileResult<ProgramImage> {
    let defines = DefineStack::new();
    let tokens = tokenize(source, filename, &defines)?;
    let ast = Parser::new(tokens, handler).parse_program()?;
    actc_emit::emit(&ast)
}

/// Executes a program image from its entry routine, sending DEVPRINT
/// output to `out`.
pub fn run_image<W: Write>(image: &ProgramImage, out: W) -> ExecResult<()> {
    let mut vm = Vm::load(image, out)?;
    vm.run()
}

/// Formats the image bytes as a hex dump, 16 bytes per line, addressed
/// from the start of the program partition.
pub fn hex_dump(code: &[u8]) -> String {
    let mut dump = String::new();
    for (i, chunk) in code.chunks(16).enumerate() {
        let addr = actc_emit::layout::START_PROGRAM as usize + i * 16;
        let bytes: Vec<String> = chunk.iter().map(|b| format!("{b:02X}")).collect();
        let _ = writeln!(dump, "{addr:04X}: {}", bytes.join(" "));
    }
    dump
}

/// The `actc` entry point: compile one source file, dump the image, run
/// it.
pub fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(source_file) = args.next() else {
        bail!("usage: actc <source-file>");
    };
    if args.next().is_some() {
        bail!("usage: actc <source-file>");
    }

    let source = fs::read_to_string(&source_file)
        .with_context(|| format!("cannot read {source_file}"))?;

    let mut handler = Handler::new();
    let image = compile(&source, &source_file, &mut handler)?;
    for diagnostic in handler.diagnostics() {
        eprintln!("{diagnostic}");
    }

    print!("{}", hex_dump(&image.code));
    let stdout = io::stdout();
    run_image(&image, stdout.lock())?;
    Ok(())
}
