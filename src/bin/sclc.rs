//! Command-line entry point (§6): a single positional input file, a
//! stage-limit flag, and per-stage `--show-*` dump flags.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use sclc::Compiler;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum Stage {
    Token,
    Parse,
    Ast,
    Tac,
    Rtl,
    Asm,
}

#[derive(Parser, Debug)]
#[command(name = "sclc", about = "Compiles a C-like source file to MIPS/SPIM assembly")]
struct Cli {
    /// Source file to compile.
    input: PathBuf,

    /// Stop after this stage instead of emitting assembly.
    #[arg(long, value_enum, default_value_t = Stage::Asm)]
    stop_at: Stage,

    #[arg(long)]
    show_ast: bool,

    #[arg(long)]
    show_tac: bool,

    #[arg(long)]
    show_rtl: bool,

    /// Redirect every requested dump to standard output instead of files.
    #[arg(long)]
    demo: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let src = match fs::read_to_string(&cli.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("sclp error: could not read {}: {e}", cli.input.display());
            return ExitCode::FAILURE;
        }
    };

    let mut compiler = Compiler::new();
    let output = match compiler.compile(&src, &cli.input) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let stem = cli.input.with_extension("");

    if cli.show_ast {
        let text = sclc::dump::dump_ast(&output.ast, &compiler.types);
        write_dump(&text, &stem.with_extension("ast"), cli.demo);
    }
    if cli.show_tac {
        let text = sclc::dump::dump_tac(&output.tac);
        write_dump(&text, &stem.with_extension("tac"), cli.demo);
    }
    if cli.show_rtl {
        let text = sclc::dump::dump_rtl(&output.rtl);
        write_dump(&text, &stem.with_extension("rtl"), cli.demo);
    }

    if cli.stop_at == Stage::Asm {
        write_dump(&output.asm, &stem.with_extension("spim"), cli.demo);
    }

    ExitCode::SUCCESS
}

fn write_dump(text: &str, path: &PathBuf, demo: bool) {
    if demo {
        print!("{text}");
    } else if let Err(e) = fs::write(path, text) {
        eprintln!("sclp error: could not write {}: {e}", path.display());
    }
}
