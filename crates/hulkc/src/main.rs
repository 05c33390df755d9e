//! The HULK semantic analyzer CLI.
//!
//! Provides the `hulkc` command with the following subcommand:
//!
//! - `hulkc check <ast.json>` - Type-check a parsed HULK program
//!
//! The program is read in the JSON interchange form produced by the parser.
//!
//! Options:
//! - `--source` - Original program text, used to quote offending lines
//! - `--types` - Print the inferred type of every declared variable and parameter
//! - `--json` - Output diagnostics as JSON (one object per line)
//! - `--no-color` - Disable colorized output
//! - `--verbose` - Log analysis progress to stderr

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::Level;

use hulk_ast::Ast;
use hulk_typeck::diagnostics::DiagnosticOptions;

#[derive(Parser)]
#[command(name = "hulkc", version, about = "The HULK semantic analyzer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Type-check a program given as a JSON AST
    Check {
        /// Path to the AST in JSON form
        ast: PathBuf,

        /// Path to the program source, for quoting lines in diagnostics
        #[arg(long)]
        source: Option<PathBuf>,

        /// Print the inferred type of every declared variable and parameter
        #[arg(long)]
        types: bool,

        /// Output diagnostics as JSON (one object per line) instead of human-readable format
        #[arg(long)]
        json: bool,

        /// Disable colorized output
        #[arg(long = "no-color")]
        no_color: bool,

        /// Log declaration checks and unification decisions to stderr
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            ast,
            source,
            types,
            json,
            no_color,
            verbose,
        } => {
            if verbose {
                tracing_subscriber::fmt()
                    .with_max_level(Level::TRACE)
                    .with_writer(std::io::stderr)
                    .init();
            }
            let diag_opts = DiagnosticOptions {
                color: !no_color && !json,
                json,
            };
            match check(&ast, source.as_deref(), types, &diag_opts) {
                Ok(true) => {}
                Ok(false) => process::exit(1),
                Err(e) => {
                    if json {
                        let msg = serde_json::json!({
                            "code": "C0001",
                            "severity": "error",
                            "message": e,
                            "file": ast.display().to_string(),
                            "spans": [],
                        });
                        eprintln!("{}", msg);
                    } else {
                        eprintln!("error: {}", e);
                    }
                    process::exit(1);
                }
            }
        }
    }
}

/// Load, analyze and report. Returns whether the program is well typed;
/// `Err` means the input could not be analyzed at all.
fn check(
    ast_path: &Path,
    source_path: Option<&Path>,
    show_types: bool,
    diag_opts: &DiagnosticOptions,
) -> Result<bool, String> {
    let text = fs::read_to_string(ast_path)
        .map_err(|e| format!("Failed to read '{}': {}", ast_path.display(), e))?;
    let ast = Ast::from_json(&text).map_err(|e| format!("{}: {}", ast_path.display(), e))?;
    let source = source_path
        .map(|p| {
            fs::read_to_string(p).map_err(|e| format!("Failed to read '{}': {}", p.display(), e))
        })
        .transpose()?;
    let file_name = source_path.unwrap_or(ast_path).display().to_string();

    let result = hulk_typeck::check(&ast);

    for rendered in result.render_errors(source.as_deref(), &file_name, diag_opts) {
        if diag_opts.json {
            eprintln!("{}", rendered);
        } else {
            eprint!("{}", rendered);
        }
    }
    if result.has_errors() {
        if !diag_opts.json {
            eprintln!("{} error(s) found", result.errors.len());
        }
        return Ok(false);
    }

    if show_types {
        for sym in result.symbols.iter().filter(|s| s.origin.is_some() && s.name != "self") {
            println!("{}: {}", sym.name, result.table.name(sym.ty));
        }
    }
    if let Some(ty) = result.result_type_name() {
        println!("ok: program has type {}", ty);
    }
    Ok(true)
}
