//! Command-line access to the validators.
//!
//! Usage:
//!   docxlate validate letter.docx --schema schema.json --include-warnings
//!   docxlate refs letter.docx

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use docxlate::{
    Schema, SemanticOptions, SyntaxOptions, extract_references, validate_semantics,
    validate_syntax,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "docxlate")]
#[command(about = "Validate template tags in .docx documents")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check tag syntax, and field and function use when a schema is given
    Validate {
        /// Document to check
        file: PathBuf,

        /// JSON schema of fields and functions
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Report schema findings as errors
        #[arg(long)]
        strict: bool,

        /// Return warnings and count them against validity
        #[arg(long)]
        include_warnings: bool,

        /// Return at most this many issues
        #[arg(long)]
        max_issues: Option<usize>,
    },
    /// List the control tags, variables and functions a document uses
    Refs {
        /// Document to inspect
        file: PathBuf,
    },
}

type CliResult<T> = Result<T, Box<dyn Error>>;

fn read(path: &Path) -> CliResult<Vec<u8>> {
    fs::read(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e).into())
}

fn load_schema(path: &Path) -> CliResult<Schema> {
    let bytes = read(path)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| format!("Invalid schema {}: {}", path.display(), e).into())
}

fn run() -> CliResult<bool> {
    let args = Args::parse();

    match args.command {
        Command::Validate {
            file,
            schema,
            strict,
            include_warnings,
            max_issues,
        } => {
            let bytes = read(&file)?;
            let result = match schema {
                Some(path) => {
                    let schema = load_schema(&path)?;
                    let options = SemanticOptions {
                        strict,
                        include_warnings,
                        max_issues,
                    };
                    validate_semantics(&bytes, &schema, options)?
                }
                None => validate_syntax(&bytes, SyntaxOptions { max_issues })?,
            };
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(result.valid)
        }
        Command::Refs { file } => {
            let bytes = read(&file)?;
            let references = extract_references(&bytes)?;
            println!("{}", serde_json::to_string_pretty(&references)?);
            Ok(true)
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("DOCXLATE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(true) => {}
        Ok(false) => process::exit(2),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
