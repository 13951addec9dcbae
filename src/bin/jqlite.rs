//! Command-line shell over [`jqlite::run`].
//!
//! Reads a query and a JSON document, evaluates the query against the
//! document, and prints one result per line. All evaluation logic
//! lives in the library; this binary only parses arguments and
//! renders errors.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use colored::Colorize;

/// A jq-compatible JSON query interpreter.
#[derive(ClapParser, Debug)]
#[command(name = "jqlite", version, about)]
struct Args {
    /// The query to evaluate, e.g. `.foo.bar`
    query: String,

    /// JSON input file; reads stdin if omitted
    #[arg(short, long)]
    input: Option<PathBuf>,
}

fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("reading input file {}", path.display())),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("reading input from stdin")?;
            Ok(buf)
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let input_text = match read_input(args.input.as_ref()) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            return ExitCode::FAILURE;
        }
    };

    match jqlite::run(&args.query, &input_text) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{output}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
