//! Command-line front end for the copy engine.
//!
//! Reads each input (a file path or `-` for stdin), copies it through an
//! [`Engine`] and writes the result to stdout or `--output`. With `--tree`
//! the input is first materialized, under the configured limits, and the
//! tree is then serialized.

use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use xmlbridge::engine::{Engine, EngineConfig};
use xmlbridge::source::{Destination, Source};
use xmlbridge::XmlError;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// xmlcopy -- copy XML between streams and trees.
#[derive(Parser, Debug)]
#[command(name = "xmlcopy", version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// XML files to copy (use `-` for stdin).
    #[arg(required = true)]
    files: Vec<String>,

    /// Copy every top-level node instead of stopping after the first
    /// element.
    #[arg(long)]
    fragment: bool,

    /// Materialize the input into a tree, then write the tree.
    #[arg(long)]
    tree: bool,

    /// Maximum element nesting depth when materializing (0 disables).
    #[arg(long, value_name = "N")]
    max_depth: Option<i64>,

    /// Maximum number of elements when materializing (0 disables).
    #[arg(long = "max-elements", value_name = "N")]
    max_elements: Option<i64>,

    /// Output in the given encoding (e.g., UTF-8, ISO-8859-1).
    #[arg(long, value_name = "ENCODING")]
    encoding: Option<String>,

    /// Save output to a file instead of stdout.
    #[arg(long, value_name = "FILE")]
    output: Option<String>,

    /// Print timing information for each input.
    #[arg(long)]
    timing: bool,
}

// ---------------------------------------------------------------------------
// Exit codes
// ---------------------------------------------------------------------------

const EXIT_SUCCESS: u8 = 0;
const EXIT_PARSE_ERROR: u8 = 1;
const EXIT_REJECTED: u8 = 2;
const EXIT_WRITE_ERROR: u8 = 3;

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    let engine = Engine::new(config_for(&cli));
    let mut worst_exit = EXIT_SUCCESS;
    let mut output = Vec::new();

    for file in &cli.files {
        let start = Instant::now();
        let exit = match copy_input(&cli, &engine, file, &mut output) {
            Ok(()) => EXIT_SUCCESS,
            Err(err) => {
                eprintln!("{file}: {err}");
                exit_code_for(&err)
            }
        };
        if cli.timing {
            let elapsed = start.elapsed();
            eprintln!("Copying {file} took {elapsed:?}");
        }
        worst_exit = worst_exit.max(exit);
    }

    if let Err(e) = write_output(&cli, &output) {
        eprintln!("failed to write output: {e}");
        worst_exit = worst_exit.max(EXIT_WRITE_ERROR);
    }
    ExitCode::from(worst_exit)
}

/// Environment settings, overridden by the command line.
fn config_for(cli: &Cli) -> EngineConfig {
    let mut config = EngineConfig::from_env();
    if let Some(depth) = cli.max_depth {
        config = config.max_depth(depth);
    }
    if let Some(count) = cli.max_elements {
        config = config.max_element_count(count);
    }
    config
}

fn exit_code_for(err: &XmlError) -> u8 {
    match err {
        XmlError::Parse(_) | XmlError::Unsupported(_) => EXIT_PARSE_ERROR,
        XmlError::Security { .. } | XmlError::LimitExceeded { .. } => EXIT_REJECTED,
        XmlError::Write(_) => EXIT_WRITE_ERROR,
    }
}

// ---------------------------------------------------------------------------
// Copying
// ---------------------------------------------------------------------------

fn source_for(filename: &str) -> Source<'static> {
    if filename == "-" {
        Source::stream(io::stdin(), None)
    } else {
        Source::file(filename)
    }
}

fn destination_for<'a>(cli: &Cli, out: &'a mut Vec<u8>) -> Destination<'a> {
    Destination::Bytes {
        output: Box::new(out),
        encoding: cli.encoding.clone(),
    }
}

/// Copies one input, appending the serialized result to `out`.
fn copy_input(cli: &Cli, engine: &Engine, filename: &str, out: &mut Vec<u8>) -> Result<(), XmlError> {
    let mut buf = Vec::new();
    if cli.tree {
        if cli.fragment {
            let (doc, fragment) = engine.materialize_fragment(source_for(filename))?;
            engine.copy(
                Source::node(&doc, fragment),
                destination_for(cli, &mut buf),
                true,
            )?;
        } else {
            let doc = engine.materialize(source_for(filename))?;
            engine.copy(Source::document(&doc), destination_for(cli, &mut buf), false)?;
        }
    } else {
        engine.copy(
            source_for(filename),
            destination_for(cli, &mut buf),
            cli.fragment,
        )?;
    }
    if !buf.is_empty() && !buf.ends_with(b"\n") {
        buf.push(b'\n');
    }
    out.extend_from_slice(&buf);
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn write_output(cli: &Cli, bytes: &[u8]) -> io::Result<()> {
    match cli.output {
        Some(ref path) => fs::write(path, bytes),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(bytes)?;
            stdout.flush()
        }
    }
}
