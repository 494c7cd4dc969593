//! `vlx` CLI: check, convert, and inspect VLX documents from the command line.
//!
//! Every subcommand reads text or binary VLX (detected from the file
//! signature) from `-i` or stdin.
//!
//! ## Usage
//!
//! ```sh
//! # Parse and link, exit non-zero on any error
//! vlx check -i scene.vlx
//!
//! # Text → binary and back
//! vlx convert --to binary -i scene.vlx -o scene.vlb
//! vlx convert --to text -i scene.vlb
//!
//! # Dump as JSON
//! vlx inspect --pretty -i scene.vlx
//!
//! # Node counts and encoded sizes
//! cat scene.vlx | vlx stats
//! ```
//!
//! Diagnostics go to stderr through `env_logger`; set `RUST_LOG=debug` for
//! more.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Read, Write};
use vlx_core::{
    export_binary, export_text, import_binary, is_binary, link, parse_text, structure_to_json,
    DocumentStats, StructureRef,
};

#[derive(Parser)]
#[command(name = "vlx", version, about = "VLX object-graph document tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Binary,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and link a document, reporting every error
    Check {
        /// Input file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
    },
    /// Re-encode a document as text or binary
    Convert {
        /// Input file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// Target encoding
        #[arg(long, value_enum)]
        to: Format,
    },
    /// Print a document as JSON
    Inspect {
        /// Input file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// Indent the JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Show node counts and text/binary sizes as JSON
    Stats {
        /// Input file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Indent the JSON
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { input } => {
            let root = load(input.as_deref())?;
            link(&root).context("Failed to link document")?;
            let stats = DocumentStats::collect(&root);
            println!(
                "{}: ok ({} structures, {} references)",
                root.borrow().tag,
                stats.structures,
                stats.uid_references
            );
        }
        Commands::Convert { input, output, to } => {
            let root = load(input.as_deref())?;
            let bytes = match to {
                Format::Text => export_text(&root).into_bytes(),
                Format::Binary => export_binary(&root),
            };
            write_output(output.as_deref(), &bytes)?;
        }
        Commands::Inspect {
            input,
            output,
            pretty,
        } => {
            let root = load(input.as_deref())?;
            let json = to_json_string(&structure_to_json(&root), pretty)?;
            write_output(output.as_deref(), format!("{json}\n").as_bytes())?;
        }
        Commands::Stats { input, pretty } => {
            let root = load(input.as_deref())?;
            let mut report = serde_json::to_value(DocumentStats::collect(&root))?;
            if let Some(fields) = report.as_object_mut() {
                fields.insert("text_bytes".into(), export_text(&root).len().into());
                fields.insert("binary_bytes".into(), export_binary(&root).len().into());
            }
            println!("{}", to_json_string(&report, pretty)?);
        }
    }

    Ok(())
}

/// Decode text or binary VLX, whichever the input holds.
fn load(path: Option<&str>) -> Result<StructureRef> {
    let bytes = read_input(path)?;
    if is_binary(&bytes) {
        log::debug!("decoding {} bytes of binary VLX", bytes.len());
        return import_binary(&bytes).context("Failed to decode binary VLX");
    }
    log::debug!("parsing {} bytes of VLX text", bytes.len());
    let text = std::str::from_utf8(&bytes).context("Input is neither binary VLX nor UTF-8 text")?;
    parse_text(text).context("Failed to parse VLX text")
}

fn to_json_string(value: &serde_json::Value, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

fn read_input(path: Option<&str>) -> Result<Vec<u8>> {
    match path {
        Some(path) => std::fs::read(path).with_context(|| format!("Failed to read file: {}", path)),
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&str>, content: &[u8]) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(content).context("Failed to write to stdout")?;
            stdout.flush()?;
        }
    }
    Ok(())
}
