use crate::coerce::coerce;
use crate::envelope::Envelope;
use crate::error::ApiError;
use crate::lineschema::Direction;
use crate::schema::{compile, CompiledSchema};
use crate::validator::validate;
use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Command-line interface for apistream
#[derive(Parser, Debug)]
#[command(name = "apistream")]
#[command(about = "Compile and exercise line schemas", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the JSON Schema, defaults and coercions derived from a line schema
    Compile {
        /// Path to the line-schema file
        #[arg(short, long)]
        schema: PathBuf,

        /// Which side of the API the schema describes
        #[arg(short, long, value_parser = parse_direction, default_value = "in")]
        direction: Direction,
    },
    /// Merge defaults into a document, validate it and coerce it
    Check {
        /// Path to the line-schema file
        #[arg(short, long)]
        schema: PathBuf,

        /// JSON document to check, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Which side of the API the schema describes
        #[arg(short, long, value_parser = parse_direction, default_value = "in")]
        direction: Direction,
    },
}

/// How a command finished. `Rejected` maps to exit status 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    Rejected,
}

fn parse_direction(s: &str) -> Result<Direction, String> {
    Direction::parse(s).ok_or_else(|| format!("expected `in` or `out`, got `{s}`"))
}

/// `{json_schema, defaults, coercions}` for a compiled schema.
#[must_use]
pub fn compile_report(compiled: &CompiledSchema) -> Value {
    json!({
        "direction": compiled.direction(),
        "fingerprint": compiled.fingerprint(),
        "json_schema": compiled.json_schema(),
        "defaults": compiled.defaults().document(),
        "coercions": compiled.coercions(),
    })
}

/// merge-defaults → validate → coerce, the input half of a request pipeline.
pub fn check_document(compiled: &CompiledSchema, input: &[u8]) -> Result<Value, ApiError> {
    let merged = compiled.defaults().merge(input)?;
    validate(&merged, compiled)?;
    let coerced = coerce(&merged, compiled.coercions())?;
    Ok(serde_json::from_slice(&coerced)?)
}

fn load_schema(path: &Path, direction: Direction) -> anyhow::Result<CompiledSchema> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read line schema {}", path.display()))?;
    let compiled = compile(&text, direction)
        .with_context(|| format!("failed to compile line schema {}", path.display()))?;
    debug!(
        schema = %path.display(),
        direction = %direction,
        fingerprint = compiled.fingerprint(),
        "Schema loaded"
    );
    Ok(compiled)
}

fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        io::stdin()
            .read_to_end(&mut buf)
            .context("failed to read document from stdin")?;
        return Ok(buf);
    }
    std::fs::read(path).with_context(|| format!("failed to read document {}", path.display()))
}

/// Execute a parsed command, writing its JSON result to `out`.
pub fn run_cli(cli: Cli, out: &mut impl Write) -> anyhow::Result<Outcome> {
    match cli.command {
        Commands::Compile { schema, direction } => {
            let compiled = load_schema(&schema, direction)?;
            serde_json::to_writer_pretty(&mut *out, &compile_report(&compiled))?;
            writeln!(out)?;
            Ok(Outcome::Accepted)
        }
        Commands::Check {
            schema,
            input,
            direction,
        } => {
            let compiled = load_schema(&schema, direction)?;
            let document = read_input(&input)?;
            match check_document(&compiled, &document) {
                Ok(value) => {
                    serde_json::to_writer_pretty(&mut *out, &value)?;
                    writeln!(out)?;
                    Ok(Outcome::Accepted)
                }
                Err(err) => {
                    info!(
                        schema = %schema.display(),
                        category = err.category(),
                        error = %err,
                        "Document rejected"
                    );
                    out.write_all(&Envelope::default().error_body(&err.to_string()))?;
                    writeln!(out)?;
                    Ok(Outcome::Rejected)
                }
            }
        }
    }
}
