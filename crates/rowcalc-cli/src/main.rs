//! rowcalc CLI - evaluate documents and expressions

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rowcalc::prelude::*;
use rowcalc::{FormulaEngine, IndexMap, Scope};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rowcalc")]
#[command(author, version, about = "Reactive row calculator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recompute a serialized document and print its rows
    Eval {
        /// Document JSON file (`{"rows": [...]}`)
        input: PathBuf,

        /// Global context entry as NAME=JSON (repeatable); non-JSON values are read as text
        #[arg(short, long = "context", value_name = "NAME=JSON")]
        context: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Table)]
        format: Format,

        /// Write the recomputed document back to the input file
        #[arg(short, long)]
        write: bool,
    },

    /// Check an expression against the capability whitelist
    Check {
        /// Expression text
        expression: String,
    },

    /// Evaluate a single expression
    Run {
        /// Expression text
        expression: String,

        /// Variable as NAME=JSON (repeatable); non-JSON values are read as text
        #[arg(short, long = "set", value_name = "NAME=JSON")]
        set: Vec<String>,
    },

    /// Show information about a serialized document
    Info {
        /// Document JSON file
        input: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Table,
    Json,
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Eval {
            input,
            context,
            format,
            write,
        } => eval_document(&input, &context, format, write),
        Commands::Check { expression } => check_expression(&expression),
        Commands::Run { expression, set } => run_expression(&expression, &set),
        Commands::Info { input } => show_info(&input),
    }
}

fn eval_document(input: &Path, context: &[String], format: Format, write: bool) -> Result<()> {
    let mut options = DocumentOptions::default();
    options.context = parse_bindings(context)?;
    let doc = open_document(input, options)?;

    let stats = doc.last_stats();
    eprintln!(
        "Recomputed {} rows ({} evaluated, {} errors, {} in cycles)",
        doc.len(),
        stats.cells_evaluated,
        stats.errors,
        stats.cycles
    );

    let json = doc.to_json().context("Failed to serialize document")?;
    match format {
        Format::Json => {
            io::stdout()
                .write_all(json.as_bytes())
                .and_then(|_| io::stdout().write_all(b"\n"))
                .context("Failed to write to stdout")?;
        }
        Format::Table => print_table(&doc),
    }

    if write {
        std::fs::write(input, &json)
            .with_context(|| format!("Failed to write '{}'", input.display()))?;
        eprintln!("Wrote {} rows to '{}'", doc.len(), input.display());
    }

    Ok(())
}

fn check_expression(expression: &str) -> Result<()> {
    let engine = FormulaEngine::default();
    let compiled = engine
        .compile(expression)
        .with_context(|| format!("Failed to parse '{}'", expression))?;

    if let Some(err) = compiled.disallowed_error() {
        for offense in &compiled.offenses {
            eprintln!("  {} at offset {}", offense.name, offense.position);
        }
        bail!(err);
    }

    let names = engine.free_names(&compiled.ast);
    println!("ok");
    if !names.is_empty() {
        println!("reads: {}", names.join(", "));
    }
    if engine.is_volatile(&compiled.ast) {
        println!("volatile: yes");
    }
    Ok(())
}

fn run_expression(expression: &str, bindings: &[String]) -> Result<()> {
    let engine = FormulaEngine::default();
    let scope: Scope = parse_bindings(bindings)?.into_iter().collect();
    let value = engine
        .eval_expression(expression, &scope)
        .with_context(|| format!("Failed to evaluate '{}'", expression))?;
    println!("{}", display_value(&value));
    Ok(())
}

fn show_info(input: &Path) -> Result<()> {
    let doc = open_document(input, DocumentOptions::default())?;

    println!("File: {}", input.display());
    println!("Rows: {}", doc.len());

    let inputs = doc.cells().iter().filter(|c| c.input().is_some()).count();
    println!("Inputs: {}", inputs);

    let unsafe_rows: Vec<&str> = doc
        .cells()
        .into_iter()
        .filter(|c| !c.is_safe())
        .map(|c| c.name())
        .collect();
    println!("Rejected: {}", join_or_none(&unsafe_rows));

    let volatile: Vec<&str> = doc
        .volatile_cells()
        .into_iter()
        .filter_map(|id| doc.cell(id))
        .map(|c| c.name())
        .collect();
    println!("Volatile: {}", join_or_none(&volatile));

    println!("Cycles: {}", doc.last_stats().cycles);
    Ok(())
}

fn open_document(input: &Path, options: DocumentOptions) -> Result<Document> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to open '{}'", input.display()))?;
    Document::from_json(&text, options)
        .with_context(|| format!("Failed to load document '{}'", input.display()))
}

/// Parse `NAME=JSON` pairs
fn parse_bindings(pairs: &[String]) -> Result<IndexMap<String, Value>> {
    let mut bindings = IndexMap::new();
    for pair in pairs {
        let Some((name, raw)) = pair.split_once('=') else {
            bail!("Expected NAME=JSON, got '{}'", pair);
        };
        let name = name.trim();
        if name.is_empty() {
            bail!("Missing name in '{}'", pair);
        }
        let value = match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(json) => Value::from(json),
            Err(_) => Value::text(raw),
        };
        bindings.insert(name.to_string(), value);
    }
    Ok(bindings)
}

fn print_table(doc: &Document) {
    let rows: Vec<[String; 4]> = doc
        .cells()
        .into_iter()
        .map(|cell| {
            [
                cell.name().to_string(),
                cell.value_kind().to_string(),
                display_value(cell.value()),
                cell.error().map(ToString::to_string).unwrap_or_default(),
            ]
        })
        .collect();

    let header = ["NAME", "KIND", "VALUE", "ERROR"].map(String::from);
    let mut widths = header.clone().map(|h| h.len());
    for row in &rows {
        for (width, field) in widths.iter_mut().zip(row) {
            *width = (*width).max(field.chars().count());
        }
    }

    for row in std::iter::once(&header).chain(&rows) {
        let line: Vec<String> = row
            .iter()
            .zip(widths)
            .map(|(field, width)| format!("{:<width$}", field, width = width))
            .collect();
        println!("{}", line.join("  ").trim_end());
    }
}

/// Compact single-line rendering of a value
fn display_value(value: &Value) -> String {
    match value {
        Value::Absent => "undefined".to_string(),
        Value::Callable(callable) => format!("[Function {}]", callable.qualified_name()),
        Value::Array(_) | Value::Object(_) => value
            .to_json()
            .map(|json| json.to_string())
            .unwrap_or_default(),
        _ => value.to_text(),
    }
}

fn join_or_none(names: &[&str]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}
