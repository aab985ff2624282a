//! Rift Predicate Matcher CLI Tool
//!
//! Evaluates a predicate (or a stub's predicate array) against a request and
//! prints whether it matched. Useful for debugging why a stub is not selected.
//!
//! Usage:
//!   rift-match --predicate predicate.json --request request.json [OPTIONS]
//!
//! Exit status: 0 when matched, 1 when not matched, 2 on error.

use anyhow::{Context, Result};
use clap::Parser;
use rift_predicates::{
    Encoding, EngineConfig, Predicate, PredicateEngine, PredicateError, TracingLogger, Value,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const RED: &str = "\x1b[31m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Rift Predicate Matcher - Check a request against stub predicates
#[derive(Parser, Debug)]
#[command(name = "rift-match")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Predicate JSON file: one predicate, or an array matched as a stub
    #[arg(short, long)]
    predicate: PathBuf,

    /// Request JSON file
    #[arg(short, long)]
    request: PathBuf,

    /// Request encoding: text or binary (base64)
    #[arg(short, long, default_value = "text", env = "RIFT_ENCODING")]
    encoding: Encoding,

    /// Engine configuration file (YAML or JSON)
    #[arg(short, long, env = "RIFT_CONFIG")]
    config: Option<PathBuf>,

    /// Accept inject predicates, overriding the configuration file
    #[arg(long, env = "RIFT_ALLOW_INJECTION")]
    allow_injection: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(true) => {
            println!("true");
            std::process::exit(0);
        }
        Ok(false) => {
            println!("false");
            std::process::exit(1);
        }
        Err(e) => {
            match e.downcast_ref::<PredicateError>() {
                Some(PredicateError::Validation {
                    context: Some(context),
                    ..
                }) => eprintln!("{RED}error (bad data):{RESET} {e:#}\n  {DIM}{context}{RESET}"),
                Some(err) => eprintln!("{RED}error ({}):{RESET} {e:#}", err.code()),
                None => eprintln!("{RED}error:{RESET} {e:#}"),
            }
            std::process::exit(2);
        }
    }
}

fn run(args: &Args) -> Result<bool> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if args.allow_injection {
        config.allow_injection = true;
    }

    let predicate = read_json(&args.predicate)?;
    let request = Value::from(read_json(&args.request)?);
    let engine = PredicateEngine::new(config);

    let matched = match predicate {
        serde_json::Value::Array(items) => {
            let stub = items
                .iter()
                .map(Predicate::parse)
                .collect::<Result<Vec<_>, _>>()?;
            tracing::debug!(predicates = stub.len(), "Matching stub");
            engine.matches_all(&stub, &request, args.encoding, &TracingLogger)?
        }
        predicate => engine.resolve_json(&predicate, &request, args.encoding, &TracingLogger)?,
    };
    Ok(matched)
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}
