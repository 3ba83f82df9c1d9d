//! mediasearch CLI: index JSON-lines catalogs and query them.
//!
//! ```text
//! mediasearch --db ./library index movies.jsonl
//! mediasearch --db ./library search dark knight
//! mediasearch --db ./library remove tt0372784
//! mediasearch --db ./library stats --json
//! ```
//!
//! Logging goes to stderr, filtered by `RUST_LOG` (default
//! `mediasearch=info`).

mod commands;
mod format;

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::process;

use mediasearch_core::{Error, IndexedDocument, Result};
use mediasearch_engine::SearchEngine;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use commands::build_cli;
use format::{format_error, format_hits, format_report, format_stats, OutputMode};

fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mediasearch=info")),
        )
        .init();

    let matches = build_cli().get_matches();
    let output_mode = if matches.get_flag("json") {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let path = matches
        .get_one::<String>("db")
        .map(|s| s.as_str())
        .unwrap_or(".mediasearch");

    let engine = SearchEngine::open(path);
    if let Err(e) = engine.init() {
        eprintln!("{}", format_error(&e, output_mode));
        process::exit(1);
    }

    // process::exit skips destructors, so shut down explicitly
    let result = run(&engine, &matches, output_mode)
        .map(|_| ())
        .and(engine.shutdown());
    if let Err(e) = result {
        eprintln!("{}", format_error(&e, output_mode));
        process::exit(1);
    }
}

fn run(engine: &SearchEngine, matches: &clap::ArgMatches, mode: OutputMode) -> Result<String> {
    let out = match matches.subcommand() {
        Some(("index", sub)) => {
            let file = sub
                .get_one::<String>("file")
                .map(|s| s.as_str())
                .unwrap_or("-");
            let docs = read_catalog(file)?;
            format_report(&engine.add_or_update(docs)?, mode)
        }
        Some(("search", sub)) => {
            let query = sub
                .get_many::<String>("query")
                .map(|terms| terms.map(String::as_str).collect::<Vec<_>>().join(" "))
                .unwrap_or_default();
            format_hits(&engine.search_with_scores(&query)?, mode)
        }
        Some(("remove", sub)) => {
            let ids = sub
                .get_many::<String>("ids")
                .map(|ids| ids.map(|id| id.as_str().into()).collect())
                .unwrap_or_default();
            format_report(&engine.remove(ids)?, mode)
        }
        Some(("stats", _)) => format_stats(&engine.stats()?, mode),
        _ => String::new(),
    };
    println!("{}", out);
    Ok(out)
}

/// Read documents from a JSON-lines file (or stdin for `-`)
///
/// Blank lines are ignored; malformed lines are logged and skipped.
fn read_catalog(file: &str) -> Result<Vec<IndexedDocument>> {
    let reader: Box<dyn BufRead> = if file == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(File::open(file)?))
    };
    parse_catalog(reader)
}

fn parse_catalog(reader: impl BufRead) -> Result<Vec<IndexedDocument>> {
    let mut docs = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line.map_err(Error::from)?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<IndexedDocument>(&line) {
            Ok(doc) => docs.push(doc),
            Err(e) => warn!(target: "mediasearch::cli", line = n + 1, error = %e, "Skipping malformed catalog line"),
        }
    }
    Ok(docs)
}
