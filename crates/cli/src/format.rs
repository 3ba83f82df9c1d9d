//! Output formatting.
//!
//! Two modes:
//! - **Human** (default): one line per item
//! - **JSON** (`--json`): `serde_json::to_string_pretty`

use mediasearch_core::Error;
use mediasearch_engine::{BatchReport, EngineStats};
use mediasearch_engine::SearchHit;

/// Output formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Format the result of an index or remove batch.
pub fn format_report(report: &BatchReport, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(report),
        OutputMode::Human => {
            let mut out = format!(
                "applied {} document(s), generation {}",
                report.applied, report.generation
            );
            for skipped in &report.skipped {
                out.push_str(&format!("\nskipped {}: {}", skipped.id, skipped.reason));
            }
            out
        }
    }
}

/// Format ranked hits.
pub fn format_hits(hits: &[SearchHit], mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => serde_json::to_string_pretty(
            &hits
                .iter()
                .map(|h| serde_json::json!({ "id": h.id, "score": h.score }))
                .collect::<Vec<_>>(),
        )
        .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e)),
        OutputMode::Human if hits.is_empty() => "(no results)".to_string(),
        OutputMode::Human => hits
            .iter()
            .enumerate()
            .map(|(rank, h)| format!("{:>2}) {}  ({:.3})", rank + 1, h.id, h.score))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Format engine statistics.
pub fn format_stats(stats: &EngineStats, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => serde_json::to_string_pretty(&serde_json::json!({
            "documents": stats.documents,
            "generation": stats.generation,
            "searcher_bound": stats.searcher_bound,
            "queue_depth": stats.queue_depth,
        }))
        .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e)),
        OutputMode::Human => format!(
            "documents:  {}\ngeneration: {}",
            stats.documents, stats.generation
        ),
    }
}

/// Format an error.
pub fn format_error(err: &Error, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => serde_json::to_string_pretty(&serde_json::json!({
            "error": format!("{}", err)
        }))
        .unwrap_or_else(|_| format!("{{\"error\": \"{}\"}}", err)),
        OutputMode::Human => format!("(error) {}", err),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}
