//! Decoding of Argo CD log streams
//!
//! Argo CD answers log requests with one JSON record per line. Depending on the endpoint and
//! version a record is either the log entry itself or the entry wrapped in a `result`
//! envelope. Decoding is lossy on purpose: a line that is not JSON, or that has no
//! `content`, is skipped instead of failing the whole payload.
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct LogEntry {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LogRecord {
    Wrapped { result: LogEntry },
    Bare(LogEntry),
}

impl LogRecord {
    fn into_content(self) -> Option<String> {
        let entry = match self {
            LogRecord::Wrapped { result } => result,
            LogRecord::Bare(entry) => entry,
        };
        entry.content.filter(|content| !content.is_empty())
    }
}

/// Extract the `content` of every well-formed record, in order
pub fn parse_log_payload(payload: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut dropped = 0usize;

    for line in payload.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<LogRecord>(line)
            .ok()
            .and_then(LogRecord::into_content)
        {
            Some(content) => lines.push(content),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        tracing::debug!(
            kept = lines.len(),
            dropped,
            "skipped undecodable log records"
        );
    }
    lines
}
