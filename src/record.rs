use std::collections::BTreeMap;

use serde::Serialize;

use crate::container::{ContainerDescriptor, ProcessTable};
use crate::decode::LogFrame;

/// One log line on its way to the collector: the owning container's tags
/// flattened next to the decoded frame fields.
#[derive(Debug, Serialize)]
pub struct LogRecord<'a> {
    #[serde(flatten)]
    pub tags: &'a ContainerDescriptor,
    pub stream: &'static str,
    pub timestamp: String,
    pub message: String,
}

impl<'a> LogRecord<'a> {
    pub fn new(tags: &'a ContainerDescriptor, frame: LogFrame) -> Self {
        Self {
            tags,
            stream: frame.origin.as_str(),
            timestamp: frame.timestamp,
            message: frame.message,
        }
    }
}

/// One process-table row from a `top` sample. Every column of the table
/// becomes a field keyed by its lowercased title, next to a human-readable
/// summary of the usual suspects.
#[derive(Debug, Serialize)]
pub struct TopRecord<'a> {
    pub host: &'a str,
    pub id: &'a str,
    pub app: &'a str,
    pub tag: &'a str,
    pub status: &'a str,
    pub time: i64,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(flatten)]
    pub columns: BTreeMap<String, String>,
    pub message: String,
}

impl<'a> TopRecord<'a> {
    pub fn from_row(
        tags: &'a ContainerDescriptor,
        table: &ProcessTable,
        row: &[String],
        time: i64,
    ) -> Self {
        let columns: BTreeMap<String, String> = table
            .titles
            .iter()
            .map(|t| t.to_lowercase())
            .zip(row.iter().cloned())
            .collect();
        let message = summary_message(&columns);
        Self {
            host: &tags.host,
            id: &tags.id,
            app: &tags.app,
            tag: &tags.tag,
            status: &tags.status,
            time,
            kind: "top",
            columns,
            message,
        }
    }
}

fn summary_message(columns: &BTreeMap<String, String>) -> String {
    let mut parts = Vec::new();
    for key in ["%cpu", "%mem"] {
        if let Some(value) = columns.get(key) {
            parts.push(format!("{key}: {value}"));
        }
    }
    for key in ["rss", "vsz"] {
        if let Some(value) = columns.get(key) {
            match value.parse::<u64>() {
                Ok(n) => parts.push(format!("{key}: {}", human_bytes(n))),
                Err(_) => parts.push(format!("{key}: {value}")),
            }
        }
    }
    parts.join(", ")
}

/// Render a byte count with 1024-based units, dropping the fraction when
/// the value divides evenly (10240 -> "10KB").
pub fn human_bytes(n: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if value.fract() == 0.0 {
        format!("{}{}", value as u64, UNITS[unit])
    } else {
        format!("{value:.1}{}", UNITS[unit])
    }
}
