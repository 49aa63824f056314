use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::ProbeOutcome;

const MAX_CMD_OUTPUT_BYTES: usize = 64 * 1024;

#[derive(Debug, Serialize)]
struct OperationLog {
    schema_version: &'static str,
    tool_version: String,
    operation: String,
    label: String,
    started_at: String,
    finished_at: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote: Option<String>,
    script: String,
    output: String,
}

/// One confirmed run of a system-changing probe.
#[derive(Debug, Clone)]
pub struct OperationRecord<'a> {
    pub id: &'a str,
    pub label: &'a str,
    pub script: &'a str,
    pub remote: Option<&'a str>,
    pub started_at: OffsetDateTime,
    pub finished_at: OffsetDateTime,
    pub outcome: &'a ProbeOutcome,
}

pub fn logs_dir(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/probedesk/logs")
}

pub fn write_operation_log(home_dir: &Path, record: &OperationRecord<'_>) -> Result<PathBuf> {
    let dir = logs_dir(home_dir);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory: {}", dir.display()))?;

    let pid = std::process::id();
    let ts = record.finished_at.unix_timestamp_nanos();
    let file_name = format!("{}-{pid}-{ts}.json", record.id);
    let path = dir.join(file_name);

    let status = match record.outcome {
        Ok(_) => "ok".to_string(),
        Err(err) => err.kind().to_string(),
    };

    let log = OperationLog {
        schema_version: "1.0",
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        operation: record.id.to_string(),
        label: record.label.to_string(),
        started_at: record
            .started_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string()),
        finished_at: record
            .finished_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string()),
        status,
        remote: record.remote.map(ToOwned::to_owned),
        script: record.script.to_string(),
        output: truncate_string(
            &crate::core::outcome_text(record.outcome),
            MAX_CMD_OUTPUT_BYTES,
        ),
    };

    let buf = serde_json::to_vec_pretty(&log).context("failed to serialize log (JSON)")?;
    std::fs::write(&path, buf)
        .with_context(|| format!("failed to write log: {}", path.display()))?;
    Ok(path)
}

fn truncate_string(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut idx = max_bytes;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx = idx.saturating_sub(1);
    }
    let head = &s[..idx];
    format!("{head}\n...(truncated, total={} bytes)", s.len())
}
