//! Action logging for Bugpen commands.
//!
//! Every CLI invocation is appended to a structured JSONL log in the data
//! directory, recording who did what and whether it succeeded. Logging is
//! best-effort: a full disk or missing directory must never fail the
//! command itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Strings longer than this are truncated before logging (attachment
/// payloads, long descriptions).
const MAX_LOGGED_STRING: usize = 100;

/// One audit record, one line of `action.log`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionLog {
    /// When the command ran
    pub timestamp: DateTime<Utc>,

    /// Principal who executed the command
    pub principal: String,

    /// Command name (e.g., "project create", "member role")
    pub command: String,

    /// Sanitized command arguments
    pub args: serde_json::Value,

    /// Whether the command succeeded
    pub success: bool,

    /// Error message if the command failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

/// Append an entry to `action.log` in the data directory.
///
/// Write failures are reported on stderr and otherwise swallowed.
pub fn log_action(
    data_dir: &Path,
    principal: &str,
    command: &str,
    args: serde_json::Value,
    success: bool,
    error: Option<String>,
    duration_ms: u64,
) {
    let entry = ActionLog {
        timestamp: Utc::now(),
        principal: principal.to_string(),
        command: command.to_string(),
        args: sanitize(args),
        success,
        error,
        duration_ms,
    };

    if let Err(e) = append_entry(&data_dir.join("action.log"), &entry) {
        eprintln!("Warning: Failed to write action log: {}", e);
    }
}

fn append_entry(path: &Path, entry: &ActionLog) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let json = serde_json::to_string(entry).map_err(std::io::Error::other)?;
    writeln!(file, "{}", json)
}

/// Keys whose values never belong in a log.
fn is_sensitive(key: &str) -> bool {
    let key = key.to_lowercase();
    ["token", "password", "secret"].iter().any(|s| key.contains(s))
}

/// Redact sensitive values and truncate long strings, recursively.
fn sanitize(args: serde_json::Value) -> serde_json::Value {
    use serde_json::Value;

    match args {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    let value = if is_sensitive(&key) {
                        Value::String("[REDACTED]".to_string())
                    } else {
                        sanitize(value)
                    };
                    (key, value)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        Value::String(s) if s.len() > MAX_LOGGED_STRING => {
            let cut = s
                .char_indices()
                .map(|(i, _)| i)
                .take_while(|&i| i <= MAX_LOGGED_STRING - 3)
                .last()
                .unwrap_or(0);
            Value::String(format!("{}... ({} chars)", &s[..cut], s.len()))
        }
        other => other,
    }
}
