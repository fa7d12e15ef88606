//! Shared data model for issue specs, reproducers and triage hypotheses.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::CoordResult;

pub fn now_utc_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureSignal {
    #[serde(default)]
    pub exception_type: Option<String>,
    #[serde(default)]
    pub message_substring: Option<String>,
    #[serde(default)]
    pub exit_code: Option<i64>,
    #[serde(default)]
    pub raw_pattern: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueSpec {
    pub issue_url: String,
    pub repo_slug: String,
    pub issue_number: u64,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub expected_failure_signals: Vec<FailureSignal>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub target_paths: Vec<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub needs_human_reason: Option<String>,
}

fn default_status() -> String {
    "ok".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerTask {
    pub run_id: String,
    pub role: String,
    pub worker_id: String,
    pub input_payload_path: String,
    pub output_path: String,
    pub worktree_path: String,
}

/// Per-worker session metadata, persisted in `sessions.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerMetadata {
    pub session_name: String,
    pub role: String,
    pub worktree_path: String,
    pub output_path: String,
    pub script_path: String,
    pub telemetry_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub total_runs: u32,
    pub matches: u32,
    pub passed: bool,
}

impl ValidationResult {
    // matched_signature is reported alongside, not part of this struct in
    // this crate's wire shape — kept as a companion field on ReproCandidate.
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReproCandidate {
    pub candidate_id: String,
    pub worker_id: String,
    pub script: String,
    #[serde(default)]
    pub setup_commands: Vec<String>,
    pub oracle_command: String,
    pub claimed_failure_signature: String,
    #[serde(default = "default_extension")]
    pub file_extension: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

fn default_extension() -> String {
    "py".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageEvidence {
    pub file: String,
    pub line: i64,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageHypothesis {
    pub hypothesis_id: String,
    pub mechanism: String,
    pub evidence: Vec<TriageEvidence>,
    pub confidence: f64,
    #[serde(default)]
    pub disconfirming_checks: Vec<String>,
    pub worker_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDecision {
    pub status: String,
    pub selected_repro_candidate_id: Option<String>,
    pub rationale: String,
    pub top_hypotheses: Vec<String>,
    pub next_fix_targets: Vec<String>,
    pub diagnostics: Vec<String>,
    #[serde(default = "now_utc_iso")]
    pub created_at: String,
}

/// Write any serializable value as pretty, key-sorted, newline-terminated JSON.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> CoordResult<()> {
    let value = serde_json::to_value(value)?;
    let sorted = sort_json_keys(value);
    let rendered = serde_json::to_string_pretty(&sorted)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format!("{rendered}\n"))?;
    Ok(())
}

pub fn read_json_file<T: for<'de> Deserialize<'de>>(path: &Path) -> CoordResult<T> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn sort_json_keys(value: serde_json::Value) -> serde_json::Value {
    use serde_json::Value;
    match value {
        Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                sorted.insert(key.clone(), sort_json_keys(map[key].clone()));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_json_keys).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_json_file_sorts_keys_and_trails_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let value = serde_json::json!({"b": 1, "a": 2});
        write_json_file(&path, &value).unwrap();
        let rendered = std::fs::read_to_string(&path).unwrap();
        assert!(rendered.ends_with('\n'));
        assert!(rendered.find("\"a\"").unwrap() < rendered.find("\"b\"").unwrap());
    }
}
