//! Timing, token and model-routing metrics aggregated over a run.
//!
//! Each worker's launcher script redirects `codex exec --json` output to
//! `telemetry/worker-<role>-<worker>.jsonl`; [`aggregate_worker_telemetry`]
//! parses those files after the run completes. [`PhaseTimers`] captures
//! wall-clock deltas at the phase boundaries the Manager crosses.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Token and turn counts accumulated for one worker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerTokenUsage {
    pub input_tokens: u64,
    pub cached_input_tokens: u64,
    pub output_tokens: u64,
    pub turns: u64,
}

impl WorkerTokenUsage {
    fn add_turn(&mut self, event: &serde_json::Value) {
        self.input_tokens += event.get("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0);
        self.cached_input_tokens += event.get("cached_input_tokens").and_then(|v| v.as_u64()).unwrap_or(0);
        self.output_tokens += event.get("output_tokens").and_then(|v| v.as_u64()).unwrap_or(0);
        self.turns += 1;
    }
}

/// Parse one worker's `codex exec --json` JSONL telemetry file, summing
/// token counters from `turn.completed` events. Malformed lines are skipped,
/// not fatal — a worker's telemetry is best-effort diagnostics, not a
/// correctness input.
pub fn parse_worker_telemetry(path: &Path) -> WorkerTokenUsage {
    let mut usage = WorkerTokenUsage::default();
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return usage,
    };
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping malformed telemetry line");
                continue;
            }
        };
        if event.get("type").and_then(|v| v.as_str()) == Some("turn.completed") {
            usage.add_turn(&event);
        }
    }
    usage
}

/// Scan `<run_dir>/telemetry/worker-*.jsonl` and aggregate token usage per
/// worker, keyed by the worker id embedded in the filename
/// (`worker-<role>-<worker>.jsonl`).
pub fn aggregate_worker_telemetry(telemetry_dir: &Path) -> HashMap<String, WorkerTokenUsage> {
    let mut usages = HashMap::new();
    let Ok(entries) = std::fs::read_dir(telemetry_dir) else {
        return usages;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some(worker_key) = stem.strip_prefix("worker-") else {
            continue;
        };
        usages.insert(worker_key.to_string(), parse_worker_telemetry(&path));
    }
    usages
}

/// Records `Instant`-based wall-clock deltas at the named phase boundaries a
/// run crosses: preflight, issue-parse, repro phase, triage phase, total.
#[derive(Debug, Default)]
pub struct PhaseTimers {
    started: HashMap<String, Instant>,
    elapsed_ms: HashMap<String, u64>,
}

impl PhaseTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, phase: &str) {
        self.started.insert(phase.to_string(), Instant::now());
    }

    pub fn finish(&mut self, phase: &str) {
        if let Some(start) = self.started.remove(phase) {
            self.elapsed_ms.insert(phase.to_string(), start.elapsed().as_millis() as u64);
        }
    }

    pub fn elapsed_ms(&self) -> &HashMap<String, u64> {
        &self.elapsed_ms
    }
}

/// Model-routing and timing/token metrics merged into `decision.json` as a
/// sibling `metrics` object (see `RunDecision` in `coordination::types`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    pub worker_model: String,
    pub manager_model: String,
    pub phase_elapsed_ms: HashMap<String, u64>,
    pub worker_tokens: HashMap<String, WorkerTokenUsage>,
}

impl RunMetrics {
    pub fn build(worker_model: &str, manager_model: &str, timers: &PhaseTimers, telemetry_dir: &Path) -> Self {
        Self {
            worker_model: worker_model.to_string(),
            manager_model: manager_model.to_string(),
            phase_elapsed_ms: timers.elapsed_ms().clone(),
            worker_tokens: aggregate_worker_telemetry(telemetry_dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_worker_telemetry_sums_turn_completed_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker-repro-w1.jsonl");
        std::fs::write(
            &path,
            concat!(
                "{\"type\":\"turn.completed\",\"input_tokens\":10,\"cached_input_tokens\":2,\"output_tokens\":5}\n",
                "not json at all\n",
                "{\"type\":\"turn.completed\",\"input_tokens\":4,\"output_tokens\":1}\n",
                "{\"type\":\"other\",\"input_tokens\":999}\n",
            ),
        )
        .unwrap();

        let usage = parse_worker_telemetry(&path);
        assert_eq!(usage.input_tokens, 14);
        assert_eq!(usage.cached_input_tokens, 2);
        assert_eq!(usage.output_tokens, 6);
        assert_eq!(usage.turns, 2);
    }

    #[test]
    fn parse_worker_telemetry_missing_file_returns_zeroed_usage() {
        let usage = parse_worker_telemetry(Path::new("/nonexistent/path.jsonl"));
        assert_eq!(usage.turns, 0);
    }

    #[test]
    fn aggregate_worker_telemetry_keys_by_role_and_worker() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("worker-repro-w1.jsonl"),
            "{\"type\":\"turn.completed\",\"input_tokens\":1,\"output_tokens\":1}\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("ignored.txt"), "not telemetry").unwrap();

        let usages = aggregate_worker_telemetry(dir.path());
        assert_eq!(usages.len(), 1);
        assert!(usages.contains_key("repro-w1"));
    }

    #[test]
    fn phase_timers_records_elapsed_ms() {
        let mut timers = PhaseTimers::new();
        timers.start("preflight");
        timers.finish("preflight");
        assert!(timers.elapsed_ms().contains_key("preflight"));
    }
}
