//! Read-only helpers over `sessions.json`, used by the auxiliary CLI
//! commands (`status`, `attach`, `send`, `stop`, `list`).

use std::path::Path;

use crate::artifacts::ArtifactStore;
use crate::error::CoordResult;

pub fn read_sessions(path: &Path) -> CoordResult<Option<serde_json::Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&raw)?))
}

pub fn require_sessions(run_id: &str, runs_root: &Path) -> CoordResult<serde_json::Value> {
    let store = ArtifactStore::new(runs_root, run_id);
    let path = store.paths.sessions_json;
    read_sessions(&path)?.ok_or_else(|| {
        crate::error::CoordError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("run not found or missing sessions file: {}", path.display()),
        ))
    })
}

pub fn resolve_session_name(sessions: &serde_json::Value, worker: &str) -> String {
    if worker == "manager" {
        return sessions
            .get("manager")
            .and_then(|m| m.get("session_name"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
    }
    sessions
        .get("workers")
        .and_then(|w| w.get(worker))
        .and_then(|m| m.get("session_name"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

pub fn iter_session_names(sessions: &serde_json::Value) -> Vec<String> {
    let mut names = Vec::new();
    if let Some(name) = sessions.get("manager").and_then(|m| m.get("session_name")).and_then(|v| v.as_str()) {
        if !name.is_empty() {
            names.push(name.to_string());
        }
    }
    if let Some(workers) = sessions.get("workers").and_then(|w| w.as_object()) {
        for worker in workers.values() {
            if let Some(name) = worker.get("session_name").and_then(|v| v.as_str()) {
                if !name.is_empty() {
                    names.push(name.to_string());
                }
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_session_name_reads_manager_and_workers() {
        let sessions = serde_json::json!({
            "manager": {"session_name": "bugorch-run-manager"},
            "workers": {"w1": {"session_name": "bugorch-run-w1"}},
        });
        assert_eq!(resolve_session_name(&sessions, "manager"), "bugorch-run-manager");
        assert_eq!(resolve_session_name(&sessions, "w1"), "bugorch-run-w1");
        assert_eq!(resolve_session_name(&sessions, "w9"), "");
    }

    #[test]
    fn require_sessions_errors_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(require_sessions("missing-run", dir.path()).is_err());
    }
}
