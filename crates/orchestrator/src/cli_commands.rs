//! Auxiliary CLI subcommands — `status`, `attach`, `send`, `stop`, `list`.
//!
//! Grounded in `orchestrator/cli.py`'s `cmd_status`/`cmd_attach`/`cmd_send`/
//! `cmd_stop`. None of these start a Manager; they only read `sessions.json`
//! and talk to tmux directly, so they work against a run that's already in
//! flight or already finished.

use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Command;

use coordination::sessions::{iter_session_names, read_sessions, require_sessions, resolve_session_name};
use coordination::types::read_json_file;
use coordination::{ArtifactStore, CommandRunner, SessionSupervisor};

pub async fn status(run_id: &str, runs_root: &Path) -> anyhow::Result<()> {
    let sessions = require_sessions(run_id, runs_root)?;
    let tmux = SessionSupervisor::new(CommandRunner::new(), runs_root);

    println!("run_id={run_id}");
    let manager_name = resolve_session_name(&sessions, "manager");
    let manager_exists = if manager_name.is_empty() { false } else { tmux.session_exists(&manager_name).await? };
    println!("manager={manager_name} exists={manager_exists}");

    let mut worker_ids: Vec<String> = sessions
        .get("workers")
        .and_then(|w| w.as_object())
        .map(|workers| workers.keys().cloned().collect())
        .unwrap_or_default();
    worker_ids.sort();

    for worker_id in worker_ids {
        let worker = &sessions["workers"][&worker_id];
        let session_name = worker.get("session_name").and_then(|v| v.as_str()).unwrap_or_default();
        let role = worker.get("role").and_then(|v| v.as_str()).unwrap_or_default();
        let status = worker.get("status").and_then(|v| v.as_str()).unwrap_or("running");
        let exists = if session_name.is_empty() { false } else { tmux.session_exists(session_name).await? };
        println!("{worker_id} role={role} session={session_name} status={status} exists={exists}");
    }

    Ok(())
}

/// Replace the current process with `tmux attach -t <session>`, matching
/// the Python prototype's `os.execvp` — not a subprocess spawn.
pub fn attach(run_id: &str, worker: &str, runs_root: &Path) -> anyhow::Result<()> {
    let sessions = require_sessions(run_id, runs_root)?;
    let session_name = resolve_session_name(&sessions, worker);
    if session_name.is_empty() {
        anyhow::bail!("unknown worker: {worker}");
    }
    let err = Command::new("tmux").args(["attach", "-t", &session_name]).exec();
    Err(anyhow::anyhow!("failed to exec tmux: {err}"))
}

pub async fn send(run_id: &str, worker: &str, text: &str, runs_root: &Path) -> anyhow::Result<()> {
    let sessions = require_sessions(run_id, runs_root)?;
    let session_name = resolve_session_name(&sessions, worker);
    if session_name.is_empty() {
        anyhow::bail!("unknown worker: {worker}");
    }
    let tmux = SessionSupervisor::new(CommandRunner::new(), runs_root);
    tmux.send_text(&session_name, text, true).await?;
    println!("sent to {session_name}");
    Ok(())
}

pub async fn stop(run_id: &str, runs_root: &Path) -> anyhow::Result<()> {
    let store = ArtifactStore::new(runs_root, run_id);
    let sessions = read_sessions(&store.paths.sessions_json)?.unwrap_or_else(|| serde_json::json!({"manager": {}, "workers": {}}));

    let tmux = SessionSupervisor::new(CommandRunner::new(), runs_root);
    for name in iter_session_names(&sessions) {
        tmux.kill_session(&name).await?;
    }

    if !store.paths.run_done_json.exists() {
        let run_done = serde_json::json!({
            "run_id": run_id,
            "status": "stopped",
            "final_md": store.paths.final_md.display().to_string(),
            "decision_json": store.paths.decision_json.display().to_string(),
        });
        store.write_json(&store.paths.run_done_json, &run_done)?;
    }
    println!("stopped run {run_id}");
    Ok(())
}

/// List every run directory under `runs_root` with its terminal status, or
/// `running` if `run_done.json` hasn't been written yet.
pub fn list(runs_root: &Path) -> anyhow::Result<()> {
    if !runs_root.exists() {
        return Ok(());
    }

    let mut run_ids: Vec<String> = std::fs::read_dir(runs_root)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    run_ids.sort();

    for run_id in run_ids {
        let store = ArtifactStore::new(runs_root, run_id.as_str());
        let status = if store.paths.run_done_json.exists() {
            read_json_file::<serde_json::Value>(&store.paths.run_done_json)
                .ok()
                .and_then(|value| value.get("status").and_then(|s| s.as_str()).map(str::to_string))
                .unwrap_or_else(|| "unknown".to_string())
        } else {
            "running".to_string()
        };
        println!("{run_id} status={status}");
    }

    Ok(())
}
