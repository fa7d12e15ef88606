//! Supervision Loop — C8.
//!
//! Models each worker's lifecycle as an explicit state machine: `tick` takes
//! a [`WorkerWatch`] by value and returns an updated copy, rather than
//! mutating shared state in place.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::CoordResult;
use crate::tmux::SessionSupervisor;

#[derive(Debug, Clone)]
pub struct WorkerWatch {
    pub session_name: String,
    pub script_path: PathBuf,
    pub stalled_once: bool,
    pub restarted_once: bool,
    pub last_digest: String,
    pub last_change_epoch: f64,
    pub failed: bool,
}

impl WorkerWatch {
    pub fn new(session_name: impl Into<String>, script_path: impl Into<PathBuf>) -> Self {
        Self {
            session_name: session_name.into(),
            script_path: script_path.into(),
            stalled_once: false,
            restarted_once: false,
            last_digest: String::new(),
            last_change_epoch: 0.0,
            failed: false,
        }
    }
}

fn now_epoch() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs_f64()
}

pub struct SupervisionLoop<'a> {
    tmux: &'a SessionSupervisor,
    stall_timeout_sec: f64,
}

impl<'a> SupervisionLoop<'a> {
    pub fn new(tmux: &'a SessionSupervisor, stall_timeout_sec: u64) -> Self {
        Self {
            tmux,
            stall_timeout_sec: stall_timeout_sec as f64,
        }
    }

    /// Advance one worker's watch by one poll round: nudge once on stall,
    /// restart once if the nudge didn't help, then give up.
    pub async fn tick(&self, mut state: WorkerWatch, workdir: &std::path::Path) -> CoordResult<WorkerWatch> {
        if state.failed {
            return Ok(state);
        }

        if !self.tmux.session_exists(&state.session_name).await? {
            return Ok(state);
        }

        let pane = self.tmux.capture_pane(&state.session_name, 200).await?;
        let digest: String = pane.chars().rev().take(500).collect::<Vec<_>>().into_iter().rev().collect();
        let now = now_epoch();

        if state.last_change_epoch == 0.0 {
            state.last_change_epoch = now;
        }

        if digest != state.last_digest {
            state.last_digest = digest;
            state.last_change_epoch = now;
            return Ok(state);
        }

        let stalled_for = now - state.last_change_epoch;
        if stalled_for < self.stall_timeout_sec {
            return Ok(state);
        }

        if !state.stalled_once {
            self.tmux
                .send_text(&state.session_name, "status update: report progress or current blocker", true)
                .await?;
            state.stalled_once = true;
            state.last_change_epoch = now;
            return Ok(state);
        }

        if !state.restarted_once {
            self.tmux.kill_session(&state.session_name).await?;
            self.tmux
                .create_session(&state.session_name, workdir, Some(&state.script_path.display().to_string()))
                .await?;
            state.restarted_once = true;
            state.last_change_epoch = now;
            return Ok(state);
        }

        state.failed = true;
        self.tmux.kill_session(&state.session_name).await?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_watch_has_no_digest_and_is_not_failed() {
        let watch = WorkerWatch::new("bugorch-run-w1", "/tmp/w1.sh");
        assert!(!watch.failed);
        assert!(watch.last_digest.is_empty());
    }
}
