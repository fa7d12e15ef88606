//! Per-run artifact directory layout — C4.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CoordResult;
use crate::types::{read_json_file, write_json_file};

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub run_dir: PathBuf,
    pub issue_json: PathBuf,
    pub sessions_json: PathBuf,
    pub repro_dir: PathBuf,
    pub repro_candidates_dir: PathBuf,
    pub minimal_repro_base: PathBuf,
    pub triage_dir: PathBuf,
    pub triage_hypotheses_json: PathBuf,
    pub decision_json: PathBuf,
    pub final_md: PathBuf,
    pub run_done_json: PathBuf,
    pub prompts_dir: PathBuf,
    pub scripts_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionsFile {
    #[serde(default)]
    pub manager: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub workers: serde_json::Map<String, serde_json::Value>,
}

pub struct ArtifactStore {
    pub runs_root: PathBuf,
    pub run_id: String,
    pub paths: ArtifactPaths,
}

impl ArtifactStore {
    pub fn new(runs_root: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        let runs_root = runs_root.into();
        let run_id = run_id.into();
        let run_dir = runs_root.join(&run_id);
        let repro_dir = run_dir.join("repro");
        let triage_dir = run_dir.join("triage");
        let paths = ArtifactPaths {
            issue_json: run_dir.join("issue.json"),
            sessions_json: run_dir.join("sessions.json"),
            repro_candidates_dir: repro_dir.join("candidates"),
            minimal_repro_base: repro_dir.join("minimal_repro"),
            repro_dir,
            triage_hypotheses_json: triage_dir.join("hypotheses.json"),
            triage_dir,
            decision_json: run_dir.join("decision.json"),
            final_md: run_dir.join("final.md"),
            run_done_json: run_dir.join("run_done.json"),
            prompts_dir: run_dir.join("prompts"),
            scripts_dir: run_dir.join("scripts"),
            run_dir,
        };
        Self {
            runs_root,
            run_id,
            paths,
        }
    }

    /// Create the full artifact tree with placeholder contents, so the
    /// contract holds even if the run fails before producing real output.
    pub fn initialize_contract(&self) -> CoordResult<()> {
        let p = &self.paths;
        std::fs::create_dir_all(&p.repro_candidates_dir)?;
        std::fs::create_dir_all(&p.triage_dir)?;
        std::fs::create_dir_all(&p.prompts_dir)?;
        std::fs::create_dir_all(&p.scripts_dir)?;

        self.write_json(&p.issue_json, &serde_json::json!({}))?;
        self.write_json(&p.sessions_json, &SessionsFile::default())?;
        self.write_json(
            &p.triage_hypotheses_json,
            &serde_json::json!({"hypotheses": []}),
        )?;
        self.write_json(&p.decision_json, &serde_json::json!({}))?;

        let placeholder_repro = self.minimal_repro_path("txt");
        if !placeholder_repro.exists() {
            std::fs::write(&placeholder_repro, "")?;
        }
        if !p.final_md.exists() {
            std::fs::write(&p.final_md, "# bug-triage orchestrator run\n\n")?;
        }
        Ok(())
    }

    pub fn minimal_repro_path(&self, file_extension: &str) -> PathBuf {
        self.paths
            .minimal_repro_base
            .with_extension(file_extension)
    }

    pub fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> CoordResult<()> {
        write_json_file(path, value)
    }

    pub fn read_json<T: for<'de> Deserialize<'de>>(&self, path: &Path) -> CoordResult<T> {
        read_json_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_contract_creates_full_tree() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), "run-1");
        store.initialize_contract().unwrap();

        assert!(store.paths.repro_candidates_dir.is_dir());
        assert!(store.paths.triage_dir.is_dir());
        assert!(store.paths.issue_json.exists());
        assert!(store.paths.sessions_json.exists());
        assert!(store.paths.final_md.exists());
        assert!(store.minimal_repro_path("txt").exists());
    }

    #[test]
    fn minimal_repro_path_swaps_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), "run-1");
        assert_eq!(
            store.minimal_repro_path("py"),
            store.paths.repro_dir.join("minimal_repro.py")
        );
    }
}
