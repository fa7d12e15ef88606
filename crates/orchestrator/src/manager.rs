//! Manager — C11.
//!
//! Drives the two-phase run: launch REPRO_BUILDER workers until one produces
//! a reproducer that clears the validation gate, minimize it, then launch
//! TRIAGER workers until their hypotheses converge (or the worker pool is
//! exhausted). Each phase escalates worker count along a fixed sequence
//! rather than retrying the same count, so a flaky first attempt doesn't
//! retry forever at the cheapest tier.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use coordination::issue::{fetch_issue_json, normalize_issue_spec, write_issue_spec};
use coordination::types::write_json_file;
use coordination::{
    build_agent_exec_script, build_repro_prompt, build_triage_prompt, choose_best_candidate,
    minimize_candidate, now_utc_iso, parse_repro_candidate, parse_triage_output, rank_hypotheses,
    run_preflight, top_hypotheses, validate_candidate, ArtifactStore, CommandRunner, CoordResult,
    IssueSpec, MinimizeParams, ReproCandidate, RunDecision, SessionSupervisor, SupervisionLoop,
    TriageHypothesis, ValidateParams, WorkerMetadata, WorkerRole, WorkerWatch, WorktreeManager,
};

use crate::telemetry::{PhaseTimers, RunMetrics};

/// Prefix for tmux session names and worktree directories this Manager
/// creates. The original Python prototype used `codorch-`; renamed here to
/// match this crate's own binary name (see DESIGN.md).
pub const SESSION_PREFIX: &str = "bugorch";

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub run_id: String,
    pub issue_url: String,
    pub repo_path: PathBuf,
    pub runs_root: PathBuf,
    pub min_workers: u32,
    pub max_workers: u32,
    pub timeout_sec: u64,
    pub poll_interval_sec: u64,
    pub repro_validation_runs: u32,
    pub repro_min_matches: u32,
    pub validation_python_version: String,
    pub worker_model: String,
    pub manager_model: String,
}

fn role_slug(role: WorkerRole) -> &'static str {
    match role {
        WorkerRole::ReproBuilder => "repro",
        WorkerRole::Triager => "triage",
    }
}

pub struct Manager {
    config: ManagerConfig,
    runner: CommandRunner,
    artifacts: ArtifactStore,
    tmux: SessionSupervisor,
    worktrees: WorktreeManager,
    timers: PhaseTimers,
}

impl Manager {
    pub fn new(config: ManagerConfig) -> Self {
        let runner = CommandRunner::new();
        let artifacts = ArtifactStore::new(config.runs_root.clone(), config.run_id.clone());
        let tmux = SessionSupervisor::new(runner, config.repo_path.clone());
        let worktrees = WorktreeManager::new(runner, config.repo_path.clone());
        Self {
            config,
            runner,
            artifacts,
            tmux,
            worktrees,
            timers: PhaseTimers::new(),
        }
    }

    pub fn manager_session_name(&self) -> String {
        format!("{SESSION_PREFIX}-{}-manager", self.config.run_id)
    }

    fn worker_session_name(&self, worker_id: &str) -> String {
        format!("{SESSION_PREFIX}-{}-{worker_id}", self.config.run_id)
    }

    fn worktree_path(&self, worker_id: &str) -> PathBuf {
        PathBuf::from(format!("/tmp/{SESSION_PREFIX}-{}-{worker_id}", self.config.run_id))
    }

    fn python_executable(&self) -> String {
        format!("python{}", self.config.validation_python_version)
    }

    /// Worker counts to try in order: the floor, then 4 and 6 if they sit
    /// strictly between the floor and ceiling, then the ceiling itself.
    fn worker_count_sequence(&self) -> Vec<u32> {
        let mut sequence = vec![self.config.min_workers];
        for size in [4u32, 6] {
            if self.config.min_workers < size && size <= self.config.max_workers {
                sequence.push(size);
            }
        }
        if !sequence.contains(&self.config.max_workers) {
            sequence.push(self.config.max_workers);
        }
        sequence.sort_unstable();
        sequence.dedup();
        sequence
    }

    fn write_sessions(&self, worker_sessions: &BTreeMap<String, WorkerMetadata>) -> CoordResult<()> {
        let sessions = serde_json::json!({
            "manager": {
                "session_name": self.manager_session_name(),
                "run_id": self.config.run_id,
                "issue_url": self.config.issue_url,
            },
            "workers": worker_sessions,
        });
        write_json_file(&self.artifacts.paths.sessions_json, &sessions)
    }

    async fn launch_workers(
        &self,
        role: WorkerRole,
        count: u32,
        issue_spec: &IssueSpec,
        minimal_repro: Option<&str>,
    ) -> CoordResult<(BTreeMap<String, WorkerMetadata>, Vec<(String, PathBuf)>)> {
        let mut worker_sessions = BTreeMap::new();
        let mut output_paths = Vec::new();

        for idx in 1..=count {
            let worker_id = format!("w{idx}");
            let session_name = self.worker_session_name(&worker_id);
            let script_path = self
                .artifacts
                .paths
                .scripts_dir
                .join(format!("{}-{worker_id}.sh", role_slug(role)));
            let output_path = match role {
                WorkerRole::ReproBuilder => self.artifacts.paths.repro_candidates_dir.join(format!("{worker_id}.json")),
                WorkerRole::Triager => self.artifacts.paths.triage_dir.join(format!("{worker_id}.json")),
            };
            let worktree_path = self.worktree_path(&worker_id);
            self.worktrees.create(&worker_id, &worktree_path).await?;

            let prompt = match role {
                WorkerRole::ReproBuilder => build_repro_prompt(issue_spec, &worker_id),
                WorkerRole::Triager => build_triage_prompt(
                    issue_spec,
                    &worker_id,
                    minimal_repro.unwrap_or_default(),
                    &issue_spec.target_paths,
                ),
            };

            let telemetry_path = self
                .artifacts
                .paths
                .run_dir
                .join("telemetry")
                .join(format!("worker-{}-{worker_id}.jsonl", role_slug(role)));
            build_agent_exec_script(
                &prompt,
                &output_path,
                &script_path,
                &worktree_path,
                &self.config.worker_model,
                Some(&telemetry_path),
            )?;

            if self.tmux.session_exists(&session_name).await? {
                self.tmux.kill_session(&session_name).await?;
            }
            self.tmux
                .create_session(&session_name, &self.config.repo_path, Some(&script_path.display().to_string()))
                .await?;

            worker_sessions.insert(
                worker_id.clone(),
                WorkerMetadata {
                    session_name,
                    role: role.as_str().to_string(),
                    worktree_path: worktree_path.display().to_string(),
                    output_path: output_path.display().to_string(),
                    script_path: script_path.display().to_string(),
                    telemetry_path: telemetry_path.display().to_string(),
                    status: None,
                    exit_code: None,
                    error: None,
                },
            );
            output_paths.push((worker_id, output_path));
        }

        Ok((worker_sessions, output_paths))
    }

    /// Poll every worker's tmux pane until all sessions have ended, the
    /// configured timeout elapses, or every worker has failed. Each
    /// worker's final status (`finished`, `failed`, `timeout`) is recorded
    /// back into `worker_sessions`.
    async fn wait_for_workers(&self, worker_sessions: &mut BTreeMap<String, WorkerMetadata>) -> CoordResult<()> {
        let stall_timeout = (self.config.timeout_sec / 3).max(45);
        let supervision = SupervisionLoop::new(&self.tmux, stall_timeout);
        let mut watches: BTreeMap<String, WorkerWatch> = worker_sessions
            .iter()
            .map(|(id, meta)| (id.clone(), WorkerWatch::new(meta.session_name.clone(), PathBuf::from(&meta.script_path))))
            .collect();

        let start = Instant::now();
        loop {
            let mut active_ids = Vec::new();
            for (worker_id, watch) in std::mem::take(&mut watches) {
                let ticked = supervision.tick(watch, &self.config.repo_path).await?;
                let still_active = !ticked.failed && self.tmux.session_exists(&ticked.session_name).await?;
                if still_active {
                    active_ids.push(worker_id.clone());
                }
                watches.insert(worker_id, ticked);
            }

            if active_ids.is_empty() {
                break;
            }
            if start.elapsed().as_secs() >= self.config.timeout_sec {
                for worker_id in &active_ids {
                    self.tmux.kill_session(&watches[worker_id].session_name).await?;
                }
                for worker_id in &active_ids {
                    if let Some(meta) = worker_sessions.get_mut(worker_id) {
                        meta.status = Some("timeout".to_string());
                    }
                }
                break;
            }
            tokio::time::sleep(Duration::from_secs(self.config.poll_interval_sec)).await;
        }

        for (worker_id, meta) in worker_sessions.iter_mut() {
            if meta.status.is_some() {
                continue;
            }
            let failed = watches.get(worker_id).is_some_and(|w| w.failed);
            meta.status = Some(if failed { "failed".to_string() } else { "finished".to_string() });
        }

        Ok(())
    }

    async fn validate_candidates(
        &self,
        issue_spec: &IssueSpec,
        output_paths: &[(String, PathBuf)],
        diagnostics: &mut Vec<String>,
    ) -> CoordResult<Vec<ReproCandidate>> {
        let python_executable = self.python_executable();
        let mut candidates = Vec::new();
        for (worker_id, output_path) in output_paths {
            let candidate = match parse_repro_candidate(worker_id, output_path) {
                Ok(Some(candidate)) => candidate,
                Ok(None) => continue,
                Err(err) => {
                    let text = format!("worker {worker_id}: {err}");
                    self.append_diagnostic(&text)?;
                    diagnostics.push(text);
                    continue;
                }
            };
            let candidate_script_path = self
                .artifacts
                .paths
                .repro_candidates_dir
                .join(format!("{}.{}", candidate.candidate_id, candidate.file_extension));
            let validation = validate_candidate(
                &candidate,
                issue_spec,
                &self.config.repo_path,
                &candidate_script_path,
                &self.runner,
                ValidateParams {
                    runs: self.config.repro_validation_runs,
                    min_matches: self.config.repro_min_matches,
                    python_executable: Some(&python_executable),
                    timeout_sec: self.config.timeout_sec.min(60),
                },
            )
            .await?;

            let mut validated = candidate;
            validated.validation = Some(validation);
            self.artifacts.write_json(output_path, &validated)?;
            candidates.push(validated);
        }
        Ok(candidates)
    }

    fn append_diagnostic(&self, text: &str) -> CoordResult<()> {
        let path = &self.artifacts.paths.decision_json;
        let mut value: serde_json::Value = if path.exists() {
            self.artifacts.read_json(path).unwrap_or_else(|_| serde_json::json!({}))
        } else {
            serde_json::json!({})
        };
        if let Some(obj) = value.as_object_mut() {
            let diagnostics = obj.entry("diagnostics").or_insert_with(|| serde_json::json!([]));
            if let Some(arr) = diagnostics.as_array_mut() {
                arr.push(serde_json::Value::String(text.to_string()));
            } else {
                *diagnostics = serde_json::json!([text]);
            }
        }
        self.artifacts.write_json(path, &value)
    }

    async fn cleanup_worktrees(&self, worker_sessions: &BTreeMap<String, WorkerMetadata>) -> CoordResult<()> {
        for meta in worker_sessions.values() {
            let path = PathBuf::from(&meta.worktree_path);
            if path.exists() {
                self.worktrees.remove(&path).await?;
            }
        }
        Ok(())
    }

    fn finalize(&self, decision: RunDecision, extra: serde_json::Value) -> CoordResult<RunDecision> {
        let mut value = serde_json::to_value(&decision)?;
        if let (Some(obj), Some(extra_obj)) = (value.as_object_mut(), extra.as_object()) {
            for (key, val) in extra_obj {
                obj.insert(key.clone(), val.clone());
            }
        }
        write_json_file(&self.artifacts.paths.decision_json, &value)?;

        let mut final_md = format!("# bug-triage orchestrator run {}\n\n", self.config.run_id);
        final_md.push_str(&format!("- issue: {}\n", self.config.issue_url));
        final_md.push_str(&format!("- status: {}\n", decision.status));
        if let Some(candidate_id) = &decision.selected_repro_candidate_id {
            final_md.push_str(&format!("- selected reproducer: {candidate_id}\n"));
        }
        final_md.push_str("\n## Rationale\n\n");
        final_md.push_str(&decision.rationale);
        final_md.push('\n');
        final_md.push_str("\n## Top hypotheses\n\n");
        if decision.top_hypotheses.is_empty() {
            final_md.push_str("1. none\n");
        } else {
            for (idx, hypothesis) in decision.top_hypotheses.iter().enumerate() {
                final_md.push_str(&format!("{}. {hypothesis}\n", idx + 1));
            }
        }
        if !decision.next_fix_targets.is_empty() {
            final_md.push_str("\n## Suggested next fix targets\n\n");
            for target in &decision.next_fix_targets {
                final_md.push_str(&format!("- {target}\n"));
            }
        }
        if !decision.diagnostics.is_empty() {
            final_md.push_str("\n## Diagnostics\n\n");
            for diagnostic in &decision.diagnostics {
                final_md.push_str(&format!("- {diagnostic}\n"));
            }
        }
        std::fs::write(&self.artifacts.paths.final_md, final_md)?;

        let run_done = serde_json::json!({
            "run_id": self.config.run_id,
            "status": decision.status,
            "decision_json": self.artifacts.paths.decision_json.display().to_string(),
            "final_md": self.artifacts.paths.final_md.display().to_string(),
            "completed_at": now_utc_iso(),
        });
        write_json_file(&self.artifacts.paths.run_done_json, &run_done)?;

        Ok(decision)
    }

    fn finalize_with_metrics(&self, decision: RunDecision) -> CoordResult<RunDecision> {
        let metrics = self.run_metrics();
        self.finalize(decision, serde_json::json!({ "metrics": metrics }))
    }

    fn run_metrics(&self) -> RunMetrics {
        RunMetrics::build(
            &self.config.worker_model,
            &self.config.manager_model,
            &self.timers,
            &self.artifacts.paths.run_dir.join("telemetry"),
        )
    }

    /// Run the full two-phase orchestration: preflight, issue normalization,
    /// repro-builder escalation, minimization, then triager escalation.
    /// Every exit path writes a complete `decision.json`/`final.md`/
    /// `run_done.json` triple — the artifact contract holds even on the
    /// earliest failure.
    pub async fn run(&mut self) -> CoordResult<RunDecision> {
        self.artifacts.initialize_contract()?;
        self.timers.start("total");

        self.timers.start("preflight");
        let preflight = run_preflight(&self.runner, &self.config.repo_path).await?;
        self.timers.finish("preflight");
        write_json_file(
            &self.artifacts.paths.decision_json,
            &serde_json::json!({"preflight": preflight.checks, "diagnostics": Vec::<String>::new()}),
        )?;
        if !preflight.passed() {
            let diagnostics = preflight
                .checks
                .iter()
                .filter(|check| !check.passed)
                .map(|check| format!("{}: {}", check.name, check.details))
                .collect();
            let decision = RunDecision {
                status: "needs-human".to_string(),
                selected_repro_candidate_id: None,
                rationale: "preflight failed".to_string(),
                top_hypotheses: vec![],
                next_fix_targets: vec![],
                diagnostics,
                created_at: now_utc_iso(),
            };
            self.timers.finish("total");
            return self.finalize_with_metrics(decision);
        }

        self.timers.start("issue");
        let issue_result: CoordResult<IssueSpec> = async {
            let payload = fetch_issue_json(&self.config.issue_url).await?;
            normalize_issue_spec(&self.config.issue_url, &payload)
        }
        .await;
        let issue_spec = match issue_result {
            Ok(spec) => spec,
            Err(err) => {
                self.timers.finish("issue");
                let decision = RunDecision {
                    status: "needs-human".to_string(),
                    selected_repro_candidate_id: None,
                    rationale: "issue parsing failed".to_string(),
                    top_hypotheses: vec![],
                    next_fix_targets: vec![],
                    diagnostics: vec![err.to_string()],
                    created_at: now_utc_iso(),
                };
                self.timers.finish("total");
                return self.finalize_with_metrics(decision);
            }
        };
        write_issue_spec(&issue_spec, &self.artifacts.paths.issue_json)?;
        self.timers.finish("issue");

        if issue_spec.status != "ok" {
            let reason = issue_spec
                .needs_human_reason
                .clone()
                .unwrap_or_else(|| "issue lacks strong machine-testable failure signals".to_string());
            let decision = RunDecision {
                status: "needs-human".to_string(),
                selected_repro_candidate_id: None,
                rationale: "issue lacks strong machine-testable failure signals".to_string(),
                top_hypotheses: vec![],
                next_fix_targets: vec![],
                diagnostics: vec![reason],
                created_at: now_utc_iso(),
            };
            self.timers.finish("total");
            return self.finalize_with_metrics(decision);
        }

        self.timers.start("repro");
        let mut best: Option<ReproCandidate> = None;
        let mut last_repro_sessions: BTreeMap<String, WorkerMetadata> = BTreeMap::new();
        let mut diagnostics: Vec<String> = Vec::new();
        for count in self.worker_count_sequence() {
            let (mut worker_sessions, output_paths) =
                self.launch_workers(WorkerRole::ReproBuilder, count, &issue_spec, None).await?;
            self.write_sessions(&worker_sessions)?;
            self.wait_for_workers(&mut worker_sessions).await?;
            self.write_sessions(&worker_sessions)?;

            let candidates = self.validate_candidates(&issue_spec, &output_paths, &mut diagnostics).await?;
            last_repro_sessions = worker_sessions;
            if let Some(candidate) = choose_best_candidate(&candidates, &issue_spec) {
                best = Some(candidate);
                break;
            }
        }
        self.timers.finish("repro");

        let Some(best) = best else {
            self.cleanup_worktrees(&last_repro_sessions).await?;
            let decision = RunDecision {
                status: "needs-human".to_string(),
                selected_repro_candidate_id: None,
                rationale: "no deterministic reproducer met the acceptance gate (>=4/5 runs)".to_string(),
                top_hypotheses: vec![],
                next_fix_targets: vec![],
                diagnostics,
                created_at: now_utc_iso(),
            };
            self.timers.finish("total");
            return self.finalize_with_metrics(decision);
        };

        self.timers.start("minimize");
        let python_executable = self.python_executable();
        let semantic_output_path = self.artifacts.paths.repro_dir.join("semantic_reduce_output.txt");
        let minimal_output_path = self.artifacts.minimal_repro_path(&best.file_extension);
        let minimize_telemetry_path = self.artifacts.paths.run_dir.join("telemetry").join("manager-minimize.jsonl");
        let minimize_result = minimize_candidate(
            &best,
            &issue_spec,
            &self.config.repo_path,
            &self.runner,
            &semantic_output_path,
            &minimal_output_path,
            MinimizeParams {
                min_matches: self.config.repro_min_matches,
                python_executable: Some(&python_executable),
                model: &self.config.manager_model,
                telemetry_jsonl_path: Some(&minimize_telemetry_path),
                timeout_sec: self.config.timeout_sec.min(60),
            },
        )
        .await;
        let minimized = match minimize_result {
            Ok(candidate) if candidate.validation.as_ref().is_some_and(|v| v.passed) => candidate,
            _ => {
                std::fs::write(&minimal_output_path, &best.script)?;
                best.clone()
            }
        };
        self.timers.finish("minimize");
        self.artifacts
            .write_json(&self.artifacts.paths.repro_dir.join("selected_candidate.json"), &minimized)?;

        self.timers.start("triage");
        let mut ranked: Vec<TriageHypothesis> = Vec::new();
        let mut last_triage_sessions: BTreeMap<String, WorkerMetadata> = BTreeMap::new();
        for count in self.worker_count_sequence() {
            let (mut worker_sessions, output_paths) = self
                .launch_workers(WorkerRole::Triager, count, &issue_spec, Some(&minimized.script))
                .await?;
            self.write_sessions(&worker_sessions)?;
            self.wait_for_workers(&mut worker_sessions).await?;
            self.write_sessions(&worker_sessions)?;

            let mut hypotheses = Vec::new();
            for (worker_id, output_path) in &output_paths {
                hypotheses.extend(parse_triage_output(worker_id, output_path)?);
            }
            let round_ranked = rank_hypotheses(&self.config.repo_path, &hypotheses, &minimized.script);
            let disagreement_high = triage_disagreement_high(&round_ranked);
            last_triage_sessions = worker_sessions;
            let at_max = count >= self.config.max_workers;

            ranked = round_ranked;
            if (!ranked.is_empty() && (!disagreement_high || at_max)) || (ranked.is_empty() && at_max) {
                break;
            }
        }
        self.timers.finish("triage");

        let top = top_hypotheses(&ranked, 3);
        write_json_file(
            &self.artifacts.paths.triage_hypotheses_json,
            &serde_json::json!({"hypotheses": ranked, "top": top}),
        )?;
        let next_fix_targets: Vec<String> = top
            .iter()
            .filter_map(|hypothesis| hypothesis.evidence.first().map(|ev| format!("{}:{}", ev.file, ev.line)))
            .collect();

        self.cleanup_worktrees(&last_repro_sessions).await?;
        self.cleanup_worktrees(&last_triage_sessions).await?;

        let decision = RunDecision {
            status: "ok".to_string(),
            selected_repro_candidate_id: Some(minimized.candidate_id.clone()),
            rationale: "selected highest-scoring deterministic reproducer, then merged triage hypotheses with evidence validation".to_string(),
            top_hypotheses: top.iter().map(|h| h.mechanism.clone()).collect(),
            next_fix_targets,
            diagnostics,
            created_at: now_utc_iso(),
        };
        self.timers.finish("total");

        let extra = serde_json::json!({
            "repro": {
                "path": minimal_output_path.display().to_string(),
                "oracle_command": minimized.oracle_command,
                "claimed_failure_signature": minimized.claimed_failure_signature,
                "validation": minimized.validation,
            },
            "metrics": self.run_metrics(),
        });
        self.finalize(decision, extra)
    }
}

/// `true` when the top two ranked hypotheses disagree on mechanism and
/// their scores are close enough that neither clearly wins — signals the
/// triage phase should escalate to more workers rather than settle.
fn triage_disagreement_high(hypotheses: &[TriageHypothesis]) -> bool {
    if hypotheses.is_empty() {
        return false;
    }
    let mechanisms: BTreeSet<String> = hypotheses
        .iter()
        .map(|h| h.mechanism.trim().to_lowercase())
        .filter(|m| !m.is_empty())
        .collect();
    if mechanisms.len() <= 1 {
        return false;
    }
    let top_scores: Vec<f64> = hypotheses.iter().take(2).map(|h| h.score.unwrap_or(0.0)).collect();
    if top_scores.len() < 2 {
        return false;
    }
    (top_scores[0] - top_scores[1]).abs() <= 0.15
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &Path) -> ManagerConfig {
        ManagerConfig {
            run_id: "run-1".to_string(),
            issue_url: "https://github.com/a/b/issues/1".to_string(),
            repo_path: dir.to_path_buf(),
            runs_root: dir.join("runs"),
            min_workers: 2,
            max_workers: 6,
            timeout_sec: 300,
            poll_interval_sec: 5,
            repro_validation_runs: 5,
            repro_min_matches: 3,
            validation_python_version: "3.12".to_string(),
            worker_model: String::new(),
            manager_model: String::new(),
        }
    }

    #[test]
    fn worker_count_sequence_includes_floor_midpoints_and_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let manager = Manager::new(config(dir.path()));
        assert_eq!(manager.worker_count_sequence(), vec![2, 4, 6]);
    }

    #[test]
    fn worker_count_sequence_collapses_when_floor_meets_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.min_workers = 6;
        cfg.max_workers = 6;
        let manager = Manager::new(cfg);
        assert_eq!(manager.worker_count_sequence(), vec![6]);
    }

    fn hypothesis(mechanism: &str, score: f64) -> TriageHypothesis {
        TriageHypothesis {
            hypothesis_id: "h".to_string(),
            mechanism: mechanism.to_string(),
            evidence: vec![],
            confidence: 0.5,
            disconfirming_checks: vec![],
            worker_id: "w1".to_string(),
            score: Some(score),
        }
    }

    #[test]
    fn triage_disagreement_high_false_on_single_mechanism() {
        let hyps = vec![hypothesis("off by one", 0.9), hypothesis("off by one", 0.8)];
        assert!(!triage_disagreement_high(&hyps));
    }

    #[test]
    fn triage_disagreement_high_true_on_close_competing_mechanisms() {
        let hyps = vec![hypothesis("off by one", 0.82), hypothesis("race condition", 0.80)];
        assert!(triage_disagreement_high(&hyps));
    }

    #[test]
    fn triage_disagreement_high_false_on_clear_winner() {
        let hyps = vec![hypothesis("off by one", 0.95), hypothesis("race condition", 0.2)];
        assert!(!triage_disagreement_high(&hyps));
    }

    #[test]
    fn finalize_writes_final_md_with_rationale_and_hypotheses() {
        let dir = tempfile::tempdir().unwrap();
        let manager = Manager::new(config(dir.path()));
        let decision = RunDecision {
            status: "ok".to_string(),
            selected_repro_candidate_id: Some("w1-candidate".to_string()),
            rationale: "picked the cleanest reproducer".to_string(),
            top_hypotheses: vec!["off by one in loop bound".to_string()],
            next_fix_targets: vec!["pkg/mod.py:42".to_string()],
            diagnostics: vec![],
            created_at: now_utc_iso(),
        };
        manager.finalize(decision, serde_json::json!({})).unwrap();

        let rendered = std::fs::read_to_string(&manager.artifacts.paths.final_md).unwrap();
        assert!(rendered.contains("# bug-triage orchestrator run run-1"));
        assert!(rendered.contains("w1-candidate"));
        assert!(rendered.contains("1. off by one in loop bound"));
        assert!(rendered.contains("pkg/mod.py:42"));

        let run_done: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&manager.artifacts.paths.run_done_json).unwrap()).unwrap();
        assert_eq!(run_done["status"], "ok");
    }

    #[test]
    fn finalize_writes_none_placeholder_when_no_hypotheses() {
        let dir = tempfile::tempdir().unwrap();
        let manager = Manager::new(config(dir.path()));
        let decision = RunDecision {
            status: "needs-human".to_string(),
            selected_repro_candidate_id: None,
            rationale: "preflight failed".to_string(),
            top_hypotheses: vec![],
            next_fix_targets: vec![],
            diagnostics: vec!["codex: not found in PATH".to_string()],
            created_at: now_utc_iso(),
        };
        manager.finalize(decision, serde_json::json!({})).unwrap();
        let rendered = std::fs::read_to_string(&manager.artifacts.paths.final_md).unwrap();
        assert!(rendered.contains("1. none"));
        assert!(rendered.contains("## Diagnostics"));
    }

    #[test]
    fn manager_session_name_uses_bugorch_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let manager = Manager::new(config(dir.path()));
        assert_eq!(manager.manager_session_name(), "bugorch-run-1-manager");
    }
}
