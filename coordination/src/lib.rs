//! Coordination library for the bug-triage orchestrator.
//!
//! Implements issue normalization, preflight checks, worktree and session
//! management, reproducer validation/minimization and triage ranking — the
//! parts of the system that are pure enough, or subprocess-wrapping enough,
//! to live independently of the binary's CLI and top-level run loop.

#![allow(dead_code)]

pub mod artifacts;
pub mod command;
pub mod error;
pub mod issue;
pub mod json_extract;
pub mod preflight;
pub mod repro;
pub mod sessions;
pub mod supervision;
pub mod tmux;
pub mod triage;
pub mod types;
pub mod worktree;
pub mod workers;

pub use artifacts::{ArtifactPaths, ArtifactStore, SessionsFile};
pub use command::{command_error, CommandOutput, CommandRunner};
pub use error::{CoordError, CoordResult};
pub use preflight::{run_preflight, PreflightCheck, PreflightResult};
pub use repro::{choose_best_candidate, minimize_candidate, parse_repro_candidate, score_candidate, semantic_reduce_script, validate_candidate, MinimizeParams, ValidateParams};
pub use supervision::{SupervisionLoop, WorkerWatch};
pub use tmux::{SessionInfo, SessionSupervisor};
pub use triage::{parse_triage_output, rank_hypotheses, top_hypotheses};
pub use types::{
    now_utc_iso, FailureSignal, IssueSpec, ReproCandidate, RunDecision, TriageEvidence,
    TriageHypothesis, ValidationResult, WorkerMetadata, WorkerTask,
};
pub use worktree::{WorktreeInfo, WorktreeManager};
pub use workers::{build_agent_exec_script, build_repro_prompt, build_triage_prompt, WorkerCommand, WorkerRole};
