//! Worker Prompt & Script Builder — C7.

use std::path::{Path, PathBuf};

use crate::error::CoordResult;
use crate::types::IssueSpec;

pub const ROLE_REPRO_BUILDER: &str = "REPRO_BUILDER";
pub const ROLE_TRIAGER: &str = "TRIAGER";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerRole {
    ReproBuilder,
    Triager,
}

impl WorkerRole {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerRole::ReproBuilder => ROLE_REPRO_BUILDER,
            WorkerRole::Triager => ROLE_TRIAGER,
        }
    }
}

fn issue_spec_json(issue_spec: &IssueSpec) -> String {
    let payload = serde_json::json!({
        "issue_url": issue_spec.issue_url,
        "repo_slug": issue_spec.repo_slug,
        "issue_number": issue_spec.issue_number,
        "title": issue_spec.title,
        "body": issue_spec.body,
        "labels": issue_spec.labels,
        "expected_failure_signals": issue_spec.expected_failure_signals.iter().map(|s| serde_json::json!({
            "exception_type": s.exception_type,
            "message_substring": s.message_substring,
            "exit_code": s.exit_code,
            "raw_pattern": s.raw_pattern,
        })).collect::<Vec<_>>(),
        "constraints": issue_spec.constraints,
        "target_paths": issue_spec.target_paths,
    });
    serde_json::to_string_pretty(&payload).unwrap_or_default()
}

pub fn build_repro_prompt(issue_spec: &IssueSpec, worker_id: &str) -> String {
    format!(
        r#"ROLE: {ROLE_REPRO_BUILDER}
TASK: Build a minimal reproducer candidate for this GitHub issue.
OUTPUT FORMAT: JSON only, no markdown.

Required JSON schema:
{{
  "candidate_id": "{worker_id}-candidate",
  "script": "<full repro script text>",
  "setup_commands": ["<shell command>", "..."],
  "oracle_command": "<shell command; can reference {{repro_file}} placeholder>",
  "claimed_failure_signature": "<short string that must appear when bug reproduces>",
  "file_extension": "py"
}}

Constraints:
- Keep setup_commands minimal and deterministic.
- oracle_command must fail loudly if bug is not reproduced.
- preserve the issue's likely root cause behavior.
- Do not propose codebase edits.

Issue Spec:
{spec}
"#,
        spec = issue_spec_json(issue_spec)
    )
}

pub fn build_triage_prompt(
    issue_spec: &IssueSpec,
    worker_id: &str,
    minimal_repro: &str,
    code_search_hints: &[String],
) -> String {
    let hints = if code_search_hints.is_empty() {
        "- none".to_string()
    } else {
        code_search_hints.iter().map(|h| format!("- {h}")).collect::<Vec<_>>().join("\n")
    };

    format!(
        r#"ROLE: {ROLE_TRIAGER}
TASK: Produce triage hypotheses for the bug. Use repository evidence and minimal repro.
OUTPUT FORMAT: JSON only, no markdown.

Required JSON schema:
{{
  "hypotheses": [
    {{
      "hypothesis_id": "{worker_id}-h1",
      "mechanism": "<what fails and why>",
      "evidence": [{{"file": "path", "line": 123, "snippet": "code"}}],
      "confidence": 0.0,
      "disconfirming_checks": ["<check>"]
    }}
  ]
}}

Rules:
- confidence must be within [0, 1].
- include at least one evidence row per hypothesis.
- list concrete disconfirming checks.
- no fixes in this phase.

Code search hints:
{hints}

Minimal repro script:
```text
{minimal_repro}
```

Issue Spec:
{spec}
"#,
        spec = issue_spec_json(issue_spec)
    )
}

/// Writes `prompt` alongside `script_path`, then writes a launcher shell
/// script at `script_path` that `cd`s into the worktree and invokes the
/// agent CLI, optionally redirecting `--json` telemetry to a sibling file.
pub fn build_agent_exec_script(
    prompt: &str,
    output_path: &Path,
    script_path: &Path,
    worktree_path: &Path,
    model: &str,
    telemetry_path: Option<&Path>,
) -> CoordResult<()> {
    let prompt_path = script_path.with_extension("prompt.txt");
    std::fs::write(&prompt_path, prompt)?;

    let model_arg = if model.trim().is_empty() {
        String::new()
    } else {
        format!("-m {} ", shell_quote(model.trim()))
    };

    let (telemetry_assign, telemetry_sink) = match telemetry_path {
        Some(path) => (
            format!("TELEMETRY_FILE={}\n", path.display()),
            "--json > \"$TELEMETRY_FILE\"".to_string(),
        ),
        None => (String::new(), String::new()),
    };

    let script = format!(
        "#!/bin/sh\nset -eu\nPROMPT_FILE={prompt}\nOUTPUT_FILE={output}\n{telemetry_assign}\ncd {worktree}\ncodex exec \"$(cat \"$PROMPT_FILE\")\" {model_arg}-s read-only --skip-git-repo-check -C {worktree} -o \"$OUTPUT_FILE\" {telemetry_sink}\n",
        prompt = prompt_path.display(),
        output = output_path.display(),
        worktree = worktree_path.display(),
    );
    std::fs::write(script_path, script)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(script_path)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(script_path, perms)?;
    }

    Ok(())
}

fn shell_quote(value: &str) -> String {
    if value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.') {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "'\\''"))
    }
}

/// Script and prompt paths produced for a single worker invocation.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub role: WorkerRole,
    pub prompt: String,
    pub output_path: PathBuf,
    pub session_script: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IssueSpec;

    #[test]
    fn build_repro_prompt_embeds_role_and_worker_id() {
        let spec = IssueSpec {
            issue_url: "https://github.com/a/b/issues/1".to_string(),
            repo_slug: "a/b".to_string(),
            issue_number: 1,
            title: "t".to_string(),
            body: "b".to_string(),
            ..Default::default()
        };
        let prompt = build_repro_prompt(&spec, "w1");
        assert!(prompt.contains("ROLE: REPRO_BUILDER"));
        assert!(prompt.contains("w1-candidate"));
    }

    #[test]
    fn build_agent_exec_script_is_executable_and_cds_into_worktree() {
        let dir = tempfile::tempdir().unwrap();
        let script_path = dir.path().join("w1.sh");
        build_agent_exec_script(
            "hello",
            &dir.path().join("out.json"),
            &script_path,
            &dir.path().join("wt"),
            "",
            None,
        )
        .unwrap();
        let contents = std::fs::read_to_string(&script_path).unwrap();
        assert!(contents.contains("cd "));
        assert!(contents.starts_with("#!/bin/sh"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&script_path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }
}
