//! Delta-debugging minimization of an accepted reproducer.

use std::path::Path;

use crate::command::CommandRunner;
use crate::error::CoordResult;
use crate::types::{IssueSpec, ReproCandidate};

use super::validate::{validate_candidate, ValidateParams};

fn extract_code_block(text: &str) -> String {
    let stripped = text.trim();
    if !stripped.contains("```") {
        return stripped.to_string();
    }

    for chunk in stripped.split("```") {
        let chunk = chunk.trim();
        if chunk.is_empty() {
            continue;
        }
        if let Some((first_line, rest)) = chunk.split_once('\n') {
            if first_line.chars().all(|c| c.is_ascii_alphabetic())
                || matches!(first_line, "python" | "py" | "text")
            {
                return rest.trim().to_string();
            }
        }
        return chunk.to_string();
    }
    stripped.to_string()
}

pub async fn semantic_reduce_script(
    script: &str,
    issue_spec: &IssueSpec,
    command_runner: &CommandRunner,
    repo_path: &Path,
    output_path: &Path,
    model: &str,
    telemetry_jsonl_path: Option<&Path>,
) -> CoordResult<String> {
    let expected_signals: Vec<String> = issue_spec
        .expected_failure_signals
        .iter()
        .map(|s| s.exception_type.clone().or_else(|| s.message_substring.clone()).unwrap_or_default())
        .collect();

    let prompt = format!(
        "You are minimizing a bug reproducer. Return only code.\nGoal: preserve the same failure signature and root-cause shape while removing noise.\nIssue: {}\nExpected signals: {:?}\nCode:\n```python\n{}\n```\n",
        issue_spec.title, expected_signals, script
    );

    let mut args = vec!["codex".to_string(), "exec".to_string(), prompt];
    if !model.trim().is_empty() {
        args.push("-m".to_string());
        args.push(model.trim().to_string());
    }
    args.extend([
        "-s".to_string(),
        "read-only".to_string(),
        "--skip-git-repo-check".to_string(),
        "-C".to_string(),
        repo_path.display().to_string(),
        "-o".to_string(),
        output_path.display().to_string(),
        "--json".to_string(),
    ]);

    let result = command_runner.run(&args, repo_path, Some(120)).await?;
    if let Some(telemetry_path) = telemetry_jsonl_path {
        if let Some(parent) = telemetry_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(telemetry_path, &result.stdout)?;
    }

    if !result.success() || !output_path.exists() {
        return Ok(script.to_string());
    }

    Ok(extract_code_block(&std::fs::read_to_string(output_path)?))
}

/// Delta-debugging (ddmin) over lines of a script: repeatedly try removing
/// 1/n chunks, shrinking n back on a successful reduction and growing it
/// when nothing shrinks, until n exceeds the remaining line count.
pub fn ddmin<F>(lines: &[String], mut oracle: F) -> Vec<String>
where
    F: FnMut(&[String]) -> bool,
{
    if lines.is_empty() {
        return lines.to_vec();
    }

    let mut n: usize = 2;
    let mut current = lines.to_vec();

    while current.len() >= 2 {
        let chunk_size = current.len() / n;
        if chunk_size == 0 {
            break;
        }

        let mut found_reduction = false;
        for i in 0..n {
            let start = i * chunk_size;
            let end = if i == n - 1 { current.len() } else { (i + 1) * chunk_size };
            let mut trial = Vec::with_capacity(current.len() - (end - start));
            trial.extend_from_slice(&current[..start]);
            trial.extend_from_slice(&current[end..]);
            if !trial.is_empty() && oracle(&trial) {
                current = trial;
                n = n.saturating_sub(1).max(2);
                found_reduction = true;
                break;
            }
        }

        if !found_reduction {
            if n >= current.len() {
                break;
            }
            n = (n * 2).min(current.len());
        }
    }

    current
}

/// Same reduction schedule as [`ddmin`], but drives an async oracle so the
/// per-trial reproducer validation can run real subprocesses without
/// blocking the executor.
async fn ddmin_async<F, Fut>(lines: &[String], mut oracle: F) -> Vec<String>
where
    F: FnMut(Vec<String>) -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    if lines.is_empty() {
        return lines.to_vec();
    }

    let mut n: usize = 2;
    let mut current = lines.to_vec();

    while current.len() >= 2 {
        let chunk_size = current.len() / n;
        if chunk_size == 0 {
            break;
        }

        let mut found_reduction = false;
        for i in 0..n {
            let start = i * chunk_size;
            let end = if i == n - 1 { current.len() } else { (i + 1) * chunk_size };
            let mut trial = Vec::with_capacity(current.len() - (end - start));
            trial.extend_from_slice(&current[..start]);
            trial.extend_from_slice(&current[end..]);
            if !trial.is_empty() && oracle(trial.clone()).await {
                current = trial;
                n = n.saturating_sub(1).max(2);
                found_reduction = true;
                break;
            }
        }

        if !found_reduction {
            if n >= current.len() {
                break;
            }
            n = (n * 2).min(current.len());
        }
    }

    current
}

pub struct MinimizeParams<'a> {
    pub min_matches: u32,
    pub python_executable: Option<&'a str>,
    pub model: &'a str,
    pub telemetry_jsonl_path: Option<&'a Path>,
    pub timeout_sec: u64,
}

impl Default for MinimizeParams<'_> {
    fn default() -> Self {
        Self {
            min_matches: 3,
            python_executable: None,
            model: "",
            telemetry_jsonl_path: None,
            timeout_sec: 30,
        }
    }
}

pub async fn minimize_candidate(
    candidate: &ReproCandidate,
    issue_spec: &IssueSpec,
    repo_path: &Path,
    command_runner: &CommandRunner,
    semantic_output_path: &Path,
    minimal_output_path: &Path,
    params: MinimizeParams<'_>,
) -> CoordResult<ReproCandidate> {
    let semantic_script = semantic_reduce_script(
        &candidate.script,
        issue_spec,
        command_runner,
        repo_path,
        semantic_output_path,
        params.model,
        params.telemetry_jsonl_path,
    )
    .await?;

    let base_script = if semantic_script.trim().is_empty() {
        candidate.script.clone()
    } else {
        semantic_script
    };
    let base_lines: Vec<String> = base_script.lines().map(str::to_string).collect();

    let minimized_lines = ddmin_async(&base_lines, |lines: Vec<String>| async move {
        let script = lines.join("\n").trim().to_string() + "\n";
        let mut probe = candidate.clone();
        probe.script = script;
        validate_candidate(
            &probe,
            issue_spec,
            repo_path,
            minimal_output_path,
            command_runner,
            ValidateParams {
                runs: 5,
                min_matches: params.min_matches,
                python_executable: params.python_executable,
                timeout_sec: params.timeout_sec,
            },
        )
        .await
        .map(|v| v.passed)
        .unwrap_or(false)
    })
    .await;

    let minimized_script = minimized_lines.join("\n").trim().to_string() + "\n";

    let mut minimized_candidate = candidate.clone();
    minimized_candidate.script = minimized_script;
    let validated = validate_candidate(
        &minimized_candidate,
        issue_spec,
        repo_path,
        minimal_output_path,
        command_runner,
        ValidateParams {
            runs: 5,
            min_matches: params.min_matches,
            python_executable: params.python_executable,
            timeout_sec: params.timeout_sec,
        },
    )
    .await?;
    minimized_candidate.validation = Some(validated);

    Ok(minimized_candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ddmin_removes_lines_that_oracle_does_not_need() {
        let lines: Vec<String> = (0..8).map(|i| format!("line{i}")).collect();
        let needed = "line3".to_string();
        let reduced = ddmin(&lines, |trial| trial.iter().any(|l| l == &needed));
        assert!(reduced.contains(&needed));
        assert!(reduced.len() < lines.len());
    }

    #[test]
    fn ddmin_returns_empty_for_empty_input() {
        let reduced: Vec<String> = ddmin(&[], |_| true);
        assert!(reduced.is_empty());
    }

    #[test]
    fn ddmin_keeps_everything_when_oracle_always_fails() {
        let lines: Vec<String> = (0..4).map(|i| format!("line{i}")).collect();
        let reduced = ddmin(&lines, |_| false);
        assert_eq!(reduced, lines);
    }

    #[test]
    fn extract_code_block_strips_fence_and_language_tag() {
        let text = "```python\nprint(1)\n```";
        assert_eq!(extract_code_block(text), "print(1)");
    }

    #[test]
    fn extract_code_block_passes_through_plain_text() {
        assert_eq!(extract_code_block("print(1)"), "print(1)");
    }

    proptest::proptest! {
        #[test]
        fn ddmin_result_always_keeps_the_line_the_oracle_requires(
            total in 2usize..40,
            needed_idx in 0usize..40,
        ) {
            let needed_idx = needed_idx % total;
            let lines: Vec<String> = (0..total).map(|i| format!("line{i}")).collect();
            let needed = lines[needed_idx].clone();
            let reduced = ddmin(&lines, |trial| trial.iter().any(|l| l == &needed));
            proptest::prop_assert!(reduced.contains(&needed));
            proptest::prop_assert!(reduced.len() <= lines.len());
        }

        #[test]
        fn ddmin_never_grows_the_input(total in 0usize..40) {
            let lines: Vec<String> = (0..total).map(|i| format!("line{i}")).collect();
            let reduced = ddmin(&lines, |trial| trial.len() * 2 >= lines.len());
            proptest::prop_assert!(reduced.len() <= lines.len());
        }
    }
}
