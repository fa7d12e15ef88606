//! Reproducer Validator & Minimizer — C9.

mod ddmin;
mod validate;

pub use ddmin::{minimize_candidate, semantic_reduce_script, MinimizeParams};
pub use validate::{choose_best_candidate, score_candidate, validate_candidate, ValidateParams};

use std::path::Path;

use crate::error::CoordResult;
use crate::json_extract::extract_json_payload;
use crate::types::ReproCandidate;

pub fn parse_repro_candidate(worker_id: &str, output_path: &Path) -> CoordResult<Option<ReproCandidate>> {
    if !output_path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(output_path)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let data = extract_json_payload(raw)?;
    let candidate_id = data
        .get("candidate_id")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{worker_id}-candidate"));

    let script = data
        .get("script")
        .and_then(|v| v.as_str())
        .ok_or(crate::error::CoordError::JsonPayloadNotFound)?
        .to_string();
    let oracle_command = data
        .get("oracle_command")
        .and_then(|v| v.as_str())
        .ok_or(crate::error::CoordError::JsonPayloadNotFound)?
        .to_string();
    let claimed_failure_signature = data
        .get("claimed_failure_signature")
        .and_then(|v| v.as_str())
        .ok_or(crate::error::CoordError::JsonPayloadNotFound)?
        .to_string();

    let setup_commands = data
        .get("setup_commands")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    let file_extension = data
        .get("file_extension")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("py")
        .to_string();

    Ok(Some(ReproCandidate {
        candidate_id,
        worker_id: worker_id.to_string(),
        script,
        setup_commands,
        oracle_command,
        claimed_failure_signature,
        file_extension,
        validation: None,
        score: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_repro_candidate_returns_none_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = parse_repro_candidate("w1", &dir.path().join("missing.json")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn parse_repro_candidate_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w1.json");
        std::fs::write(
            &path,
            r#"{"script": "print(1)", "oracle_command": "python {repro_file}", "claimed_failure_signature": "ValueError"}"#,
        )
        .unwrap();
        let candidate = parse_repro_candidate("w1", &path).unwrap().unwrap();
        assert_eq!(candidate.candidate_id, "w1-candidate");
        assert_eq!(candidate.file_extension, "py");
    }
}
