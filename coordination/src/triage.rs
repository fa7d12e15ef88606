//! Triage Ranker — C10.

use std::collections::HashSet;
use std::path::Path;

use crate::error::CoordResult;
use crate::json_extract::extract_json_payload;
use crate::types::{TriageEvidence, TriageHypothesis};

pub fn parse_triage_output(worker_id: &str, output_path: &Path) -> CoordResult<Vec<TriageHypothesis>> {
    if !output_path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(output_path)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    let payload = extract_json_payload(raw)?;
    let empty = Vec::new();
    let hypotheses_payload = payload.get("hypotheses").and_then(|v| v.as_array()).unwrap_or(&empty);

    let mut hypotheses = Vec::new();
    for (idx, item) in hypotheses_payload.iter().enumerate() {
        let idx = idx + 1;
        let evidence: Vec<TriageEvidence> = item
            .get("evidence")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|ev| {
                        let ev = ev.as_object()?;
                        Some(TriageEvidence {
                            file: ev.get("file").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                            line: ev.get("line").and_then(|v| v.as_i64()).unwrap_or(0),
                            snippet: ev.get("snippet").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let hypothesis_id = item
            .get("hypothesis_id")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{worker_id}-h{idx}"));

        let confidence = item
            .get("confidence")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);

        let disconfirming_checks = item
            .get("disconfirming_checks")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        hypotheses.push(TriageHypothesis {
            hypothesis_id,
            mechanism: item.get("mechanism").and_then(|v| v.as_str()).unwrap_or_default().trim().to_string(),
            evidence,
            confidence,
            disconfirming_checks,
            worker_id: worker_id.to_string(),
            score: None,
        });
    }
    Ok(hypotheses)
}

fn evidence_valid(repo_path: &Path, evidence: &TriageEvidence) -> bool {
    if evidence.file.is_empty() || evidence.line <= 0 {
        return false;
    }
    let path = repo_path.join(&evidence.file);
    let Ok(contents) = std::fs::read_to_string(&path) else {
        return false;
    };
    let lines: Vec<&str> = contents.lines().collect();
    let Ok(line_idx) = usize::try_from(evidence.line - 1) else {
        return false;
    };
    let Some(line_text) = lines.get(line_idx) else {
        return false;
    };
    if !evidence.snippet.is_empty() && !line_text.contains(&evidence.snippet) {
        return false;
    }
    true
}

fn agreement_weight(mechanism: &str, all_hypotheses: &[TriageHypothesis]) -> f64 {
    let normalized = mechanism.trim().to_lowercase();
    if normalized.is_empty() {
        return 0.0;
    }
    let matches = all_hypotheses
        .iter()
        .filter(|h| h.mechanism.trim().to_lowercase() == normalized)
        .count();
    let worker_count = all_hypotheses
        .iter()
        .map(|h| h.worker_id.as_str())
        .collect::<HashSet<_>>()
        .len()
        .max(1);
    (matches as f64 / worker_count as f64).min(1.0)
}

fn replay_consistency(mechanism: &str, repro_text: &str) -> f64 {
    if mechanism.trim().is_empty() || repro_text.trim().is_empty() {
        return 0.0;
    }
    let words: HashSet<String> = mechanism
        .split_whitespace()
        .filter(|w| w.len() >= 4)
        .map(str::to_lowercase)
        .collect();
    if words.is_empty() {
        return 0.0;
    }
    let repro_lower = repro_text.to_lowercase();
    let overlaps = words.iter().filter(|w| repro_lower.contains(w.as_str())).count();
    (overlaps as f64 / words.len().max(1) as f64).min(1.0)
}

fn round5(value: f64) -> f64 {
    (value * 100_000.0).round() / 100_000.0
}

/// Filter hypotheses to those with at least one evidence-checked claim, then
/// score by evidence count, cross-worker agreement, replay-text overlap and
/// self-reported confidence.
pub fn rank_hypotheses(repo_path: &Path, hypotheses: &[TriageHypothesis], repro_text: &str) -> Vec<TriageHypothesis> {
    let mut filtered: Vec<TriageHypothesis> = Vec::new();
    for hypothesis in hypotheses {
        if hypothesis.mechanism.is_empty() || hypothesis.evidence.is_empty() {
            continue;
        }
        let valid_evidence: Vec<TriageEvidence> = hypothesis
            .evidence
            .iter()
            .filter(|ev| evidence_valid(repo_path, ev))
            .cloned()
            .collect();
        if valid_evidence.is_empty() {
            continue;
        }
        let mut h = hypothesis.clone();
        h.evidence = valid_evidence;
        filtered.push(h);
    }

    let mut ranked: Vec<TriageHypothesis> = filtered
        .iter()
        .map(|hypothesis| {
            let evidence_score = (hypothesis.evidence.len() as f64 / 3.0).min(1.0);
            let agreement_score = agreement_weight(&hypothesis.mechanism, &filtered);
            let replay_score = replay_consistency(&hypothesis.mechanism, repro_text);
            let confidence_score = hypothesis.confidence;
            let score = round5(0.4 * evidence_score + 0.25 * agreement_score + 0.2 * replay_score + 0.15 * confidence_score);
            let mut h = hypothesis.clone();
            h.score = Some(score);
            h
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .unwrap_or(0.0)
            .partial_cmp(&a.score.unwrap_or(0.0))
            .unwrap()
            .then_with(|| b.confidence.partial_cmp(&a.confidence).unwrap())
            .then_with(|| a.hypothesis_id.cmp(&b.hypothesis_id))
    });

    ranked
}

pub fn top_hypotheses(ranked: &[TriageHypothesis], limit: usize) -> Vec<TriageHypothesis> {
    ranked.iter().take(limit).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hyp(id: &str, mechanism: &str, confidence: f64, worker: &str, evidence: Vec<TriageEvidence>) -> TriageHypothesis {
        TriageHypothesis {
            hypothesis_id: id.to_string(),
            mechanism: mechanism.to_string(),
            evidence,
            confidence,
            disconfirming_checks: vec![],
            worker_id: worker.to_string(),
            score: None,
        }
    }

    #[test]
    fn rank_hypotheses_drops_hypotheses_without_valid_evidence() {
        let dir = tempfile::tempdir().unwrap();
        let h = hyp(
            "w1-h1",
            "off-by-one in loop bound",
            0.8,
            "w1",
            vec![TriageEvidence {
                file: "missing.py".to_string(),
                line: 1,
                snippet: String::new(),
            }],
        );
        let ranked = rank_hypotheses(dir.path(), &[h], "repro text");
        assert!(ranked.is_empty());
    }

    #[test]
    fn rank_hypotheses_scores_and_sorts_by_evidence_and_agreement() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mod.py"), "def f():\n    return 1\n").unwrap();

        let evidence = vec![TriageEvidence {
            file: "mod.py".to_string(),
            line: 2,
            snippet: "return 1".to_string(),
        }];
        let h1 = hyp("w1-h1", "off by one", 0.9, "w1", evidence.clone());
        let h2 = hyp("w2-h1", "off by one", 0.5, "w2", evidence);
        let ranked = rank_hypotheses(dir.path(), &[h1, h2], "repro uses off by one logic");
        assert_eq!(ranked.len(), 2);
        assert!(ranked[0].score.unwrap() >= ranked[1].score.unwrap());
    }

    #[test]
    fn top_hypotheses_limits_results() {
        let ranked = vec![
            hyp("a", "m", 0.1, "w1", vec![]),
            hyp("b", "m", 0.1, "w1", vec![]),
            hyp("c", "m", 0.1, "w1", vec![]),
        ];
        assert_eq!(top_hypotheses(&ranked, 2).len(), 2);
    }
}
