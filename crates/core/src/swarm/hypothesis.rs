//! # Hypotheses
//!
//! User-posed claims checked against the insight store, either by the model
//! or by a keyword heuristic when the model is unavailable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::reply::parse_json_reply;

/// Heuristic verdicts never claim more certainty than this
pub const HEURISTIC_MAX_CONFIDENCE: f64 = 0.4;
const HEURISTIC_EVIDENCE_LIMIT: usize = 5;

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "will", "would", "should",
    "can", "could", "may", "might", "of", "to", "in", "on", "for", "and", "or", "that",
    "this", "these", "those", "it", "its", "with", "by", "as", "at", "from", "has", "have",
    "had", "do", "does", "did", "our", "we", "they", "there", "their", "i", "you",
];

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "none", "without", "lack", "lacks", "lacking", "fail", "failed",
    "fails", "decline", "declined", "declining", "decrease", "decreased", "decreasing",
    "fell", "fall", "falling", "drop", "dropped", "shrink", "shrank", "shrinking", "down",
    "unlikely", "contrary", "isn't", "aren't", "won't", "didn't", "doesn't",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HypothesisStatus {
    Supported,
    Refuted,
    Inconclusive,
}

impl HypothesisStatus {
    /// Unknown labels coerce to inconclusive
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "supported" => HypothesisStatus::Supported,
            "refuted" => HypothesisStatus::Refuted,
            _ => HypothesisStatus::Inconclusive,
        }
    }
}

/// Result of one evaluation, applied to a hypothesis as a unit
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub status: HypothesisStatus,
    pub reasoning: String,
    pub evidence: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Hypothesis {
    pub id: String,
    pub text: String,
    pub status: HypothesisStatus,
    pub reasoning: String,
    pub evidence: Vec<String>,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_evaluated_at: Option<DateTime<Utc>>,
}

impl Hypothesis {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            status: HypothesisStatus::Inconclusive,
            reasoning: String::new(),
            evidence: Vec::new(),
            confidence: 0.0,
            created_at: Utc::now(),
            last_evaluated_at: None,
        }
    }

    /// Overwrite every evaluated field at once
    pub fn apply(&mut self, evaluation: Evaluation) {
        self.status = evaluation.status;
        self.reasoning = evaluation.reasoning;
        self.evidence = evaluation.evidence;
        self.confidence = evaluation.confidence;
        self.last_evaluated_at = Some(Utc::now());
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// First token that is not a stopword and longer than one character
fn key_term(hypothesis: &str) -> Option<String> {
    tokens(hypothesis)
        .into_iter()
        .find(|t| t.chars().count() > 1 && !STOPWORDS.contains(&t.as_str()))
}

fn heuristic_confidence(matches: usize) -> f64 {
    (0.2 + 0.05 * matches as f64).min(HEURISTIC_MAX_CONFIDENCE)
}

/// Keyword heuristic: insights mentioning the key term without negation
/// support the claim; insights carrying negation terms count against it.
pub fn heuristic_evaluate(hypothesis: &str, insights: &[String]) -> Evaluation {
    let Some(key) = key_term(hypothesis) else {
        return Evaluation {
            status: HypothesisStatus::Inconclusive,
            reasoning: "The hypothesis has no significant terms to match.".to_string(),
            evidence: Vec::new(),
            confidence: 0.0,
        };
    };

    if insights.is_empty() {
        return Evaluation {
            status: HypothesisStatus::Inconclusive,
            reasoning: "No insights have been reported yet.".to_string(),
            evidence: Vec::new(),
            confidence: 0.0,
        };
    }

    let mut supporting = Vec::new();
    let mut refuting = Vec::new();
    for insight in insights {
        let words = tokens(insight);
        let negated = words.iter().any(|w| NEGATIONS.contains(&w.as_str()));
        let mentions = words.iter().any(|w| w.starts_with(key.as_str()));
        if negated {
            refuting.push(insight.clone());
        } else if mentions {
            supporting.push(insight.clone());
        }
    }

    let reasoning = format!(
        "Keyword check on '{}': {} insight(s) mention it without negation, {} carry negation terms.",
        key,
        supporting.len(),
        refuting.len()
    );

    let (status, mut evidence, confidence) = if supporting.len() > refuting.len() {
        let n = supporting.len();
        (HypothesisStatus::Supported, supporting, heuristic_confidence(n))
    } else if refuting.len() > supporting.len() {
        let n = refuting.len();
        (HypothesisStatus::Refuted, refuting, heuristic_confidence(n))
    } else {
        let mixed: Vec<String> = supporting.into_iter().chain(refuting).collect();
        let confidence = if mixed.is_empty() { 0.0 } else { 0.1 };
        (HypothesisStatus::Inconclusive, mixed, confidence)
    };
    evidence.truncate(HEURISTIC_EVIDENCE_LIMIT);

    Evaluation {
        status,
        reasoning,
        evidence,
        confidence,
    }
}

/// Read the model's JSON verdict; `None` when the reply is not an object
pub fn parse_evaluation(text: &str) -> Option<Evaluation> {
    let value: Value = parse_json_reply(text)?;
    let object = value.as_object()?;

    let status = object
        .get("status")
        .and_then(Value::as_str)
        .map(HypothesisStatus::parse)
        .unwrap_or(HypothesisStatus::Inconclusive);
    let reasoning = object
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let evidence = object
        .get("evidence")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    let confidence = object
        .get("confidence")
        .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
        .filter(|c: &f64| c.is_finite())
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);

    Some(Evaluation {
        status,
        reasoning,
        evidence,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_negations_without_support_refute() {
        let eval = heuristic_evaluate(
            "Revenue will grow next year",
            &texts(&["Revenue fell 5% in Q3", "Sales declined in every region"]),
        );
        assert_eq!(eval.status, HypothesisStatus::Refuted);
        assert!(eval.confidence <= HEURISTIC_MAX_CONFIDENCE);
        assert_eq!(eval.evidence.len(), 2);
    }

    #[test]
    fn test_overlap_supports_with_capped_confidence() {
        let insights: Vec<String> = (0..10).map(|i| format!("Adoption rose {}%", i)).collect();
        let eval = heuristic_evaluate("Adoption is accelerating", &insights);
        assert_eq!(eval.status, HypothesisStatus::Supported);
        assert_eq!(eval.confidence, HEURISTIC_MAX_CONFIDENCE);
        assert_eq!(eval.evidence.len(), 5);
    }

    #[test]
    fn test_no_signal_is_inconclusive() {
        let eval = heuristic_evaluate("Margins expand", &texts(&["Hiring is steady"]));
        assert_eq!(eval.status, HypothesisStatus::Inconclusive);
        assert_eq!(eval.confidence, 0.0);
    }

    #[test]
    fn test_no_insights_is_inconclusive() {
        let eval = heuristic_evaluate("Margins expand", &[]);
        assert_eq!(eval.status, HypothesisStatus::Inconclusive);
    }

    #[test]
    fn test_parse_coerces_unknown_status_and_clamps() {
        let eval = parse_evaluation(
            r#"{"status": "probably", "reasoning": "r", "evidence": ["a", 3], "confidence": 7}"#,
        )
        .unwrap();
        assert_eq!(eval.status, HypothesisStatus::Inconclusive);
        assert_eq!(eval.confidence, 1.0);
        assert_eq!(eval.evidence, vec!["a".to_string()]);
    }

    #[test]
    fn test_parse_fenced_reply() {
        let eval = parse_evaluation(
            "```json\n{\"status\": \"Refuted\", \"reasoning\": \"x\", \"evidence\": [], \"confidence\": -0.3}\n```",
        )
        .unwrap();
        assert_eq!(eval.status, HypothesisStatus::Refuted);
        assert_eq!(eval.confidence, 0.0);
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(parse_evaluation("[1, 2]").is_none());
        assert!(parse_evaluation("I think it is supported").is_none());
    }

    #[test]
    fn test_apply_overwrites_all_fields() {
        let mut hypothesis = Hypothesis::new("Prices rise");
        hypothesis.apply(Evaluation {
            status: HypothesisStatus::Supported,
            reasoning: "r".into(),
            evidence: vec!["e".into()],
            confidence: 0.9,
        });
        assert_eq!(hypothesis.status, HypothesisStatus::Supported);
        assert_eq!(hypothesis.evidence, vec!["e".to_string()]);
        assert!(hypothesis.last_evaluated_at.is_some());
    }
}
