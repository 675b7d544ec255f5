//! Critique record construction from critic output.
//!
//! Structured JSON is preferred. When nothing parseable comes back, scores are mined
//! from the prose with keyword patterns so the loop always receives a usable record.

use crate::extract::{
    extract, lenient_list, lenient_score, lenient_text, text_from_value, truncate_chars,
};
use crate::prompts::{CRITIQUE_PROMPT, render};
use ideaforge_core::idea::{Criterion, CriterionScores, CritiqueRecord, IdeaContent};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;

/// Longest raw response kept as feedback on the text-fallback path.
pub const FALLBACK_FEEDBACK_CHARS: usize = 2000;

/// Diagnostic used when an idea has nothing to evaluate.
pub const NO_CONTENT_MESSAGE: &str = "No content found";

const NO_FEEDBACK: &str = "No detailed feedback provided.";

/// Which parsing tier produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CritiquePath {
    Structured,
    TextFallback,
}

/// Render the critic prompt for one proposal.
pub fn build_critique_prompt(content: &IdeaContent) -> String {
    render(
        CRITIQUE_PROMPT,
        &[
            ("title", &content.title),
            ("methodology", &content.methodology),
            (
                "description",
                content.description.as_deref().unwrap_or("Not provided"),
            ),
        ],
    )
}

/// Record for an idea with no content. The critic is never called for these.
pub fn missing_content_record() -> CritiqueRecord {
    CritiqueRecord::error(NO_CONTENT_MESSAGE)
}

/// Build a normalized critique from raw critic text.
pub fn build_record(raw_text: &str) -> CritiqueRecord {
    build_with_path(raw_text).0
}

/// Like [`build_record`], also reporting which tier was used.
pub fn build_with_path(raw_text: &str) -> (CritiqueRecord, CritiquePath) {
    if let Some(value @ Value::Object(_)) = extract(raw_text)
        && let Ok(payload) = serde_json::from_value::<CritiquePayload>(value)
    {
        return (payload.into_record(raw_text), CritiquePath::Structured);
    }

    tracing::debug!("critique had no structured payload, mining scores from text");
    (from_text(raw_text), CritiquePath::TextFallback)
}

// ---------------------------------------------------------------------------
// Structured path
// ---------------------------------------------------------------------------

/// Critic JSON. Every field is optional and read leniently; a wrong type yields the
/// field's default instead of failing the whole payload.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CritiquePayload {
    #[serde(deserialize_with = "lenient_score")]
    novelty_score: i64,
    #[serde(deserialize_with = "lenient_score")]
    feasibility_score: i64,
    #[serde(deserialize_with = "lenient_score")]
    specificity_score: i64,
    #[serde(deserialize_with = "lenient_score")]
    impact_score: i64,
    #[serde(deserialize_with = "lenient_text")]
    novelty_reasoning: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    feasibility_reasoning: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    specificity_reasoning: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    impact_reasoning: Option<String>,
    /// Kept raw: a present but empty assessment is still the critic's feedback.
    overall_feedback: Option<Value>,
    #[serde(deserialize_with = "lenient_list")]
    key_weaknesses: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    key_strengths: Vec<String>,
}

impl CritiquePayload {
    fn reasoning(&self, criterion: Criterion) -> Option<&str> {
        match criterion {
            Criterion::Novelty => self.novelty_reasoning.as_deref(),
            Criterion::Feasibility => self.feasibility_reasoning.as_deref(),
            Criterion::Specificity => self.specificity_reasoning.as_deref(),
            Criterion::Impact => self.impact_reasoning.as_deref(),
        }
    }

    fn into_record(self, raw_text: &str) -> CritiqueRecord {
        let scores = CriterionScores::new(
            self.novelty_score,
            self.feasibility_score,
            self.specificity_score,
            self.impact_score,
        );

        let mut sections = Vec::new();
        if let Some(overall) = self.overall_feedback.as_ref().and_then(text_from_value) {
            sections.push(format!("**Overall Assessment:** {overall}"));
        }
        for criterion in Criterion::ALL {
            if let Some(reasoning) = self.reasoning(criterion) {
                sections.push(format!(
                    "**{} ({}/5):** {}",
                    criterion,
                    scores.get(criterion),
                    reasoning
                ));
            }
        }
        if !self.key_weaknesses.is_empty() {
            sections.push(bulleted("**Key Weaknesses:**", &self.key_weaknesses));
        }
        if !self.key_strengths.is_empty() {
            sections.push(bulleted("**Key Strengths:**", &self.key_strengths));
        }

        let feedback = match (sections.is_empty(), self.overall_feedback) {
            (false, _) => sections.join("\n\n"),
            (true, Some(Value::String(overall))) => overall,
            (true, Some(other)) => other.to_string(),
            (true, None) => NO_FEEDBACK.to_string(),
        };

        CritiqueRecord::new(scores, feedback, Some(raw_text.to_string()))
    }
}

fn bulleted(heading: &str, items: &[String]) -> String {
    let mut out = heading.to_string();
    for item in items {
        out.push_str("\n- ");
        out.push_str(item);
    }
    out
}

// ---------------------------------------------------------------------------
// Text fallback
// ---------------------------------------------------------------------------

fn criterion_keywords(criterion: Criterion) -> &'static [&'static str] {
    match criterion {
        Criterion::Novelty => &["novelty", "novel"],
        Criterion::Feasibility => &["feasibility", "feasible"],
        Criterion::Specificity => &["specificity", "specific"],
        Criterion::Impact => &["impact"],
    }
}

/// Per criterion: the compiled patterns, keyword-major, in match priority order.
fn fallback_patterns() -> &'static [(Criterion, Vec<Regex>)] {
    static PATTERNS: OnceLock<Vec<(Criterion, Vec<Regex>)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        Criterion::ALL
            .iter()
            .map(|&criterion| {
                let regexes = criterion_keywords(criterion)
                    .iter()
                    .flat_map(|kw| {
                        [
                            format!(r"{kw}[:\s]+([0-9])[/\s]?5?"),
                            format!(r"{kw}\s+score[:\s]+([0-9])"),
                        ]
                    })
                    .map(|pattern| Regex::new(&pattern).expect("valid regex"))
                    .collect();
                (criterion, regexes)
            })
            .collect()
    })
}

/// First in-range digit found by this criterion's patterns, or `0`.
fn find_score(lowered: &str, patterns: &[Regex]) -> i64 {
    patterns
        .iter()
        .filter_map(|re| re.captures(lowered))
        .filter_map(|caps| caps.get(1)?.as_str().parse::<i64>().ok())
        .find(|score| (1..=5).contains(score))
        .unwrap_or(0)
}

fn from_text(raw_text: &str) -> CritiqueRecord {
    let lowered = raw_text.to_lowercase();
    let mut scores = CriterionScores::default();
    for (criterion, patterns) in fallback_patterns() {
        scores.set(*criterion, find_score(&lowered, patterns));
    }
    CritiqueRecord::new(
        scores,
        truncate_chars(raw_text, FALLBACK_FEEDBACK_CHARS),
        Some(raw_text.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_critique() {
        let raw = r#"Here is my review:
```json
{
  "novelty_score": 4,
  "novelty_reasoning": "Fresh angle",
  "feasibility_score": "3",
  "feasibility_reasoning": "Needs data",
  "specificity_score": 2,
  "impact_score": 5,
  "overall_feedback": "Promising",
  "key_weaknesses": ["no baseline", "small dataset"],
  "key_strengths": ["clear goal"]
}
```"#;
        let (record, path) = build_with_path(raw);
        assert_eq!(path, CritiquePath::Structured);
        assert_eq!(record.scores.get(Criterion::Novelty), 4);
        assert_eq!(record.scores.get(Criterion::Feasibility), 3);
        assert_eq!(record.average(), 3.5);
        assert_eq!(
            record.feedback_text,
            "**Overall Assessment:** Promising\n\n\
             **Novelty (4/5):** Fresh angle\n\n\
             **Feasibility (3/5):** Needs data\n\n\
             **Key Weaknesses:**\n- no baseline\n- small dataset\n\n\
             **Key Strengths:**\n- clear goal"
        );
        assert_eq!(record.raw_response.as_deref(), Some(raw));
    }

    #[test]
    fn test_structured_bad_types_default_to_zero() {
        let raw = r#"{"novelty_score": "high", "feasibility_score": null, "specificity_score": [3], "impact_score": 4.9}"#;
        let record = build_record(raw);
        assert_eq!(record.scores.get(Criterion::Novelty), 0);
        assert_eq!(record.scores.get(Criterion::Feasibility), 0);
        assert_eq!(record.scores.get(Criterion::Specificity), 0);
        assert_eq!(record.scores.get(Criterion::Impact), 4);
        assert_eq!(record.average(), 4.0);
        assert_eq!(record.feedback_text, NO_FEEDBACK);
    }

    #[test]
    fn test_structured_empty_overall_feedback_is_kept() {
        let record = build_record(r#"{"novelty_score": 3, "overall_feedback": ""}"#);
        assert_eq!(record.scores.get(Criterion::Novelty), 3);
        assert_eq!(record.feedback_text, "");
    }

    #[test]
    fn test_structured_out_of_range_score_is_unscored() {
        let record = build_record(r#"{"novelty_score": 9, "impact_score": 3}"#);
        assert_eq!(record.scores.get(Criterion::Novelty), 0);
        assert_eq!(record.average(), 3.0);
    }

    #[test]
    fn test_text_fallback_scores() {
        let raw = "Novelty: 4/5 because it is new. Also feasibility score: 2 given the data.";
        let (record, path) = build_with_path(raw);
        assert_eq!(path, CritiquePath::TextFallback);
        assert_eq!(record.scores.get(Criterion::Novelty), 4);
        assert_eq!(record.scores.get(Criterion::Feasibility), 2);
        assert_eq!(record.scores.get(Criterion::Specificity), 0);
        assert_eq!(record.scores.get(Criterion::Impact), 0);
        assert_eq!(record.average(), 3.0);
        assert_eq!(record.feedback_text, raw);
    }

    #[test]
    fn test_text_fallback_rejects_out_of_range_digits() {
        let record = build_record("Impact: 9 and novelty: 0");
        assert!(record.scores.is_unscored());
        assert_eq!(record.average(), 0.0);
    }

    #[test]
    fn test_text_fallback_keyword_variants() {
        let record = build_record("Quite novel: 5. Specific: 3. Impact 2/5");
        assert_eq!(record.scores.get(Criterion::Novelty), 5);
        assert_eq!(record.scores.get(Criterion::Specificity), 3);
        assert_eq!(record.scores.get(Criterion::Impact), 2);
    }

    #[test]
    fn test_text_fallback_skips_non_ascii_digits() {
        let record = build_record("Novelty: \u{0663} overall. Later, novelty: 4");
        assert_eq!(record.scores.get(Criterion::Novelty), 4);
    }

    #[test]
    fn test_text_fallback_truncates_feedback() {
        let raw = "x".repeat(FALLBACK_FEEDBACK_CHARS + 500);
        let record = build_record(&raw);
        assert_eq!(record.feedback_text.chars().count(), FALLBACK_FEEDBACK_CHARS);
        assert_eq!(record.raw_response.as_deref().map(str::len), Some(raw.len()));
    }

    #[test]
    fn test_json_array_takes_fallback() {
        let (_, path) = build_with_path("[1, 2, 3]");
        assert_eq!(path, CritiquePath::TextFallback);
    }

    #[test]
    fn test_empty_response_is_unscored() {
        let record = build_record("");
        assert!(record.scores.is_unscored());
        assert_eq!(record.feedback_text, "");
    }

    #[test]
    fn test_missing_content_record() {
        let record = missing_content_record();
        assert!(record.scores.is_unscored());
        assert_eq!(record.feedback_text, "Error: No content found");
        assert!(record.raw_response.is_none());
    }

    #[test]
    fn test_prompt_contains_proposal() {
        let content = IdeaContent::new("Claim graphs", "GAT over claims");
        let prompt = build_critique_prompt(&content);
        assert!(prompt.contains("Title: Claim graphs"));
        assert!(prompt.contains("Methodology: GAT over claims"));
        assert!(prompt.contains("Description: Not provided"));
    }
}
