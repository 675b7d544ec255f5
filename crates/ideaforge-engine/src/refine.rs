//! Refinement: rewrite an idea's content in response to its latest critique.
//!
//! The builder never loses the prior version. Fields missing from the refiner's
//! output are carried over one by one, and an unparseable response yields the prior
//! content unchanged together with a record that says so.

use crate::extract::{extract, lenient_text, text_from_value, truncate_chars};
use crate::prompts::{REFINE_PROMPT, render};
use ideaforge_core::idea::{CritiqueRecord, IdeaContent, RefinementRecord};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Longest slice of the prior critique copied into the refinement record.
pub const FEEDBACK_EXCERPT_CHARS: usize = 500;

const NO_REASONING: &str = "No reasoning provided";
const NO_CHANGES: &str = "No specific changes documented";
const PARSE_FAILED_REASONING: &str = "Parsing failed - using original content";
const PARSE_FAILED_CHANGES: &str = "No changes (parsing error)";

/// Result of one refinement attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RefinementOutcome {
    /// The refiner's output parsed; `content` is the new version.
    Refined {
        content: IdeaContent,
        record: RefinementRecord,
    },
    /// The output had no usable structure; `content` is the prior version, untouched.
    Unparsed {
        content: IdeaContent,
        record: RefinementRecord,
    },
    /// No prior content or critique. Nothing was attempted.
    NothingToRefine,
}

impl RefinementOutcome {
    /// Content and record to append, if any.
    pub fn into_parts(self) -> Option<(IdeaContent, RefinementRecord)> {
        match self {
            Self::Refined { content, record } | Self::Unparsed { content, record } => {
                Some((content, record))
            }
            Self::NothingToRefine => None,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Refined { .. })
    }
}

/// Render the refiner prompt for a proposal and its critique.
pub fn build_refine_prompt(content: &IdeaContent, critique: &CritiqueRecord) -> String {
    let score = format!("{:.2}", critique.average());
    render(
        REFINE_PROMPT,
        &[
            ("title", &content.title),
            ("methodology", &content.methodology),
            (
                "description",
                content.description.as_deref().unwrap_or("Not provided"),
            ),
            ("score", &score),
            ("feedback", &critique.feedback_text),
        ],
    )
}

/// Build the next content version from raw refiner text.
pub fn build_refinement(
    prior: Option<&IdeaContent>,
    critique: Option<&CritiqueRecord>,
    raw_text: &str,
) -> RefinementOutcome {
    let (Some(prior), Some(critique)) = (prior, critique) else {
        return RefinementOutcome::NothingToRefine;
    };

    let payload = match extract(raw_text) {
        Some(value @ Value::Object(_)) => serde_json::from_value::<RefinePayload>(value).ok(),
        _ => None,
    };

    let Some(payload) = payload else {
        tracing::warn!(
            "refinement of '{}' did not parse, keeping prior content",
            truncate_chars(&prior.title, 50)
        );
        return RefinementOutcome::Unparsed {
            content: prior.clone(),
            record: base_record(
                prior,
                critique,
                PARSE_FAILED_REASONING.to_string(),
                PARSE_FAILED_CHANGES.to_string(),
            ),
        };
    };

    let content = IdeaContent {
        title: payload
            .refined_title
            .clone()
            .unwrap_or_else(|| prior.title.clone()),
        methodology: payload
            .refined_methodology
            .clone()
            .unwrap_or_else(|| prior.methodology.clone()),
        description: payload
            .refined_description
            .clone()
            .or_else(|| prior.description.clone()),
        raw_content: Some(raw_text.to_string()),
    };

    let changes = payload.change_log();
    let reasoning = payload
        .thinking_process
        .unwrap_or_else(|| NO_REASONING.to_string());

    RefinementOutcome::Refined {
        record: base_record(prior, critique, reasoning, changes),
        content,
    }
}

fn base_record(
    prior: &IdeaContent,
    critique: &CritiqueRecord,
    reasoning: String,
    changes: String,
) -> RefinementRecord {
    RefinementRecord {
        original_title: prior.title.clone(),
        original_methodology: prior.methodology.clone(),
        critique_feedback: truncate_chars(&critique.feedback_text, FEEDBACK_EXCERPT_CHARS)
            .to_string(),
        critique_score: (critique.average() * 100.0).round() / 100.0,
        refinement_reasoning: reasoning,
        changes_made: changes,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RefinePayload {
    #[serde(deserialize_with = "lenient_text")]
    thinking_process: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    changes_summary: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    refined_title: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    refined_methodology: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    refined_description: Option<String>,
    #[serde(deserialize_with = "lenient_pairs")]
    addressed_weaknesses: Vec<(String, String)>,
}

impl RefinePayload {
    fn change_log(&self) -> String {
        let mut log = self.changes_summary.clone().unwrap_or_default();
        if !self.addressed_weaknesses.is_empty() {
            if !log.is_empty() {
                log.push_str("\n\n");
            }
            log.push_str("**Addressed Weaknesses:**");
            for (weakness, solution) in &self.addressed_weaknesses {
                log.push_str(&format!("\n• {weakness} → {solution}"));
            }
        }
        if log.is_empty() {
            NO_CHANGES.to_string()
        } else {
            log
        }
    }
}

/// `[{weakness, solution}, ...]`; non-object entries are skipped, missing halves read "N/A".
fn lenient_pairs<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<(String, String)>, D::Error> {
    let Value::Array(items) = Value::deserialize(d)? else {
        return Ok(Vec::new());
    };
    let field = |item: &serde_json::Map<String, Value>, key: &str| {
        item.get(key)
            .and_then(text_from_value)
            .unwrap_or_else(|| "N/A".to_string())
    };
    Ok(items
        .iter()
        .filter_map(Value::as_object)
        .map(|item| (field(item, "weakness"), field(item, "solution")))
        .collect())
}
