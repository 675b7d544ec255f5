//! Draft generation: the generator prompt and parsing of its topic list into ideas.

use crate::extract::{extract, lenient_list, lenient_text, strip_think_blocks};
use crate::openalex::{Paper, format_latest_titles, format_papers_for_prompt};
use crate::prompts::{GENERATE_PROMPT, render};
use ideaforge_core::idea::{Idea, IdeaContent};
use serde::Deserialize;
use serde_json::Value;

const UNTITLED: &str = "Untitled";

/// Render the generator prompt for `n` topics grounded in `papers`.
pub fn build_generation_prompt(keyword: &str, papers: &[Paper], n: usize) -> String {
    let n = n.to_string();
    render(
        GENERATE_PROMPT,
        &[
            ("n", &n),
            ("keyword", keyword),
            ("latest_papers", &format_latest_titles(papers)),
            ("papers_context", &format_papers_for_prompt(papers)),
        ],
    )
}

/// Parse generator output into fresh draft ideas.
///
/// Accepts `{"topics": [...]}` or a bare list. Non-object items are skipped. An
/// unparseable response yields no ideas.
pub fn parse_drafts(raw_text: &str) -> Vec<Idea> {
    let cleaned = strip_think_blocks(raw_text);
    let items = match extract(&cleaned) {
        Some(Value::Object(mut obj)) => match obj.remove("topics") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };

    if items.is_empty() {
        tracing::warn!("generator response contained no topics");
    }

    items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|item| {
            let raw = item.to_string();
            serde_json::from_value::<TopicPayload>(item)
                .ok()
                .map(|topic| Idea::new(topic.into_content(raw)))
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TopicPayload {
    #[serde(deserialize_with = "lenient_text")]
    title: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    methodology: Option<String>,
    #[serde(deserialize_with = "lenient_list")]
    table_of_contents: Vec<String>,
    #[serde(deserialize_with = "lenient_text")]
    background: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    necessity: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    expected_effects: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    description: Option<String>,
}

impl TopicPayload {
    fn into_content(self, raw: String) -> IdeaContent {
        let mut methodology = self.methodology.unwrap_or_default();
        if !self.table_of_contents.is_empty() {
            if !methodology.is_empty() {
                methodology.push_str("\n\n");
            }
            methodology.push_str("**Proposed Structure:**\n");
            methodology.push_str(&self.table_of_contents.join("\n"));
        }

        let sections: Vec<String> = [
            ("Background", self.background),
            ("Necessity", self.necessity),
            ("Expected Effects", self.expected_effects),
        ]
        .into_iter()
        .filter_map(|(label, text)| Some(format!("**{label}:** {}", text?)))
        .collect();
        let description = if sections.is_empty() {
            self.description
        } else {
            Some(sections.join("\n\n"))
        };

        IdeaContent {
            title: self.title.unwrap_or_else(|| UNTITLED.to_string()),
            methodology,
            description,
            raw_content: Some(raw),
        }
    }
}
