//! JSON serialization and structural validation for persisted idea lists.

use crate::idea::{Idea, SnapshotRole};
use anyhow::{Context, Result};

/// Check the history shape of a loaded idea: a leading draft, strictly
/// increasing iterations, and a counter that matches the last snapshot.
pub fn validate(idea: &Idea) -> Result<()> {
    let history = idea.history();
    let Some(first) = history.first() else {
        anyhow::bail!("idea {} has an empty evolution_history", idea.id());
    };
    if first.role() != SnapshotRole::Draft {
        anyhow::bail!(
            "idea {} starts with a {} snapshot, expected draft",
            idea.id(),
            first.role()
        );
    }
    for pair in history.windows(2) {
        if pair[1].iteration() <= pair[0].iteration() {
            anyhow::bail!(
                "idea {} has non-increasing iterations ({} then {})",
                idea.id(),
                pair[0].iteration(),
                pair[1].iteration()
            );
        }
        if pair[1].role() == SnapshotRole::Draft {
            anyhow::bail!(
                "idea {} has a draft snapshot at iteration {}",
                idea.id(),
                pair[1].iteration()
            );
        }
    }
    if let Some(last) = history.last()
        && last.iteration() != idea.current_iteration()
    {
        anyhow::bail!(
            "idea {} current_iteration {} does not match last snapshot {}",
            idea.id(),
            idea.current_iteration(),
            last.iteration()
        );
    }
    Ok(())
}

/// Serialize ideas to a pretty-printed JSON array.
pub fn to_json(ideas: &[Idea]) -> Result<String> {
    serde_json::to_string_pretty(ideas).context("failed to serialize ideas to JSON")
}

/// Deserialize and validate an idea list.
pub fn from_json(json: &str) -> Result<Vec<Idea>> {
    let ideas: Vec<Idea> =
        serde_json::from_str(json).context("failed to deserialize ideas from JSON")?;
    for idea in &ideas {
        validate(idea)?;
    }
    Ok(ideas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idea::{IdeaContent, RefinementRecord};

    fn record() -> RefinementRecord {
        RefinementRecord {
            original_title: "t".to_string(),
            original_methodology: "m".to_string(),
            critique_feedback: "f".to_string(),
            critique_score: 2.5,
            refinement_reasoning: "r".to_string(),
            changes_made: "c".to_string(),
        }
    }

    #[test]
    fn test_valid_idea_passes() {
        let mut idea = Idea::with_id("a", IdeaContent::new("t", "m"));
        idea.push_refinement(IdeaContent::new("t2", "m2"), record()).unwrap();
        assert!(validate(&idea).is_ok());
    }

    #[test]
    fn test_empty_history_rejected() {
        let json = r#"[{"idea_id":"x","current_iteration":0,"status":"active","evolution_history":[]}]"#;
        let err = from_json(json).unwrap_err();
        assert!(err.to_string().contains("empty evolution_history"));
    }

    #[test]
    fn test_refined_first_snapshot_rejected() {
        let json = r#"[{"idea_id":"x","current_iteration":0,"status":"accepted","evolution_history":[
            {"iteration":0,"role":"refined","content":{"title":"t","methodology":"m","description":null,"raw_content":null},"critique":null,"refinement_details":null}
        ]}]"#;
        let err = from_json(json).unwrap_err();
        assert!(err.to_string().contains("expected draft"));
    }

    #[test]
    fn test_counter_mismatch_rejected() {
        let json = r#"[{"idea_id":"x","current_iteration":2,"status":"accepted","evolution_history":[
            {"iteration":0,"role":"draft","content":{"title":"t","methodology":"m","description":null,"raw_content":null},"critique":null,"refinement_details":null}
        ]}]"#;
        assert!(from_json(json).is_err());
    }

    #[test]
    fn test_malformed_json_has_context() {
        let err = from_json("{not json").unwrap_err();
        assert!(err.to_string().contains("failed to deserialize"));
    }
}
