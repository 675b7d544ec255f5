//! Prompt templates for the three agent roles.

pub const CRITIQUE_PROMPT: &str = include_str!("prompts/critique.md");
pub const REFINE_PROMPT: &str = include_str!("prompts/refine.md");
pub const GENERATE_PROMPT: &str = include_str!("prompts/generate.md");

/// Substitute `{key}` placeholders in a single left-to-right pass.
///
/// Substituted values are never rescanned, so model text that happens to contain
/// `{title}` stays literal. Unknown `{...}` sequences (the JSON examples) pass through.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let hit = vars.iter().find(|(key, _)| {
            after.starts_with(key) && after[key.len()..].starts_with('}')
        });
        match hit {
            Some((key, value)) => {
                out.push_str(value);
                rest = &after[key.len() + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_known_keys() {
        let out = render("{a} and {b} and {c}", &[("a", "1"), ("b", "2")]);
        assert_eq!(out, "1 and 2 and {c}");
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let out = render("T: {title} M: {methodology}", &[
            ("title", "{methodology}"),
            ("methodology", "m"),
        ]);
        assert_eq!(out, "T: {methodology} M: m");
    }

    #[test]
    fn test_templates_keep_json_examples() {
        let out = render(CRITIQUE_PROMPT, &[
            ("title", "t"),
            ("methodology", "m"),
            ("description", "d"),
        ]);
        assert!(out.contains("\"novelty_score\""));
        assert!(out.contains("Title: t"));
        assert!(!out.contains("{title}"));
    }
}
