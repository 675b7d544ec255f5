//! Markdown and HTML reports of finalized ideas and their evolution.

use crate::prompts::render;
use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone};
use ideaforge_core::idea::{Criterion, Idea, SnapshotRole};
use pulldown_cmark::{Options, Parser, html};
use std::path::{Path, PathBuf};

const HTML_TEMPLATE: &str = include_str!("templates/report.html");

/// Paths written by [`write_report`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub markdown: PathBuf,
    pub html: PathBuf,
}

/// Render the full report. `generated_at` is passed in so output is reproducible.
pub fn render_markdown<Tz: TimeZone>(
    ideas: &[Idea],
    keyword: &str,
    generated_at: &DateTime<Tz>,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::new();
    out.push_str("# Research Idea Report\n\n");
    out.push_str(&format!("**Keyword:** {}\n", keyword));
    out.push_str(&format!(
        "**Generated:** {}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format!("**Total Ideas:** {}\n\n---\n\n", ideas.len()));

    for (idx, idea) in ideas.iter().enumerate() {
        render_idea(&mut out, idx + 1, idea);
    }

    out.push_str("## Conclusion\n\n");
    out.push_str(&format!(
        "This report collects the research ideas generated for **{}**. \
         The generator-critic-refiner loop finalized **{}** ideas.\n",
        keyword,
        ideas.len()
    ));
    out
}

fn render_idea(out: &mut String, number: usize, idea: &Idea) {
    let title = idea
        .latest_content()
        .map_or("Untitled", |c| c.title.as_str());
    out.push_str(&format!("## Idea {}: {}\n\n", number, title));
    out.push_str(&format!("**Status:** `{}`\n", idea.status()));
    out.push_str(&format!(
        "**Total Iterations:** {}\n\n",
        idea.current_iteration() + 1
    ));
    out.push_str("### Evolution History\n\n");

    for snapshot in idea.history() {
        let content = snapshot.content();
        out.push_str(&format!(
            "#### Iteration {} - {}\n\n",
            snapshot.iteration(),
            snapshot.role().to_string().to_uppercase()
        ));
        out.push_str(&format!("**Title:** {}\n\n", content.title));
        let methodology = if content.methodology.is_empty() {
            "Not provided"
        } else {
            &content.methodology
        };
        out.push_str(&format!("**Methodology:**\n\n{}\n\n", methodology));
        if let Some(description) = content.description.as_deref().filter(|d| !d.is_empty()) {
            out.push_str(&format!("**Description:**\n\n{}\n\n", description));
        }

        if let Some(critique) = snapshot.critique() {
            out.push_str("##### Critic Evaluation\n\n| Criterion | Score |\n|---|---|\n");
            for criterion in Criterion::ALL {
                out.push_str(&format!(
                    "| {} | {}/5 |\n",
                    criterion.label(),
                    critique.scores.get(criterion)
                ));
            }
            out.push_str(&format!(
                "| **Average** | **{:.2}** |\n\n",
                critique.average()
            ));
            let feedback = if critique.feedback_text.is_empty() {
                "No feedback provided"
            } else {
                &critique.feedback_text
            };
            out.push_str(&format!("**Critic Feedback:**\n\n{}\n\n", feedback));
        }

        if snapshot.role() == SnapshotRole::Refined {
            out.push_str("##### Refiner Changes\n\n");
            match snapshot.refinement() {
                Some(details) => {
                    out.push_str(&format!(
                        "**Previous Score:** {:.2}/5\n\n",
                        details.critique_score
                    ));
                    out.push_str(&format!(
                        "**Refiner Reasoning:**\n\n{}\n\n",
                        details.refinement_reasoning
                    ));
                    out.push_str(&format!("**Key Changes:**\n\n{}\n\n", details.changes_made));
                }
                None => out.push_str("> Title and methodology were revised as shown above.\n\n"),
            }
        }

        out.push_str("---\n\n");
    }
    out.push('\n');
}

/// File name for a report generated at `at`.
pub fn report_file_name<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("research_report_{}.md", at.format("%Y%m%d_%H%M%S"))
}

/// Convert a rendered Markdown report into a standalone styled HTML page.
pub fn render_html(markdown: &str, title: &str) -> String {
    let parser = Parser::new_ext(markdown, Options::ENABLE_TABLES);
    let mut body = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut body, parser);
    let body = body
        .replace(
            "<code>accepted</code>",
            "<span class=\"status-accepted\">accepted</span>",
        )
        .replace(
            "<code>refined_best_effort</code>",
            "<span class=\"status-refined\">refined (best effort)</span>",
        );
    render(
        HTML_TEMPLATE,
        &[("title", &escape_html(title)), ("body", &body)],
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Write the HTML rendering of a Markdown report next to it. The page title is the
/// report's first `# ` heading, or the file name.
pub fn write_html(markdown_path: &Path) -> Result<PathBuf> {
    let markdown = std::fs::read_to_string(markdown_path)
        .with_context(|| format!("failed to read report {}", markdown_path.display()))?;
    let title = markdown
        .lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(str::to_string)
        .unwrap_or_else(|| markdown_path.display().to_string());
    let path = markdown_path.with_extension("html");
    std::fs::write(&path, render_html(&markdown, &title))
        .with_context(|| format!("failed to write HTML report {}", path.display()))?;
    tracing::info!("HTML report saved to {}", path.display());
    Ok(path)
}

/// Render and write a timestamped Markdown report into `dir`, plus its HTML twin.
pub fn write_report(dir: &Path, ideas: &[Idea], keyword: &str) -> Result<ReportPaths> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create report dir {}", dir.display()))?;
    let now = Local::now();
    let markdown = dir.join(report_file_name(&now));
    std::fs::write(&markdown, render_markdown(ideas, keyword, &now))
        .with_context(|| format!("failed to write report {}", markdown.display()))?;
    tracing::info!("report saved to {}", markdown.display());
    let html = write_html(&markdown)?;
    Ok(ReportPaths { markdown, html })
}
