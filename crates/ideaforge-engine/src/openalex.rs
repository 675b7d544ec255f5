//! OpenAlex paper lookup used as grounding context for draft generation.

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const WORKS_URL: &str = "https://api.openalex.org/works";
/// OpenAlex caps `per-page` at 200.
const MAX_PER_PAGE: usize = 200;
const MAX_AUTHORS: usize = 5;
const PROMPT_AUTHORS: usize = 3;
const PROMPT_ABSTRACT_CHARS: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum OpenAlexError {
    #[error("OpenAlex request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("OpenAlex returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// A paper with a reconstructed abstract.
#[derive(Debug, Clone, PartialEq)]
pub struct Paper {
    pub title: String,
    pub abstract_text: String,
    pub year: Option<i32>,
    pub authors: Vec<String>,
    pub url: Option<String>,
    pub cited_by_count: u64,
}

pub struct OpenAlexClient {
    http: reqwest::Client,
    base_url: String,
    mailto: String,
}

impl OpenAlexClient {
    pub fn new(mailto: impl Into<String>) -> Self {
        Self::with_base_url(WORKS_URL, mailto)
    }

    pub fn with_base_url(base_url: impl Into<String>, mailto: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into(),
            mailto: mailto.into(),
        }
    }

    /// Newest papers matching `keyword` that have both a title and an abstract.
    pub async fn fetch_papers(
        &self,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<Paper>, OpenAlexError> {
        let per_page = limit.clamp(1, MAX_PER_PAGE).to_string();
        let resp = self
            .http
            .get(&self.base_url)
            .query(&[
                ("search", keyword),
                ("per-page", per_page.as_str()),
                ("filter", "has_abstract:true"),
                ("sort", "publication_year:desc"),
            ])
            .header("User-Agent", format!("mailto:{}", self.mailto))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(OpenAlexError::Api { status, body });
        }

        let works: WorksResponse = resp.json().await?;
        let papers: Vec<Paper> = works
            .results
            .into_iter()
            .filter_map(Work::into_paper)
            .collect();
        tracing::info!("OpenAlex returned {} papers for '{}'", papers.len(), keyword);
        Ok(papers)
    }

    /// [`Self::fetch_papers`], logging a failure and returning no papers instead.
    pub async fn fetch_papers_or_empty(&self, keyword: &str, limit: usize) -> Vec<Paper> {
        match self.fetch_papers(keyword, limit).await {
            Ok(papers) => papers,
            Err(e) => {
                tracing::warn!("OpenAlex fetch failed, continuing without papers: {}", e);
                Vec::new()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct WorksResponse {
    #[serde(default)]
    results: Vec<Work>,
}

#[derive(Deserialize)]
struct Work {
    id: Option<String>,
    title: Option<String>,
    publication_year: Option<i32>,
    #[serde(default)]
    cited_by_count: Option<u64>,
    abstract_inverted_index: Option<HashMap<String, Vec<usize>>>,
    #[serde(default)]
    authorships: Vec<Authorship>,
}

#[derive(Deserialize)]
struct Authorship {
    author: Option<Author>,
}

#[derive(Deserialize)]
struct Author {
    display_name: Option<String>,
}

impl Work {
    fn into_paper(self) -> Option<Paper> {
        let title = self.title.filter(|t| !t.is_empty())?;
        let abstract_text = self
            .abstract_inverted_index
            .as_ref()
            .map(reconstruct_abstract)
            .filter(|a| !a.is_empty())?;
        let authors = self
            .authorships
            .into_iter()
            .take(MAX_AUTHORS)
            .filter_map(|a| a.author?.display_name)
            .collect();
        Some(Paper {
            title,
            abstract_text,
            year: self.publication_year,
            authors,
            url: self.id,
            cited_by_count: self.cited_by_count.unwrap_or(0),
        })
    }
}

/// Rebuild abstract text from OpenAlex's `{word: [positions]}` form.
pub fn reconstruct_abstract(inverted: &HashMap<String, Vec<usize>>) -> String {
    let mut positioned: Vec<(usize, &str)> = inverted
        .iter()
        .flat_map(|(word, positions)| positions.iter().map(move |&p| (p, word.as_str())))
        .collect();
    positioned.sort_unstable();
    positioned
        .into_iter()
        .map(|(_, word)| word)
        .collect::<Vec<_>>()
        .join(" ")
}

/// The `k` most relevant papers: newest first, then most cited.
pub fn select_top_papers(mut papers: Vec<Paper>, k: usize) -> Vec<Paper> {
    papers.sort_by(|a, b| {
        (b.year.unwrap_or(0), b.cited_by_count).cmp(&(a.year.unwrap_or(0), a.cited_by_count))
    });
    papers.truncate(k);
    papers
}

/// Paper summaries for the generator prompt.
pub fn format_papers_for_prompt(papers: &[Paper]) -> String {
    if papers.is_empty() {
        return "No papers found.".to_string();
    }
    papers
        .iter()
        .enumerate()
        .map(|(i, paper)| {
            let abstract_excerpt =
                crate::extract::truncate_chars(&paper.abstract_text, PROMPT_ABSTRACT_CHARS);
            format!(
                "**Paper {}** [{}] (Cited: {})\n- **Title:** {}\n- **Authors:** {}\n- **Abstract:** {}...",
                i + 1,
                year_label(paper.year),
                paper.cited_by_count,
                paper.title,
                paper
                    .authors
                    .iter()
                    .take(PROMPT_AUTHORS)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
                abstract_excerpt
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One `- [year] title` line per paper.
pub fn format_latest_titles(papers: &[Paper]) -> String {
    if papers.is_empty() {
        return "No latest papers found.".to_string();
    }
    papers
        .iter()
        .map(|p| format!("- [{}] {}", year_label(p.year), p.title))
        .collect::<Vec<_>>()
        .join("\n")
}

fn year_label(year: Option<i32>) -> String {
    year.map_or_else(|| "N/A".to_string(), |y| y.to_string())
}
