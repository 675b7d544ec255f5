//! Ollama availability checks.

use serde::Deserialize;

/// Response from Ollama's /api/tags endpoint.
#[derive(Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModelInfo>,
}

#[derive(Deserialize)]
struct OllamaModelInfo {
    name: String,
}

/// Query Ollama at `base_url`. Returns installed model names, or `None` if unreachable.
pub async fn detect_ollama(base_url: &str) -> Option<Vec<String>> {
    let url = format!("{}/api/tags", base_url.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(3))
        .build()
        .ok()?;

    let resp = client.get(&url).send().await.ok()?;
    let tags: OllamaTagsResponse = resp.json().await.ok()?;
    Some(tags.models.into_iter().map(|m| m.name).collect())
}

/// Check if a requested model is in the installed list.
/// "qwen2.5" matches an installed "qwen2.5:7b", and "qwen2.5:7b" matches "qwen2.5".
pub fn model_is_available(installed: &[String], requested: &str) -> bool {
    let requested = requested.to_lowercase();
    installed.iter().any(|m| {
        let m = m.to_lowercase();
        m == requested
            || m.starts_with(&format!("{requested}:"))
            || requested.starts_with(&format!("{m}:"))
    })
}
