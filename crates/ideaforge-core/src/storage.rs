//! Read/write finalized idea lists from disk.

use crate::idea::Idea;
use crate::schema;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const RESULTS_FILE: &str = "research_results.json";

/// Default results path inside an output directory.
pub fn results_path(output_dir: &Path) -> PathBuf {
    output_dir.join(RESULTS_FILE)
}

/// Load a saved idea list.
pub fn load(path: &Path) -> Result<Vec<Idea>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read results from {}", path.display()))?;
    schema::from_json(&json)
}

/// Save an idea list, creating the parent directory if needed.
pub fn save(path: &Path, ideas: &[Idea]) -> Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    }

    let json = schema::to_json(ideas)?;
    fs::write(path, json)
        .with_context(|| format!("failed to write results to {}", path.display()))?;

    tracing::info!("saved {} ideas to {}", ideas.len(), path.display());
    Ok(())
}
