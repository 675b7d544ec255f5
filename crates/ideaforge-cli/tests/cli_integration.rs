//! Integration tests for the library calls the `ideaforge` commands make.

use ideaforge_core::config::{ConfigError, ForgeConfig, ProviderKind};
use ideaforge_core::idea::{CriterionScores, CritiqueRecord, Idea, IdeaContent, IdeaStatus};
use ideaforge_core::storage;
use ideaforge_engine::agent::{AgentRole, RoleAgent};
use ideaforge_engine::report;

const PROJECT_TOML: &str = r#"
[loop]
score_threshold = 4.0
drop_threshold = 2.0
max_loops = 2

[agents.critic]
provider = "ollama-cloud"
model = "gpt-oss:120b"

[output]
dir = "out"
"#;

fn accepted_idea(title: &str) -> Idea {
    let mut idea = Idea::new(IdeaContent::new(title, "method"));
    idea.attach_critique(CritiqueRecord::new(
        CriterionScores::new(5, 4, 4, 5),
        "Strong.",
        None,
    ))
    .unwrap();
    idea.transition(IdeaStatus::Accepted).unwrap();
    idea
}

#[test]
fn test_project_config_loads() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("ideaforge.toml"), PROJECT_TOML).unwrap();

    let config = ForgeConfig::load(tmp.path()).unwrap();
    let policy = config.loop_settings.policy().unwrap();
    assert_eq!(policy.max_loops, 2);
    assert_eq!(policy.accept_at, 4.0);
    assert_eq!(
        AgentRole::Critic.model_config(&config).provider,
        ProviderKind::OllamaCloud
    );
    assert_eq!(config.output.dir, std::path::PathBuf::from("out"));
}

#[test]
fn test_run_fails_fast_without_config() {
    let tmp = tempfile::tempdir().unwrap();
    let err = ForgeConfig::load(tmp.path()).unwrap_err();
    assert!(matches!(err, ConfigError::MissingThreshold(_)));
}

#[test]
fn test_local_agent_builds_from_default_section() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("ideaforge.toml"), PROJECT_TOML).unwrap();
    let config = ForgeConfig::load(tmp.path()).unwrap();

    let role = AgentRole::Generator;
    let agent =
        RoleAgent::from_config(role, role.model_config(&config), &config.llm, tmp.path()).unwrap();
    assert_eq!(agent.client().provider().provider_name(), "Ollama (local)");
}

#[test]
fn test_saved_results_rerender() {
    let tmp = tempfile::tempdir().unwrap();
    let results = storage::results_path(&tmp.path().join("out"));
    storage::save(&results, &[accepted_idea("Kept idea")]).unwrap();

    let loaded = storage::load(&results).unwrap();
    let paths = report::write_report(results.parent().unwrap(), &loaded, "robotics").unwrap();
    let md = std::fs::read_to_string(&paths.markdown).unwrap();
    let page = std::fs::read_to_string(&paths.html).unwrap();
    assert!(page.contains("<td><strong>Average</strong></td>"));
    assert!(md.contains("**Keyword:** robotics"));
    assert!(md.contains("## Idea 1: Kept idea"));
    assert!(md.contains("| **Average** | **4.50** |"));
}
