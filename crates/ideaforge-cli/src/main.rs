//! CLI binary for ideaforge: generate research ideas from recent literature, then
//! critique and refine them until they are accepted, rejected, or out of passes.

mod progress;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ideaforge_core::config::{ForgeConfig, ProviderKind};
use ideaforge_core::idea::{Idea, IdeaStatus};
use ideaforge_core::storage;
use ideaforge_engine::agent::{Agent, AgentRole, RoleAgent};
use ideaforge_engine::lifecycle::IdeaLifecycleController;
use ideaforge_engine::{drafts, llm, openalex, report};
use progress::ProgressSink;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "ideaforge", about = "Multi-agent research idea generator")]
struct Cli {
    /// Project root containing ideaforge.toml (defaults to current directory)
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate ideas for a keyword and run the critique/refine loop
    Run {
        /// Research keyword used for paper search and generation
        #[arg(short, long)]
        keyword: String,

        /// Override the configured maximum number of passes
        #[arg(short, long)]
        loops: Option<u32>,

        /// Results JSON path (defaults to <output.dir>/research_results.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Re-render the Markdown and HTML reports from a saved results file
    Report {
        /// Saved results JSON
        #[arg(short, long)]
        input: PathBuf,

        /// Keyword shown in the report header
        #[arg(short, long)]
        keyword: String,
    },
}

fn get_project_root(cli: &Cli) -> Result<PathBuf> {
    match &cli.project {
        Some(p) => Ok(p.clone()),
        None => std::env::current_dir().context("failed to get current directory"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let project_root = get_project_root(&cli)?;

    match cli.command {
        Commands::Run {
            keyword,
            loops,
            output,
        } => cmd_run(&project_root, &keyword, loops, output).await,
        Commands::Report { input, keyword } => cmd_report(&input, &keyword),
    }
}

async fn cmd_run(
    project_root: &Path,
    keyword: &str,
    loops: Option<u32>,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut config = ForgeConfig::load(project_root)?;
    if let Some(n) = loops {
        config.loop_settings.max_loops = n;
    }
    let policy = config.loop_settings.policy()?;
    let output_dir = project_root.join(&config.output.dir);
    let results_path = output.unwrap_or_else(|| storage::results_path(&output_dir));

    check_local_models(&config).await;

    let build_agent = |role: AgentRole| {
        RoleAgent::from_config(role, role.model_config(&config), &config.llm, project_root)
            .with_context(|| format!("failed to configure {} agent", role))
    };
    let generator = build_agent(AgentRole::Generator)?;
    let critic = build_agent(AgentRole::Critic)?;
    let refiner = build_agent(AgentRole::Refiner)?;

    eprintln!("Searching OpenAlex for '{}'...", keyword);
    let scholar = openalex::OpenAlexClient::new(config.openalex.mailto.clone());
    let papers = scholar
        .fetch_papers_or_empty(keyword, config.openalex.fetch_limit)
        .await;
    let papers = openalex::select_top_papers(papers, config.openalex.top_k_papers);
    eprintln!("  Using {} papers as context", papers.len());

    let num_ideas = config.loop_settings.num_ideas;
    eprintln!("Generating {} ideas...", num_ideas);
    let prompt = drafts::build_generation_prompt(keyword, &papers, num_ideas);
    let raw = match generator.ask(&prompt).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!("generator failed: {}", e);
            String::new()
        }
    };
    generator.release().await;
    let ideas = drafts::parse_drafts(&raw);
    if ideas.is_empty() {
        eprintln!("No ideas could be parsed from the generator output.");
    } else {
        eprintln!("  Drafted {} ideas", ideas.len());
    }

    eprintln!(
        "Running critique/refine loop (accept >= {}, drop <= {}, max {} passes)...",
        policy.accept_at, policy.drop_below, policy.max_loops
    );
    let controller =
        IdeaLifecycleController::new(policy, &critic, &refiner).with_sink(ProgressSink::new());
    let (ideas, summary) = controller.run(ideas).await;

    eprintln!(
        "Finished after {} passes: {} accepted, {} best effort, {} rejected",
        summary.passes, summary.accepted, summary.best_effort, summary.rejected
    );
    if summary.agent_failures > 0 {
        eprintln!(
            "  {} agent calls failed and were scored as empty responses",
            summary.agent_failures
        );
    }

    let kept = persisted(ideas);
    storage::save(&results_path, &kept)?;
    println!("Results: {}", results_path.display());

    if kept.is_empty() {
        eprintln!("No ideas survived, skipping report.");
        return Ok(());
    }
    let report_dir = results_path
        .parent()
        .map_or_else(|| output_dir.clone(), Path::to_path_buf);
    let paths = report::write_report(&report_dir, &kept, keyword)?;
    println!("Report: {}", paths.markdown.display());
    println!("HTML report: {}", paths.html.display());
    Ok(())
}

fn cmd_report(input: &Path, keyword: &str) -> Result<()> {
    let ideas = storage::load(input)?;
    let dir = input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let paths = report::write_report(dir, &ideas, keyword)?;
    println!("Report: {}", paths.markdown.display());
    println!("HTML report: {}", paths.html.display());
    Ok(())
}

/// Ideas worth saving: accepted, or refined as far as the pass budget allowed.
///
/// Accepted ideas come first in the order they were accepted, then the best-effort
/// ones. An idea accepted on pass `k` has exactly `k` snapshots, and the sort is
/// stable, so ideas finalized in the same pass keep their input order.
fn persisted(ideas: Vec<Idea>) -> Vec<Idea> {
    let mut kept: Vec<Idea> = ideas
        .into_iter()
        .filter(|idea| {
            matches!(
                idea.status(),
                IdeaStatus::Accepted | IdeaStatus::RefinedBestEffort
            )
        })
        .collect();
    kept.sort_by_key(|idea| {
        (
            idea.status() == IdeaStatus::RefinedBestEffort,
            idea.history().len(),
        )
    });
    kept
}

/// Warn early when a local model is missing or Ollama is not running.
async fn check_local_models(config: &ForgeConfig) {
    let local: Vec<&str> = AgentRole::ALL
        .iter()
        .map(|role| role.model_config(config))
        .filter(|m| m.provider == ProviderKind::Ollama)
        .map(|m| m.model.as_str())
        .collect();
    if local.is_empty() {
        return;
    }

    let Some(installed) = llm::detect_ollama(&config.llm.base_url).await else {
        tracing::warn!(
            "Ollama not reachable at {}; local agents will fail",
            config.llm.base_url
        );
        return;
    };
    for model in local {
        if !llm::model_is_available(&installed, model) {
            tracing::warn!("model {} is not installed, run `ollama pull {}`", model, model);
        }
    }
}
