//! Terminal progress for a lifecycle run.

use ideaforge_engine::events::{EventSink, LoopEvent};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner that tracks the current pass and prints one line per scored idea.
pub struct ProgressSink {
    spinner: ProgressBar,
}

impl ProgressSink {
    pub fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .expect("valid template"),
        );
        spinner.enable_steady_tick(Duration::from_millis(120));
        Self { spinner }
    }
}

impl Default for ProgressSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for ProgressSink {
    fn emit(&self, event: &LoopEvent) {
        match event {
            LoopEvent::PassStarted {
                pass,
                max_loops,
                active,
            } => {
                self.spinner
                    .println(format!("  Pass {}/{} ({} active)", pass, max_loops, active));
            }
            LoopEvent::BatchStarted { role, size } => {
                self.spinner
                    .set_message(format!("{} working on {} ideas...", role, size));
            }
            LoopEvent::Critiqued {
                title,
                average,
                verdict,
                fallback,
                ..
            } => {
                let marker = if *fallback { " (text fallback)" } else { "" };
                self.spinner.println(format!(
                    "    {:.2}/5 {} -> {}{}",
                    average, title, verdict, marker
                ));
            }
            LoopEvent::Refined {
                idea_id, parsed, ..
            } if !parsed => {
                self.spinner.println(format!(
                    "    refinement of {} did not parse, kept prior content",
                    idea_id
                ));
            }
            LoopEvent::AgentFailed {
                idea_id,
                role,
                error,
            } => {
                self.spinner
                    .println(format!("    {} failed on {}: {}", role, idea_id, error));
            }
            LoopEvent::Finished(_) => self.spinner.finish_and_clear(),
            LoopEvent::Refined { .. } | LoopEvent::Transitioned { .. } => {}
        }
    }
}
