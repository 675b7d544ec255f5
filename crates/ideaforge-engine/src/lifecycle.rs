//! The critique/refine loop that drives every idea to a terminal status.
//!
//! Each pass critiques the whole active set, classifies each idea, then refines
//! the subset that needs it. Calls are batched by role: all critiques of a pass
//! finish before any refinement starts. Within a batch, up to `parallelism` calls
//! run concurrently. Results are written back only once the batch has completed,
//! in input order, one write per idea.

use crate::agent::{Agent, AgentRole};
use crate::critique::{self, CritiquePath};
use crate::events::{EventSink, LoopEvent, LoopReport, NullSink};
use crate::refine::{self, RefinementOutcome};
use crate::scoring::{ScoringPolicy, Verdict};
use futures_util::stream::{self, StreamExt};
use ideaforge_core::config::LoopPolicy;
use ideaforge_core::idea::{CritiqueRecord, Idea, IdeaContent, IdeaStatus};

/// Drives ideas through critique, classification, and refinement.
pub struct IdeaLifecycleController<'a, C, R, S = NullSink> {
    policy: LoopPolicy,
    scoring: ScoringPolicy,
    critic: &'a C,
    refiner: &'a R,
    sink: S,
}

struct CritiqueResult {
    record: CritiqueRecord,
    fallback: bool,
    error: Option<String>,
}

struct RefineResult {
    outcome: RefinementOutcome,
    error: Option<String>,
}

impl<'a, C: Agent, R: Agent> IdeaLifecycleController<'a, C, R, NullSink> {
    pub fn new(policy: LoopPolicy, critic: &'a C, refiner: &'a R) -> Self {
        Self {
            scoring: ScoringPolicy::from(&policy),
            policy,
            critic,
            refiner,
            sink: NullSink,
        }
    }
}

impl<'a, C: Agent, R: Agent, S: EventSink> IdeaLifecycleController<'a, C, R, S> {
    /// Replace the event sink.
    pub fn with_sink<T: EventSink>(self, sink: T) -> IdeaLifecycleController<'a, C, R, T> {
        IdeaLifecycleController {
            policy: self.policy,
            scoring: self.scoring,
            critic: self.critic,
            refiner: self.refiner,
            sink,
        }
    }

    /// Run the loop to completion. Every returned idea has a terminal status.
    pub async fn run(&self, mut ideas: Vec<Idea>) -> (Vec<Idea>, LoopReport) {
        let mut report = LoopReport::default();

        for pass in 1..=self.policy.max_loops {
            let active: Vec<usize> = (0..ideas.len()).filter(|&i| ideas[i].is_active()).collect();
            if active.is_empty() {
                break;
            }
            report.passes = pass;
            tracing::info!(
                "pass {}/{}: critiquing {} ideas",
                pass,
                self.policy.max_loops,
                active.len()
            );
            self.sink.emit(&LoopEvent::PassStarted {
                pass,
                max_loops: self.policy.max_loops,
                active: active.len(),
            });

            let needs_refinement = self.critique_pass(&mut ideas, &active, &mut report).await;
            if needs_refinement.is_empty() {
                tracing::info!("no ideas need refinement, loop finished");
                break;
            }
            self.refine_pass(&mut ideas, &needs_refinement, &mut report)
                .await;
        }

        for idea in ideas.iter_mut().filter(|idea| idea.is_active()) {
            self.finalize(idea, IdeaStatus::RefinedBestEffort, &mut report);
        }

        tracing::info!(
            "run finished after {} passes: {} accepted, {} rejected, {} best effort",
            report.passes,
            report.accepted,
            report.rejected,
            report.best_effort
        );
        self.sink.emit(&LoopEvent::Finished(report.clone()));
        (ideas, report)
    }

    /// Critique every active idea, then classify. Returns indices that need refinement.
    async fn critique_pass(
        &self,
        ideas: &mut [Idea],
        active: &[usize],
        report: &mut LoopReport,
    ) -> Vec<usize> {
        self.sink.emit(&LoopEvent::BatchStarted {
            role: AgentRole::Critic,
            size: active.len(),
        });
        let jobs: Vec<Option<IdeaContent>> = active
            .iter()
            .map(|&i| ideas[i].latest_content().cloned())
            .collect();
        let results: Vec<CritiqueResult> = stream::iter(jobs)
            .map(|content| self.critique_one(content))
            .buffered(self.policy.parallelism)
            .collect()
            .await;
        self.critic.release().await;

        let mut needs_refinement = Vec::new();
        for (&i, result) in active.iter().zip(results) {
            let idea = &mut ideas[i];
            if let Some(error) = result.error {
                report.agent_failures += 1;
                self.sink.emit(&LoopEvent::AgentFailed {
                    idea_id: idea.id().to_string(),
                    role: AgentRole::Critic,
                    error,
                });
            }
            if result.fallback {
                report.critique_fallbacks += 1;
            }
            if let Err(e) = idea.attach_critique(result.record) {
                tracing::warn!("critique not attached: {}", e);
            }

            let Some(critique) = idea.latest_critique() else {
                continue;
            };
            let average = critique.average();
            let verdict = self.scoring.classify(critique);
            let title = idea
                .latest_content()
                .map(|c| c.title.clone())
                .unwrap_or_default();
            tracing::info!("'{}' scored {:.2} -> {}", title, average, verdict);
            self.sink.emit(&LoopEvent::Critiqued {
                idea_id: idea.id().to_string(),
                title,
                average,
                verdict,
                fallback: result.fallback,
            });

            match verdict {
                Verdict::Accept => self.finalize(idea, IdeaStatus::Accepted, report),
                Verdict::Drop => self.finalize(idea, IdeaStatus::Rejected, report),
                Verdict::Refine => needs_refinement.push(i),
            }
        }
        needs_refinement
    }

    async fn critique_one(&self, content: Option<IdeaContent>) -> CritiqueResult {
        let Some(content) = content else {
            return CritiqueResult {
                record: critique::missing_content_record(),
                fallback: false,
                error: None,
            };
        };

        let prompt = critique::build_critique_prompt(&content);
        let (text, error) = match self.critic.ask(&prompt).await {
            Ok(text) => (text, None),
            Err(e) => {
                tracing::warn!("critic failed for '{}': {}", content.title, e);
                (String::new(), Some(e.to_string()))
            }
        };
        let (record, path) = critique::build_with_path(&text);
        CritiqueResult {
            record,
            fallback: path == CritiquePath::TextFallback,
            error,
        }
    }

    async fn refine_pass(&self, ideas: &mut [Idea], targets: &[usize], report: &mut LoopReport) {
        tracing::info!("refining {} ideas", targets.len());
        self.sink.emit(&LoopEvent::BatchStarted {
            role: AgentRole::Refiner,
            size: targets.len(),
        });
        let jobs: Vec<(Option<IdeaContent>, Option<CritiqueRecord>)> = targets
            .iter()
            .map(|&i| {
                (
                    ideas[i].latest_content().cloned(),
                    ideas[i].latest_critique().cloned(),
                )
            })
            .collect();
        let results: Vec<RefineResult> = stream::iter(jobs)
            .map(|(content, critique)| self.refine_one(content, critique))
            .buffered(self.policy.parallelism)
            .collect()
            .await;
        self.refiner.release().await;

        for (&i, result) in targets.iter().zip(results) {
            let idea = &mut ideas[i];
            if let Some(error) = result.error {
                report.agent_failures += 1;
                self.sink.emit(&LoopEvent::AgentFailed {
                    idea_id: idea.id().to_string(),
                    role: AgentRole::Refiner,
                    error,
                });
            }
            let parsed = result.outcome.is_parsed();
            let Some((content, record)) = result.outcome.into_parts() else {
                tracing::debug!("idea {} had nothing to refine", idea.id());
                continue;
            };
            if !parsed {
                report.refine_failures += 1;
            }
            match idea.push_refinement(content, record) {
                Ok(iteration) => self.sink.emit(&LoopEvent::Refined {
                    idea_id: idea.id().to_string(),
                    iteration,
                    parsed,
                }),
                Err(e) => tracing::warn!("refinement not recorded: {}", e),
            }
        }
    }

    async fn refine_one(
        &self,
        content: Option<IdeaContent>,
        critique: Option<CritiqueRecord>,
    ) -> RefineResult {
        let (Some(content), Some(critique)) = (content, critique) else {
            return RefineResult {
                outcome: RefinementOutcome::NothingToRefine,
                error: None,
            };
        };

        let prompt = refine::build_refine_prompt(&content, &critique);
        let (text, error) = match self.refiner.ask(&prompt).await {
            Ok(text) => (text, None),
            Err(e) => {
                tracing::warn!("refiner failed for '{}': {}", content.title, e);
                (String::new(), Some(e.to_string()))
            }
        };
        RefineResult {
            outcome: refine::build_refinement(Some(&content), Some(&critique), &text),
            error,
        }
    }

    fn finalize(&self, idea: &mut Idea, status: IdeaStatus, report: &mut LoopReport) {
        if let Err(e) = idea.transition(status) {
            tracing::warn!("transition skipped: {}", e);
            return;
        }
        match status {
            IdeaStatus::Accepted => report.accepted += 1,
            IdeaStatus::Rejected => report.rejected += 1,
            IdeaStatus::RefinedBestEffort => report.best_effort += 1,
            IdeaStatus::Active => {}
        }
        self.sink.emit(&LoopEvent::Transitioned {
            idea_id: idea.id().to_string(),
            status,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentError;
    use crate::events::CollectingSink;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedAgent<F> {
        role: AgentRole,
        respond: F,
        calls: AtomicUsize,
        releases: AtomicUsize,
    }

    impl<F> ScriptedAgent<F>
    where
        F: Fn(&str) -> Result<String, AgentError> + Sync,
    {
        fn new(role: AgentRole, respond: F) -> Self {
            Self {
                role,
                respond,
                calls: AtomicUsize::new(0),
                releases: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl<F> Agent for ScriptedAgent<F>
    where
        F: Fn(&str) -> Result<String, AgentError> + Sync,
    {
        fn role(&self) -> AgentRole {
            self.role
        }

        async fn generate(&self, prompt: &str, _system_prompt: &str) -> Result<String, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.respond)(prompt)
        }

        async fn release(&self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn scores(n: u8) -> Result<String, AgentError> {
        Ok(format!(
            r#"{{"novelty_score": {n}, "feasibility_score": {n}, "specificity_score": {n}, "impact_score": {n}, "overall_feedback": "ok"}}"#
        ))
    }

    fn policy(max_loops: u32, parallelism: usize) -> LoopPolicy {
        LoopPolicy {
            accept_at: 4.0,
            drop_below: 2.0,
            max_loops,
            parallelism,
        }
    }

    fn idea(title: &str) -> Idea {
        Idea::new(IdeaContent::new(title, "method"))
    }

    fn refine_to(title: &str) -> Result<String, AgentError> {
        Ok(format!(
            r#"{{"thinking_process": "why", "changes_summary": "what", "refined_title": "{title}"}}"#
        ))
    }

    #[tokio::test]
    async fn test_low_score_rejected_on_first_pass() {
        let critic = ScriptedAgent::new(AgentRole::Critic, |_: &str| scores(1));
        let refiner = ScriptedAgent::new(AgentRole::Refiner, |_: &str| refine_to("never"));
        let controller = IdeaLifecycleController::new(policy(3, 1), &critic, &refiner);

        let (ideas, report) = controller.run(vec![idea("Weak")]).await;
        assert_eq!(ideas[0].status(), IdeaStatus::Rejected);
        assert_eq!(ideas[0].history().len(), 1);
        assert_eq!(refiner.calls(), 0);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.passes, 1);
    }

    #[tokio::test]
    async fn test_middling_score_ends_best_effort() {
        let critic = ScriptedAgent::new(AgentRole::Critic, |_: &str| scores(3));
        let refiner =
            ScriptedAgent::new(AgentRole::Refiner, |_: &str| refine_to("Middling again"));
        let controller = IdeaLifecycleController::new(policy(3, 1), &critic, &refiner);

        let (ideas, report) = controller.run(vec![idea("Middling")]).await;
        let idea = &ideas[0];
        assert_eq!(idea.status(), IdeaStatus::RefinedBestEffort);
        assert_eq!(idea.history().len(), 4);
        assert_eq!(idea.current_iteration(), 3);
        assert_eq!(critic.calls(), 3);
        assert_eq!(refiner.calls(), 3);
        // The last refinement is never critiqued.
        assert!(idea.latest_critique().is_none());
        let iterations: Vec<u32> = idea.history().iter().map(|s| s.iteration()).collect();
        assert_eq!(iterations, [0, 1, 2, 3]);
        assert_eq!(report.best_effort, 1);
        assert_eq!(report.passes, 3);
        assert_eq!(critic.releases.load(Ordering::SeqCst), 3);
        assert_eq!(refiner.releases.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_refined_idea_accepted_on_next_pass() {
        let critic = ScriptedAgent::new(AgentRole::Critic, |prompt: &str| {
            if prompt.contains("Title: Alpha Refined") {
                scores(5)
            } else {
                scores(3)
            }
        });
        let refiner = ScriptedAgent::new(AgentRole::Refiner, |_: &str| refine_to("Alpha Refined"));
        let controller = IdeaLifecycleController::new(policy(3, 1), &critic, &refiner);

        let (ideas, report) = controller.run(vec![idea("Alpha")]).await;
        let idea = &ideas[0];
        assert_eq!(idea.status(), IdeaStatus::Accepted);
        assert_eq!(idea.history().len(), 2);
        assert_eq!(idea.latest_critique().unwrap().average(), 5.0);
        let details = idea.history()[1].refinement().unwrap();
        assert_eq!(details.original_title, "Alpha");
        assert_eq!(details.critique_score, 3.0);
        assert_eq!(report.passes, 2);
    }

    #[tokio::test]
    async fn test_agent_errors_degrade_to_fallback() {
        let critic = ScriptedAgent::new(AgentRole::Critic, |_: &str| {
            Err(AgentError::EmptyResponse("test".into()))
        });
        let refiner = ScriptedAgent::new(AgentRole::Refiner, |_: &str| refine_to("x"));
        let sink = CollectingSink::new();
        let controller =
            IdeaLifecycleController::new(policy(2, 1), &critic, &refiner).with_sink(&sink);

        let (ideas, report) = controller.run(vec![idea("A"), idea("B")]).await;
        assert!(ideas.iter().all(|i| i.status() == IdeaStatus::Rejected));
        assert!(ideas[0].latest_critique().unwrap().scores.is_unscored());
        assert_eq!(report.agent_failures, 2);
        assert_eq!(report.critique_fallbacks, 2);
        let failures = sink
            .events()
            .iter()
            .filter(|e| matches!(e, LoopEvent::AgentFailed { .. }))
            .count();
        assert_eq!(failures, 2);
    }

    #[tokio::test]
    async fn test_unparseable_refinement_keeps_prior_content() {
        let critic = ScriptedAgent::new(AgentRole::Critic, |_: &str| scores(3));
        let refiner = ScriptedAgent::new(AgentRole::Refiner, |_: &str| Ok("no idea".to_string()));
        let controller = IdeaLifecycleController::new(policy(2, 1), &critic, &refiner);

        let original = idea("Steady");
        let draft = original.latest_content().cloned().unwrap();
        let (ideas, report) = controller.run(vec![original]).await;
        let idea = &ideas[0];
        assert_eq!(idea.status(), IdeaStatus::RefinedBestEffort);
        assert_eq!(idea.history().len(), 3);
        assert_eq!(idea.latest_content(), Some(&draft));
        assert_eq!(report.refine_failures, 2);
    }

    #[tokio::test]
    async fn test_parallel_results_assigned_to_their_ideas() {
        let critic = ScriptedAgent::new(AgentRole::Critic, |prompt: &str| {
            if prompt.contains("Title: Good") {
                scores(5)
            } else if prompt.contains("Title: Bad") {
                scores(1)
            } else {
                scores(3)
            }
        });
        let refiner = ScriptedAgent::new(AgentRole::Refiner, |prompt: &str| {
            if prompt.contains("**Title:** Meh") {
                refine_to("Meh Refined")
            } else {
                refine_to("Wrong")
            }
        });
        let controller = IdeaLifecycleController::new(policy(1, 4), &critic, &refiner);

        let input = vec![idea("Good"), idea("Bad"), idea("Meh"), idea("Good"), idea("Bad")];
        let ids: Vec<String> = input.iter().map(|i| i.id().to_string()).collect();
        let (ideas, report) = controller.run(input).await;

        let returned: Vec<&str> = ideas.iter().map(Idea::id).collect();
        assert_eq!(returned, ids);
        let statuses: Vec<IdeaStatus> = ideas.iter().map(Idea::status).collect();
        assert_eq!(
            statuses,
            [
                IdeaStatus::Accepted,
                IdeaStatus::Rejected,
                IdeaStatus::RefinedBestEffort,
                IdeaStatus::Accepted,
                IdeaStatus::Rejected,
            ]
        );
        assert_eq!(ideas[2].latest_content().unwrap().title, "Meh Refined");
        assert_eq!(report.finalized(), 5);
    }

    #[tokio::test]
    async fn test_all_critiques_precede_refinements() {
        let critic = ScriptedAgent::new(AgentRole::Critic, |_: &str| scores(3));
        let refiner = ScriptedAgent::new(AgentRole::Refiner, |_: &str| refine_to("R"));
        let sink = CollectingSink::new();
        let controller =
            IdeaLifecycleController::new(policy(1, 2), &critic, &refiner).with_sink(&sink);

        controller.run(vec![idea("A"), idea("B"), idea("C")]).await;
        let events = sink.events();
        let last_critique = events
            .iter()
            .rposition(|e| matches!(e, LoopEvent::Critiqued { .. }))
            .unwrap();
        let first_refine = events
            .iter()
            .position(|e| matches!(e, LoopEvent::Refined { .. }))
            .unwrap();
        assert!(last_critique < first_refine);
        assert!(matches!(events.last(), Some(LoopEvent::Finished(_))));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let critic = ScriptedAgent::new(AgentRole::Critic, |_: &str| scores(3));
        let refiner = ScriptedAgent::new(AgentRole::Refiner, |_: &str| refine_to("R"));
        let controller = IdeaLifecycleController::new(policy(3, 1), &critic, &refiner);

        let (ideas, report) = controller.run(Vec::new()).await;
        assert!(ideas.is_empty());
        assert_eq!(report, LoopReport::default());
        assert_eq!(critic.calls(), 0);
    }
}
