//! Structured progress events emitted by the lifecycle controller.

use crate::agent::AgentRole;
use crate::scoring::Verdict;
use ideaforge_core::idea::IdeaStatus;
use std::sync::Mutex;

/// One observable step of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    PassStarted {
        pass: u32,
        max_loops: u32,
        active: usize,
    },
    BatchStarted {
        role: AgentRole,
        size: usize,
    },
    Critiqued {
        idea_id: String,
        title: String,
        average: f64,
        verdict: Verdict,
        fallback: bool,
    },
    Refined {
        idea_id: String,
        iteration: u32,
        parsed: bool,
    },
    AgentFailed {
        idea_id: String,
        role: AgentRole,
        error: String,
    },
    Transitioned {
        idea_id: String,
        status: IdeaStatus,
    },
    Finished(LoopReport),
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopReport {
    pub passes: u32,
    pub accepted: usize,
    pub rejected: usize,
    pub best_effort: usize,
    /// Backend errors absorbed as empty responses.
    pub agent_failures: usize,
    /// Critiques scored by the text fallback instead of structured output.
    pub critique_fallbacks: usize,
    /// Refinements that kept the prior content because the output did not parse.
    pub refine_failures: usize,
}

impl LoopReport {
    pub fn finalized(&self) -> usize {
        self.accepted + self.rejected + self.best_effort
    }
}

/// Receiver for [`LoopEvent`]s.
pub trait EventSink {
    fn emit(&self, event: &LoopEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &LoopEvent) {}
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<LoopEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LoopEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: &LoopEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

impl<S: EventSink + ?Sized> EventSink for &S {
    fn emit(&self, event: &LoopEvent) {
        (**self).emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_sink_keeps_order() {
        let sink = CollectingSink::new();
        sink.emit(&LoopEvent::BatchStarted {
            role: AgentRole::Critic,
            size: 2,
        });
        sink.emit(&LoopEvent::Finished(LoopReport::default()));
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], LoopEvent::Finished(_)));
    }

    #[test]
    fn test_report_finalized_count() {
        let report = LoopReport {
            accepted: 2,
            rejected: 1,
            best_effort: 3,
            ..LoopReport::default()
        };
        assert_eq!(report.finalized(), 6);
    }
}
