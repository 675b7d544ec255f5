//! Idea data model: content versions, critiques, refinement provenance, and the
//! append-only snapshot history owned by each idea.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound of every criterion score. `0` means "unscored".
pub const MAX_SCORE: u8 = 5;

/// One version of an idea's text. Never mutated once it is part of a snapshot;
/// refinement always produces a fresh value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdeaContent {
    pub title: String,
    pub methodology: String,
    pub description: Option<String>,
    /// Verbatim producer output this content was built from, kept for audit.
    pub raw_content: Option<String>,
}

impl IdeaContent {
    pub fn new(title: impl Into<String>, methodology: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            methodology: methodology.into(),
            description: None,
            raw_content: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_raw_content(mut self, raw: impl Into<String>) -> Self {
        self.raw_content = Some(raw.into());
        self
    }
}

/// The four evaluation criteria, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Criterion {
    Novelty,
    Feasibility,
    Specificity,
    Impact,
}

impl Criterion {
    pub const ALL: [Criterion; 4] = [
        Criterion::Novelty,
        Criterion::Feasibility,
        Criterion::Specificity,
        Criterion::Impact,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Criterion::Novelty => "Novelty",
            Criterion::Feasibility => "Feasibility",
            Criterion::Specificity => "Specificity",
            Criterion::Impact => "Impact",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-criterion scores, each in `0..=MAX_SCORE`.
///
/// Out-of-range input is stored as `0` (unscored) so the average can never leave
/// `[0, MAX_SCORE]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CriterionScores {
    novelty: u8,
    feasibility: u8,
    specificity: u8,
    impact: u8,
}

impl CriterionScores {
    pub fn new(novelty: i64, feasibility: i64, specificity: i64, impact: i64) -> Self {
        Self {
            novelty: normalize_score(novelty),
            feasibility: normalize_score(feasibility),
            specificity: normalize_score(specificity),
            impact: normalize_score(impact),
        }
    }

    pub fn get(&self, criterion: Criterion) -> u8 {
        match criterion {
            Criterion::Novelty => self.novelty,
            Criterion::Feasibility => self.feasibility,
            Criterion::Specificity => self.specificity,
            Criterion::Impact => self.impact,
        }
    }

    pub fn set(&mut self, criterion: Criterion, value: i64) {
        let value = normalize_score(value);
        match criterion {
            Criterion::Novelty => self.novelty = value,
            Criterion::Feasibility => self.feasibility = value,
            Criterion::Specificity => self.specificity = value,
            Criterion::Impact => self.impact = value,
        }
    }

    /// Mean of the scored (non-zero) criteria, or `0.0` when nothing was scored.
    pub fn average(&self) -> f64 {
        let scored: Vec<u8> = Criterion::ALL
            .iter()
            .map(|c| self.get(*c))
            .filter(|s| *s > 0)
            .collect();
        if scored.is_empty() {
            return 0.0;
        }
        let sum: u32 = scored.iter().map(|s| u32::from(*s)).sum();
        f64::from(sum) / scored.len() as f64
    }

    pub fn is_unscored(&self) -> bool {
        Criterion::ALL.iter().all(|c| self.get(*c) == 0)
    }
}

fn normalize_score(value: i64) -> u8 {
    u8::try_from(value)
        .ok()
        .filter(|s| *s <= MAX_SCORE)
        .unwrap_or(0)
}

/// Normalized critic verdict for one snapshot.
///
/// There is no stored average: [`CritiqueRecord::average`] is always derived from the
/// current scores. The serialized `average_score` is written for report consumers and
/// ignored on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "CritiqueWire", from = "CritiqueWire")]
pub struct CritiqueRecord {
    pub scores: CriterionScores,
    pub feedback_text: String,
    /// Original producer text; `None` for records synthesized without a producer call.
    pub raw_response: Option<String>,
}

impl CritiqueRecord {
    pub fn new(
        scores: CriterionScores,
        feedback_text: impl Into<String>,
        raw_response: Option<String>,
    ) -> Self {
        Self {
            scores,
            feedback_text: feedback_text.into(),
            raw_response,
        }
    }

    /// All-zero record carrying a diagnostic message.
    pub fn error(message: &str) -> Self {
        Self {
            scores: CriterionScores::default(),
            feedback_text: format!("Error: {message}"),
            raw_response: None,
        }
    }

    pub fn average(&self) -> f64 {
        self.scores.average()
    }
}

#[derive(Serialize, Deserialize)]
struct CritiqueWire {
    #[serde(default)]
    novelty_score: i64,
    #[serde(default)]
    feasibility_score: i64,
    #[serde(default)]
    specificity_score: i64,
    #[serde(default)]
    impact_score: i64,
    #[serde(default)]
    average_score: f64,
    #[serde(default)]
    feedback_text: String,
    #[serde(default)]
    raw_response: Option<String>,
}

impl From<CritiqueRecord> for CritiqueWire {
    fn from(record: CritiqueRecord) -> Self {
        let average = record.average();
        Self {
            novelty_score: i64::from(record.scores.novelty),
            feasibility_score: i64::from(record.scores.feasibility),
            specificity_score: i64::from(record.scores.specificity),
            impact_score: i64::from(record.scores.impact),
            average_score: (average * 100.0).round() / 100.0,
            feedback_text: record.feedback_text,
            raw_response: record.raw_response,
        }
    }
}

impl From<CritiqueWire> for CritiqueRecord {
    fn from(wire: CritiqueWire) -> Self {
        Self {
            scores: CriterionScores::new(
                wire.novelty_score,
                wire.feasibility_score,
                wire.specificity_score,
                wire.impact_score,
            ),
            feedback_text: wire.feedback_text,
            raw_response: wire.raw_response,
        }
    }
}

/// Provenance of one refinement step. Audit trail only, never read by control logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementRecord {
    pub original_title: String,
    pub original_methodology: String,
    pub critique_feedback: String,
    pub critique_score: f64,
    pub refinement_reasoning: String,
    pub changes_made: String,
}

/// Which step produced a snapshot's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotRole {
    Draft,
    Refined,
}

impl fmt::Display for SnapshotRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotRole::Draft => f.write_str("draft"),
            SnapshotRole::Refined => f.write_str("refined"),
        }
    }
}

/// One point in an idea's evolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    iteration: u32,
    role: SnapshotRole,
    content: IdeaContent,
    critique: Option<CritiqueRecord>,
    #[serde(rename = "refinement_details")]
    refinement: Option<RefinementRecord>,
}

impl Snapshot {
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn role(&self) -> SnapshotRole {
        self.role
    }

    pub fn content(&self) -> &IdeaContent {
        &self.content
    }

    pub fn critique(&self) -> Option<&CritiqueRecord> {
        self.critique.as_ref()
    }

    pub fn refinement(&self) -> Option<&RefinementRecord> {
        self.refinement.as_ref()
    }
}

/// Lifecycle state of an idea. Everything except `Active` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdeaStatus {
    Active,
    Accepted,
    Rejected,
    RefinedBestEffort,
}

impl IdeaStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, IdeaStatus::Active)
    }
}

impl fmt::Display for IdeaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdeaStatus::Active => f.write_str("active"),
            IdeaStatus::Accepted => f.write_str("accepted"),
            IdeaStatus::Rejected => f.write_str("rejected"),
            IdeaStatus::RefinedBestEffort => f.write_str("refined_best_effort"),
        }
    }
}

/// Illegal writes against an idea's history or status.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdeaError {
    #[error("idea {idea_id} has no snapshots")]
    EmptyHistory { idea_id: String },
    #[error("idea {idea_id} snapshot {iteration} already has a critique")]
    AlreadyCritiqued { idea_id: String, iteration: u32 },
    #[error("idea {idea_id} is {status}, not active")]
    NotActive { idea_id: String, status: IdeaStatus },
    #[error("{0} is not a terminal status")]
    NonTerminalStatus(IdeaStatus),
}

/// Aggregate root: identity, status, and the append-only snapshot sequence.
///
/// Serialized field order (`idea_id`, `current_iteration`, `status`,
/// `evolution_history`) is part of the persisted format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Idea {
    idea_id: String,
    current_iteration: u32,
    status: IdeaStatus,
    evolution_history: Vec<Snapshot>,
}

impl Idea {
    /// Create an active idea with a fresh UUID and one uncritiqued draft snapshot.
    pub fn new(content: IdeaContent) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), content)
    }

    pub fn with_id(idea_id: impl Into<String>, content: IdeaContent) -> Self {
        Self {
            idea_id: idea_id.into(),
            current_iteration: 0,
            status: IdeaStatus::Active,
            evolution_history: vec![Snapshot {
                iteration: 0,
                role: SnapshotRole::Draft,
                content,
                critique: None,
                refinement: None,
            }],
        }
    }

    pub fn id(&self) -> &str {
        &self.idea_id
    }

    pub fn current_iteration(&self) -> u32 {
        self.current_iteration
    }

    pub fn status(&self) -> IdeaStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == IdeaStatus::Active
    }

    pub fn history(&self) -> &[Snapshot] {
        &self.evolution_history
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.evolution_history.last()
    }

    pub fn latest_content(&self) -> Option<&IdeaContent> {
        self.latest().map(Snapshot::content)
    }

    pub fn latest_critique(&self) -> Option<&CritiqueRecord> {
        self.latest().and_then(Snapshot::critique)
    }

    /// Attach the evaluation result to the latest snapshot. Allowed once per snapshot.
    pub fn attach_critique(&mut self, critique: CritiqueRecord) -> Result<(), IdeaError> {
        self.ensure_active()?;
        let idea_id = self.idea_id.clone();
        let snapshot = self
            .evolution_history
            .last_mut()
            .ok_or_else(|| IdeaError::EmptyHistory {
                idea_id: idea_id.clone(),
            })?;
        if snapshot.critique.is_some() {
            return Err(IdeaError::AlreadyCritiqued {
                idea_id,
                iteration: snapshot.iteration,
            });
        }
        snapshot.critique = Some(critique);
        Ok(())
    }

    /// Append a refined snapshot and advance the iteration counter.
    /// Returns the new snapshot's iteration index.
    pub fn push_refinement(
        &mut self,
        content: IdeaContent,
        record: RefinementRecord,
    ) -> Result<u32, IdeaError> {
        self.ensure_active()?;
        let iteration = self.current_iteration + 1;
        self.evolution_history.push(Snapshot {
            iteration,
            role: SnapshotRole::Refined,
            content,
            critique: None,
            refinement: Some(record),
        });
        self.current_iteration = iteration;
        Ok(iteration)
    }

    /// Move an active idea into a terminal status. Happens exactly once per idea.
    pub fn transition(&mut self, status: IdeaStatus) -> Result<(), IdeaError> {
        if !status.is_terminal() {
            return Err(IdeaError::NonTerminalStatus(status));
        }
        self.ensure_active()?;
        self.status = status;
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), IdeaError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(IdeaError::NotActive {
                idea_id: self.idea_id.clone(),
                status: self.status,
            })
        }
    }
}
