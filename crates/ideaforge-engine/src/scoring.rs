//! Threshold classification of critique averages.

use ideaforge_core::config::LoopPolicy;
use ideaforge_core::idea::CritiqueRecord;
use std::fmt;

/// Outcome of classifying one critique.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Drop,
    Refine,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Accept => f.write_str("accept"),
            Verdict::Drop => f.write_str("drop"),
            Verdict::Refine => f.write_str("refine"),
        }
    }
}

/// Accept/drop boundaries. Both are inclusive: a score sitting exactly on either
/// boundary takes that boundary's verdict rather than `Refine`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringPolicy {
    accept_at: f64,
    drop_below: f64,
}

impl ScoringPolicy {
    pub fn new(accept_at: f64, drop_below: f64) -> Self {
        Self {
            accept_at,
            drop_below,
        }
    }

    pub fn accept_at(&self) -> f64 {
        self.accept_at
    }

    pub fn drop_below(&self) -> f64 {
        self.drop_below
    }

    /// Classify an average score. Accept is checked before drop, so an inverted
    /// threshold pair resolves overlapping scores to `Accept`.
    pub fn classify_score(&self, average: f64) -> Verdict {
        if average >= self.accept_at {
            Verdict::Accept
        } else if average <= self.drop_below {
            Verdict::Drop
        } else {
            Verdict::Refine
        }
    }

    pub fn classify(&self, critique: &CritiqueRecord) -> Verdict {
        self.classify_score(critique.average())
    }
}

impl From<&LoopPolicy> for ScoringPolicy {
    fn from(policy: &LoopPolicy) -> Self {
        Self::new(policy.accept_at, policy.drop_below)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ideaforge_core::idea::CriterionScores;

    #[test]
    fn test_boundaries() {
        let policy = ScoringPolicy::new(3.5, 2.0);
        assert_eq!(policy.classify_score(3.5), Verdict::Accept);
        assert_eq!(policy.classify_score(2.0), Verdict::Drop);
        assert_eq!(policy.classify_score(2.01), Verdict::Refine);
        assert_eq!(policy.classify_score(3.49), Verdict::Refine);
        assert_eq!(policy.classify_score(5.0), Verdict::Accept);
    }

    #[test]
    fn test_unscored_critique_drops() {
        let policy = ScoringPolicy::new(3.0, 2.0);
        let record = CritiqueRecord::error("No content found");
        assert_eq!(policy.classify(&record), Verdict::Drop);
    }

    #[test]
    fn test_classify_uses_average() {
        let policy = ScoringPolicy::new(4.0, 2.0);
        let record = CritiqueRecord::new(CriterionScores::new(4, 2, 0, 0), "fb", None);
        assert_eq!(policy.classify(&record), Verdict::Refine);
    }

    #[test]
    fn test_inverted_thresholds_accept_first() {
        let policy = ScoringPolicy::new(2.0, 3.0);
        assert_eq!(policy.classify_score(2.5), Verdict::Accept);
        assert_eq!(policy.classify_score(1.5), Verdict::Drop);
    }

    #[test]
    fn test_equal_thresholds_accept_wins() {
        let policy = ScoringPolicy::new(3.0, 3.0);
        assert_eq!(policy.classify_score(3.0), Verdict::Accept);
    }
}
