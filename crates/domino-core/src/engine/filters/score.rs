use super::{Candidate, FilterTable, SubsetFilter};
use crate::core::models::subset::Subset;
use crate::engine::context::InferenceContext;
use std::time::{Duration, Instant};

/// Rejects candidates whose subtree score is worse than a fixed threshold.
///
/// Lossless only when partial scores can never improve as more of the tree
/// is added (e.g. non-negative terms under minimization).
#[derive(Debug, Clone, Copy)]
pub struct ScoreThresholdFilter {
    threshold: f64,
}

impl ScoreThresholdFilter {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl SubsetFilter for ScoreThresholdFilter {
    fn is_ok(&self, candidate: &Candidate<'_>, context: &InferenceContext<'_>) -> bool {
        candidate
            .score
            .is_none_or(|s| !context.semantics().is_better(self.threshold, s))
    }

    fn needs_score(&self) -> bool {
        true
    }
}

impl FilterTable for ScoreThresholdFilter {
    fn name(&self) -> &str {
        "score-threshold"
    }

    fn bind(&self, _: &Subset, _: &InferenceContext<'_>) -> Option<Box<dyn SubsetFilter + '_>> {
        Some(Box::new(*self))
    }

    fn strength(&self, _: &Subset, _: &InferenceContext<'_>) -> f64 {
        0.0
    }

    fn is_lossless(&self) -> bool {
        false
    }
}

/// Rejects candidates whose subtree score is already worse than the best
/// complete score known to the run.
#[derive(Debug, Clone, Copy, Default)]
pub struct BranchAndBoundFilter;

impl SubsetFilter for BranchAndBoundFilter {
    fn is_ok(&self, candidate: &Candidate<'_>, context: &InferenceContext<'_>) -> bool {
        match (candidate.score, context.current_bound()) {
            (Some(score), Some(bound)) => !context.semantics().is_better(bound, score),
            _ => true,
        }
    }

    fn needs_score(&self) -> bool {
        true
    }
}

impl FilterTable for BranchAndBoundFilter {
    fn name(&self) -> &str {
        "branch-and-bound"
    }

    fn bind(&self, _: &Subset, _: &InferenceContext<'_>) -> Option<Box<dyn SubsetFilter + '_>> {
        Some(Box::new(*self))
    }

    fn strength(&self, _: &Subset, _: &InferenceContext<'_>) -> f64 {
        0.0
    }

    fn is_lossless(&self) -> bool {
        false
    }
}

/// Stops a run from growing once a deadline passes.
///
/// After the deadline a node accepts a candidate only while it holds no
/// assignment yet, so no node that had feasible candidates ends up empty.
/// The parent may still find no child completion matching its separator.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineFilter {
    deadline: Instant,
}

impl DeadlineFilter {
    pub fn at(deadline: Instant) -> Self {
        Self { deadline }
    }

    pub fn after(budget: Duration) -> Self {
        Self::at(Instant::now() + budget)
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

impl SubsetFilter for DeadlineFilter {
    fn is_ok(&self, candidate: &Candidate<'_>, _: &InferenceContext<'_>) -> bool {
        candidate.retained == 0 || !self.expired()
    }

    fn needs_score(&self) -> bool {
        true
    }
}

impl FilterTable for DeadlineFilter {
    fn name(&self) -> &str {
        "deadline"
    }

    fn bind(&self, _: &Subset, _: &InferenceContext<'_>) -> Option<Box<dyn SubsetFilter + '_>> {
        Some(Box::new(*self))
    }

    fn strength(&self, _: &Subset, _: &InferenceContext<'_>) -> f64 {
        if self.expired() { 1.0 } else { 0.0 }
    }

    fn is_lossless(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::system::EntitySystem;
    use crate::engine::config::InferenceConfig;
    use crate::engine::progress::ProgressReporter;

    fn scored(score: f64, retained: usize) -> Candidate<'static> {
        Candidate {
            states: &[],
            score: Some(score),
            retained,
        }
    }

    #[test]
    fn threshold_rejects_only_worse_scores() {
        let system = EntitySystem::new();
        let config = InferenceConfig::builder().num_solutions(1).build().unwrap();
        let reporter = ProgressReporter::new();
        let context = InferenceContext::new(&system, &config, &reporter);
        let filter = ScoreThresholdFilter::new(5.0);
        assert!(filter.is_ok(&scored(4.0, 0), &context));
        assert!(filter.is_ok(&scored(5.0, 0), &context));
        assert!(!filter.is_ok(&scored(5.5, 0), &context));
        assert!(!FilterTable::is_lossless(&filter));
    }

    #[test]
    fn branch_and_bound_follows_the_context_bound() {
        let system = EntitySystem::new();
        let config = InferenceConfig::builder().num_solutions(1).build().unwrap();
        let reporter = ProgressReporter::new();
        let context = InferenceContext::new(&system, &config, &reporter);
        let filter = BranchAndBoundFilter;
        assert!(filter.is_ok(&scored(100.0, 0), &context));
        context.tighten_bound(10.0);
        assert!(filter.is_ok(&scored(10.0, 0), &context));
        assert!(!filter.is_ok(&scored(10.5, 0), &context));
    }

    #[test]
    fn expired_deadline_keeps_one_assignment_per_node() {
        let system = EntitySystem::new();
        let config = InferenceConfig::builder().num_solutions(1).build().unwrap();
        let reporter = ProgressReporter::new();
        let context = InferenceContext::new(&system, &config, &reporter);
        let expired = DeadlineFilter::at(Instant::now() - Duration::from_millis(1));
        assert!(expired.is_ok(&scored(0.0, 0), &context));
        assert!(!expired.is_ok(&scored(0.0, 1), &context));

        let open = DeadlineFilter::after(Duration::from_secs(3600));
        assert!(open.is_ok(&scored(0.0, 5), &context));
    }
}
