use super::config::InferenceConfig;
use super::progress::ProgressReporter;
use super::semantics::ScoreSemantics;
use crate::core::models::system::EntitySystem;
use std::sync::atomic::{AtomicU64, Ordering};

/// Read-mostly state shared by everything taking part in one inference run.
///
/// Besides the inputs, it carries the best complete score known so far,
/// which branch-and-bound filters read and the engine tightens. Each run
/// owns its own context, so independent runs never interfere.
pub struct InferenceContext<'a> {
    pub system: &'a EntitySystem,
    pub config: &'a InferenceConfig,
    pub reporter: &'a ProgressReporter<'a>,
    bound: AtomicU64,
}

impl<'a> InferenceContext<'a> {
    pub fn new(
        system: &'a EntitySystem,
        config: &'a InferenceConfig,
        reporter: &'a ProgressReporter<'a>,
    ) -> Self {
        Self {
            system,
            config,
            reporter,
            bound: AtomicU64::new(config.semantics.worst().to_bits()),
        }
    }

    /// Seeds the global bound, e.g. with the score of a known feasible solution.
    pub fn with_bound(self, score: f64) -> Self {
        self.tighten_bound(score);
        self
    }

    #[inline]
    pub fn semantics(&self) -> ScoreSemantics {
        self.config.semantics
    }

    /// The best complete score known so far, if any.
    pub fn current_bound(&self) -> Option<f64> {
        let value = f64::from_bits(self.bound.load(Ordering::Acquire));
        (value != self.semantics().worst()).then_some(value)
    }

    /// Replaces the bound if `score` is strictly better. Returns whether it did.
    pub fn tighten_bound(&self, score: f64) -> bool {
        let semantics = self.semantics();
        let mut current = self.bound.load(Ordering::Acquire);
        loop {
            if !semantics.is_better(score, f64::from_bits(current)) {
                return false;
            }
            match self.bound.compare_exchange_weak(
                current,
                score.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::semantics::{Combine, Objective};

    #[test]
    fn bound_only_moves_towards_better_scores() {
        let system = EntitySystem::new();
        let config = InferenceConfig::builder().num_solutions(1).build().unwrap();
        let reporter = ProgressReporter::new();
        let context = InferenceContext::new(&system, &config, &reporter);
        assert_eq!(context.current_bound(), None);
        assert!(context.tighten_bound(10.0));
        assert!(!context.tighten_bound(12.0));
        assert!(context.tighten_bound(-3.0));
        assert_eq!(context.current_bound(), Some(-3.0));
    }

    #[test]
    fn bound_respects_maximization() {
        let system = EntitySystem::new();
        let config = InferenceConfig::builder()
            .num_solutions(1)
            .semantics(ScoreSemantics::new(Objective::Maximize, Combine::Product))
            .build()
            .unwrap();
        let reporter = ProgressReporter::new();
        let context = InferenceContext::new(&system, &config, &reporter).with_bound(0.2);
        assert!(!context.tighten_bound(0.1));
        assert!(context.tighten_bound(0.7));
        assert_eq!(context.current_bound(), Some(0.7));
    }
}
