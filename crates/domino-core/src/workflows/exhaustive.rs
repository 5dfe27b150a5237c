//! Brute-force reference solver.
//!
//! Enumerates every joint configuration of the whole system, so it is only
//! usable on small problems. It shares the scoring rules of the junction-tree
//! engine but none of its decomposition, which makes it a useful oracle.

use crate::core::models::assignment::Assignment;
use crate::core::models::subset::Subset;
use crate::core::models::system::EntitySystem;
use crate::core::scoring::term::{ScoringTerm, validate_term};
use crate::core::utils::enumeration::MixedRadix;
use crate::engine::config::InferenceConfig;
use crate::engine::containers::AssignmentContainer;
use crate::engine::containers::heap::HeapContainer;
use crate::engine::error::EngineError;
use crate::engine::semantics::ScoreSemantics;
use crate::engine::state::Solution;
use tracing::{debug, instrument};

/// Default ceiling on the number of joint configurations enumerated when the
/// configuration sets no domain limit.
pub const DEFAULT_MAX_CONFIGURATIONS: u64 = 1 << 24;

/// Scores one full joint configuration of `entities` under `semantics`.
///
/// Terms whose support is not inside `entities` are skipped.
pub fn score(
    terms: &[Box<dyn ScoringTerm>],
    semantics: ScoreSemantics,
    entities: &Subset,
    states: &[usize],
) -> f64 {
    terms.iter().fold(semantics.identity(), |acc, term| {
        let restricted: Option<Vec<usize>> = term
            .support()
            .iter()
            .map(|&id| entities.position(id).map(|p| states[p]))
            .collect();
        match restricted {
            Some(restricted) => {
                let s = term.evaluate(&restricted);
                semantics.combine(acc, semantics.weighted(s.value, s.weight))
            }
            None => acc,
        }
    })
}

/// Returns the `config.num_solutions` best joint configurations, best first.
///
/// Storage and filter settings of `config` are ignored; only its semantics,
/// solution count and domain ceiling apply.
///
/// # Errors
///
/// Invalid terms yield [`EngineError::Model`]; a system with more joint
/// configurations than the ceiling yields [`EngineError::ResourceExhausted`].
#[instrument(skip_all, name = "exhaustive_workflow")]
pub fn run(
    system: &EntitySystem,
    terms: &[Box<dyn ScoringTerm>],
    config: &InferenceConfig,
) -> Result<Vec<Solution>, EngineError> {
    for term in terms {
        validate_term(term.as_ref(), system)?;
    }
    let entities = system.all_entities();
    let domain = system.domain_size(&entities);
    let limit = config
        .limits
        .max_domain_size
        .unwrap_or(DEFAULT_MAX_CONFIGURATIONS) as u128;
    if domain > limit {
        return Err(EngineError::ResourceExhausted {
            node: 0,
            resource: "joint configuration count",
            size: domain,
            limit,
        });
    }

    let semantics = config.semantics;
    let radix = MixedRadix::new(system.radices(&entities));
    let mut best = HeapContainer::new(entities.len(), config.num_solutions, semantics);
    for states in radix.iter() {
        let value = score(terms, semantics, &entities, &states);
        best.insert(Assignment::new(states, value))
            .map_err(|source| EngineError::Container { node: 0, source })?;
    }
    debug!(enumerated = %domain, "Exhaustive enumeration complete.");

    let solutions = best
        .assignments()
        .map_err(|source| EngineError::Container { node: 0, source })?
        .into_iter()
        .map(|a| Solution {
            entities: entities.clone(),
            states: a.states,
            score: a.score,
        })
        .collect();
    Ok(solutions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scoring::term::{FnTerm, TableTerm};
    use crate::engine::config::ResourceLimits;
    use crate::engine::error::ErrorKind;
    use crate::engine::semantics::{Combine, Objective};

    #[test]
    fn enumerates_every_configuration_in_score_order() {
        let mut system = EntitySystem::new();
        let a = system.add_entity("A", 2).unwrap();
        let b = system.add_entity("B", 2).unwrap();
        let terms: Vec<Box<dyn ScoringTerm>> = vec![Box::new(
            TableTerm::new("ab", vec![a, b], &system, vec![4.0, 1.0, 3.0, 2.0]).unwrap(),
        )];
        let config = InferenceConfig::builder().num_solutions(10).build().unwrap();
        let solutions = run(&system, &terms, &config).unwrap();
        let scores: Vec<f64> = solutions.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(solutions[0].states, vec![0, 1]);
    }

    #[test]
    fn score_applies_weights_and_semantics() {
        let mut system = EntitySystem::new();
        let a = system.add_entity("A", 3).unwrap();
        let entities = system.all_entities();
        let terms: Vec<Box<dyn ScoringTerm>> = vec![
            Box::new(FnTerm::new("double", vec![a], |s| s[0] as f64).with_weight(2.0)),
            Box::new(FnTerm::new("one", vec![a], |_| 1.0)),
        ];
        assert_eq!(score(&terms, ScoreSemantics::default(), &entities, &[2]), 5.0);
        let product = ScoreSemantics::new(Objective::Maximize, Combine::Product);
        assert_eq!(score(&terms, product, &entities, &[2]), 4.0);
    }

    #[test]
    fn refuses_oversized_systems() {
        let mut system = EntitySystem::new();
        for i in 0..4 {
            system.add_entity(&format!("E{}", i), 3).unwrap();
        }
        let config = InferenceConfig::builder()
            .num_solutions(1)
            .limits(ResourceLimits {
                max_domain_size: Some(80),
                max_assignments_per_node: None,
            })
            .build()
            .unwrap();
        let err = run(&system, &[], &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    }
}
