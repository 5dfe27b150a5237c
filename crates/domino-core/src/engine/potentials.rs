use super::cache::ScoreCache;
use super::config::TableMode;
use super::error::EngineError;
use super::semantics::ScoreSemantics;
use crate::core::graph::junction_tree::{JunctionTree, NodeIndex};
use crate::core::models::subset::Subset;
use crate::core::models::system::EntitySystem;
use crate::core::scoring::term::{ScoringTerm, validate_term};
use crate::core::utils::enumeration::MixedRadix;
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A term attached to a node, with the node positions of its support.
#[derive(Debug, Clone)]
struct Attached {
    term: usize,
    positions: Vec<usize>,
}

/// Local score tables of every junction-tree node.
///
/// Each scoring term is attached to exactly one node whose subset covers its
/// support. A node's score for a joint configuration combines the weighted
/// scores of its attached terms and then applies the node's own weight;
/// a node with no terms scores the identity of the combination operator.
pub struct Potentials<'t> {
    terms: &'t [Box<dyn ScoringTerm>],
    semantics: ScoreSemantics,
    attached: Vec<Vec<Attached>>,
    node_of_term: Vec<NodeIndex>,
    weights: Vec<f64>,
    radices: Vec<MixedRadix>,
    tables: Vec<Option<Vec<f64>>>,
    cache: ScoreCache,
}

impl<'t> Potentials<'t> {
    /// Attaches every term to a node and, in eager mode, materializes the tables.
    ///
    /// # Errors
    ///
    /// A term with an invalid support is a [`ModelError`]. A valid term that
    /// no node covers means the tree is inconsistent with the terms and is
    /// reported as [`EngineError::Internal`].
    #[instrument(skip_all, name = "potential_assembly", fields(terms = terms.len(), mode = ?mode))]
    pub fn assemble(
        tree: &JunctionTree,
        system: &EntitySystem,
        terms: &'t [Box<dyn ScoringTerm>],
        semantics: ScoreSemantics,
        mode: TableMode,
    ) -> Result<Self, EngineError> {
        let mut attached = vec![Vec::new(); tree.len()];
        let mut node_of_term = Vec::with_capacity(terms.len());
        for (index, term) in terms.iter().enumerate() {
            validate_term(term.as_ref(), system)?;
            let support: Subset = term.support().iter().copied().collect();
            let node = covering_node(tree, &support).ok_or_else(|| {
                EngineError::Internal(format!(
                    "scoring term '{}' (support {}) is not covered by any junction-tree node",
                    term.name(),
                    support
                ))
            })?;
            let subset = &tree.nodes()[node].subset;
            let positions = term
                .support()
                .iter()
                .map(|&id| subset.position(id))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| {
                    EngineError::Internal(format!(
                        "node {} does not contain the support of term '{}'",
                        node,
                        term.name()
                    ))
                })?;
            attached[node].push(Attached {
                term: index,
                positions,
            });
            node_of_term.push(node);
        }

        let radices: Vec<MixedRadix> = tree
            .nodes()
            .iter()
            .map(|n| MixedRadix::new(system.radices(&n.subset)))
            .collect();
        let weights = tree.nodes().iter().map(|n| n.weight).collect();

        let mut potentials = Self {
            terms,
            semantics,
            attached,
            node_of_term,
            weights,
            radices,
            tables: vec![None; tree.len()],
            cache: ScoreCache::new(),
        };

        if mode == TableMode::Eager {
            for node in 0..tree.len() {
                let table = potentials.materialize(node)?;
                potentials.tables[node] = Some(table);
            }
        }
        debug!(
            nodes = tree.len(),
            eager = mode == TableMode::Eager,
            "Potentials assembled."
        );
        Ok(potentials)
    }

    fn materialize(&self, node: NodeIndex) -> Result<Vec<f64>, EngineError> {
        let radix = &self.radices[node];
        let len = radix.len().ok_or_else(|| {
            EngineError::ResourceExhausted {
                node,
                resource: "potential table size",
                size: u128::MAX,
                limit: usize::MAX as u128,
            }
        })?;

        #[cfg(not(feature = "parallel"))]
        let table = (0..len)
            .map(|i| self.evaluate(node, &radix.decode(i), false))
            .collect();

        #[cfg(feature = "parallel")]
        let table = (0..len)
            .into_par_iter()
            .map(|i| self.evaluate(node, &radix.decode(i), false))
            .collect();

        Ok(table)
    }

    fn evaluate(&self, node: NodeIndex, states: &[usize], cached: bool) -> f64 {
        let semantics = self.semantics;
        let local = self.attached[node].iter().fold(semantics.identity(), |acc, a| {
            let restricted: Vec<usize> = a.positions.iter().map(|&p| states[p]).collect();
            let term = &self.terms[a.term];
            let score = if cached {
                self.cache
                    .get_or_insert_with(a.term, &restricted, || term.evaluate(&restricted))
            } else {
                term.evaluate(&restricted)
            };
            semantics.combine(acc, semantics.weighted(score.value, score.weight))
        });
        semantics.weighted(local, self.weights[node])
    }

    /// Local score of `node` at one joint configuration of its subset.
    pub fn get_score(&self, node: NodeIndex, states: &[usize]) -> f64 {
        match &self.tables[node] {
            Some(table) => table[self.radices[node].encode(states)],
            None => self.evaluate(node, states, true),
        }
    }

    /// Indices of the terms attached to `node`.
    pub fn terms_at(&self, node: NodeIndex) -> impl Iterator<Item = usize> + '_ {
        self.attached[node].iter().map(|a| a.term)
    }

    pub fn node_of_term(&self, term: usize) -> Option<NodeIndex> {
        self.node_of_term.get(term).copied()
    }

    pub fn radix(&self, node: NodeIndex) -> &MixedRadix {
        &self.radices[node]
    }

    pub fn is_eager(&self, node: NodeIndex) -> bool {
        self.tables[node].is_some()
    }

    /// Number of memoized term evaluations (lazy mode only).
    pub fn cached_evaluations(&self) -> usize {
        self.cache.len()
    }
}

/// The deepest node covering `support`; ties go to the smaller domain, then
/// the lower index.
fn covering_node(tree: &JunctionTree, support: &Subset) -> Option<NodeIndex> {
    tree.nodes()
        .iter()
        .enumerate()
        .filter(|(_, n)| support.is_subset_of(&n.subset))
        .min_by(|(i, a), (j, b)| {
            b.depth
                .cmp(&a.depth)
                .then(a.domain_size.cmp(&b.domain_size))
                .then(i.cmp(j))
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::interaction::InteractionGraph;
    use crate::core::graph::triangulation::EliminationHeuristic;
    use crate::core::models::ids::EntityId;
    use crate::core::models::system::ModelError;
    use crate::core::scoring::term::FnTerm;
    use crate::engine::semantics::{Combine, Objective};

    fn chain() -> (EntitySystem, Vec<EntityId>, Vec<Box<dyn ScoringTerm>>) {
        let mut system = EntitySystem::new();
        let e: Vec<EntityId> = (0..3)
            .map(|i| system.add_entity(&format!("E{}", i), 2).unwrap())
            .collect();
        let terms: Vec<Box<dyn ScoringTerm>> = vec![
            Box::new(FnTerm::new("e0e1", vec![e[0], e[1]], |s| (s[0] + 2 * s[1]) as f64)),
            Box::new(FnTerm::new("e2e1", vec![e[2], e[1]], |s| (10 * s[0] + s[1]) as f64)),
            Box::new(FnTerm::new("e1", vec![e[1]], |s| s[0] as f64).with_weight(100.0)),
        ];
        (system, e, terms)
    }

    fn tree_for(system: &EntitySystem, terms: &[Box<dyn ScoringTerm>]) -> JunctionTree {
        let graph = InteractionGraph::build(system, terms).unwrap();
        JunctionTree::decompose(&graph, system, EliminationHeuristic::MinDegree).unwrap()
    }

    #[test]
    fn every_term_lands_on_a_covering_node() {
        let (system, _, terms) = chain();
        let tree = tree_for(&system, &terms);
        for mode in [TableMode::Eager, TableMode::Lazy] {
            let potentials =
                Potentials::assemble(&tree, &system, &terms, ScoreSemantics::default(), mode)
                    .unwrap();
            for (t, term) in terms.iter().enumerate() {
                let node = potentials.node_of_term(t).unwrap();
                let support: Subset = term.support().iter().copied().collect();
                assert!(support.is_subset_of(&tree.nodes()[node].subset));
            }
            let attached: usize = (0..tree.len()).map(|n| potentials.terms_at(n).count()).sum();
            assert_eq!(attached, terms.len());
        }
    }

    #[test]
    fn node_scores_sum_to_the_global_score() {
        let (system, e, terms) = chain();
        let tree = tree_for(&system, &terms);
        let eager = Potentials::assemble(
            &tree,
            &system,
            &terms,
            ScoreSemantics::default(),
            TableMode::Eager,
        )
        .unwrap();
        let lazy = Potentials::assemble(
            &tree,
            &system,
            &terms,
            ScoreSemantics::default(),
            TableMode::Lazy,
        )
        .unwrap();

        let full = [1usize, 1, 0];
        let expected = (1 + 2) as f64 + (0 + 1) as f64 + 100.0;
        for potentials in [&eager, &lazy] {
            let total: f64 = tree
                .nodes()
                .iter()
                .enumerate()
                .map(|(n, node)| {
                    let states: Vec<usize> = node
                        .subset
                        .iter()
                        .map(|id| full[e.iter().position(|&x| x == id).unwrap()])
                        .collect();
                    potentials.get_score(n, &states)
                })
                .sum();
            assert_eq!(total, expected);
        }
        assert!(lazy.cached_evaluations() > 0);
        assert!(eager.is_eager(0) && !lazy.is_eager(0));
    }

    #[test]
    fn termless_node_scores_the_identity() {
        let mut system = EntitySystem::new();
        let a = system.add_entity("A", 2).unwrap();
        let b = system.add_entity("B", 3).unwrap();
        let terms: Vec<Box<dyn ScoringTerm>> =
            vec![Box::new(FnTerm::new("a", vec![a], |s| s[0] as f64 + 0.5))];
        let tree = JunctionTree::from_subsets(
            vec![Subset::new([a]), Subset::new([b])],
            &[(0, 1)],
            &system,
        )
        .unwrap();
        let product = ScoreSemantics::new(Objective::Maximize, Combine::Product);
        let potentials =
            Potentials::assemble(&tree, &system, &terms, product, TableMode::Eager).unwrap();
        for s in 0..3 {
            assert_eq!(potentials.get_score(1, &[s]), 1.0);
        }
        assert_eq!(potentials.get_score(0, &[1]), 1.5);

        let sum = Potentials::assemble(
            &tree,
            &system,
            &terms,
            ScoreSemantics::default(),
            TableMode::Eager,
        )
        .unwrap();
        assert_eq!(sum.get_score(1, &[2]), 0.0);
    }

    #[test]
    fn node_weight_scales_local_score() {
        let mut system = EntitySystem::new();
        let a = system.add_entity("A", 2).unwrap();
        let terms: Vec<Box<dyn ScoringTerm>> =
            vec![Box::new(FnTerm::new("a", vec![a], |s| s[0] as f64 + 1.0))];
        let mut tree = JunctionTree::from_subsets(vec![Subset::new([a])], &[], &system).unwrap();
        assert!(tree.set_node_weight(0, 3.0));
        let potentials = Potentials::assemble(
            &tree,
            &system,
            &terms,
            ScoreSemantics::default(),
            TableMode::Lazy,
        )
        .unwrap();
        assert_eq!(potentials.get_score(0, &[1]), 6.0);
    }

    #[test]
    fn uncovered_term_is_an_internal_error() {
        let mut system = EntitySystem::new();
        let a = system.add_entity("A", 2).unwrap();
        let b = system.add_entity("B", 2).unwrap();
        let terms: Vec<Box<dyn ScoringTerm>> =
            vec![Box::new(FnTerm::new("ab", vec![a, b], |_| 0.0))];
        let tree = JunctionTree::from_subsets(
            vec![Subset::new([a]), Subset::new([b])],
            &[(0, 1)],
            &system,
        )
        .unwrap();
        let result = Potentials::assemble(
            &tree,
            &system,
            &terms,
            ScoreSemantics::default(),
            TableMode::Eager,
        );
        assert!(matches!(result, Err(EngineError::Internal(msg)) if msg.contains("'ab'")));
    }

    #[test]
    fn degenerate_term_is_a_configuration_error() {
        let (system, _, mut terms) = chain();
        let tree = tree_for(&system, &terms);
        terms.push(Box::new(FnTerm::new("empty", vec![], |_| 0.0)));
        let result = Potentials::assemble(
            &tree,
            &system,
            &terms,
            ScoreSemantics::default(),
            TableMode::Eager,
        );
        assert!(matches!(
            result,
            Err(EngineError::Model {
                source: ModelError::DegenerateTerm { .. }
            })
        ));
    }
}
