use crate::core::graph::junction_tree::{JunctionTree, NodeIndex};
use crate::core::models::assignment::Assignment;
use crate::core::models::subset::restrict;
use crate::engine::containers::Insertion;
use crate::engine::context::InferenceContext;
use crate::engine::error::EngineError;
use crate::engine::filters::{Candidate, NodeFilters};
use crate::engine::potentials::Potentials;
use crate::engine::semantics::ScoreSemantics;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use tracing::{debug, instrument, trace};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Joint configurations evaluated between two rounds of container insertion.
const CHUNK_SIZE: usize = 4096;

/// Reference to the `rank`-th best completion of entry `entry` of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pick {
    pub entry: usize,
    pub rank: usize,
}

/// One way to complete a node's subtree: its combined score and the
/// completion chosen for each child, in child order.
#[derive(Debug, Clone, PartialEq)]
pub struct Derivation {
    pub score: f64,
    pub picks: Vec<Pick>,
}

/// A retained joint configuration with its best subtree completions, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct TableEntry {
    pub states: Vec<usize>,
    pub derivations: Vec<Derivation>,
}

/// A subtree completion as seen from the parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Completion {
    pub score: f64,
    pub pick: Pick,
}

/// Counters of one node's elimination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    pub domain_size: u128,
    pub enumerated: usize,
    pub filtered: usize,
    pub infeasible: usize,
    pub stored: usize,
    /// Feasible assignments the container discarded.
    pub dropped: usize,
    pub retained: usize,
}

/// The finished, read-only result of eliminating a node.
#[derive(Debug, Clone)]
pub struct NodeTable {
    pub node: NodeIndex,
    pub entries: Vec<TableEntry>,
    pub stats: NodeStats,
    index: HashMap<Vec<usize>, Vec<Completion>>,
}

impl NodeTable {
    /// The best completions whose restriction to the parent separator is `key`.
    pub fn completions(&self, key: &[usize]) -> Option<&[Completion]> {
        self.index.get(key).map(Vec::as_slice)
    }

    pub fn separator_keys(&self) -> impl Iterator<Item = &Vec<usize>> {
        self.index.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct Scored {
    states: Vec<usize>,
    derivations: Vec<Derivation>,
}

enum Outcome {
    Filtered,
    Infeasible,
    Scored(Scored),
}

/// Eliminates one node: enumerates its joint configurations, combines each
/// with the best completions of its children, and keeps what its container
/// and filters allow.
///
/// A configuration for which some child has no completion with a matching
/// separator restriction is infeasible and skipped.
///
/// # Errors
///
/// [`EngineError::ResourceExhausted`] when the node's domain or retained
/// assignment count exceeds a configured ceiling, [`EngineError::Container`]
/// for storage failures, and [`EngineError::Internal`] for inconsistent
/// inputs.
#[instrument(skip_all, name = "eliminate_node", fields(node = node))]
pub fn run(
    node: NodeIndex,
    tree: &JunctionTree,
    potentials: &Potentials<'_>,
    filters: &NodeFilters<'_>,
    children: &[&NodeTable],
    context: &InferenceContext<'_>,
) -> Result<NodeTable, EngineError> {
    let config = context.config;
    let semantics = context.semantics();
    let k = config.num_solutions;
    let jnode = tree
        .node(node)
        .ok_or_else(|| EngineError::Internal(format!("unknown junction-tree node {}", node)))?;
    if jnode.children.len() != children.len() {
        return Err(EngineError::Internal(format!(
            "node {} has {} children but {} tables were supplied",
            node,
            jnode.children.len(),
            children.len()
        )));
    }

    if let Some(limit) = config.limits.max_domain_size {
        if jnode.domain_size > limit as u128 {
            return Err(EngineError::ResourceExhausted {
                node,
                resource: "domain size",
                size: jnode.domain_size,
                limit: limit as u128,
            });
        }
    }
    let radix = potentials.radix(node);
    let len = radix.len().ok_or(EngineError::ResourceExhausted {
        node,
        resource: "domain size",
        size: jnode.domain_size,
        limit: usize::MAX as u128,
    })?;

    let child_positions = jnode
        .children
        .iter()
        .map(|&c| {
            tree.node(c)
                .and_then(|child| jnode.subset.positions_of(&child.separator))
                .ok_or_else(|| {
                    EngineError::Internal(format!(
                        "separator of node {} is not contained in parent {}",
                        c, node
                    ))
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut container = config
        .storage
        .create(node, jnode.subset.as_slice(), semantics)
        .map_err(|source| EngineError::Container { node, source })?;
    let mut derivations_by_states: HashMap<Vec<usize>, Vec<Derivation>> = HashMap::new();
    let mut stats = NodeStats {
        domain_size: jnode.domain_size,
        ..NodeStats::default()
    };
    let is_root = node == tree.root();

    let evaluate = |index: usize, retained: usize| -> Outcome {
        let states = radix.decode(index);
        let candidate = Candidate {
            states: &states,
            score: None,
            retained,
        };
        if !filters.accepts(&candidate, context) {
            trace!(?states, "Rejected before scoring.");
            return Outcome::Filtered;
        }

        let local = potentials.get_score(node, &states);
        let mut lists = Vec::with_capacity(children.len());
        for (child, positions) in children.iter().zip(&child_positions) {
            match child.completions(&restrict(&states, positions)) {
                Some(list) => lists.push(list),
                None => return Outcome::Infeasible,
            }
        }
        let derivations = k_best(local, &lists, k, semantics);
        let Some(best) = derivations.first().map(|d| d.score) else {
            return Outcome::Infeasible;
        };

        let candidate = Candidate {
            states: &states,
            score: Some(best),
            retained,
        };
        if !filters.accepts(&candidate, context) {
            trace!(?states, score = best, "Rejected after scoring.");
            return Outcome::Filtered;
        }
        Outcome::Scored(Scored {
            states,
            derivations,
        })
    };

    for start in (0..len).step_by(CHUNK_SIZE) {
        let end = (start + CHUNK_SIZE).min(len);
        let retained = container.len();

        #[cfg(not(feature = "parallel"))]
        let outcomes: Vec<Outcome> = (start..end).map(|i| evaluate(i, retained)).collect();

        #[cfg(feature = "parallel")]
        let outcomes: Vec<Outcome> = (start..end)
            .into_par_iter()
            .map(|i| evaluate(i, retained))
            .collect();

        stats.enumerated += end - start;
        for outcome in outcomes {
            let scored = match outcome {
                Outcome::Filtered => {
                    stats.filtered += 1;
                    continue;
                }
                Outcome::Infeasible => {
                    stats.infeasible += 1;
                    continue;
                }
                Outcome::Scored(scored) => scored,
            };
            let best = scored.derivations[0].score;
            let insertion = container
                .insert(Assignment::new(scored.states.clone(), best))
                .map_err(|source| EngineError::Container { node, source })?;
            match insertion {
                Insertion::Added => {}
                Insertion::Replaced(evicted) => {
                    derivations_by_states.remove(&evicted.states);
                    stats.dropped += 1;
                }
                Insertion::Rejected => {
                    stats.dropped += 1;
                    continue;
                }
                Insertion::Duplicate => continue,
            }
            stats.stored += 1;
            if is_root && k == 1 {
                context.tighten_bound(best);
            }
            derivations_by_states.insert(scored.states, scored.derivations);

            if let Some(limit) = config.limits.max_assignments_per_node {
                if container.len() > limit {
                    return Err(EngineError::ResourceExhausted {
                        node,
                        resource: "retained assignments",
                        size: container.len() as u128,
                        limit: limit as u128,
                    });
                }
            }
        }
    }

    container
        .flush()
        .map_err(|source| EngineError::Container { node, source })?;
    let retained = container
        .assignments()
        .map_err(|source| EngineError::Container { node, source })?;
    if stats.stored > 0 && retained.is_empty() {
        return Err(EngineError::Internal(format!(
            "node {} accepted {} assignments but retained none",
            node, stats.stored
        )));
    }
    stats.retained = retained.len();

    let entries = retained
        .into_iter()
        .map(|assignment| {
            derivations_by_states
                .remove(&assignment.states)
                .map(|derivations| TableEntry {
                    states: assignment.states,
                    derivations,
                })
                .ok_or_else(|| {
                    EngineError::Internal(format!(
                        "node {} retained an assignment it never scored",
                        node
                    ))
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let separator_positions = jnode.subset.positions_of(&jnode.separator).ok_or_else(|| {
        EngineError::Internal(format!("separator of node {} is not in its subset", node))
    })?;
    let index = build_index(&entries, &separator_positions, k, semantics);

    debug!(
        domain_size = stats.domain_size,
        enumerated = stats.enumerated,
        filtered = stats.filtered,
        infeasible = stats.infeasible,
        retained = stats.retained,
        separator_keys = index.len(),
        "Node eliminated."
    );
    Ok(NodeTable {
        node,
        entries,
        stats,
        index,
    })
}

/// Groups every completion by its separator restriction and keeps the `k`
/// best per key.
fn build_index(
    entries: &[TableEntry],
    separator_positions: &[usize],
    k: usize,
    semantics: ScoreSemantics,
) -> HashMap<Vec<usize>, Vec<Completion>> {
    let mut index: HashMap<Vec<usize>, Vec<Completion>> = HashMap::new();
    for (entry_index, entry) in entries.iter().enumerate() {
        let key = restrict(&entry.states, separator_positions);
        let list = index.entry(key).or_default();
        for (rank, derivation) in entry.derivations.iter().enumerate() {
            list.push(Completion {
                score: derivation.score,
                pick: Pick {
                    entry: entry_index,
                    rank,
                },
            });
        }
    }
    for list in index.values_mut() {
        list.sort_by(|a, b| {
            semantics
                .compare(a.score, b.score)
                .then_with(|| a.pick.cmp(&b.pick))
        });
        list.truncate(k);
    }
    index
}

struct Frontier {
    score: f64,
    ranks: Vec<usize>,
    semantics: ScoreSemantics,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Better scores compare greater so the max-heap pops them first.
impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.semantics
            .compare(other.score, self.score)
            .then_with(|| other.ranks.cmp(&self.ranks))
    }
}

/// The `k` best ways to combine `local` with one completion from each list.
///
/// Each list must be sorted best-first. Starting from the all-best
/// combination, successors are generated by advancing one list at a time;
/// because combining with a worse completion never yields a better score,
/// they pop from the heap in best-first order.
pub(crate) fn k_best(
    local: f64,
    lists: &[&[Completion]],
    k: usize,
    semantics: ScoreSemantics,
) -> Vec<Derivation> {
    if lists.iter().any(|l| l.is_empty()) || k == 0 {
        return Vec::new();
    }
    let score_of = |ranks: &[usize]| {
        lists
            .iter()
            .zip(ranks)
            .fold(local, |acc, (list, &r)| semantics.combine(acc, list[r].score))
    };

    let start = vec![0; lists.len()];
    let mut heap = BinaryHeap::new();
    let mut seen = HashSet::new();
    heap.push(Frontier {
        score: score_of(&start),
        ranks: start.clone(),
        semantics,
    });
    seen.insert(start);

    let mut out = Vec::with_capacity(k.min(64));
    while out.len() < k {
        let Some(Frontier { score, ranks, .. }) = heap.pop() else {
            break;
        };
        for i in 0..lists.len() {
            if ranks[i] + 1 < lists[i].len() {
                let mut next = ranks.clone();
                next[i] += 1;
                if seen.insert(next.clone()) {
                    heap.push(Frontier {
                        score: score_of(&next),
                        ranks: next,
                        semantics,
                    });
                }
            }
        }
        out.push(Derivation {
            score,
            picks: lists
                .iter()
                .zip(&ranks)
                .map(|(list, &r)| list[r].pick)
                .collect(),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::semantics::{Combine, Objective};

    fn list(scores: &[f64]) -> Vec<Completion> {
        scores
            .iter()
            .enumerate()
            .map(|(i, &score)| Completion {
                score,
                pick: Pick { entry: i, rank: 0 },
            })
            .collect()
    }

    #[test]
    fn k_best_without_children_returns_the_local_score() {
        let out = k_best(2.5, &[], 3, ScoreSemantics::default());
        assert_eq!(
            out,
            vec![Derivation {
                score: 2.5,
                picks: vec![]
            }]
        );
    }

    #[test]
    fn k_best_enumerates_sums_in_order() {
        let a = list(&[0.0, 1.0, 5.0]);
        let b = list(&[0.0, 2.0]);
        let out = k_best(10.0, &[&a, &b], 4, ScoreSemantics::default());
        let scores: Vec<f64> = out.iter().map(|d| d.score).collect();
        assert_eq!(scores, vec![10.0, 11.0, 12.0, 13.0]);
        assert_eq!(out[1].picks, vec![Pick { entry: 1, rank: 0 }, Pick { entry: 0, rank: 0 }]);
    }

    #[test]
    fn k_best_is_exhaustive_when_k_is_large() {
        let a = list(&[1.0, 2.0]);
        let b = list(&[1.0, 3.0]);
        let out = k_best(0.0, &[&a, &b], 10, ScoreSemantics::default());
        assert_eq!(out.len(), 4);
        let mut picks: Vec<_> = out.iter().map(|d| d.picks.clone()).collect();
        picks.sort();
        picks.dedup();
        assert_eq!(picks.len(), 4);
    }

    #[test]
    fn k_best_handles_products_under_maximization() {
        let semantics = ScoreSemantics::new(Objective::Maximize, Combine::Product);
        let a = list(&[0.9, 0.1]);
        let b = list(&[0.5, 0.4]);
        let out = k_best(1.0, &[&a, &b], 2, semantics);
        assert!((out[0].score - 0.45).abs() < 1e-12);
        assert!((out[1].score - 0.36).abs() < 1e-12);
    }

    #[test]
    fn k_best_with_an_empty_list_is_infeasible() {
        let a = list(&[1.0]);
        let empty: Vec<Completion> = Vec::new();
        assert!(k_best(0.0, &[&a, &empty], 2, ScoreSemantics::default()).is_empty());
    }

    #[test]
    fn build_index_keeps_k_best_per_key() {
        let entries = vec![
            TableEntry {
                states: vec![0, 0],
                derivations: vec![Derivation {
                    score: 3.0,
                    picks: vec![],
                }],
            },
            TableEntry {
                states: vec![1, 0],
                derivations: vec![
                    Derivation {
                        score: 1.0,
                        picks: vec![],
                    },
                    Derivation {
                        score: 2.0,
                        picks: vec![],
                    },
                ],
            },
            TableEntry {
                states: vec![1, 1],
                derivations: vec![Derivation {
                    score: 0.5,
                    picks: vec![],
                }],
            },
        ];
        let index = build_index(&entries, &[1], 2, ScoreSemantics::default());
        assert_eq!(index.len(), 2);
        let zero: Vec<(f64, Pick)> = index[&vec![0]].iter().map(|c| (c.score, c.pick)).collect();
        assert_eq!(
            zero,
            vec![
                (1.0, Pick { entry: 1, rank: 0 }),
                (2.0, Pick { entry: 1, rank: 1 })
            ]
        );
        assert_eq!(index[&vec![1]].len(), 1);
    }
}
