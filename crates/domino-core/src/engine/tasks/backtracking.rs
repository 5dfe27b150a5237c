use super::elimination::{NodeTable, Pick};
use crate::core::graph::junction_tree::JunctionTree;
use crate::core::models::subset::Subset;
use crate::engine::error::EngineError;
use crate::engine::semantics::ScoreSemantics;
use crate::engine::state::Solution;
use tracing::{debug, instrument};

/// Rebuilds the best `num_solutions` joint assignments over `entities` from
/// finished node tables, best first.
///
/// Starting from the root's ranked completions, each solution descends
/// through the children recorded by its derivation and copies every node's
/// states into the full assignment. Overlapping nodes must agree on their
/// shared entities.
///
/// `tables` is indexed by node. An empty root table yields no solutions.
#[instrument(skip_all, name = "backtracking_task", fields(num_solutions = num_solutions))]
pub fn run(
    tree: &JunctionTree,
    tables: &[NodeTable],
    entities: &Subset,
    num_solutions: usize,
    semantics: ScoreSemantics,
) -> Result<Vec<Solution>, EngineError> {
    if tables.len() != tree.len() {
        return Err(EngineError::Internal(format!(
            "expected {} node tables, found {}",
            tree.len(),
            tables.len()
        )));
    }
    let root = &tables[tree.root()];

    let mut starts: Vec<(f64, Pick)> = root
        .entries
        .iter()
        .enumerate()
        .flat_map(|(entry, e)| {
            e.derivations
                .iter()
                .enumerate()
                .map(move |(rank, d)| (d.score, Pick { entry, rank }))
        })
        .collect();
    starts.sort_by(|a, b| semantics.compare(a.0, b.0).then_with(|| a.1.cmp(&b.1)));
    starts.truncate(num_solutions);

    let solutions = starts
        .into_iter()
        .map(|(score, pick)| descend(tree, tables, entities, pick, score))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(found = solutions.len(), "Back-tracking complete.");
    Ok(solutions)
}

fn descend(
    tree: &JunctionTree,
    tables: &[NodeTable],
    entities: &Subset,
    pick: Pick,
    score: f64,
) -> Result<Solution, EngineError> {
    let mut states: Vec<Option<usize>> = vec![None; entities.len()];
    let mut stack = vec![(tree.root(), pick)];

    while let Some((node, pick)) = stack.pop() {
        let jnode = tree
            .node(node)
            .ok_or_else(|| EngineError::Internal(format!("unknown node {}", node)))?;
        let entry = tables[node].entries.get(pick.entry).ok_or_else(|| {
            EngineError::Internal(format!("node {} has no entry {}", node, pick.entry))
        })?;
        let derivation = entry.derivations.get(pick.rank).ok_or_else(|| {
            EngineError::Internal(format!(
                "entry {} of node {} has no derivation {}",
                pick.entry, node, pick.rank
            ))
        })?;

        for (id, &state) in jnode.subset.iter().zip(&entry.states) {
            let slot = entities
                .position(id)
                .and_then(|p| states.get_mut(p))
                .ok_or_else(|| {
                    EngineError::Internal(format!("node {} holds an unknown entity {:?}", node, id))
                })?;
            match *slot {
                Some(existing) if existing != state => {
                    return Err(EngineError::Internal(format!(
                        "node {} disagrees with an ancestor on entity {:?}",
                        node, id
                    )));
                }
                _ => *slot = Some(state),
            }
        }

        if derivation.picks.len() != jnode.children.len() {
            return Err(EngineError::Internal(format!(
                "derivation at node {} picks {} children, expected {}",
                node,
                derivation.picks.len(),
                jnode.children.len()
            )));
        }
        stack.extend(jnode.children.iter().copied().zip(derivation.picks.iter().copied()));
    }

    let states = states
        .into_iter()
        .zip(entities.iter())
        .map(|(s, id)| {
            s.ok_or_else(|| {
                EngineError::Internal(format!("entity {:?} is not covered by any node", id))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Solution {
        entities: entities.clone(),
        states,
        score,
    })
}
