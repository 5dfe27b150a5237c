use super::interaction::InteractionGraph;
use crate::core::models::system::EntitySystem;
use serde::Deserialize;
use std::collections::BTreeSet;

/// Greedy rule used to pick the next vertex to eliminate.
///
/// Every rule yields a valid chordal supergraph; they differ only in the
/// size of the cliques produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EliminationHeuristic {
    /// Fewest remaining neighbours.
    #[default]
    MinDegree,
    /// Fewest fill edges introduced.
    MinFill,
    /// Smallest joint domain of the vertex and its remaining neighbours.
    MinDomain,
}

/// Result of eliminating every vertex of an interaction graph.
#[derive(Debug, Clone)]
pub struct Triangulation {
    /// Vertex indices in elimination order.
    pub order: Vec<usize>,
    /// Maximal cliques of the triangulated graph, as sorted vertex indices.
    pub cliques: Vec<Vec<usize>>,
    /// Number of edges added to make the graph chordal.
    pub fill_edges: usize,
}

/// Triangulates `graph` by greedy vertex elimination.
///
/// Ties are broken by the lowest vertex index, so the result is
/// deterministic for a given graph and heuristic.
pub fn triangulate(
    graph: &InteractionGraph,
    system: &EntitySystem,
    heuristic: EliminationHeuristic,
) -> Triangulation {
    let n = graph.num_vertices();
    let mut adjacency: Vec<BTreeSet<usize>> = graph.adjacency().to_vec();
    let sizes: Vec<usize> = graph
        .vertices()
        .iter()
        .map(|&id| system.num_configurations(id).unwrap_or(0))
        .collect();
    let mut eliminated = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut elimination_cliques = Vec::with_capacity(n);
    let mut fill_edges = 0;

    for _ in 0..n {
        let Some(v) = (0..n)
            .filter(|&v| !eliminated[v])
            .min_by_key(|&v| (cost(v, &adjacency, &sizes, heuristic), v))
        else {
            break;
        };

        let neighbors: Vec<usize> = adjacency[v].iter().copied().collect();
        for (i, &a) in neighbors.iter().enumerate() {
            for &b in &neighbors[i + 1..] {
                if adjacency[a].insert(b) {
                    adjacency[b].insert(a);
                    fill_edges += 1;
                }
            }
        }
        for &u in &neighbors {
            adjacency[u].remove(&v);
        }

        let mut clique = neighbors;
        clique.push(v);
        clique.sort_unstable();
        elimination_cliques.push(clique);
        eliminated[v] = true;
        order.push(v);
    }

    Triangulation {
        order,
        cliques: maximal_cliques(elimination_cliques),
        fill_edges,
    }
}

fn cost(
    v: usize,
    adjacency: &[BTreeSet<usize>],
    sizes: &[usize],
    heuristic: EliminationHeuristic,
) -> u128 {
    let nbrs = &adjacency[v];
    match heuristic {
        EliminationHeuristic::MinDegree => nbrs.len() as u128,
        EliminationHeuristic::MinFill => {
            let list: Vec<usize> = nbrs.iter().copied().collect();
            let mut missing = 0u128;
            for (i, &a) in list.iter().enumerate() {
                for &b in &list[i + 1..] {
                    if !adjacency[a].contains(&b) {
                        missing += 1;
                    }
                }
            }
            missing
        }
        EliminationHeuristic::MinDomain => nbrs
            .iter()
            .chain(std::iter::once(&v))
            .fold(1u128, |acc, &u| acc.saturating_mul(sizes[u] as u128)),
    }
}

/// Drops every clique contained in another one. Of two identical cliques the
/// first survives.
fn maximal_cliques(cliques: Vec<Vec<usize>>) -> Vec<Vec<usize>> {
    let sets: Vec<BTreeSet<usize>> = cliques.iter().map(|c| c.iter().copied().collect()).collect();
    cliques
        .into_iter()
        .enumerate()
        .filter(|(i, _)| {
            !sets.iter().enumerate().any(|(j, other)| {
                j != *i
                    && sets[*i].is_subset(other)
                    && (sets[*i].len() < other.len() || j < *i)
            })
        })
        .map(|(_, c)| c)
        .collect()
}
