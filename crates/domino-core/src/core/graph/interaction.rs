use crate::core::models::ids::EntityId;
use crate::core::models::system::{EntitySystem, ModelError};
use crate::core::scoring::term::{ScoringTerm, validate_term};
use itertools::Itertools;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, instrument};

/// Undirected graph over the entities of a system.
///
/// Vertices are stored in the system's canonical entity order and addressed
/// by a dense index; adjacency sets keep neighbour iteration deterministic.
#[derive(Debug, Clone, Default)]
pub struct InteractionGraph {
    vertices: Vec<EntityId>,
    index: HashMap<EntityId, usize>,
    adjacency: Vec<BTreeSet<usize>>,
}

impl InteractionGraph {
    /// Creates an edgeless graph with one vertex per entity of `system`.
    pub fn new(system: &EntitySystem) -> Self {
        let vertices: Vec<EntityId> = system.all_entities().iter().collect();
        let index = vertices.iter().enumerate().map(|(i, &id)| (id, i)).collect();
        let adjacency = vec![BTreeSet::new(); vertices.len()];
        Self {
            vertices,
            index,
            adjacency,
        }
    }

    /// Builds the interaction graph of a set of scoring terms.
    ///
    /// Every entity of the system becomes a vertex, including entities no term
    /// mentions. Two vertices are adjacent iff some term's support contains
    /// both.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelError`] for a term with an empty support set, a
    /// repeated support entity, or an entity unknown to `system`.
    #[instrument(skip_all, name = "interaction_graph")]
    pub fn build(
        system: &EntitySystem,
        terms: &[Box<dyn ScoringTerm>],
    ) -> Result<Self, ModelError> {
        let mut graph = Self::new(system);
        for term in terms {
            validate_term(term.as_ref(), system)?;
            graph.add_clique(term.support());
        }
        debug!(
            vertices = graph.num_vertices(),
            edges = graph.num_edges(),
            "Interaction graph built."
        );
        Ok(graph)
    }

    /// Connects every pair of the given entities. Unknown entities are ignored.
    pub fn add_clique(&mut self, entities: &[EntityId]) {
        let indices: Vec<usize> = entities
            .iter()
            .filter_map(|id| self.index.get(id).copied())
            .collect();
        for (a, b) in indices.into_iter().tuple_combinations() {
            self.add_edge_by_index(a, b);
        }
    }

    /// Adds the edge `a - b`. Returns `false` if either entity is unknown or
    /// the two are the same entity.
    pub fn add_edge(&mut self, a: EntityId, b: EntityId) -> bool {
        match (self.index.get(&a).copied(), self.index.get(&b).copied()) {
            (Some(i), Some(j)) if i != j => {
                self.add_edge_by_index(i, j);
                true
            }
            _ => false,
        }
    }

    fn add_edge_by_index(&mut self, i: usize, j: usize) {
        if i != j {
            self.adjacency[i].insert(j);
            self.adjacency[j].insert(i);
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_edges(&self) -> usize {
        self.adjacency.iter().map(BTreeSet::len).sum::<usize>() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertices(&self) -> &[EntityId] {
        &self.vertices
    }

    pub fn vertex(&self, index: usize) -> Option<EntityId> {
        self.vertices.get(index).copied()
    }

    pub fn index_of(&self, id: EntityId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn neighbors(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency.get(index).into_iter().flatten().copied()
    }

    pub(crate) fn adjacency(&self) -> &[BTreeSet<usize>] {
        &self.adjacency
    }

    pub fn has_edge(&self, a: EntityId, b: EntityId) -> bool {
        match (self.index_of(a), self.index_of(b)) {
            (Some(i), Some(j)) => self.adjacency[i].contains(&j),
            _ => false,
        }
    }

    /// Iterates every edge once, as `(smaller, larger)` in canonical order.
    pub fn edges(&self) -> impl Iterator<Item = (EntityId, EntityId)> + '_ {
        self.adjacency.iter().enumerate().flat_map(move |(i, nbrs)| {
            nbrs.range(i + 1..)
                .map(move |&j| (self.vertices[i], self.vertices[j]))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scoring::term::FnTerm;

    fn system_of(n: usize) -> (EntitySystem, Vec<EntityId>) {
        let mut system = EntitySystem::new();
        let ids = (0..n)
            .map(|i| system.add_entity(&format!("E{}", i), 2).unwrap())
            .collect();
        (system, ids)
    }

    fn term(name: &str, support: Vec<EntityId>) -> Box<dyn ScoringTerm> {
        Box::new(FnTerm::new(name, support, |_| 0.0))
    }

    #[test]
    fn edges_are_union_of_support_pairs() {
        let (system, e) = system_of(4);
        let terms = vec![
            term("t0", vec![e[0], e[1], e[2]]),
            term("t1", vec![e[2], e[3]]),
            term("t2", vec![e[1], e[0]]),
        ];
        let graph = InteractionGraph::build(&system, &terms).unwrap();
        assert_eq!(graph.num_vertices(), 4);
        assert_eq!(graph.num_edges(), 4);
        assert!(graph.has_edge(e[0], e[2]));
        assert!(graph.has_edge(e[3], e[2]));
        assert!(!graph.has_edge(e[0], e[3]));
        let edges: Vec<_> = graph.edges().collect();
        assert_eq!(edges.len(), 4);
        assert!(edges.iter().all(|(a, b)| a < b));
    }

    #[test]
    fn unary_terms_add_vertices_without_edges() {
        let (system, e) = system_of(2);
        let terms = vec![term("u0", vec![e[0]]), term("u1", vec![e[1]])];
        let graph = InteractionGraph::build(&system, &terms).unwrap();
        assert_eq!(graph.num_vertices(), 2);
        assert_eq!(graph.num_edges(), 0);
    }

    #[test]
    fn build_rejects_degenerate_term() {
        let (system, _) = system_of(2);
        let terms = vec![term("empty", vec![])];
        let result = InteractionGraph::build(&system, &terms);
        assert!(matches!(result, Err(ModelError::DegenerateTerm { term }) if term == "empty"));
    }

    #[test]
    fn add_edge_ignores_self_loops_and_unknown_entities() {
        let (system, e) = system_of(2);
        let (_, foreign) = system_of(3);
        let mut graph = InteractionGraph::new(&system);
        assert!(!graph.add_edge(e[0], e[0]));
        assert!(graph.add_edge(e[0], e[1]));
        assert_eq!(graph.num_edges(), 1);
        // Keys from another system may alias local ones, so only check an index past the end.
        assert!(!graph.add_edge(e[0], foreign[2]));
    }
}
