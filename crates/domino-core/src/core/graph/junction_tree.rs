use super::DecompositionError;
use super::interaction::InteractionGraph;
use super::triangulation::{EliminationHeuristic, triangulate};
use crate::core::models::ids::EntityId;
use crate::core::models::subset::Subset;
use crate::core::models::system::EntitySystem;
use crate::core::utils::disjoint_sets::DisjointSets;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, instrument};

pub type NodeIndex = usize;

/// One clique of the junction tree.
#[derive(Debug, Clone)]
pub struct JunctionNode {
    pub subset: Subset,
    pub parent: Option<NodeIndex>,
    pub children: Vec<NodeIndex>,
    /// Intersection with the parent's subset. Empty for the root.
    pub separator: Subset,
    pub depth: usize,
    pub domain_size: u128,
    /// Multiplier applied to this node's local potential.
    pub weight: f64,
}

/// Size figures of a decomposition, used to decide whether inference is
/// affordable before committing to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecompositionStats {
    pub nodes: usize,
    pub max_subset_len: usize,
    pub max_separator_len: usize,
    pub max_domain_size: u128,
    pub total_domain_size: u128,
}

/// A rooted tree of entity subsets satisfying the running-intersection
/// property. Node 0 is always the root.
#[derive(Debug, Clone)]
pub struct JunctionTree {
    nodes: Vec<JunctionNode>,
    post_order: Vec<NodeIndex>,
}

impl JunctionTree {
    pub const ROOT: NodeIndex = 0;

    /// Decomposes an interaction graph into a junction tree.
    ///
    /// The graph is triangulated with `heuristic`, its maximal cliques become
    /// nodes, and the nodes are linked by a maximum spanning tree over
    /// intersection sizes. Cliques from different connected components are
    /// then chained together with empty separators.
    ///
    /// # Errors
    ///
    /// Returns [`DecompositionError::EmptyGraph`] if the graph has no vertices.
    #[instrument(skip_all, name = "decompose", fields(heuristic = ?heuristic))]
    pub fn decompose(
        graph: &InteractionGraph,
        system: &EntitySystem,
        heuristic: EliminationHeuristic,
    ) -> Result<Self, DecompositionError> {
        if graph.is_empty() {
            return Err(DecompositionError::EmptyGraph);
        }
        let triangulation = triangulate(graph, system, heuristic);
        let subsets: Vec<Subset> = triangulation
            .cliques
            .iter()
            .map(|clique| clique.iter().filter_map(|&v| graph.vertex(v)).collect())
            .collect();
        debug!(
            cliques = subsets.len(),
            fill_edges = triangulation.fill_edges,
            "Graph triangulated."
        );

        let n = subsets.len();
        let mut candidates = Vec::new();
        for i in 0..n {
            for j in i + 1..n {
                let weight = subsets[i].intersection(&subsets[j]).len();
                if weight > 0 {
                    candidates.push((weight, i, j));
                }
            }
        }
        candidates.sort_by(|a, b| b.0.cmp(&a.0).then((a.1, a.2).cmp(&(b.1, b.2))));

        let mut components = DisjointSets::new(n);
        let mut edges = Vec::with_capacity(n.saturating_sub(1));
        for (_, i, j) in candidates {
            if components.union(i, j) {
                edges.push((i, j));
            }
        }
        for i in 1..n {
            if components.union(i - 1, i) {
                edges.push((i - 1, i));
            }
        }

        Self::link(subsets, &edges, system)
    }

    /// Builds a tree from a caller-supplied decomposition, skipping
    /// triangulation entirely. Node 0 becomes the root.
    ///
    /// # Errors
    ///
    /// Fails if the edges do not form a spanning tree, a subset names an
    /// unknown entity, some entity of `system` is not covered, or the
    /// running-intersection property does not hold.
    pub fn from_subsets(
        subsets: Vec<Subset>,
        edges: &[(NodeIndex, NodeIndex)],
        system: &EntitySystem,
    ) -> Result<Self, DecompositionError> {
        let tree = Self::link(subsets, edges, system)?;
        tree.verify(system)?;
        Ok(tree)
    }

    fn link(
        subsets: Vec<Subset>,
        edges: &[(NodeIndex, NodeIndex)],
        system: &EntitySystem,
    ) -> Result<Self, DecompositionError> {
        let n = subsets.len();
        if n == 0 {
            return Err(DecompositionError::EmptyTree);
        }
        if edges.len() != n - 1 {
            return Err(DecompositionError::NotATree {
                nodes: n,
                expected: n - 1,
                found: edges.len(),
            });
        }
        let mut adjacency = vec![Vec::new(); n];
        for &(a, b) in edges {
            for node in [a, b] {
                if node >= n {
                    return Err(DecompositionError::NodeOutOfRange { node, len: n });
                }
            }
            adjacency[a].push(b);
            adjacency[b].push(a);
        }

        let mut nodes: Vec<JunctionNode> = subsets
            .into_iter()
            .map(|subset| JunctionNode {
                domain_size: system.domain_size(&subset),
                subset,
                parent: None,
                children: Vec::new(),
                separator: Subset::empty(),
                depth: 0,
                weight: 1.0,
            })
            .collect();

        let mut visited = vec![false; n];
        let mut queue = VecDeque::from([Self::ROOT]);
        visited[Self::ROOT] = true;
        while let Some(node) = queue.pop_front() {
            let mut next: Vec<NodeIndex> = adjacency[node]
                .iter()
                .copied()
                .filter(|&c| !visited[c])
                .collect();
            next.sort_unstable();
            next.dedup();
            for &child in &next {
                visited[child] = true;
                let separator = nodes[child].subset.intersection(&nodes[node].subset);
                let depth = nodes[node].depth + 1;
                let child_node = &mut nodes[child];
                child_node.parent = Some(node);
                child_node.separator = separator;
                child_node.depth = depth;
                queue.push_back(child);
            }
            nodes[node].children = next;
        }
        if let Some(node) = visited.iter().position(|&v| !v) {
            return Err(DecompositionError::Disconnected { node });
        }

        let post_order = Self::compute_post_order(&nodes);
        Ok(Self { nodes, post_order })
    }

    fn compute_post_order(nodes: &[JunctionNode]) -> Vec<NodeIndex> {
        let mut order = Vec::with_capacity(nodes.len());
        let mut stack = vec![(Self::ROOT, false)];
        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                order.push(node);
            } else {
                stack.push((node, true));
                for &child in nodes[node].children.iter().rev() {
                    stack.push((child, false));
                }
            }
        }
        order
    }

    /// Checks coverage and the running-intersection property.
    ///
    /// The nodes containing a given entity must form a connected subtree.
    /// In a rooted tree that holds iff exactly one of those nodes has a
    /// parent that does not also contain the entity.
    pub fn verify(&self, system: &EntitySystem) -> Result<(), DecompositionError> {
        let mut occurrences: HashMap<EntityId, (usize, usize)> = HashMap::new();
        for (index, node) in self.nodes.iter().enumerate() {
            for entity in node.subset.iter() {
                if !system.contains(entity) {
                    return Err(DecompositionError::UnknownEntity {
                        node: index,
                        entity,
                    });
                }
                let entry = occurrences.entry(entity).or_default();
                entry.0 += 1;
                let linked = node
                    .parent
                    .is_some_and(|p| self.nodes[p].subset.contains(entity));
                if !linked {
                    entry.1 += 1;
                }
            }
        }
        for (entity, _) in system.entities_iter() {
            match occurrences.get(&entity) {
                None => {
                    return Err(DecompositionError::UncoveredEntity {
                        name: system.name_of(entity),
                    });
                }
                Some(&(_, tops)) if tops != 1 => {
                    return Err(DecompositionError::RunningIntersection {
                        name: system.name_of(entity),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> NodeIndex {
        Self::ROOT
    }

    pub fn node(&self, index: NodeIndex) -> Option<&JunctionNode> {
        self.nodes.get(index)
    }

    /// Whether some node contains every entity of `subset`.
    pub fn covers(&self, subset: &Subset) -> bool {
        self.nodes.iter().any(|n| subset.is_subset_of(&n.subset))
    }

    pub fn nodes(&self) -> &[JunctionNode] {
        &self.nodes
    }

    /// Children before parents; the root comes last.
    pub fn post_order(&self) -> &[NodeIndex] {
        &self.post_order
    }

    /// Nodes grouped by depth, deepest level first.
    pub fn levels(&self) -> Vec<Vec<NodeIndex>> {
        let max_depth = self.nodes.iter().map(|n| n.depth).max().unwrap_or(0);
        let mut levels = vec![Vec::new(); max_depth + 1];
        for (index, node) in self.nodes.iter().enumerate() {
            levels[max_depth - node.depth].push(index);
        }
        levels
    }

    /// Sets the multiplier applied to a node's local potential. Returns
    /// `false` for an unknown node.
    pub fn set_node_weight(&mut self, index: NodeIndex, weight: f64) -> bool {
        match self.nodes.get_mut(index) {
            Some(node) => {
                node.weight = weight;
                true
            }
            None => false,
        }
    }

    /// Node path from `a` to `b`, both endpoints included.
    pub fn path(&self, a: NodeIndex, b: NodeIndex) -> Vec<NodeIndex> {
        let (mut x, mut y) = (a, b);
        let mut front = Vec::new();
        let mut back = Vec::new();
        while self.nodes[x].depth > self.nodes[y].depth {
            front.push(x);
            x = self.nodes[x].parent.unwrap_or(Self::ROOT);
        }
        while self.nodes[y].depth > self.nodes[x].depth {
            back.push(y);
            y = self.nodes[y].parent.unwrap_or(Self::ROOT);
        }
        while x != y {
            front.push(x);
            back.push(y);
            x = self.nodes[x].parent.unwrap_or(Self::ROOT);
            y = self.nodes[y].parent.unwrap_or(Self::ROOT);
        }
        front.push(x);
        front.extend(back.into_iter().rev());
        front
    }

    pub fn stats(&self) -> DecompositionStats {
        DecompositionStats {
            nodes: self.nodes.len(),
            max_subset_len: self.nodes.iter().map(|n| n.subset.len()).max().unwrap_or(0),
            max_separator_len: self
                .nodes
                .iter()
                .map(|n| n.separator.len())
                .max()
                .unwrap_or(0),
            max_domain_size: self.nodes.iter().map(|n| n.domain_size).max().unwrap_or(0),
            total_domain_size: self
                .nodes
                .iter()
                .fold(0u128, |acc, n| acc.saturating_add(n.domain_size)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn setup(n: usize, sizes: usize) -> (EntitySystem, Vec<EntityId>) {
        let mut system = EntitySystem::new();
        let ids = (0..n)
            .map(|i| system.add_entity(&format!("V{}", i), sizes).unwrap())
            .collect();
        (system, ids)
    }

    fn graph(system: &EntitySystem, ids: &[EntityId], edges: &[(usize, usize)]) -> InteractionGraph {
        let mut graph = InteractionGraph::new(system);
        for &(a, b) in edges {
            graph.add_edge(ids[a], ids[b]);
        }
        graph
    }

    fn running_intersection_holds(tree: &JunctionTree) -> bool {
        for a in 0..tree.len() {
            for b in 0..tree.len() {
                let shared = tree.nodes()[a].subset.intersection(&tree.nodes()[b].subset);
                for c in tree.path(a, b) {
                    if !shared.is_subset_of(&tree.nodes()[c].subset) {
                        return false;
                    }
                }
            }
        }
        true
    }

    #[test]
    fn decompose_rejects_empty_graph() {
        let system = EntitySystem::new();
        let graph = InteractionGraph::new(&system);
        let result = JunctionTree::decompose(&graph, &system, EliminationHeuristic::MinDegree);
        assert_eq!(result.unwrap_err(), DecompositionError::EmptyGraph);
    }

    #[test]
    fn chain_decomposes_into_pairs_with_singleton_separators() {
        let (system, ids) = setup(4, 3);
        let g = graph(&system, &ids, &[(0, 1), (1, 2), (2, 3)]);
        let tree = JunctionTree::decompose(&g, &system, EliminationHeuristic::MinDegree).unwrap();
        assert_eq!(tree.len(), 3);
        assert!(tree.verify(&system).is_ok());
        for node in tree.nodes().iter().skip(1) {
            assert_eq!(node.separator.len(), 1);
        }
        let stats = tree.stats();
        assert_eq!(stats.max_subset_len, 2);
        assert_eq!(stats.max_domain_size, 9);
        assert_eq!(stats.total_domain_size, 27);
        assert_eq!(*tree.post_order().last().unwrap(), JunctionTree::ROOT);
    }

    #[test]
    fn disconnected_components_are_joined_with_empty_separators() {
        let (system, ids) = setup(4, 2);
        let g = graph(&system, &ids, &[(0, 1), (2, 3)]);
        let tree = JunctionTree::decompose(&g, &system, EliminationHeuristic::MinFill).unwrap();
        assert_eq!(tree.len(), 2);
        assert!(tree.nodes()[1].separator.is_empty());
        assert!(tree.verify(&system).is_ok());
    }

    #[test]
    fn post_order_visits_children_before_parents() {
        let (system, ids) = setup(5, 2);
        let g = graph(&system, &ids, &[(0, 1), (1, 2), (1, 3), (3, 4)]);
        let tree = JunctionTree::decompose(&g, &system, EliminationHeuristic::MinDegree).unwrap();
        let position: HashMap<NodeIndex, usize> = tree
            .post_order()
            .iter()
            .enumerate()
            .map(|(i, &n)| (n, i))
            .collect();
        assert_eq!(position.len(), tree.len());
        for (index, node) in tree.nodes().iter().enumerate() {
            if let Some(parent) = node.parent {
                assert!(position[&index] < position[&parent]);
            }
        }
        let levels = tree.levels();
        assert_eq!(levels.iter().map(Vec::len).sum::<usize>(), tree.len());
        assert_eq!(levels.last().unwrap(), &vec![JunctionTree::ROOT]);
    }

    #[test]
    fn from_subsets_accepts_valid_tree() {
        let (system, ids) = setup(3, 2);
        let subsets = vec![
            Subset::new([ids[0], ids[1]]),
            Subset::new([ids[1], ids[2]]),
        ];
        let tree = JunctionTree::from_subsets(subsets, &[(1, 0)], &system).unwrap();
        assert_eq!(tree.nodes()[1].parent, Some(0));
        assert_eq!(tree.nodes()[0].children, vec![1]);
        assert_eq!(tree.nodes()[1].separator.as_slice(), &[ids[1]]);
    }

    #[test]
    fn from_subsets_rejects_running_intersection_violation() {
        let (system, ids) = setup(3, 2);
        let subsets = vec![
            Subset::new([ids[0], ids[1]]),
            Subset::new([ids[2]]),
            Subset::new([ids[0], ids[2]]),
        ];
        let result = JunctionTree::from_subsets(subsets, &[(0, 1), (1, 2)], &system);
        assert!(matches!(
            result,
            Err(DecompositionError::RunningIntersection { name }) if name == "V0"
        ));
    }

    #[test]
    fn from_subsets_rejects_bad_shapes() {
        let (system, ids) = setup(2, 2);
        let two = || vec![Subset::new([ids[0]]), Subset::new([ids[1]])];
        assert!(matches!(
            JunctionTree::from_subsets(two(), &[], &system),
            Err(DecompositionError::NotATree { found: 0, .. })
        ));
        assert!(matches!(
            JunctionTree::from_subsets(two(), &[(0, 5)], &system),
            Err(DecompositionError::NodeOutOfRange { node: 5, .. })
        ));
        assert!(matches!(
            JunctionTree::from_subsets(two(), &[(1, 1)], &system),
            Err(DecompositionError::Disconnected { node: 1 })
        ));
        assert!(matches!(
            JunctionTree::from_subsets(vec![Subset::new([ids[0]])], &[], &system),
            Err(DecompositionError::UncoveredEntity { .. })
        ));
        assert_eq!(
            JunctionTree::from_subsets(vec![], &[], &system).unwrap_err(),
            DecompositionError::EmptyTree
        );
    }

    #[test]
    fn path_walks_through_common_ancestor() {
        let (system, ids) = setup(3, 2);
        let subsets = vec![
            Subset::new([ids[1]]),
            Subset::new([ids[0], ids[1]]),
            Subset::new([ids[1], ids[2]]),
        ];
        let tree = JunctionTree::from_subsets(subsets, &[(0, 1), (0, 2)], &system).unwrap();
        assert_eq!(tree.path(1, 2), vec![1, 0, 2]);
        assert_eq!(tree.path(2, 2), vec![2]);
        assert_eq!(tree.path(0, 1), vec![0, 1]);
    }

    proptest! {
        #[test]
        fn decomposition_satisfies_running_intersection(
            n in 1usize..9,
            raw_edges in proptest::collection::vec((0usize..9, 0usize..9), 0..20),
            heuristic in prop_oneof![
                Just(EliminationHeuristic::MinDegree),
                Just(EliminationHeuristic::MinFill),
                Just(EliminationHeuristic::MinDomain),
            ],
        ) {
            let (system, ids) = setup(n, 2);
            let edges: Vec<(usize, usize)> = raw_edges
                .into_iter()
                .filter(|&(a, b)| a < n && b < n)
                .collect();
            let g = graph(&system, &ids, &edges);
            let tree = JunctionTree::decompose(&g, &system, heuristic).unwrap();
            prop_assert!(tree.verify(&system).is_ok());
            prop_assert!(running_intersection_holds(&tree));
            for &(a, b) in &edges {
                if a != b {
                    let pair = Subset::new([ids[a], ids[b]]);
                    prop_assert!(tree.nodes().iter().any(|node| pair.is_subset_of(&node.subset)));
                }
            }
        }
    }
}
