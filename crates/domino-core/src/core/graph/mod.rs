//! # Graph Module
//!
//! Structures describing which entities interact and how the problem is cut
//! into overlapping pieces for dynamic programming.
//!
//! - [`interaction`] - The [`interaction::InteractionGraph`]: one vertex per
//!   entity, one edge per pair of entities sharing a scoring term.
//! - [`triangulation`] - Greedy elimination orderings and the maximal cliques of
//!   the resulting chordal graph.
//! - [`junction_tree`] - The [`junction_tree::JunctionTree`] arena built from
//!   those cliques, or from a caller-supplied decomposition.
//!
//! Both graph structures are arenas indexed by plain integers; nodes never
//! hold references to each other.

use crate::core::models::ids::EntityId;
use thiserror::Error;

pub mod interaction;
pub mod junction_tree;
pub mod triangulation;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecompositionError {
    #[error("Cannot decompose an empty interaction graph")]
    EmptyGraph,

    #[error("A junction tree needs at least one node")]
    EmptyTree,

    #[error("Tree edge references node {node}, but the tree has only {len} nodes")]
    NodeOutOfRange { node: usize, len: usize },

    #[error("A tree with {nodes} nodes needs exactly {expected} edges, found {found}")]
    NotATree {
        nodes: usize,
        expected: usize,
        found: usize,
    },

    #[error("Node {node} is not connected to the root")]
    Disconnected { node: usize },

    #[error("Node {node} contains unknown entity {entity:?}")]
    UnknownEntity { node: usize, entity: EntityId },

    #[error("Entity '{name}' is not covered by any node")]
    UncoveredEntity { name: String },

    #[error("No node contains the support of scoring term '{term}'")]
    UncoveredTerm { term: String },

    #[error("No node contains all entities coupled by filter '{filter}'")]
    UncoveredFilter { filter: String },

    #[error("Entity '{name}' violates the running-intersection property")]
    RunningIntersection { name: String },
}
