use super::error::EngineError;
use crate::core::graph::junction_tree::{JunctionTree, NodeIndex};
use crate::core::models::assignment::Assignment;
use crate::core::models::ids::EntityId;
use crate::core::models::subset::Subset;
use std::collections::HashMap;

/// Lifecycle of one junction-tree node during the bottom-up pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Unvisited,
    Computing,
    Done,
}

/// Tracks the state of every node and enforces children-before-parents.
#[derive(Debug, Clone)]
pub struct NodeStates {
    states: Vec<NodeState>,
}

impl NodeStates {
    pub fn new(len: usize) -> Self {
        Self {
            states: vec![NodeState::Unvisited; len],
        }
    }

    pub fn get(&self, node: NodeIndex) -> Option<NodeState> {
        self.states.get(node).copied()
    }

    /// Moves `node` to `Computing`. Every child must already be `Done`.
    pub fn begin(&mut self, tree: &JunctionTree, node: NodeIndex) -> Result<(), EngineError> {
        match self.get(node) {
            Some(NodeState::Unvisited) => {}
            other => {
                return Err(EngineError::Internal(format!(
                    "node {} cannot start from state {:?}",
                    node, other
                )));
            }
        }
        let children = tree.node(node).map(|n| n.children.as_slice()).unwrap_or(&[]);
        if let Some(&child) = children
            .iter()
            .find(|&&c| self.get(c) != Some(NodeState::Done))
        {
            return Err(EngineError::Internal(format!(
                "node {} started before its child {} finished",
                node, child
            )));
        }
        self.states[node] = NodeState::Computing;
        Ok(())
    }

    /// Moves `node` from `Computing` to `Done`, after which its table is read-only.
    pub fn finish(&mut self, node: NodeIndex) -> Result<(), EngineError> {
        if self.get(node) != Some(NodeState::Computing) {
            return Err(EngineError::Internal(format!(
                "node {} finished without being computed",
                node
            )));
        }
        self.states[node] = NodeState::Done;
        Ok(())
    }

    pub fn all_done(&self) -> bool {
        self.states.iter().all(|&s| s == NodeState::Done)
    }
}

/// One full joint assignment over every entity, with its global score.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub entities: Subset,
    pub states: Vec<usize>,
    pub score: f64,
}

impl Solution {
    pub fn state_of(&self, entity: EntityId) -> Option<usize> {
        self.entities.position(entity).map(|p| self.states[p])
    }

    pub fn to_map(&self) -> HashMap<EntityId, usize> {
        self.entities.iter().zip(self.states.iter().copied()).collect()
    }

    pub fn to_assignment(&self) -> Assignment {
        Assignment::new(self.states.clone(), self.score)
    }
}
