//! Pluggable stores for the assignments retained at a junction-tree node.
//!
//! Every store exposes the same [`AssignmentContainer`] interface; they differ
//! only in storage medium and in which assignments survive once a bound is
//! reached.

use super::config::StorageConfig;
use super::semantics::ScoreSemantics;
use crate::core::graph::junction_tree::NodeIndex;
use crate::core::io::records::RecordError;
use crate::core::models::assignment::Assignment;
use crate::core::models::ids::EntityId;
use thiserror::Error;

pub mod disk;
pub mod heap;
pub mod list;
pub mod sample;

pub use disk::DiskContainer;
pub use heap::HeapContainer;
pub use list::{CappedContainer, ListContainer, PackedContainer};
pub use sample::SampleContainer;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Container capacity of {max} assignments exceeded")]
    CapacityExceeded { max: usize },

    #[error("Assignment has {found} states, but the container stores {expected}")]
    WidthMismatch { expected: usize, found: usize },

    #[error("Container is read-only")]
    ReadOnly,

    #[error("Assignment storage '{path}' failed: {source}")]
    Storage { path: String, source: RecordError },
}

/// Outcome of offering an assignment to a container.
#[derive(Debug, Clone, PartialEq)]
pub enum Insertion {
    Added,
    /// An assignment with the same states is already stored.
    Duplicate,
    /// The container is full and the assignment did not make the cut.
    Rejected,
    /// The assignment was stored in place of the returned one.
    Replaced(Assignment),
}

impl Insertion {
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Added | Self::Replaced(_))
    }
}

pub trait AssignmentContainer: Send {
    /// Number of states per stored assignment.
    fn width(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&mut self, assignment: Assignment) -> Result<Insertion, ContainerError>;

    fn contains(&self, states: &[usize]) -> bool;

    fn get(&self, index: usize) -> Result<Option<Assignment>, ContainerError>;

    /// Every stored assignment. Bounded stores return them best-first.
    fn assignments(&self) -> Result<Vec<Assignment>, ContainerError>;

    /// True if the container may discard assignments it was offered.
    fn is_lossy(&self) -> bool {
        false
    }

    /// Persists buffered writes. A no-op for in-memory stores.
    fn flush(&mut self) -> Result<(), ContainerError> {
        Ok(())
    }
}

pub(crate) fn check_width(expected: usize, assignment: &Assignment) -> Result<(), ContainerError> {
    if assignment.len() != expected {
        return Err(ContainerError::WidthMismatch {
            expected,
            found: assignment.len(),
        });
    }
    Ok(())
}

impl StorageConfig {
    /// Creates the container a node of the given subset should use.
    ///
    /// # Errors
    ///
    /// Only disk storage can fail, when its directory or file cannot be created.
    pub fn create(
        &self,
        node: NodeIndex,
        entities: &[EntityId],
        semantics: ScoreSemantics,
    ) -> Result<Box<dyn AssignmentContainer>, ContainerError> {
        let width = entities.len();
        Ok(match self {
            StorageConfig::Unbounded => Box::new(ListContainer::new(width)),
            StorageConfig::Packed => Box::new(PackedContainer::new(width)),
            StorageConfig::KeepBest { k } => Box::new(HeapContainer::new(width, *k, semantics)),
            StorageConfig::Capped { max } => Box::new(CappedContainer::new(width, *max)),
            StorageConfig::Sample { k, seed } => Box::new(SampleContainer::new(
                width,
                *k,
                seed.wrapping_add(node as u64),
            )),
            StorageConfig::Disk { directory } => {
                std::fs::create_dir_all(directory).map_err(|e| ContainerError::Storage {
                    path: directory.to_string_lossy().to_string(),
                    source: RecordError::Io(e),
                })?;
                let path = directory.join(format!("node-{}.rec", node));
                Box::new(DiskContainer::create(&path, entities.to_vec())?)
            }
        })
    }
}
