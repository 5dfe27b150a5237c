use super::entity::Entity;
use super::ids::EntityId;
use super::subset::Subset;
use slotmap::SlotMap;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Entity '{name}' must have at least one configuration")]
    EmptyConfigurationSpace { name: String },

    #[error("Entity name '{name}' is already in use")]
    DuplicateEntityName { name: String },

    #[error("Degenerate scoring term '{term}': the support set is empty")]
    DegenerateTerm { term: String },

    #[error("Scoring term '{term}' lists entity {entity:?} more than once")]
    DuplicateSupportEntity { term: String, entity: EntityId },

    #[error("Scoring term '{term}' references unknown entity {entity:?}")]
    UnknownEntity { term: String, entity: EntityId },

    #[error(
        "Assignment for subset {subset} is invalid: expected {expected} states, found {found}"
    )]
    AssignmentWidth {
        subset: Subset,
        expected: usize,
        found: usize,
    },

    #[error("State {state} is out of bounds for entity '{name}' ({len} configurations)")]
    StateOutOfBounds {
        name: String,
        state: usize,
        len: usize,
    },
}

/// The set of discrete variables being optimized.
///
/// Entities are created once during setup and their configuration spaces are
/// immutable afterwards. Every other structure in the crate refers to an
/// entity through its [`EntityId`].
#[derive(Debug, Clone, Default)]
pub struct EntitySystem {
    /// Primary storage for entities using a slot map for stable IDs.
    entities: SlotMap<EntityId, Entity>,
    /// Lookup map for finding entities by name.
    name_map: HashMap<String, EntityId>,
}

impl EntitySystem {
    /// Creates a new, empty system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entity with `num_configurations` candidate configurations.
    ///
    /// # Arguments
    ///
    /// * `name` - A label unique within this system.
    /// * `num_configurations` - Size of the configuration space; must be non-zero.
    ///
    /// # Return
    ///
    /// Returns the new entity's ID.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyConfigurationSpace`] when `num_configurations` is zero
    /// and [`ModelError::DuplicateEntityName`] when the name is already taken.
    pub fn add_entity(
        &mut self,
        name: &str,
        num_configurations: usize,
    ) -> Result<EntityId, ModelError> {
        if num_configurations == 0 {
            return Err(ModelError::EmptyConfigurationSpace {
                name: name.to_string(),
            });
        }
        if self.name_map.contains_key(name) {
            return Err(ModelError::DuplicateEntityName {
                name: name.to_string(),
            });
        }
        let id = self.entities.insert(Entity::new(name, num_configurations));
        self.name_map.insert(name.to_string(), id);
        Ok(id)
    }

    /// Retrieves an entity by its ID.
    ///
    /// # Return
    ///
    /// Returns `Some(&Entity)` if the entity exists, otherwise `None`.
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Finds an entity ID by name.
    pub fn find_entity_by_name(&self, name: &str) -> Option<EntityId> {
        self.name_map.get(name).copied()
    }

    /// Returns the entity's name, or a debug rendering of the ID if unknown.
    pub fn name_of(&self, id: EntityId) -> String {
        self.entities
            .get(id)
            .map(|e| e.name.clone())
            .unwrap_or_else(|| format!("{:?}", id))
    }

    /// Returns the number of configurations of an entity, if it exists.
    pub fn num_configurations(&self, id: EntityId) -> Option<usize> {
        self.entities.get(id).map(Entity::num_configurations)
    }

    /// Returns an iterator over all entities in canonical (ID) order.
    ///
    /// # Return
    ///
    /// An iterator yielding `(EntityId, &Entity)` pairs.
    pub fn entities_iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter()
    }

    /// Returns the subset made of every entity in the system.
    pub fn all_entities(&self) -> Subset {
        self.entities.keys().collect()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns the configuration-space sizes of a subset's entities in subset order.
    ///
    /// Unknown entities contribute a size of zero, which makes every
    /// enumeration over the subset empty.
    pub fn radices(&self, subset: &Subset) -> Vec<usize> {
        subset
            .iter()
            .map(|id| self.num_configurations(id).unwrap_or(0))
            .collect()
    }

    /// Returns the number of joint configurations of a subset.
    ///
    /// The product saturates at `u128::MAX` instead of overflowing.
    pub fn domain_size(&self, subset: &Subset) -> u128 {
        self.radices(subset)
            .into_iter()
            .fold(1u128, |acc, r| acc.saturating_mul(r as u128))
    }

    /// Checks that `states` is a valid joint configuration of `subset`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::AssignmentWidth`] when the lengths differ and
    /// [`ModelError::StateOutOfBounds`] when an index exceeds its entity's space.
    pub fn validate_states(&self, subset: &Subset, states: &[usize]) -> Result<(), ModelError> {
        if states.len() != subset.len() {
            return Err(ModelError::AssignmentWidth {
                subset: subset.clone(),
                expected: subset.len(),
                found: states.len(),
            });
        }
        for (id, &state) in subset.iter().zip(states) {
            let len = self.num_configurations(id).unwrap_or(0);
            if state >= len {
                return Err(ModelError::StateOutOfBounds {
                    name: self.name_of(id),
                    state,
                    len,
                });
            }
        }
        Ok(())
    }
}
