use super::ids::EntityId;
use std::fmt;

/// An ordered set of entities.
///
/// The entity list is always sorted and free of duplicates, so two subsets
/// built from the same entities compare equal regardless of input order.
/// Joint configurations ("states") of a subset are indexed in this order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Subset {
    entities: Vec<EntityId>,
}

impl Subset {
    pub fn new(entities: impl IntoIterator<Item = EntityId>) -> Self {
        let mut entities: Vec<EntityId> = entities.into_iter().collect();
        entities.sort_unstable();
        entities.dedup();
        Self { entities }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[EntityId] {
        &self.entities
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = EntityId> + '_ {
        self.entities.iter().copied()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.binary_search(&id).is_ok()
    }

    /// Position of `id` in canonical order.
    pub fn position(&self, id: EntityId) -> Option<usize> {
        self.entities.binary_search(&id).ok()
    }

    pub fn is_subset_of(&self, other: &Subset) -> bool {
        self.entities.iter().all(|&id| other.contains(id))
    }

    pub fn intersection(&self, other: &Subset) -> Subset {
        Subset {
            entities: self
                .entities
                .iter()
                .copied()
                .filter(|&id| other.contains(id))
                .collect(),
        }
    }

    pub fn union(&self, other: &Subset) -> Subset {
        Subset::new(self.iter().chain(other.iter()))
    }

    /// Positions in `self` of each entity of `other`, in `other`'s order.
    ///
    /// Returns `None` if `other` is not contained in `self`.
    pub fn positions_of(&self, other: &Subset) -> Option<Vec<usize>> {
        other.iter().map(|id| self.position(id)).collect()
    }
}

impl FromIterator<EntityId> for Subset {
    fn from_iter<T: IntoIterator<Item = EntityId>>(iter: T) -> Self {
        Subset::new(iter)
    }
}

impl fmt::Display for Subset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, id) in self.entities.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}", id)?;
        }
        write!(f, "]")
    }
}

/// Projects a joint configuration onto a list of positions.
#[inline]
pub fn restrict(states: &[usize], positions: &[usize]) -> Vec<usize> {
    positions.iter().map(|&p| states[p]).collect()
}
