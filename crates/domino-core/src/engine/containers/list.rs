use super::{AssignmentContainer, ContainerError, Insertion, check_width};
use crate::core::models::assignment::Assignment;
use std::collections::HashSet;

/// Unbounded growable list, in insertion order.
#[derive(Debug, Clone)]
pub struct ListContainer {
    width: usize,
    items: Vec<Assignment>,
    members: HashSet<Vec<usize>>,
}

impl ListContainer {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            items: Vec::new(),
            members: HashSet::new(),
        }
    }
}

impl AssignmentContainer for ListContainer {
    fn width(&self) -> usize {
        self.width
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn insert(&mut self, assignment: Assignment) -> Result<Insertion, ContainerError> {
        check_width(self.width, &assignment)?;
        if !self.members.insert(assignment.states.clone()) {
            return Ok(Insertion::Duplicate);
        }
        self.items.push(assignment);
        Ok(Insertion::Added)
    }

    fn contains(&self, states: &[usize]) -> bool {
        self.members.contains(states)
    }

    fn get(&self, index: usize) -> Result<Option<Assignment>, ContainerError> {
        Ok(self.items.get(index).cloned())
    }

    fn assignments(&self) -> Result<Vec<Assignment>, ContainerError> {
        Ok(self.items.clone())
    }
}

/// Unbounded store keeping all states in one flat buffer.
#[derive(Debug, Clone)]
pub struct PackedContainer {
    width: usize,
    states: Vec<usize>,
    scores: Vec<f64>,
    members: HashSet<Vec<usize>>,
}

impl PackedContainer {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            states: Vec::new(),
            scores: Vec::new(),
            members: HashSet::new(),
        }
    }

    fn row(&self, index: usize) -> &[usize] {
        &self.states[index * self.width..(index + 1) * self.width]
    }
}

impl AssignmentContainer for PackedContainer {
    fn width(&self) -> usize {
        self.width
    }

    fn len(&self) -> usize {
        self.scores.len()
    }

    fn insert(&mut self, assignment: Assignment) -> Result<Insertion, ContainerError> {
        check_width(self.width, &assignment)?;
        if self.members.contains(&assignment.states) {
            return Ok(Insertion::Duplicate);
        }
        self.states.extend_from_slice(&assignment.states);
        self.scores.push(assignment.score);
        self.members.insert(assignment.states);
        Ok(Insertion::Added)
    }

    fn contains(&self, states: &[usize]) -> bool {
        self.members.contains(states)
    }

    fn get(&self, index: usize) -> Result<Option<Assignment>, ContainerError> {
        Ok(self
            .scores
            .get(index)
            .map(|&score| Assignment::new(self.row(index).to_vec(), score)))
    }

    fn assignments(&self) -> Result<Vec<Assignment>, ContainerError> {
        Ok((0..self.len())
            .map(|i| Assignment::new(self.row(i).to_vec(), self.scores[i]))
            .collect())
    }
}

/// Unbounded list that fails once it would exceed `max` entries.
///
/// Unlike a keep-best store it never drops assignments, so exceeding the
/// ceiling surfaces as [`ContainerError::CapacityExceeded`].
#[derive(Debug, Clone)]
pub struct CappedContainer {
    inner: ListContainer,
    max: usize,
}

impl CappedContainer {
    pub fn new(width: usize, max: usize) -> Self {
        Self {
            inner: ListContainer::new(width),
            max,
        }
    }
}

impl AssignmentContainer for CappedContainer {
    fn width(&self) -> usize {
        self.inner.width()
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn insert(&mut self, assignment: Assignment) -> Result<Insertion, ContainerError> {
        check_width(self.inner.width(), &assignment)?;
        if self.inner.contains(&assignment.states) {
            return Ok(Insertion::Duplicate);
        }
        if self.inner.len() >= self.max {
            return Err(ContainerError::CapacityExceeded { max: self.max });
        }
        self.inner.insert(assignment)
    }

    fn contains(&self, states: &[usize]) -> bool {
        self.inner.contains(states)
    }

    fn get(&self, index: usize) -> Result<Option<Assignment>, ContainerError> {
        self.inner.get(index)
    }

    fn assignments(&self) -> Result<Vec<Assignment>, ContainerError> {
        self.inner.assignments()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_keeps_insertion_order() {
        let mut list = ListContainer::new(1);
        for (s, score) in [(2, 0.5), (0, 0.1), (1, 0.9)] {
            list.insert(Assignment::new(vec![s], score)).unwrap();
        }
        let states: Vec<usize> = list
            .assignments()
            .unwrap()
            .iter()
            .map(|a| a.states[0])
            .collect();
        assert_eq!(states, vec![2, 0, 1]);
        assert_eq!(list.get(1).unwrap(), Some(Assignment::new(vec![0], 0.1)));
        assert_eq!(list.get(3).unwrap(), None);
    }

    #[test]
    fn packed_rows_are_recovered_intact() {
        let mut packed = PackedContainer::new(3);
        packed.insert(Assignment::new(vec![1, 2, 3], 1.0)).unwrap();
        packed.insert(Assignment::new(vec![4, 5, 6], 2.0)).unwrap();
        assert_eq!(
            packed.get(1).unwrap(),
            Some(Assignment::new(vec![4, 5, 6], 2.0))
        );
        assert_eq!(packed.assignments().unwrap().len(), 2);
    }

    #[test]
    fn packed_handles_zero_width() {
        let mut packed = PackedContainer::new(0);
        assert_eq!(
            packed.insert(Assignment::new(vec![], 1.0)).unwrap(),
            Insertion::Added
        );
        assert_eq!(
            packed.insert(Assignment::new(vec![], 2.0)).unwrap(),
            Insertion::Duplicate
        );
        assert_eq!(packed.get(0).unwrap(), Some(Assignment::new(vec![], 1.0)));
    }

    #[test]
    fn capped_fails_instead_of_dropping() {
        let mut capped = CappedContainer::new(1, 2);
        capped.insert(Assignment::new(vec![0], 0.0)).unwrap();
        capped.insert(Assignment::new(vec![1], 0.0)).unwrap();
        assert_eq!(
            capped.insert(Assignment::new(vec![1], 0.0)).unwrap(),
            Insertion::Duplicate
        );
        assert!(matches!(
            capped.insert(Assignment::new(vec![2], 0.0)),
            Err(ContainerError::CapacityExceeded { max: 2 })
        ));
        assert_eq!(capped.len(), 2);
    }
}
