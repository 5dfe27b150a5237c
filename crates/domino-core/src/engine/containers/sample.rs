use super::{AssignmentContainer, ContainerError, Insertion, check_width};
use crate::core::models::assignment::Assignment;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

/// Keeps a uniform random sample of at most `k` of the distinct assignments
/// offered (reservoir sampling). Reproducible for a given seed.
#[derive(Debug, Clone)]
pub struct SampleContainer {
    width: usize,
    capacity: usize,
    seen: usize,
    items: Vec<Assignment>,
    members: HashSet<Vec<usize>>,
    rng: StdRng,
}

impl SampleContainer {
    pub fn new(width: usize, capacity: usize, seed: u64) -> Self {
        Self {
            width,
            capacity,
            seen: 0,
            items: Vec::new(),
            members: HashSet::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Distinct assignments offered so far, kept or not.
    pub fn seen(&self) -> usize {
        self.seen
    }
}

impl AssignmentContainer for SampleContainer {
    fn width(&self) -> usize {
        self.width
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn insert(&mut self, assignment: Assignment) -> Result<Insertion, ContainerError> {
        check_width(self.width, &assignment)?;
        if self.members.contains(&assignment.states) {
            return Ok(Insertion::Duplicate);
        }
        self.seen += 1;
        if self.items.len() < self.capacity {
            self.members.insert(assignment.states.clone());
            self.items.push(assignment);
            return Ok(Insertion::Added);
        }
        let slot = self.rng.gen_range(0..self.seen);
        if slot >= self.capacity {
            return Ok(Insertion::Rejected);
        }
        self.members.insert(assignment.states.clone());
        let evicted = std::mem::replace(&mut self.items[slot], assignment);
        self.members.remove(&evicted.states);
        Ok(Insertion::Replaced(evicted))
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

    fn is_lossy(&self) -> bool {
        true
    }
}
