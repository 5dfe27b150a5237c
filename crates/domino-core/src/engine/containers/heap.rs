use super::{AssignmentContainer, ContainerError, Insertion, check_width};
use crate::core::models::assignment::Assignment;
use crate::engine::semantics::ScoreSemantics;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// Heap entry ordered so that the worst assignment sits on top.
#[derive(Debug, Clone)]
struct Ranked {
    assignment: Assignment,
    semantics: ScoreSemantics,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.semantics
            .compare(self.assignment.score, other.assignment.score)
            .then_with(|| self.assignment.states.cmp(&other.assignment.states))
    }
}

/// Keeps the `k` best assignments seen, evicting the worst in O(log k).
///
/// Score ties are broken by the lexicographically smaller state vector, so
/// the retained set does not depend on insertion order.
#[derive(Debug, Clone)]
pub struct HeapContainer {
    width: usize,
    capacity: usize,
    semantics: ScoreSemantics,
    heap: BinaryHeap<Ranked>,
    members: HashSet<Vec<usize>>,
}

impl HeapContainer {
    pub fn new(width: usize, capacity: usize, semantics: ScoreSemantics) -> Self {
        Self {
            width,
            capacity,
            semantics,
            heap: BinaryHeap::with_capacity(capacity.min(1 << 16)),
            members: HashSet::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Score of the assignment that would be evicted next.
    pub fn worst_score(&self) -> Option<f64> {
        self.heap.peek().map(|r| r.assignment.score)
    }
}

impl AssignmentContainer for HeapContainer {
    fn width(&self) -> usize {
        self.width
    }

    fn len(&self) -> usize {
        self.heap.len()
    }

    fn insert(&mut self, assignment: Assignment) -> Result<Insertion, ContainerError> {
        check_width(self.width, &assignment)?;
        if self.members.contains(&assignment.states) {
            return Ok(Insertion::Duplicate);
        }
        let candidate = Ranked {
            assignment,
            semantics: self.semantics,
        };
        if self.heap.len() < self.capacity {
            self.members.insert(candidate.assignment.states.clone());
            self.heap.push(candidate);
            return Ok(Insertion::Added);
        }
        match self.heap.peek() {
            Some(worst) if candidate < *worst => {}
            _ => return Ok(Insertion::Rejected),
        }
        let evicted = self.heap.pop().map(|r| r.assignment);
        self.members.insert(candidate.assignment.states.clone());
        self.heap.push(candidate);
        match evicted {
            Some(evicted) => {
                self.members.remove(&evicted.states);
                Ok(Insertion::Replaced(evicted))
            }
            None => Ok(Insertion::Added),
        }
    }

    fn contains(&self, states: &[usize]) -> bool {
        self.members.contains(states)
    }

    fn get(&self, index: usize) -> Result<Option<Assignment>, ContainerError> {
        Ok(self.assignments()?.into_iter().nth(index))
    }

    fn assignments(&self) -> Result<Vec<Assignment>, ContainerError> {
        Ok(self
            .heap
            .clone()
            .into_sorted_vec()
            .into_iter()
            .map(|r| r.assignment)
            .collect())
    }

    fn is_lossy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::semantics::{Combine, Objective};
    use proptest::prelude::*;

    fn scores(container: &HeapContainer) -> Vec<f64> {
        container
            .assignments()
            .unwrap()
            .iter()
            .map(|a| a.score)
            .collect()
    }

    #[test]
    fn full_heap_evicts_exactly_the_worst() {
        let mut heap = HeapContainer::new(1, 3, ScoreSemantics::default());
        for (s, score) in [(0, 5.0), (1, 1.0), (2, 3.0)] {
            heap.insert(Assignment::new(vec![s], score)).unwrap();
        }
        let outcome = heap.insert(Assignment::new(vec![3], 2.0)).unwrap();
        assert_eq!(outcome, Insertion::Replaced(Assignment::new(vec![0], 5.0)));
        assert_eq!(scores(&heap), vec![1.0, 2.0, 3.0]);
        assert!(!heap.contains(&[0]));
        assert_eq!(heap.worst_score(), Some(3.0));
    }

    #[test]
    fn full_heap_rejects_worse_and_equal_scores() {
        let mut heap = HeapContainer::new(1, 1, ScoreSemantics::default());
        heap.insert(Assignment::new(vec![1], 1.0)).unwrap();
        assert_eq!(
            heap.insert(Assignment::new(vec![2], 4.0)).unwrap(),
            Insertion::Rejected
        );
        assert_eq!(
            heap.insert(Assignment::new(vec![3], 1.0)).unwrap(),
            Insertion::Rejected
        );
        assert_eq!(scores(&heap), vec![1.0]);
    }

    #[test]
    fn maximization_keeps_largest_scores() {
        let semantics = ScoreSemantics::new(Objective::Maximize, Combine::Sum);
        let mut heap = HeapContainer::new(1, 2, semantics);
        for (s, score) in [(0, 0.1), (1, 0.9), (2, 0.5)] {
            heap.insert(Assignment::new(vec![s], score)).unwrap();
        }
        assert_eq!(scores(&heap), vec![0.9, 0.5]);
        assert_eq!(heap.get(0).unwrap(), Some(Assignment::new(vec![1], 0.9)));
    }

    proptest! {
        #[test]
        fn heap_retains_the_k_best_of_everything_inserted(
            k in 1usize..6,
            values in proptest::collection::vec(-100i32..100, 0..40),
        ) {
            let mut heap = HeapContainer::new(1, k, ScoreSemantics::default());
            for (i, &v) in values.iter().enumerate() {
                heap.insert(Assignment::new(vec![i], v as f64)).unwrap();
                prop_assert!(heap.len() <= k);
            }
            let mut expected: Vec<f64> = values.iter().map(|&v| v as f64).collect();
            expected.sort_by(|a, b| a.total_cmp(b));
            expected.truncate(k);
            prop_assert_eq!(scores(&heap), expected);
        }
    }
}
