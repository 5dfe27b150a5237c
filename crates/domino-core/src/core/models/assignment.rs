use super::subset::restrict;

/// One joint configuration of a subset plus its score.
///
/// `states` holds one configuration index per entity of the owning subset,
/// in the subset's canonical order.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub states: Vec<usize>,
    pub score: f64,
}

impl Assignment {
    pub fn new(states: Vec<usize>, score: f64) -> Self {
        Self { states, score }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// The states at `positions`, e.g. the restriction to a separator.
    pub fn restrict(&self, positions: &[usize]) -> Vec<usize> {
        restrict(&self.states, positions)
    }
}
