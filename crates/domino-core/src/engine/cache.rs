use crate::core::scoring::term::TermScore;
use dashmap::DashMap;

/// Memoized term evaluations, keyed by term index and the configuration of
/// the term's support.
///
/// Shared by every node of a run; safe to fill from several threads.
#[derive(Debug, Default)]
pub struct ScoreCache {
    data: DashMap<(usize, Vec<usize>), TermScore>,
}

impl ScoreCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, term: usize, states: &[usize]) -> Option<TermScore> {
        self.data.get(&(term, states.to_vec())).map(|entry| *entry)
    }

    pub fn insert(&self, term: usize, states: Vec<usize>, score: TermScore) {
        self.data.insert((term, states), score);
    }

    /// Returns the cached score, evaluating and storing it on a miss.
    pub fn get_or_insert_with(
        &self,
        term: usize,
        states: &[usize],
        evaluate: impl FnOnce() -> TermScore,
    ) -> TermScore {
        if let Some(score) = self.get(term, states) {
            return score;
        }
        let score = evaluate();
        self.insert(term, states.to_vec(), score);
        score
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn get_or_insert_with_evaluates_once_per_key() {
        let cache = ScoreCache::new();
        let calls = Cell::new(0);
        let eval = || {
            calls.set(calls.get() + 1);
            TermScore::unweighted(4.0)
        };
        assert_eq!(cache.get_or_insert_with(0, &[1, 2], eval).value, 4.0);
        assert_eq!(cache.get_or_insert_with(0, &[1, 2], eval).value, 4.0);
        assert_eq!(calls.get(), 1);
        cache.get_or_insert_with(1, &[1, 2], eval);
        assert_eq!(calls.get(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn keys_distinguish_terms_and_states() {
        let cache = ScoreCache::new();
        cache.insert(0, vec![0], TermScore::unweighted(1.0));
        assert!(cache.get(0, &[1]).is_none());
        assert!(cache.get(1, &[0]).is_none());
        assert_eq!(cache.get(0, &[0]), Some(TermScore::unweighted(1.0)));
    }
}
