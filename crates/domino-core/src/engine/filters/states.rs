use super::{Candidate, FilterTable, SubsetFilter};
use crate::core::models::ids::EntityId;
use crate::core::models::subset::Subset;
use crate::engine::context::InferenceContext;
use std::collections::HashMap;

/// Restricts entities to explicit lists of allowed states.
///
/// Entities without a list are unrestricted. Restricting an entity twice
/// keeps the intersection of both lists.
#[derive(Debug, Clone, Default)]
pub struct AllowedStatesFilter {
    allowed: HashMap<EntityId, Vec<bool>>,
}

impl AllowedStatesFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(&mut self, entity: EntityId, states: &[usize]) {
        let len = states.iter().max().map_or(0, |&m| m + 1);
        let mut mask = vec![false; len];
        for &s in states {
            mask[s] = true;
        }
        match self.allowed.get_mut(&entity) {
            Some(existing) => {
                for (i, slot) in existing.iter_mut().enumerate() {
                    *slot = *slot && mask.get(i).copied().unwrap_or(false);
                }
            }
            None => {
                self.allowed.insert(entity, mask);
            }
        }
    }

    pub fn with_allowed(mut self, entity: EntityId, states: &[usize]) -> Self {
        self.allow(entity, states);
        self
    }

    pub fn is_allowed(&self, entity: EntityId, state: usize) -> bool {
        self.allowed
            .get(&entity)
            .is_none_or(|mask| mask.get(state).copied().unwrap_or(false))
    }
}

struct BoundStates<'f> {
    checks: Vec<(usize, &'f [bool])>,
}

impl SubsetFilter for BoundStates<'_> {
    fn is_ok(&self, candidate: &Candidate<'_>, _: &InferenceContext<'_>) -> bool {
        self.checks
            .iter()
            .all(|&(p, mask)| mask.get(candidate.states[p]).copied().unwrap_or(false))
    }
}

impl FilterTable for AllowedStatesFilter {
    fn name(&self) -> &str {
        "allowed-states"
    }

    fn bind(
        &self,
        subset: &Subset,
        _: &InferenceContext<'_>,
    ) -> Option<Box<dyn SubsetFilter + '_>> {
        let checks: Vec<(usize, &[bool])> = subset
            .iter()
            .enumerate()
            .filter_map(|(p, id)| self.allowed.get(&id).map(|m| (p, m.as_slice())))
            .collect();
        if checks.is_empty() {
            return None;
        }
        Some(Box::new(BoundStates { checks }))
    }

    fn strength(&self, subset: &Subset, context: &InferenceContext<'_>) -> f64 {
        let pass: f64 = subset
            .iter()
            .filter_map(|id| {
                let mask = self.allowed.get(&id)?;
                let len = context.system.num_configurations(id)?.max(1);
                let allowed = mask.iter().take(len).filter(|&&a| a).count();
                Some(allowed as f64 / len as f64)
            })
            .product();
        1.0 - pass
    }
}
