use super::{Candidate, FilterTable, SubsetFilter};
use crate::core::models::ids::EntityId;
use crate::core::models::subset::Subset;
use crate::core::utils::disjoint_sets::DisjointSets;
use crate::engine::context::InferenceContext;
use std::collections::{BTreeMap, HashMap};

/// Relation required among the members of each set that fall in a subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetRelation {
    /// All members share one state.
    Equal,
    /// All members have pairwise different states.
    Distinct,
    /// States never decrease along canonical entity order. Breaks the
    /// symmetry between interchangeable entities.
    NonDecreasing,
}

/// Constraints over groups of entities, grouped with union-find.
///
/// Adding a pair or set merges groups, so `add_pair(a, b)` followed by
/// `add_pair(b, c)` constrains `a`, `b` and `c` together.
#[derive(Debug, Clone)]
pub struct DisjointSetsFilter {
    relation: SetRelation,
    sets: DisjointSets,
    index: HashMap<EntityId, usize>,
    entities: Vec<EntityId>,
}

impl DisjointSetsFilter {
    pub fn new(relation: SetRelation) -> Self {
        Self {
            relation,
            sets: DisjointSets::new(0),
            index: HashMap::new(),
            entities: Vec::new(),
        }
    }

    pub fn equality() -> Self {
        Self::new(SetRelation::Equal)
    }

    pub fn exclusion() -> Self {
        Self::new(SetRelation::Distinct)
    }

    pub fn equivalence() -> Self {
        Self::new(SetRelation::NonDecreasing)
    }

    pub fn relation(&self) -> SetRelation {
        self.relation
    }

    fn slot(&mut self, entity: EntityId) -> usize {
        if let Some(&i) = self.index.get(&entity) {
            return i;
        }
        let i = self.sets.make_set();
        self.index.insert(entity, i);
        self.entities.push(entity);
        i
    }

    pub fn add_pair(&mut self, a: EntityId, b: EntityId) {
        let (i, j) = (self.slot(a), self.slot(b));
        self.sets.union(i, j);
    }

    pub fn add_set(&mut self, entities: &[EntityId]) {
        if let Some((&first, rest)) = entities.split_first() {
            let root = self.slot(first);
            for &other in rest {
                let j = self.slot(other);
                self.sets.union(root, j);
            }
        }
    }

    pub fn with_set(mut self, entities: &[EntityId]) -> Self {
        self.add_set(entities);
        self
    }

    /// Every group with at least two members, in entity insertion order.
    fn groups(&self) -> Vec<Vec<EntityId>> {
        let mut sets = self.sets.clone();
        let mut groups: BTreeMap<usize, Vec<EntityId>> = BTreeMap::new();
        for (&entity, i) in self.entities.iter().zip(0..) {
            groups.entry(sets.find(i)).or_default().push(entity);
        }
        groups.into_values().filter(|g| g.len() > 1).collect()
    }

    /// Positions in `subset` of each group with at least two members there.
    fn groups_in(&self, subset: &Subset) -> Vec<Vec<usize>> {
        let mut sets = self.sets.clone();
        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (position, entity) in subset.iter().enumerate() {
            if let Some(&i) = self.index.get(&entity) {
                groups.entry(sets.find(i)).or_default().push(position);
            }
        }
        groups.into_values().filter(|g| g.len() > 1).collect()
    }
}

struct BoundSets {
    relation: SetRelation,
    groups: Vec<Vec<usize>>,
}

impl SubsetFilter for BoundSets {
    fn is_ok(&self, candidate: &Candidate<'_>, _: &InferenceContext<'_>) -> bool {
        let states = candidate.states;
        self.groups.iter().all(|group| match self.relation {
            SetRelation::Equal => group.iter().all(|&p| states[p] == states[group[0]]),
            SetRelation::NonDecreasing => group.windows(2).all(|w| states[w[0]] <= states[w[1]]),
            SetRelation::Distinct => group
                .iter()
                .enumerate()
                .all(|(i, &p)| group[i + 1..].iter().all(|&q| states[p] != states[q])),
        })
    }
}

impl FilterTable for DisjointSetsFilter {
    fn name(&self) -> &str {
        match self.relation {
            SetRelation::Equal => "equality",
            SetRelation::Distinct => "exclusion",
            SetRelation::NonDecreasing => "equivalence",
        }
    }

    fn coupled(&self) -> Vec<Vec<EntityId>> {
        self.groups()
    }

    fn bind(
        &self,
        subset: &Subset,
        _: &InferenceContext<'_>,
    ) -> Option<Box<dyn SubsetFilter + '_>> {
        let groups = self.groups_in(subset);
        if groups.is_empty() {
            return None;
        }
        Some(Box::new(BoundSets {
            relation: self.relation,
            groups,
        }))
    }

    fn strength(&self, subset: &Subset, context: &InferenceContext<'_>) -> f64 {
        let mut pass = 1.0;
        for group in self.groups_in(subset) {
            let m = group.len();
            let d = group
                .iter()
                .filter_map(|&p| context.system.num_configurations(subset.as_slice()[p]))
                .max()
                .unwrap_or(1) as f64;
            pass *= match self.relation {
                SetRelation::Equal => d.powi(1 - m as i32),
                SetRelation::Distinct => (0..m)
                    .map(|i| ((d - i as f64) / d).max(0.0))
                    .product::<f64>(),
                SetRelation::NonDecreasing => 1.0 / (1..=m).map(|i| i as f64).product::<f64>(),
            };
        }
        1.0 - pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::system::EntitySystem;
    use crate::engine::config::InferenceConfig;
    use crate::engine::progress::ProgressReporter;

    fn setup() -> (EntitySystem, Vec<EntityId>, InferenceConfig) {
        let mut system = EntitySystem::new();
        let ids = (0..4)
            .map(|i| system.add_entity(&format!("E{}", i), 3).unwrap())
            .collect();
        let config = InferenceConfig::builder().num_solutions(1).build().unwrap();
        (system, ids, config)
    }

    fn check(filter: &dyn SubsetFilter, context: &InferenceContext<'_>, states: &[usize]) -> bool {
        filter.is_ok(
            &Candidate {
                states,
                score: None,
                retained: 0,
            },
            context,
        )
    }

    #[test]
    fn equality_merges_pairs_transitively() {
        let (system, e, config) = setup();
        let reporter = ProgressReporter::new();
        let context = InferenceContext::new(&system, &config, &reporter);
        let mut filter = DisjointSetsFilter::equality();
        filter.add_pair(e[0], e[1]);
        filter.add_pair(e[1], e[3]);

        let subset = Subset::new([e[0], e[2], e[3]]);
        let bound = filter.bind(&subset, &context).unwrap();
        assert!(check(bound.as_ref(), &context, &[2, 0, 2]));
        assert!(!check(bound.as_ref(), &context, &[2, 0, 1]));

        let unrelated = Subset::new([e[0], e[2]]);
        assert!(filter.bind(&unrelated, &context).is_none());
        assert!((filter.strength(&subset, &context) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn coupled_reports_merged_groups() {
        let (_, e, _) = setup();
        let mut filter = DisjointSetsFilter::equality();
        filter.add_pair(e[0], e[1]);
        filter.add_pair(e[2], e[1]);
        assert_eq!(filter.coupled(), vec![vec![e[0], e[1], e[2]]]);
        assert!(DisjointSetsFilter::exclusion().coupled().is_empty());
    }

    #[test]
    fn exclusion_requires_distinct_states() {
        let (system, e, config) = setup();
        let reporter = ProgressReporter::new();
        let context = InferenceContext::new(&system, &config, &reporter);
        let filter = DisjointSetsFilter::exclusion().with_set(&[e[0], e[1], e[2]]);
        let subset = Subset::new([e[0], e[1], e[2]]);
        let bound = filter.bind(&subset, &context).unwrap();
        assert!(check(bound.as_ref(), &context, &[0, 1, 2]));
        assert!(!check(bound.as_ref(), &context, &[0, 1, 0]));
        assert_eq!(filter.name(), "exclusion");
    }

    #[test]
    fn equivalence_orders_interchangeable_entities() {
        let (system, e, config) = setup();
        let reporter = ProgressReporter::new();
        let context = InferenceContext::new(&system, &config, &reporter);
        let filter = DisjointSetsFilter::equivalence().with_set(&[e[2], e[1]]);
        let subset = Subset::new([e[1], e[2]]);
        let bound = filter.bind(&subset, &context).unwrap();
        assert!(check(bound.as_ref(), &context, &[1, 1]));
        assert!(check(bound.as_ref(), &context, &[0, 2]));
        assert!(!check(bound.as_ref(), &context, &[2, 0]));
        assert!((filter.strength(&subset, &context) - 0.5).abs() < 1e-12);
    }
}
