//! Vetoes applied to candidate assignments before they are stored.
//!
//! A [`FilterTable`] holds a rule over the whole problem. Binding it to a
//! junction-tree node's subset yields a [`SubsetFilter`] specialized to that
//! subset's entity positions, or nothing when the rule cannot affect it.
//! Filters only ever reject; a candidate every filter accepts is stored.

use super::context::InferenceContext;
use crate::core::models::ids::EntityId;
use crate::core::models::subset::Subset;
use std::sync::atomic::{AtomicUsize, Ordering};

pub mod score;
pub mod sets;
pub mod states;

pub use score::{BranchAndBoundFilter, DeadlineFilter, ScoreThresholdFilter};
pub use sets::{DisjointSetsFilter, SetRelation};
pub use states::AllowedStatesFilter;

/// A joint configuration offered to a node's filters.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'c> {
    /// One state per entity of the node's subset.
    pub states: &'c [usize],
    /// Combined score of the node and its subtree. `None` before scoring.
    pub score: Option<f64>,
    /// Assignments the node has stored so far.
    pub retained: usize,
}

pub trait SubsetFilter: Send + Sync {
    fn is_ok(&self, candidate: &Candidate<'_>, context: &InferenceContext<'_>) -> bool;

    /// Score-based filters run only after scoring; the rest run before.
    fn needs_score(&self) -> bool {
        false
    }
}

/// A filter rule over the whole problem.
///
/// Rules are checked per node. A rule relating several entities must list
/// them in [`FilterTable::coupled`] so the decomposition places each group
/// inside one node.
pub trait FilterTable: Send + Sync {
    fn name(&self) -> &str;

    /// Groups of entities this rule constrains jointly.
    fn coupled(&self) -> Vec<Vec<EntityId>> {
        Vec::new()
    }

    fn bind(
        &self,
        subset: &Subset,
        context: &InferenceContext<'_>,
    ) -> Option<Box<dyn SubsetFilter + '_>>;

    /// Estimated fraction of a subset's configurations this filter rejects.
    fn strength(&self, subset: &Subset, context: &InferenceContext<'_>) -> f64;

    /// False if the filter may reject assignments that belong to an optimal
    /// solution, making the result approximate.
    fn is_lossless(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterStats {
    pub name: String,
    pub checked: usize,
    pub rejected: usize,
}

struct Counters {
    checked: AtomicUsize,
    rejected: AtomicUsize,
}

/// An ordered collection of filter tables with rejection counters.
#[derive(Default)]
pub struct FilterChain {
    tables: Vec<(Box<dyn FilterTable>, Counters)>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, table: impl FilterTable + 'static) -> Self {
        self.push(Box::new(table));
        self
    }

    pub fn push(&mut self, table: Box<dyn FilterTable>) {
        self.tables.push((
            table,
            Counters {
                checked: AtomicUsize::new(0),
                rejected: AtomicUsize::new(0),
            },
        ));
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn is_lossless(&self) -> bool {
        self.tables.iter().all(|(t, _)| t.is_lossless())
    }

    /// Every coupled group of every table, labelled with the table's name.
    pub fn coupled(&self) -> Vec<(String, Vec<EntityId>)> {
        self.tables
            .iter()
            .flat_map(|(table, _)| {
                let name = table.name().to_string();
                table
                    .coupled()
                    .into_iter()
                    .map(move |group| (name.clone(), group))
            })
            .collect()
    }

    /// Specializes every table to `subset`, strongest filter first.
    pub fn bind<'f>(&'f self, subset: &Subset, context: &InferenceContext<'_>) -> NodeFilters<'f> {
        let mut bound: Vec<(usize, f64, Box<dyn SubsetFilter + 'f>)> = self
            .tables
            .iter()
            .enumerate()
            .filter_map(|(i, (table, _))| {
                table
                    .bind(subset, context)
                    .map(|f| (i, table.strength(subset, context), f))
            })
            .collect();
        bound.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        NodeFilters { chain: self, bound }
    }

    pub fn stats(&self) -> Vec<FilterStats> {
        self.tables
            .iter()
            .map(|(table, counters)| FilterStats {
                name: table.name().to_string(),
                checked: counters.checked.load(Ordering::Relaxed),
                rejected: counters.rejected.load(Ordering::Relaxed),
            })
            .collect()
    }
}

/// The filters relevant to one node, in evaluation order.
pub struct NodeFilters<'f> {
    chain: &'f FilterChain,
    bound: Vec<(usize, f64, Box<dyn SubsetFilter + 'f>)>,
}

impl NodeFilters<'_> {
    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }

    /// Runs the filters of one stage: score-free filters when
    /// `candidate.score` is `None`, score filters otherwise.
    pub fn accepts(&self, candidate: &Candidate<'_>, context: &InferenceContext<'_>) -> bool {
        let scored = candidate.score.is_some();
        for (table, _, filter) in &self.bound {
            if filter.needs_score() != scored {
                continue;
            }
            let counters = &self.chain.tables[*table].1;
            counters.checked.fetch_add(1, Ordering::Relaxed);
            if !filter.is_ok(candidate, context) {
                counters.rejected.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        }
        true
    }
}
