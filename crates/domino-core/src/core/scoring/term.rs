use crate::core::models::ids::EntityId;
use crate::core::models::system::{EntitySystem, ModelError};
use crate::core::utils::enumeration::MixedRadix;
use std::collections::HashSet;
use std::fmt;
use std::ops::{Add, AddAssign};

/// The value returned by one term for one joint configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermScore {
    pub value: f64,
    pub weight: f64,
}

impl TermScore {
    pub fn new(value: f64, weight: f64) -> Self {
        Self { value, weight }
    }

    pub fn unweighted(value: f64) -> Self {
        Self { value, weight: 1.0 }
    }

    #[inline]
    pub fn weighted(&self) -> f64 {
        self.value * self.weight
    }
}

impl Default for TermScore {
    fn default() -> Self {
        Self::unweighted(0.0)
    }
}

/// Sums weighted contributions; the result carries unit weight.
impl Add for TermScore {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::unweighted(self.weighted() + rhs.weighted())
    }
}

impl AddAssign for TermScore {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// A local scoring function over a fixed support set.
///
/// Implementations must be deterministic and free of side effects: the
/// optimizer may evaluate a configuration more than once, cache the result,
/// or evaluate from several threads.
pub trait ScoringTerm: Send + Sync {
    fn name(&self) -> &str;

    /// The entities this term depends on. `evaluate` receives one state per
    /// entity, in this order.
    fn support(&self) -> &[EntityId];

    fn evaluate(&self, states: &[usize]) -> TermScore;
}

impl fmt::Debug for dyn ScoringTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScoringTerm")
            .field("name", &self.name())
            .field("support", &self.support())
            .finish()
    }
}

/// Checks a term's support set against the system.
///
/// # Errors
///
/// [`ModelError::DegenerateTerm`] for an empty support,
/// [`ModelError::DuplicateSupportEntity`] when an entity repeats and
/// [`ModelError::UnknownEntity`] when the system does not know an entity.
pub fn validate_term(term: &dyn ScoringTerm, system: &EntitySystem) -> Result<(), ModelError> {
    let support = term.support();
    if support.is_empty() {
        return Err(ModelError::DegenerateTerm {
            term: term.name().to_string(),
        });
    }
    let mut seen = HashSet::with_capacity(support.len());
    for &entity in support {
        if !system.contains(entity) {
            return Err(ModelError::UnknownEntity {
                term: term.name().to_string(),
                entity,
            });
        }
        if !seen.insert(entity) {
            return Err(ModelError::DuplicateSupportEntity {
                term: term.name().to_string(),
                entity,
            });
        }
    }
    Ok(())
}

/// A term backed by a closure.
pub struct FnTerm<F> {
    name: String,
    support: Vec<EntityId>,
    weight: f64,
    func: F,
}

impl<F> FnTerm<F>
where
    F: Fn(&[usize]) -> f64 + Send + Sync,
{
    pub fn new(name: &str, support: Vec<EntityId>, func: F) -> Self {
        Self {
            name: name.to_string(),
            support,
            weight: 1.0,
            func,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

impl<F> ScoringTerm for FnTerm<F>
where
    F: Fn(&[usize]) -> f64 + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn support(&self) -> &[EntityId] {
        &self.support
    }

    fn evaluate(&self, states: &[usize]) -> TermScore {
        TermScore::new((self.func)(states), self.weight)
    }
}

/// A term whose scores are precomputed for every joint configuration of
/// its support, stored in lexicographic order (last entity fastest).
#[derive(Debug, Clone)]
pub struct TableTerm {
    name: String,
    support: Vec<EntityId>,
    weight: f64,
    radix: MixedRadix,
    values: Vec<f64>,
}

impl TableTerm {
    /// # Errors
    ///
    /// Fails with [`ModelError::AssignmentWidth`] when `values` does not hold
    /// exactly one score per joint configuration of `support`.
    pub fn new(
        name: &str,
        support: Vec<EntityId>,
        system: &EntitySystem,
        values: Vec<f64>,
    ) -> Result<Self, ModelError> {
        let radices: Vec<usize> = support
            .iter()
            .map(|&id| system.num_configurations(id).unwrap_or(0))
            .collect();
        let radix = MixedRadix::new(radices);
        let expected = radix.len().unwrap_or(usize::MAX);
        if values.len() != expected {
            return Err(ModelError::AssignmentWidth {
                subset: support.iter().copied().collect(),
                expected,
                found: values.len(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            support,
            weight: 1.0,
            radix,
            values,
        })
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

impl ScoringTerm for TableTerm {
    fn name(&self) -> &str {
        &self.name
    }

    fn support(&self) -> &[EntityId] {
        &self.support
    }

    fn evaluate(&self, states: &[usize]) -> TermScore {
        TermScore::new(self.values[self.radix.encode(states)], self.weight)
    }
}
