use serde::Deserialize;
use std::cmp::Ordering;

/// Direction of optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Objective {
    /// Lower scores are better (energies, penalties).
    #[default]
    Minimize,
    /// Higher scores are better (probabilities, rewards).
    Maximize,
}

/// Operator joining the scores of independent parts of an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Combine {
    #[default]
    Sum,
    /// Requires non-negative scores.
    Product,
}

/// How scores combine and which of two scores is better, fixed for a whole
/// inference run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ScoreSemantics {
    #[serde(default)]
    pub objective: Objective,
    #[serde(default)]
    pub combine: Combine,
}

impl ScoreSemantics {
    pub fn new(objective: Objective, combine: Combine) -> Self {
        Self { objective, combine }
    }

    /// The neutral element of [`Self::combine`].
    #[inline]
    pub fn identity(&self) -> f64 {
        match self.combine {
            Combine::Sum => 0.0,
            Combine::Product => 1.0,
        }
    }

    #[inline]
    pub fn combine(&self, a: f64, b: f64) -> f64 {
        match self.combine {
            Combine::Sum => a + b,
            Combine::Product => a * b,
        }
    }

    /// Applies a weight: scaling for sums, exponentiation for products.
    #[inline]
    pub fn weighted(&self, value: f64, weight: f64) -> f64 {
        match self.combine {
            Combine::Sum => value * weight,
            Combine::Product => value.powf(weight),
        }
    }

    /// Orders scores best-first: `Less` means `a` is better than `b`.
    ///
    /// Uses a total order, so NaN scores sort after every real score.
    #[inline]
    pub fn compare(&self, a: f64, b: f64) -> Ordering {
        let (a, b) = (nan_last(a, self.objective), nan_last(b, self.objective));
        match self.objective {
            Objective::Minimize => a.total_cmp(&b),
            Objective::Maximize => b.total_cmp(&a),
        }
    }

    /// True if `a` is strictly better than `b`.
    #[inline]
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        self.compare(a, b) == Ordering::Less
    }

    /// A score no real score is worse than.
    pub fn worst(&self) -> f64 {
        match self.objective {
            Objective::Minimize => f64::INFINITY,
            Objective::Maximize => f64::NEG_INFINITY,
        }
    }
}

fn nan_last(value: f64, objective: Objective) -> f64 {
    if value.is_nan() {
        match objective {
            Objective::Minimize => f64::INFINITY,
            Objective::Maximize => f64::NEG_INFINITY,
        }
    } else {
        value
    }
}
