//! Weighted risk aggregation
//!
//! Combines the per-factor risk contributions with the customer's baseline
//! risk into a 0-100 score and maps it to a risk level. A single dominant
//! factor (>= 80 on its own) switches to a blend that keeps it from being
//! averaged away by the quiet factors.

use crate::config::FactorWeights;

/// Score above which a single factor forces the dominant-factor blend.
const DOMINANT_FACTOR_CUTOFF: f64 = 80.0;

/// Per-factor risk contributions feeding one aggregation.
///
/// Contributions are already zeroed for factors that did not fire.
#[derive(Debug, Clone, Copy, Default)]
pub struct FactorRisks {
    pub amount: f64,
    pub location: f64,
    pub device: f64,
    pub velocity: f64,
    pub pattern: f64,
}

impl FactorRisks {
    fn max(&self) -> f64 {
        self.amount
            .max(self.location)
            .max(self.device)
            .max(self.velocity)
            .max(self.pattern)
    }
}

/// Round to two decimal places, the precision carried on wire-facing scores.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Combine factor risks and the customer baseline into a 0-100 score.
pub fn combine(factors: &FactorRisks, weights: &FactorWeights, customer_base_risk: f64) -> f64 {
    let transaction_risk = 100.0
        * (factors.amount * weights.amount
            + factors.location * weights.location
            + factors.device * weights.device
            + factors.velocity * weights.velocity
            + factors.pattern * weights.pattern);

    let max_factor_risk = 100.0 * factors.max();

    let combined = if max_factor_risk >= DOMINANT_FACTOR_CUTOFF {
        transaction_risk * 0.5 + max_factor_risk * 0.3 + customer_base_risk * 0.2
    } else {
        transaction_risk * 0.7 + customer_base_risk * 0.3
    };

    combined.clamp(0.0, 100.0)
}

/// Increment applied to the customer baseline per flag on a high-risk hit.
pub const FEEDBACK_INCREMENT_PER_FLAG: f64 = 2.5;
