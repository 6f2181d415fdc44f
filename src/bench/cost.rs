//! Linear pricing model: a flat per-request charge plus a duration charge
//! scaled by memory size.

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

/// Memory size that one GB-second is normalized against
pub const REFERENCE_MEMORY: f64 = 1024.0;

/// Request price in USD (AWS Lambda, Jan 2017)
pub const DEFAULT_COST_PER_REQUEST: f64 = 0.000_000_2;

/// GB-second price in USD (AWS Lambda, Jan 2017)
pub const DEFAULT_COST_PER_GB_SECOND: f64 = 0.000_016_67;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    pub cost_per_request: f64,
    pub cost_per_gb_second: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            cost_per_request: DEFAULT_COST_PER_REQUEST,
            cost_per_gb_second: DEFAULT_COST_PER_GB_SECOND,
        }
    }
}

impl CostModel {
    pub fn new(cost_per_request: f64, cost_per_gb_second: f64) -> Self {
        Self {
            cost_per_request,
            cost_per_gb_second,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("cost per request", self.cost_per_request),
            ("cost per GB-second", self.cost_per_gb_second),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(BenchError::Validation(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Cost of `success_count` invocations of a tier that ran for
    /// `total_duration_secs` in total.
    pub fn cost(&self, tier: u32, total_duration_secs: f64, success_count: u64) -> f64 {
        let gb_seconds = (tier as f64 / REFERENCE_MEMORY) * total_duration_secs;
        success_count as f64 * self.cost_per_request + gb_seconds * self.cost_per_gb_second
    }
}

/// Mean duration of the successful invocations, `None` when there were none
pub fn average_duration(total_duration_secs: f64, success_count: u64) -> Option<f64> {
    if success_count == 0 {
        return None;
    }
    Some(total_duration_secs / success_count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_cost_formula() {
        let model = CostModel::default();
        let cost = model.cost(128, 1.5, 3);
        let expected = 3.0 * DEFAULT_COST_PER_REQUEST + 0.125 * 1.5 * DEFAULT_COST_PER_GB_SECOND;
        assert!((cost - expected).abs() < 1e-15);
    }

    #[test]
    fn test_cost_at_reference_memory() {
        let model = CostModel::new(0.0, 1.0);
        assert!((model.cost(1024, 2.0, 10) - 2.0).abs() < 1e-12);
        assert!((model.cost(2048, 2.0, 10) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_cost_without_successes_is_zero() {
        let model = CostModel::default();
        assert_eq!(model.cost(512, 0.0, 0), 0.0);
    }

    #[test]
    fn test_average_duration() {
        assert_eq!(average_duration(1.5, 3), Some(0.5));
        assert_eq!(average_duration(0.0, 0), None);
        assert_eq!(average_duration(4.0, 0), None);
    }

    #[test]
    fn test_validate_rejects_bad_rates() {
        assert!(CostModel::default().validate().is_ok());
        assert!(CostModel::new(f64::NAN, 0.0).validate().is_err());
        assert!(CostModel::new(0.0, -0.1).validate().is_err());
        assert!(CostModel::new(0.0, f64::INFINITY).validate().is_err());
        assert!(CostModel::new(0.0, 0.0).validate().is_ok());
    }

    proptest! {
        #[test]
        fn prop_cost_is_monotonic_in_duration(
            tier in 1u32..10_240,
            duration in 0.0f64..1_000.0,
            extra in 0.0f64..1_000.0,
            count in 0u64..10_000,
        ) {
            let model = CostModel::default();
            prop_assert!(model.cost(tier, duration + extra, count) >= model.cost(tier, duration, count));
        }

        #[test]
        fn prop_cost_is_additive_over_splits(
            tier in 1u32..10_240,
            a in 0.0f64..100.0,
            b in 0.0f64..100.0,
            n in 0u64..1_000,
            m in 0u64..1_000,
        ) {
            let model = CostModel::default();
            let whole = model.cost(tier, a + b, n + m);
            let parts = model.cost(tier, a, n) + model.cost(tier, b, m);
            prop_assert!((whole - parts).abs() <= 1e-9 * whole.abs().max(1.0));
        }
    }
}
