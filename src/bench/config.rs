//! Configuration structs for benchmarking.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::cost::CostModel;
use crate::error::{BenchError, Result};

/// Parameters of a single benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunParams {
    /// Upper bound of the prime search performed by each invocation
    pub max_prime: u64,
    /// Invocations per tier
    pub num_executions: usize,
    /// Repetitions of the prime search inside one invocation
    pub num_loops: u32,
    /// Process-wide ceiling on in-flight invocations
    pub max_concurrency: usize,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// Whole-run timeout; `None` waits for every invocation
    pub run_timeout: Option<Duration>,
    /// Pricing used for the cost estimate
    pub cost: CostModel,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            max_prime: 1_000_000,
            num_executions: 20,
            num_loops: 1,
            max_concurrency: 80,
            request_timeout: Duration::from_secs(300),
            run_timeout: None,
            cost: CostModel::default(),
        }
    }
}

impl RunParams {
    /// Reject out-of-range parameters before anything is dispatched
    pub fn validate(&self) -> Result<()> {
        if self.max_prime < 3 {
            return Err(BenchError::Validation(
                "--max must be 3 or greater".to_string(),
            ));
        }
        if self.num_executions < 1 {
            return Err(BenchError::Validation(
                "--execs must be 1 or greater".to_string(),
            ));
        }
        if self.num_loops < 1 {
            return Err(BenchError::Validation(
                "--loops must be 1 or greater".to_string(),
            ));
        }
        if self.max_concurrency < 1 {
            return Err(BenchError::Validation(
                "--conc must be 1 or greater".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(BenchError::Validation(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        if matches!(self.run_timeout, Some(t) if t.is_zero()) {
            return Err(BenchError::Validation(
                "run timeout must be greater than zero".to_string(),
            ));
        }
        self.cost.validate()
    }
}

/// Configuration for the local compute endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockServerConfig {
    /// Port to listen on (0 for random)
    pub port: u16,
    /// Extra latency added to every response in milliseconds
    pub latency_ms: u64,
    /// Error rate (0.0 to 1.0)
    pub error_rate: f64,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            latency_ms: 0,
            error_rate: 0.0,
        }
    }
}

impl MockServerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.error_rate) {
            return Err(BenchError::Validation(
                "--error-rate must be between 0.0 and 1.0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_validation(params: RunParams, expected: &str) {
        match params.validate() {
            Err(BenchError::Validation(msg)) => assert_eq!(msg, expected),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let params = RunParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.max_prime, 1_000_000);
        assert_eq!(params.num_executions, 20);
        assert_eq!(params.num_loops, 1);
        assert_eq!(params.max_concurrency, 80);
        assert!(params.run_timeout.is_none());
    }

    #[test]
    fn test_parameter_lower_bounds() {
        assert_validation(
            RunParams {
                max_prime: 2,
                ..Default::default()
            },
            "--max must be 3 or greater",
        );
        assert_validation(
            RunParams {
                num_executions: 0,
                ..Default::default()
            },
            "--execs must be 1 or greater",
        );
        assert_validation(
            RunParams {
                num_loops: 0,
                ..Default::default()
            },
            "--loops must be 1 or greater",
        );
        assert_validation(
            RunParams {
                max_concurrency: 0,
                ..Default::default()
            },
            "--conc must be 1 or greater",
        );
    }

    #[test]
    fn test_boundary_values_accepted() {
        let params = RunParams {
            max_prime: 3,
            num_executions: 1,
            num_loops: 1,
            max_concurrency: 1,
            ..Default::default()
        };
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        assert_validation(
            RunParams {
                request_timeout: Duration::ZERO,
                ..Default::default()
            },
            "request timeout must be greater than zero",
        );
        assert_validation(
            RunParams {
                run_timeout: Some(Duration::ZERO),
                ..Default::default()
            },
            "run timeout must be greater than zero",
        );
    }

    #[test]
    fn test_invalid_cost_model_rejected() {
        let params = RunParams {
            cost: CostModel {
                cost_per_request: -1.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(BenchError::Validation(_))));
    }

    #[test]
    fn test_error_rate_range() {
        for rate in [0.0, 0.5, 1.0] {
            let config = MockServerConfig {
                error_rate: rate,
                ..Default::default()
            };
            assert!(config.validate().is_ok(), "{} rejected", rate);
        }
        for rate in [-0.1, 1.5, f64::NAN, f64::INFINITY] {
            let config = MockServerConfig {
                error_rate: rate,
                ..Default::default()
            };
            match config.validate() {
                Err(BenchError::Validation(msg)) => {
                    assert_eq!(msg, "--error-rate must be between 0.0 and 1.0")
                }
                other => panic!("{} accepted: {:?}", rate, other),
            }
        }
    }
}
