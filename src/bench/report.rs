//! Report generation for benchmark results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::collector::RunAggregate;
use super::config::RunParams;
use super::cost::average_duration;

/// Complete cost report of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostReport {
    /// Results per tier, ascending by memory size
    pub tiers: Vec<TierReport>,
    /// Failed invocations, lost ones included
    pub error_count: u64,
    /// Invocations that never reported back (run timeout or crash)
    pub lost_count: u64,
    /// Sum of every tier's cost
    pub total_cost: f64,
    pub max_prime: u64,
    pub num_executions: usize,
    pub num_loops: u32,
    pub generated_at: DateTime<Utc>,
}

/// Results for a single memory tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierReport {
    pub memory: u32,
    /// `None` when the tier had no successful invocation
    pub average_duration_secs: Option<f64>,
    pub p50_duration_secs: Option<f64>,
    pub p99_duration_secs: Option<f64>,
    pub cost: f64,
    pub success_count: u64,
}

impl CostReport {
    /// Price an aggregate with the run's cost model
    pub fn from_aggregate(aggregate: &RunAggregate, params: &RunParams) -> Self {
        let model = &params.cost;
        let tiers: Vec<TierReport> = aggregate
            .tiers()
            .map(|(memory, agg)| TierReport {
                memory,
                average_duration_secs: average_duration(agg.total_duration_secs, agg.success_count),
                p50_duration_secs: agg.percentile_secs(50.0),
                p99_duration_secs: agg.percentile_secs(99.0),
                cost: model.cost(memory, agg.total_duration_secs, agg.success_count),
                success_count: agg.success_count,
            })
            .collect();

        let total_cost = tiers.iter().map(|t| t.cost).sum();

        Self {
            tiers,
            error_count: aggregate.error_count(),
            lost_count: aggregate.lost_count(),
            total_cost,
            max_prime: params.max_prime,
            num_executions: params.num_executions,
            num_loops: params.num_loops,
            generated_at: Utc::now(),
        }
    }

    pub fn tier(&self, memory: u32) -> Option<&TierReport> {
        self.tiers.iter().find(|t| t.memory == memory)
    }

    /// Whether any invocation failed
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Print the report as an ASCII table
    pub fn print_table(&self) {
        println!();
        println!("╔══════════════════════════════════════════════════════════════════════════╗");
        println!("║                        LAMBDA COST BENCHMARK RESULTS                     ║");
        println!("╚══════════════════════════════════════════════════════════════════════════╝");
        println!();
        println!(
            "Each invocation looped {} time(s), calculating all primes <= {}",
            self.num_loops, self.max_prime
        );
        println!();
        println!("┌──────────┬────────────┬────────────┬────────────┬──────────────┬─────────┐");
        println!("│  Memory  │  avg (s)   │  p50 (s)   │  p99 (s)   │  cost (USD)  │  count  │");
        println!("├──────────┼────────────┼────────────┼────────────┼──────────────┼─────────┤");

        for tier in &self.tiers {
            println!(
                "│ {:>6}mb │ {:>10} │ {:>10} │ {:>10} │ {:>12.8} │ {:>7} │",
                tier.memory,
                format_secs(tier.average_duration_secs),
                format_secs(tier.p50_duration_secs),
                format_secs(tier.p99_duration_secs),
                tier.cost,
                tier.success_count
            );
        }

        println!("└──────────┴────────────┴────────────┴────────────┴──────────────┴─────────┘");
        println!();
        self.print_summary();
    }

    /// Print error count and total cost
    pub fn print_summary(&self) {
        if self.has_errors() {
            println!(
                "WARNING: {} invocation(s) returned errors and were excluded from the stats",
                self.error_count
            );
            if self.lost_count > 0 {
                println!(
                    "         {} of them never completed before the run ended",
                    self.lost_count
                );
            }
        } else {
            println!("Number of invocations returning errors: 0");
        }
        println!("Total cost of this test run: ${:.6}", self.total_cost);
        println!();
    }

    /// Export the report as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Seconds with six decimals, or "no data"
fn format_secs(value: Option<f64>) -> String {
    match value {
        Some(secs) => format!("{:.6}", secs),
        None => "no data".to_string(),
    }
}
