//! Benchmark runner: wires the HTTP invoker into a dispatcher and prices
//! the outcome.

use std::time::Instant;

use super::config::RunParams;
use super::dispatcher::Dispatcher;
use super::invoker::{HttpInvoker, Invoker};
use super::report::CostReport;
use crate::config::TierTable;
use crate::error::Result;

/// Idle connections kept per function host
const POOL_MAX_IDLE_PER_HOST: usize = 500;

/// Benchmark runner that executes a full run against a tier table
pub struct BenchmarkRunner<I: Invoker = HttpInvoker> {
    dispatcher: Dispatcher<I>,
    params: RunParams,
}

impl BenchmarkRunner<HttpInvoker> {
    /// Create a runner that invokes the tiers over HTTP
    pub fn new(tiers: TierTable, params: RunParams) -> Result<Self> {
        params.validate()?;
        let invoker = HttpInvoker::new(params.request_timeout, POOL_MAX_IDLE_PER_HOST)?;
        Self::with_invoker(tiers, params, invoker)
    }
}

impl<I: Invoker> BenchmarkRunner<I> {
    /// Create a runner around any invoker
    pub fn with_invoker(tiers: TierTable, params: RunParams, invoker: I) -> Result<Self> {
        let dispatcher = Dispatcher::new(tiers, params.clone(), invoker)?;
        Ok(Self { dispatcher, params })
    }

    /// Run every invocation and build the cost report
    pub async fn run(&self) -> CostReport {
        let start = Instant::now();
        let aggregate = self.dispatcher.run().await;
        tracing::info!(
            elapsed_secs = start.elapsed().as_secs_f64(),
            "Run finished"
        );
        CostReport::from_aggregate(&aggregate, &self.params)
    }
}
