//! Load-test engine for memory tiers of a remote compute function.
//!
//! This module provides:
//! - Concurrency limiter bounding in-flight invocations process-wide
//! - HTTP invoker for the prime-search endpoint protocol
//! - Dispatcher fanning every (tier, repetition) pair out and joining them
//! - Collector folding results into per-tier totals
//! - Linear cost model and report generation
//! - Local prime-search endpoint for standalone runs

pub mod collector;
pub mod config;
pub mod cost;
pub mod dispatcher;
pub mod invoker;
pub mod limiter;
pub mod mock_server;
pub mod report;
pub mod runner;

pub use collector::{Collector, RunAggregate, TierAggregate};
pub use config::{MockServerConfig, RunParams};
pub use cost::CostModel;
pub use dispatcher::Dispatcher;
pub use invoker::{HttpInvoker, InvocationRequest, InvocationResult, Invoker};
pub use limiter::{ConcurrencyLimiter, LimiterPermit};
pub use mock_server::MockLambdaServer;
pub use report::{CostReport, TierReport};
pub use runner::BenchmarkRunner;
