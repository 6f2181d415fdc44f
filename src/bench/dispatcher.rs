//! Fan-out of every (tier, repetition) pair under the concurrency ceiling,
//! fan-in through a single collector.
//!
//! # Flow
//! 1. Build one [`InvocationRequest`] per tier and repetition.
//! 2. Spawn the collector, the only owner of the [`RunAggregate`].
//! 3. Spawn one task per request into a `JoinSet`. Each task takes a limiter
//!    permit, invokes, drops the permit and sends exactly one result.
//! 4. Join every task (optionally bounded by the run timeout, after which the
//!    rest are aborted), then wait for the collector.
//! 5. Any request that never produced a result is accounted as lost.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use super::collector::{Collector, RunAggregate};
use super::config::RunParams;
use super::invoker::{InvocationRequest, InvocationResult, Invoker};
use super::limiter::ConcurrencyLimiter;
use crate::config::TierTable;
use crate::error::{BenchError, Result};

/// Schedules a run's invocations and returns its aggregate
pub struct Dispatcher<I: Invoker> {
    tiers: TierTable,
    params: RunParams,
    invoker: Arc<I>,
    limiter: ConcurrencyLimiter,
}

impl<I: Invoker> Dispatcher<I> {
    /// Validate the inputs and build a dispatcher. Nothing runs yet.
    pub fn new(tiers: TierTable, params: RunParams, invoker: I) -> Result<Self> {
        if tiers.is_empty() {
            return Err(BenchError::Config("no functions defined".to_string()));
        }
        params.validate()?;

        let limiter = ConcurrencyLimiter::new(params.max_concurrency);
        Ok(Self {
            tiers,
            params,
            invoker: Arc::new(invoker),
            limiter,
        })
    }

    /// Limiter shared by every task of this dispatcher
    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    /// Every request of the run, tiers ascending, repetitions in order
    pub fn plan(&self) -> Vec<InvocationRequest> {
        let executions = self.params.num_executions;
        let search_bound = self.params.max_prime;
        let loop_count = self.params.num_loops;

        self.tiers
            .iter()
            .flat_map(move |(tier, endpoint)| {
                (0..executions).map(move |_| InvocationRequest {
                    tier,
                    endpoint: endpoint.to_string(),
                    search_bound,
                    loop_count,
                })
            })
            .collect()
    }

    /// Run every planned invocation and return the finished aggregate
    pub async fn run(&self) -> RunAggregate {
        let requests = self.plan();
        let expected = requests.len();

        tracing::info!(
            tiers = self.tiers.len(),
            executions = self.params.num_executions,
            loops = self.params.num_loops,
            max_prime = self.params.max_prime,
            max_concurrency = self.limiter.capacity(),
            "Triggering {} invocations",
            expected
        );

        let (tx, rx) = mpsc::channel::<InvocationResult>(self.limiter.capacity());
        let collector = tokio::spawn(Collector::new(self.tiers.memories(), expected).run(rx));

        let mut tasks = JoinSet::new();
        for request in requests {
            let limiter = self.limiter.clone();
            let invoker = self.invoker.clone();
            let tx = tx.clone();
            tasks.spawn(async move {
                let result = invoke_limited(&limiter, invoker.as_ref(), &request).await;
                // Only fails once the collector has everything it expects
                let _ = tx.send(result).await;
            });
        }
        // The collector sees the channel close once the last task is done
        drop(tx);

        let mut panicked = 0;
        let finished = match self.params.run_timeout {
            Some(limit) => tokio::time::timeout(limit, join_all(&mut tasks, &mut panicked))
                .await
                .is_ok(),
            None => {
                join_all(&mut tasks, &mut panicked).await;
                true
            }
        };
        if !finished {
            tracing::warn!(
                outstanding = tasks.len(),
                "Run timeout elapsed, aborting outstanding invocations"
            );
            tasks.abort_all();
            join_all(&mut tasks, &mut panicked).await;
        }
        if panicked > 0 {
            tracing::error!(panicked = panicked, "Invocation tasks panicked");
        }

        let mut aggregate = match collector.await {
            Ok(aggregate) => aggregate,
            Err(e) => {
                tracing::error!(error = %e, "Collector task failed");
                RunAggregate::new(self.tiers.memories())
            }
        };

        let missing = expected.saturating_sub(aggregate.received());
        if missing > 0 {
            tracing::warn!(
                missing = missing,
                expected = expected,
                "Invocations finished without a result"
            );
            aggregate.record_lost(missing);
        }

        tracing::info!(
            successes = aggregate.success_count(),
            errors = aggregate.error_count(),
            "All invocations accounted for"
        );
        aggregate
    }
}

/// Invoke while holding one limiter unit, reducing any error to a failed result
async fn invoke_limited<I: Invoker>(
    limiter: &ConcurrencyLimiter,
    invoker: &I,
    request: &InvocationRequest,
) -> InvocationResult {
    let permit = limiter.acquire().await;
    tracing::debug!(
        tier = request.tier,
        endpoint = %request.endpoint,
        in_flight = limiter.in_use(),
        "Invoking"
    );
    let outcome = invoker.invoke(request).await;
    permit.release();

    match outcome {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(
                tier = e.tier(),
                error_kind = e.kind(),
                error = %e,
                "Invocation failed"
            );
            InvocationResult::failure(request.tier)
        }
    }
}

/// Drain a join set, adding every panicked task (aborts excluded) to
/// `panicked` as it is joined
async fn join_all(tasks: &mut JoinSet<()>, panicked: &mut usize) {
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            if e.is_panic() {
                *panicked += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvocationError;
    use std::collections::BTreeMap;

    struct FixedInvoker(f64);

    impl Invoker for FixedInvoker {
        async fn invoke(
            &self,
            request: &InvocationRequest,
        ) -> std::result::Result<InvocationResult, InvocationError> {
            Ok(InvocationResult::success(request.tier, self.0))
        }
    }

    fn tiers(entries: &[(u32, &str)]) -> TierTable {
        TierTable::new(
            entries
                .iter()
                .map(|(m, u)| (*m, u.to_string()))
                .collect::<BTreeMap<_, _>>(),
        )
        .unwrap()
    }

    #[test]
    fn test_plan_is_cross_product() {
        let params = RunParams {
            num_executions: 3,
            max_prime: 100,
            num_loops: 2,
            ..Default::default()
        };
        let dispatcher = Dispatcher::new(
            tiers(&[(256, "http://b"), (128, "http://a")]),
            params,
            FixedInvoker(0.1),
        )
        .unwrap();

        let plan = dispatcher.plan();
        assert_eq!(plan.len(), 6);
        assert_eq!(plan.iter().filter(|r| r.tier == 128).count(), 3);
        assert_eq!(plan.iter().filter(|r| r.tier == 256).count(), 3);
        assert!(plan
            .iter()
            .all(|r| r.search_bound == 100 && r.loop_count == 2));
        assert_eq!(plan[0].endpoint, "http://a");
        assert_eq!(plan[5].endpoint, "http://b");
    }

    #[test]
    fn test_new_rejects_invalid_params() {
        let params = RunParams {
            max_concurrency: 0,
            ..Default::default()
        };
        let result = Dispatcher::new(tiers(&[(128, "http://a")]), params, FixedInvoker(0.1));
        assert!(matches!(result, Err(BenchError::Validation(_))));
    }

    #[tokio::test]
    async fn test_panics_counted_before_timeout_survive() {
        let mut tasks = JoinSet::new();
        tasks.spawn(async { panic!("boom") });
        tasks.spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        });

        let mut panicked = 0;
        let finished = tokio::time::timeout(
            std::time::Duration::from_millis(200),
            join_all(&mut tasks, &mut panicked),
        )
        .await
        .is_ok();
        assert!(!finished);
        assert_eq!(panicked, 1);

        tasks.abort_all();
        join_all(&mut tasks, &mut panicked).await;
        assert_eq!(panicked, 1);
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn test_run_releases_every_unit() {
        let params = RunParams {
            num_executions: 10,
            max_concurrency: 3,
            ..Default::default()
        };
        let dispatcher =
            Dispatcher::new(tiers(&[(128, "http://a")]), params, FixedInvoker(0.5)).unwrap();

        let aggregate = dispatcher.run().await;
        assert_eq!(aggregate.received(), 10);
        assert_eq!(aggregate.tier(128).unwrap().success_count, 10);
        assert_eq!(dispatcher.limiter().available(), 3);
    }
}
