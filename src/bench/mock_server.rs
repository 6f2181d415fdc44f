//! Local stand-in for the deployed prime-search function.
//!
//! Serves `GET /prime/{memory}?max=M&loops=L`, runs the sieve of
//! Eratosthenes up to `M`, `L` times, and answers with the same body the
//! deployed function returns: `{"durationSeconds": .., "max": .., "loops": ..}`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use rand::Rng;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use super::config::MockServerConfig;
use crate::config::TierTable;
use crate::error::Result;

/// Largest search bound the local endpoint accepts
const MAX_SEARCH_BOUND: u64 = 50_000_000;

/// Local prime-search endpoint for benchmarking
pub struct MockLambdaServer {
    config: MockServerConfig,
    shutdown_tx: Option<oneshot::Sender<()>>,
    port: u16,
}

impl MockLambdaServer {
    /// Create a new local endpoint with the given configuration
    pub fn new(config: MockServerConfig) -> Self {
        Self {
            config,
            shutdown_tx: None,
            port: 0,
        }
    }

    /// Start serving and return the actual port
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        self.config.validate()?;
        let addr = format!("127.0.0.1:{}", self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        self.port = port;

        let config = Arc::new(self.config.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let app = Router::new()
            .route("/prime/:memory", get(handle_prime))
            .with_state(config);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        tracing::info!(port = port, "Local prime endpoint listening");
        Ok(port)
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Endpoint URL for one memory tier
    pub fn endpoint(&self, memory: u32) -> String {
        format!("{}/prime/{}", self.url(), memory)
    }

    /// Tier table pointing every given memory size at this server
    pub fn tier_table(&self, memories: &[u32]) -> Result<TierTable> {
        let functions: BTreeMap<u32, String> = memories
            .iter()
            .map(|m| (*m, self.endpoint(*m)))
            .collect();
        TierTable::new(functions)
    }

    /// Stop the server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockLambdaServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Deserialize)]
struct PrimeQuery {
    max: Option<String>,
    loops: Option<String>,
}

/// Handle one prime-search invocation
async fn handle_prime(
    State(config): State<Arc<MockServerConfig>>,
    Path(memory): Path<u32>,
    Query(query): Query<PrimeQuery>,
) -> Response {
    let (max, loops) = match parse_query(&query) {
        Ok(parsed) => parsed,
        Err(message) => return (StatusCode::BAD_REQUEST, message).into_response(),
    };

    if config.latency_ms > 0 {
        tokio::time::sleep(Duration::from_millis(config.latency_ms)).await;
    }

    // Simulate random errors
    let fail = config.error_rate > 0.0 && rand::thread_rng().gen::<f64>() < config.error_rate;
    if fail {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Simulated error").into_response();
    }

    let search = tokio::task::spawn_blocking(move || {
        let start = Instant::now();
        for _ in 0..loops {
            let primes = eratosthenes(max);
            tracing::trace!(
                memory = memory,
                highest = ?primes.iter().rev().take(3).collect::<Vec<_>>(),
                "Highest 3 primes"
            );
        }
        start.elapsed()
    })
    .await;

    match search {
        Ok(elapsed) => Json(serde_json::json!({
            "durationSeconds": elapsed.as_secs_f64(),
            "max": max,
            "loops": loops,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Prime search task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Prime search failed").into_response()
        }
    }
}

fn parse_query(query: &PrimeQuery) -> std::result::Result<(u64, u32), String> {
    let max: u64 = query
        .max
        .as_deref()
        .ok_or("missing max")?
        .parse()
        .map_err(|_| "max must be an integer".to_string())?;
    let loops: u32 = query
        .loops
        .as_deref()
        .ok_or("missing loops")?
        .parse()
        .map_err(|_| "loops must be an integer".to_string())?;

    if !(3..=MAX_SEARCH_BOUND).contains(&max) {
        return Err(format!("max must be between 3 and {}", MAX_SEARCH_BOUND));
    }
    if loops < 1 {
        return Err("loops must be 1 or greater".to_string());
    }
    Ok((max, loops))
}

/// All primes up to and including `n`
pub fn eratosthenes(n: u64) -> Vec<u64> {
    let n = n as usize;
    if n < 2 {
        return Vec::new();
    }
    let mut sieve = vec![true; n + 1];
    sieve[0] = false;
    sieve[1] = false;

    let mut p = 2;
    while p * p <= n {
        if sieve[p] {
            for multiple in (p * p..=n).step_by(p) {
                sieve[multiple] = false;
            }
        }
        p += 1;
    }

    sieve
        .iter()
        .enumerate()
        .filter_map(|(i, is_prime)| is_prime.then_some(i as u64))
        .collect()
}
