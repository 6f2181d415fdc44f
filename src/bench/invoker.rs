//! One remote invocation of a tier's compute endpoint.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};

use crate::error::InvocationError;

/// A single scheduled call. Built once by the dispatcher and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRequest {
    pub tier: u32,
    pub endpoint: String,
    pub search_bound: u64,
    pub loop_count: u32,
}

/// Outcome of one invocation as seen by the collector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InvocationResult {
    pub tier: u32,
    /// Compute time reported by the endpoint; always zero on failure
    pub duration_secs: f64,
    pub success: bool,
}

impl InvocationResult {
    pub fn success(tier: u32, duration_secs: f64) -> Self {
        Self {
            tier,
            duration_secs,
            success: true,
        }
    }

    pub fn failure(tier: u32) -> Self {
        Self {
            tier,
            duration_secs: 0.0,
            success: false,
        }
    }
}

/// Performs one remote call. Implementations must not retry.
pub trait Invoker: Send + Sync + 'static {
    fn invoke(
        &self,
        request: &InvocationRequest,
    ) -> impl Future<Output = Result<InvocationResult, InvocationError>> + Send;
}

/// Body returned by the compute endpoint
#[derive(Debug, Deserialize)]
struct DurationRecord {
    #[serde(rename = "durationSeconds")]
    duration_seconds: f64,
    #[serde(default)]
    max: Option<u64>,
    #[serde(default)]
    loops: Option<u32>,
}

/// Invoker that calls the endpoint over HTTP:
/// `GET {endpoint}?max={search_bound}&loops={loop_count}`
#[derive(Clone)]
pub struct HttpInvoker {
    client: reqwest::Client,
}

impl HttpInvoker {
    /// Create an invoker whose requests give up after `request_timeout`
    pub fn new(request_timeout: Duration, max_idle_per_host: usize) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .pool_max_idle_per_host(max_idle_per_host)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

impl Invoker for HttpInvoker {
    async fn invoke(
        &self,
        request: &InvocationRequest,
    ) -> Result<InvocationResult, InvocationError> {
        let tier = request.tier;
        let start = Instant::now();

        let response = self
            .client
            .get(&request.endpoint)
            .query(&[
                ("max", request.search_bound.to_string()),
                ("loops", request.loop_count.to_string()),
            ])
            .send()
            .await
            .map_err(|e| transport_error(tier, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InvocationError::Status {
                tier,
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(tier, &e))?;
        let duration_secs = decode_duration(tier, &body)?;

        tracing::debug!(
            tier = tier,
            duration_secs = duration_secs,
            round_trip_ms = start.elapsed().as_millis() as u64,
            "Invocation succeeded"
        );

        Ok(InvocationResult::success(tier, duration_secs))
    }
}

/// Categorize a reqwest error for logging
fn transport_error(tier: u32, e: &reqwest::Error) -> InvocationError {
    let kind = if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connection_failed"
    } else if e.is_request() || e.is_builder() {
        "request_error"
    } else if e.is_body() || e.is_decode() {
        "body_error"
    } else {
        "unknown"
    };

    InvocationError::Transport {
        tier,
        kind,
        message: e.to_string(),
    }
}

/// Parse the endpoint body into a non-negative duration in seconds
pub fn decode_duration(tier: u32, body: &[u8]) -> Result<f64, InvocationError> {
    let record: DurationRecord =
        serde_json::from_slice(body).map_err(|e| InvocationError::Decode {
            tier,
            message: e.to_string(),
        })?;

    if !record.duration_seconds.is_finite() || record.duration_seconds < 0.0 {
        return Err(InvocationError::Decode {
            tier,
            message: format!("invalid durationSeconds: {}", record.duration_seconds),
        });
    }

    tracing::trace!(
        tier = tier,
        max = ?record.max,
        loops = ?record.loops,
        "Decoded duration record"
    );

    Ok(record.duration_seconds)
}
