// Error handling module
// Defines per-invocation errors and fatal run errors

use thiserror::Error;

/// Failure of a single remote invocation.
///
/// None of these abort the run: the dispatcher logs them and reduces the
/// call to a failed result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvocationError {
    /// The network call itself could not complete
    #[error("function {tier}mb transport error ({kind}): {message}")]
    Transport {
        tier: u32,
        kind: &'static str,
        message: String,
    },

    /// A response arrived with a non-success status
    #[error("function {tier}mb returned status code: {status}")]
    Status { tier: u32, status: u16 },

    /// The response body did not hold a usable duration record
    #[error("function {tier}mb returned an undecodable body: {message}")]
    Decode { tier: u32, message: String },
}

impl InvocationError {
    /// Tier the failed call was aimed at
    pub fn tier(&self) -> u32 {
        match self {
            InvocationError::Transport { tier, .. }
            | InvocationError::Status { tier, .. }
            | InvocationError::Decode { tier, .. } => *tier,
        }
    }

    /// Short label used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            InvocationError::Transport { .. } => "transport",
            InvocationError::Status { .. } => "status",
            InvocationError::Decode { .. } => "decode",
        }
    }
}

/// Errors that stop a run before any invocation is dispatched
#[derive(Error, Debug)]
pub enum BenchError {
    /// Missing or malformed tier mapping
    #[error("Configuration error: {0}")]
    Config(String),

    /// Run parameter out of range
    #[error("Validation error: {0}")]
    Validation(String),

    /// Setup failure outside the two categories above
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Result type alias for run setup
pub type Result<T> = std::result::Result<T, BenchError>;
