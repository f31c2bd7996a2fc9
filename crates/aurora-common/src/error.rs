//! Error types for Project Aurora.
//!
//! The streaming core has no fatal errors: pool exhaustion is a designed
//! eviction trigger and stale worker responses are silently discarded. The
//! types here cover the offload boundary and configuration I/O, where
//! faults degrade throughput but never correctness.

use thiserror::Error;

/// Top-level error type for Aurora operations.
#[derive(Debug, Error)]
pub enum AuroraError {
    /// Streaming/offload errors
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the chunk streaming and offload subsystem.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The background worker stopped responding or its channel closed.
    ///
    /// Recoverable: requests fail over to synchronous computation.
    #[error("Background worker unavailable: {0}")]
    WorkerUnavailable(String),

    /// A response arrived whose correlation id matches no pending request.
    ///
    /// Expected when a chunk is evicted mid-flight; the result is dropped.
    #[error("Stale response for correlation id {0}")]
    StaleResponse(u64),
}

/// Result type alias for Aurora operations.
pub type AuroraResult<T> = Result<T, AuroraError>;
