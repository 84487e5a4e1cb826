//! crates/coffee_analysis_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like model providers or
//! rate-limit stores.

use crate::domain::ChatMessage;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The inference provider (or its transport) failed. The inner detail is
    /// for server-side logs only and must never be surfaced to a caller.
    #[error("Upstream inference error: {0}")]
    Upstream(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A lazy, finite, non-restartable sequence of text chunks produced by the
/// model, in arrival order. The stream ends exactly once; the consumer is
/// responsible for concatenating chunks into the final answer text.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String, PortError>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ChatStreamService: Send + Sync {
    /// Forwards a validated message sequence (with embedded image data) to
    /// the external model and returns its output as an incremental stream.
    async fn stream_chat(&self, messages: Vec<ChatMessage>) -> PortResult<ChatStream>;
}

/// The outcome of a rate-limit check for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    /// The caller should back off for the given number of seconds.
    Limited { retry_after_secs: u64 },
}

#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Records one request from `client_id` and decides whether it may
    /// proceed. Concurrent calls for the same identifier must not
    /// undercount.
    async fn check(&self, client_id: &str) -> RateLimitDecision;
}
