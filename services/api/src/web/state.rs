//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use coffee_analysis_core::ports::{ChatStreamService, RateLimitStore};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
///
/// The rate-limit table is the only shared mutable state; everything else
/// is per-request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// `None` when the model credential is absent from the environment;
    /// every chat request then fails closed with 503.
    pub chat_adapter: Option<Arc<dyn ChatStreamService>>,
    pub rate_limiter: Arc<dyn RateLimitStore>,
}
