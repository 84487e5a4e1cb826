//! services/api/src/lib.rs
//!
//! The coffee-package analysis service: image intake (validation and
//! compression), a rate-limited streaming chat proxy, and the glue that
//! turns model output into structured analysis records.

pub mod adapters;
pub mod config;
pub mod error;
pub mod intake;
pub mod web;
