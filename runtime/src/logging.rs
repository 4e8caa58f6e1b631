//! Action logging middleware

use crate::metrics::StoreMetrics;
use crate::middleware::{Middleware, Next};
use crate::store::{DispatchResult, StoreApi};
use reflow_core::Action;
use std::time::Instant;

/// Logs every dispatched action with its latency through the rest of the
/// chain.
///
/// Place it first so the timing covers every other middleware.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn handle(&self, _api: &StoreApi, action: Action, next: Next<'_>) -> DispatchResult {
        let action_type = action.action_type().clone();
        let started = Instant::now();
        let result = next.run(action);
        let elapsed = started.elapsed();

        match &result {
            Ok(Some(_)) => {
                tracing::debug!(action = %action_type, elapsed_us = elapsed.as_micros(), "Action dispatched");
            },
            Ok(None) => {
                tracing::debug!(action = %action_type, elapsed_us = elapsed.as_micros(), "Action absorbed by middleware");
            },
            Err(error) => {
                tracing::warn!(action = %action_type, error = %error, "Dispatch failed");
            },
        }
        StoreMetrics::record_chain(elapsed);
        result
    }
}
