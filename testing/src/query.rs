//! Scripted query functions
//!
//! [`MockQuery`] stands in for a network call: it records every call,
//! answers from a queue of scripted responses and falls back to echoing
//! its arguments with the call number.

use futures::future::BoxFuture;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

#[derive(Default)]
struct MockState {
    scripted: VecDeque<Result<Value, Value>>,
    calls: Vec<Value>,
    delay: Duration,
}

/// A scripted query function.
///
/// Clones share the same script and call log.
///
/// # Example
///
/// ```
/// use reflow_testing::MockQuery;
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let mock = MockQuery::new();
/// mock.respond_ok(json!(["first"]));
///
/// assert_eq!(mock.call(json!(null)).await, Ok(json!(["first"])));
/// assert_eq!(mock.call(json!(7)).await, Ok(json!({ "args": 7, "call": 2 })));
/// assert_eq!(mock.calls(), 2);
/// # });
/// ```
#[derive(Clone, Default)]
pub struct MockQuery {
    state: Arc<Mutex<MockState>>,
}

impl MockQuery {
    /// A mock with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response by `delay` (Tokio time, so paused clocks work).
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        self.lock().delay = delay;
        self
    }

    /// Queue a successful response.
    pub fn respond_ok(&self, value: Value) -> &Self {
        self.lock().scripted.push_back(Ok(value));
        self
    }

    /// Queue a failed response.
    pub fn respond_err(&self, error: Value) -> &Self {
        self.lock().scripted.push_back(Err(error));
        self
    }

    /// Run the query.
    pub fn call(&self, args: Value) -> BoxFuture<'static, Result<Value, Value>> {
        let (response, delay) = {
            let mut state = self.lock();
            state.calls.push(args.clone());
            let call = state.calls.len();
            let response = state
                .scripted
                .pop_front()
                .unwrap_or_else(|| Ok(json!({ "args": args, "call": call })));
            (response, state.delay)
        };
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            response
        })
    }

    /// Number of calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.lock().calls.len()
    }

    /// Arguments of every call, in order.
    #[must_use]
    pub fn call_args(&self) -> Vec<Value> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for MockQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MockQuery")
            .field("calls", &state.calls.len())
            .field("scripted", &state.scripted.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_responses_come_first() {
        let mock = MockQuery::new();
        mock.respond_err(json!("offline")).respond_ok(json!(1));

        assert_eq!(mock.call(json!("a")).await, Err(json!("offline")));
        assert_eq!(mock.call(json!("b")).await, Ok(json!(1)));
        assert_eq!(
            mock.call(json!("c")).await,
            Ok(json!({ "args": "c", "call": 3 }))
        );
        assert_eq!(mock.call_args(), vec![json!("a"), json!("b"), json!("c")]);
    }

    #[tokio::test(start_paused = true)]
    async fn delay_uses_tokio_time() {
        let mock = MockQuery::new().with_delay(Duration::from_secs(3));
        let started = tokio::time::Instant::now();
        let _ = mock.call(Value::Null).await;
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert_eq!(mock.calls(), 1);
    }
}
