//! # Reflow Testing
//!
//! Testing utilities and helpers for Reflow stores and middleware.
//!
//! This crate provides:
//! - Deterministic environment implementations ([`FixedClock`])
//! - Scripted query functions that count their calls ([`MockQuery`])
//! - Capture of `tracing` diagnostics ([`Diagnostics`], [`capture_diagnostics`])
//! - A middleware recording every dispatched action ([`ActionRecorder`])
//! - A Given-When-Then harness for reducers ([`ReducerTest`])
//!
//! ## Example
//!
//! ```
//! use reflow_core::{Action, State, slice_reducer};
//! use reflow_runtime::{ApplyMiddleware, create_store_with_enhancer};
//! use reflow_testing::ActionRecorder;
//!
//! let recorder = ActionRecorder::new();
//! let counter = slice_reducer(0_i64, |n: &i64, a: &Action| a.is("INC").then(|| n + 1));
//! let store = create_store_with_enhancer(
//!     counter,
//!     None,
//!     ApplyMiddleware::new().with(recorder.clone()),
//! )
//! .unwrap();
//!
//! store.dispatch(Action::new("INC")).unwrap();
//! assert_eq!(recorder.types(), vec!["INC".to_string()]);
//! assert_eq!(store.get_state(), State::new(1_i64));
//! ```

use chrono::{DateTime, Utc};
use reflow_core::Clock;

pub mod diagnostics;
pub mod query;
pub mod recorder;
pub mod reducer_test;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Returns the same time until moved with [`FixedClock::advance`].
    ///
    /// # Example
    ///
    /// ```
    /// use reflow_testing::mocks::FixedClock;
    /// use reflow_core::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2);
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward. Every clone sees the new time.
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

pub use diagnostics::{Diagnostic, Diagnostics, capture_diagnostics};
pub use mocks::{FixedClock, test_clock};
pub use query::MockQuery;
pub use recorder::ActionRecorder;
pub use reducer_test::ReducerTest;
