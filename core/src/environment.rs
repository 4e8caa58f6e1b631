//! Injected dependencies
//!
//! Anything that reads the outside world goes through a trait here so tests
//! can substitute deterministic implementations.

use chrono::{DateTime, Utc};

/// Wall-clock time, used for cache entry timestamps.
///
/// # Examples
///
/// ```
/// use reflow_core::{Clock, SystemClock};
///
/// let clock = SystemClock;
/// assert!(clock.now() <= chrono::Utc::now());
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// The production clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
