//! Polling
//!
//! Each entry polls at the lowest interval among its subscribers, falling
//! back to the endpoint default for subscribers that set none. An interval
//! of zero opts a subscriber out. The next poll is scheduled whenever a
//! fetch settles.

use super::{CacheHandler, HandlerContext};
use crate::actions::ApiAction;
use crate::api::refetch_key;
use crate::state::{QueryCacheKey, QueryStatus};
use reflow_runtime::TaskHandle;
use reflow_runtime::metrics::QueryMetrics;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

struct Poll {
    /// `None` when the interval is too long to represent.
    next_at: Option<Instant>,
    timer: Option<TaskHandle>,
}

#[derive(Default)]
pub(crate) struct Polling {
    polls: Arc<Mutex<HashMap<QueryCacheKey, Poll>>>,
}

impl Polling {
    fn lock(&self) -> MutexGuard<'_, HashMap<QueryCacheKey, Poll>> {
        self.polls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `None` when the entry is missing or was never fetched, otherwise
    /// the lowest active interval, if any.
    fn lowest_interval(key: &QueryCacheKey, cx: &HandlerContext<'_>) -> Option<Option<Duration>> {
        let entry = cx.after()?.query(key)?;
        if entry.status == QueryStatus::Uninitialized {
            return None;
        }
        let fallback = cx
            .shared
            .endpoints
            .get(&entry.endpoint_name)
            .and_then(|endpoint| endpoint.default_polling_interval());
        Some(
            cx.live
                .options(key)
                .into_iter()
                .filter_map(|options| options.polling_interval.or(fallback))
                .filter(|interval| !interval.is_zero())
                .min(),
        )
    }

    fn cleanup(&self, key: &QueryCacheKey) {
        if let Some(poll) = self.lock().remove(key) {
            if let Some(timer) = poll.timer {
                timer.cancel();
            }
        }
    }

    fn cleanup_all(&self) {
        for (_, poll) in self.lock().drain() {
            if let Some(timer) = poll.timer {
                timer.cancel();
            }
        }
    }

    fn start_next_poll(&self, key: &QueryCacheKey, cx: &HandlerContext<'_>) {
        let Some(Some(interval)) = Self::lowest_interval(key, cx) else {
            return;
        };

        let mut polls = self.lock();
        if let Some(timer) = polls.get_mut(key).and_then(|poll| poll.timer.take()) {
            timer.cancel();
        }

        let api = cx.api.clone();
        let shared = Arc::clone(cx.shared);
        let target = key.clone();
        let timer = reflow_runtime::spawn_after("query-poll", interval, async move {
            tracing::trace!(api = shared.path(), key = %target, "Polling query");
            QueryMetrics::record_poll_refetch();
            if let Err(error) = refetch_key(&shared, &api, &target) {
                tracing::error!(api = shared.path(), key = %target, error = %error, "Polling refetch failed");
            }
        });
        polls.insert(
            key.clone(),
            Poll {
                next_at: Instant::now().checked_add(interval),
                timer,
            },
        );
    }

    fn update_interval(&self, key: &QueryCacheKey, cx: &HandlerContext<'_>) {
        let Some(lowest) = Self::lowest_interval(key, cx) else {
            return;
        };
        let Some(interval) = lowest else {
            self.cleanup(key);
            return;
        };
        let next_at = Instant::now().checked_add(interval);
        let sooner = self.lock().get(key).is_none_or(|poll| match (next_at, poll.next_at) {
            (Some(next), Some(scheduled)) => next < scheduled,
            (Some(_), None) => true,
            (None, _) => false,
        });
        if sooner {
            self.start_next_poll(key, cx);
        }
    }
}

impl CacheHandler for Polling {
    fn handle(&self, action: &ApiAction<'_>, cx: &mut HandlerContext<'_>) {
        match action {
            ApiAction::SubscriptionAdded(subscription)
            | ApiAction::SubscriptionRemoved(subscription)
            | ApiAction::SubscriptionOptionsUpdated(subscription) => {
                self.update_interval(&subscription.key, cx);
            },
            ApiAction::Pending(pending) => self.update_interval(&pending.arg.key, cx),
            ApiAction::Fulfilled(fulfilled) => self.start_next_poll(&fulfilled.arg.key, cx),
            ApiAction::Rejected(rejected) => self.start_next_poll(&rejected.arg.key, cx),
            ApiAction::QueryRemoved(key) => self.cleanup(key),
            ApiAction::ResetApiState => self.cleanup_all(),
            _ => {},
        }
    }
}
