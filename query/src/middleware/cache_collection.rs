//! Eviction of unused cache entries
//!
//! When the last subscriber of an entry leaves, a removal timer starts
//! with the endpoint's keep-alive (or the api default). A new subscriber
//! cancels it; when it fires the subscriber count is checked again.

use super::{CacheHandler, HandlerContext};
use crate::actions::ApiAction;
use crate::config::KeepAlive;
use crate::state::QueryCacheKey;
use reflow_runtime::TaskHandle;
use reflow_runtime::metrics::QueryMetrics;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Timers = Arc<Mutex<HashMap<QueryCacheKey, TaskHandle>>>;

#[derive(Default)]
pub(crate) struct CacheCollection {
    timers: Timers,
}

fn lock(timers: &Timers) -> MutexGuard<'_, HashMap<QueryCacheKey, TaskHandle>> {
    timers.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CacheCollection {
    fn cancel(&self, key: &QueryCacheKey) {
        if let Some(timer) = lock(&self.timers).remove(key) {
            timer.cancel();
        }
    }

    fn cancel_all(&self) {
        for (_, timer) in lock(&self.timers).drain() {
            timer.cancel();
        }
    }

    fn on_unsubscribe(&self, key: &QueryCacheKey, cx: &HandlerContext<'_>) {
        if cx.live.count(key) > 0 {
            return;
        }
        let Some(entry) = cx.after().and_then(|slice| slice.query(key)) else {
            return;
        };
        let KeepAlive::For(keep_alive) = cx.shared.keep_alive_for(&entry.endpoint_name) else {
            return;
        };

        self.cancel(key);
        let timers = Arc::clone(&self.timers);
        let live = cx.live.clone();
        let api = cx.api.clone();
        let shared = Arc::clone(cx.shared);
        let target = key.clone();
        let timer = reflow_runtime::spawn_after("cache-collection", keep_alive, async move {
            lock(&timers).remove(&target);
            if live.count(&target) > 0 {
                return;
            }
            tracing::debug!(api = shared.path(), key = %target, "Removing unused cache entry");
            QueryMetrics::record_eviction();
            if let Err(error) = api.dispatch(shared.actions.query_removed(target.clone())) {
                tracing::error!(api = shared.path(), key = %target, error = %error, "Failed to remove cache entry");
            }
        });
        if let Some(timer) = timer {
            lock(&self.timers).insert(key.clone(), timer);
        }
    }
}

impl CacheHandler for CacheCollection {
    fn handle(&self, action: &ApiAction<'_>, cx: &mut HandlerContext<'_>) {
        match action {
            ApiAction::SubscriptionRemoved(removed) => self.on_unsubscribe(&removed.key, cx),
            ApiAction::SubscriptionAdded(added) => self.cancel(&added.key),
            ApiAction::Pending(pending) if pending.arg.subscribe => self.cancel(&pending.arg.key),
            ApiAction::QueryRemoved(key) => self.cancel(key),
            ApiAction::ResetApiState => self.cancel_all(),
            _ => {},
        }
    }
}
