//! Subscription batching
//!
//! Per-subscriber actions are applied to a live table owned by the
//! middleware and kept out of the reducer. A single
//! `subscriptions/updated` snapshot is dispatched once the current burst
//! of synchronous work has finished, so mounting many subscribers costs
//! one state update.

use crate::actions::ApiAction;
use crate::api::ApiShared;
use crate::state::{QueryCacheKey, SubscriptionOptions, SubscriptionTable};
use reflow_core::Action;
use reflow_runtime::StoreApi;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The middleware's up-to-date view of every subscriber.
#[derive(Debug, Clone, Default)]
pub(crate) struct LiveSubscriptions(Arc<Mutex<SubscriptionTable>>);

impl LiveSubscriptions {
    fn lock(&self) -> MutexGuard<'_, SubscriptionTable> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn count(&self, key: &QueryCacheKey) -> usize {
        self.lock().get(key).map_or(0, BTreeMap::len)
    }

    pub(crate) fn options(&self, key: &QueryCacheKey) -> Vec<SubscriptionOptions> {
        self.lock()
            .get(key)
            .map(|subscribers| subscribers.values().copied().collect())
            .unwrap_or_default()
    }

    pub(crate) fn snapshot(&self) -> SubscriptionTable {
        self.lock().clone()
    }

    /// Apply a subscription-affecting action. Returns whether the table
    /// changed.
    pub(crate) fn apply(&self, action: &ApiAction<'_>) -> bool {
        let mut table = self.lock();
        match action {
            ApiAction::Pending(pending) if pending.arg.subscribe => {
                table
                    .entry(pending.arg.key.clone())
                    .or_default()
                    .insert(pending.request_id.clone(), pending.arg.subscription_options);
                true
            },
            ApiAction::SubscriptionAdded(added) => {
                table
                    .entry(added.key.clone())
                    .or_default()
                    .insert(added.request_id.clone(), added.options);
                true
            },
            ApiAction::SubscriptionOptionsUpdated(updated) => {
                match table
                    .get_mut(&updated.key)
                    .and_then(|subscribers| subscribers.get_mut(&updated.request_id))
                {
                    Some(options) if *options != updated.options => {
                        *options = updated.options;
                        true
                    },
                    _ => false,
                }
            },
            // An emptied key stays in the table until its entry is removed.
            ApiAction::SubscriptionRemoved(removed) => table
                .get_mut(&removed.key)
                .and_then(|subscribers| subscribers.remove(&removed.request_id))
                .is_some(),
            ApiAction::QueryRemoved(key) => table.remove(*key).is_some(),
            ApiAction::ResetApiState => {
                let changed = !table.is_empty();
                table.clear();
                changed
            },
            _ => false,
        }
    }
}

/// Absorbs per-subscriber actions and schedules the snapshot flush.
pub(crate) struct BatchActions {
    shared: Arc<ApiShared>,
    live: LiveSubscriptions,
    flush_queued: Arc<AtomicBool>,
    inline_flush: AtomicBool,
}

impl BatchActions {
    pub(crate) fn new(shared: Arc<ApiShared>, live: LiveSubscriptions) -> Self {
        Self {
            shared,
            live,
            flush_queued: Arc::new(AtomicBool::new(false)),
            inline_flush: AtomicBool::new(false),
        }
    }

    /// Record the action. Returns `false` when it must not reach the
    /// reducer.
    pub(crate) fn observe(&self, action: Option<&ApiAction<'_>>, api: &StoreApi) -> bool {
        let Some(action) = action else {
            return true;
        };
        if self.live.apply(action) {
            self.schedule_flush(api);
        }
        !action.is_subscription_change()
    }

    fn schedule_flush(&self, api: &StoreApi) {
        if self.flush_queued.swap(true, Ordering::SeqCst) {
            return;
        }
        let queued = Arc::clone(&self.flush_queued);
        let live = self.live.clone();
        let shared = Arc::clone(&self.shared);
        let api_handle = api.clone();
        let task = async move {
            tokio::task::yield_now().await;
            queued.store(false, Ordering::SeqCst);
            let snapshot = live.snapshot();
            if let Err(error) = api_handle.dispatch(shared.actions.subscriptions_updated(snapshot)) {
                tracing::error!(api = shared.path(), error = %error, "Failed to flush subscriptions");
            }
        };
        if reflow_runtime::spawn("subscription-flush", task).is_none() {
            self.flush_queued.store(false, Ordering::SeqCst);
            self.inline_flush.store(true, Ordering::SeqCst);
        }
    }

    /// Without a runtime the snapshot is dispatched at the end of the
    /// current middleware pass instead.
    pub(crate) fn take_inline_flush(&self) -> Option<Action> {
        self.inline_flush
            .swap(false, Ordering::SeqCst)
            .then(|| self.shared.actions.subscriptions_updated(self.live.snapshot()))
    }
}
