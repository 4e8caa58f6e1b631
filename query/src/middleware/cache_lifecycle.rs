//! `on_cache_entry_added` hooks
//!
//! A hook starts when a pending fetch creates a new entry. It is told
//! about the first successful result and about the entry's removal.

use super::{CacheHandler, HandlerContext};
use crate::actions::ApiAction;
use crate::lifecycle::{CacheLifecycle, EntryProgress, run_hook};
use crate::state::QueryCacheKey;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

#[derive(Default)]
pub(crate) struct CacheLifecycleHandler {
    entries: Mutex<HashMap<QueryCacheKey, watch::Sender<EntryProgress>>>,
}

impl CacheLifecycleHandler {
    fn lock(&self) -> MutexGuard<'_, HashMap<QueryCacheKey, watch::Sender<EntryProgress>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mark_removed(progress: &watch::Sender<EntryProgress>) {
        progress.send_modify(|current| current.removed = true);
    }
}

impl CacheHandler for CacheLifecycleHandler {
    fn handle(&self, action: &ApiAction<'_>, cx: &mut HandlerContext<'_>) {
        match action {
            ApiAction::Pending(pending) => {
                let key = &pending.arg.key;
                let existed = cx.before().is_some_and(|slice| slice.queries.contains_key(key));
                let exists = cx.after().is_some_and(|slice| slice.queries.contains_key(key));
                if existed || !exists {
                    return;
                }
                let Some(hook) = cx
                    .shared
                    .endpoints
                    .get(&pending.arg.endpoint_name)
                    .and_then(|endpoint| endpoint.cache_entry_added_hook())
                else {
                    return;
                };

                let (progress, receiver) = watch::channel(EntryProgress::default());
                if let Some(previous) = self.lock().insert(key.clone(), progress) {
                    Self::mark_removed(&previous);
                }
                let lifecycle = CacheLifecycle::new(
                    cx.api.clone(),
                    Arc::clone(cx.shared),
                    key.clone(),
                    pending.request_id.clone(),
                    receiver,
                );
                run_hook(
                    "on-cache-entry-added",
                    pending.arg.endpoint_name.clone(),
                    hook(pending.arg.original_args.clone(), lifecycle),
                );
            },
            ApiAction::Fulfilled(fulfilled) => {
                let applied = cx
                    .after()
                    .and_then(|slice| slice.query(&fulfilled.arg.key))
                    .is_some_and(|entry| entry.request_id == fulfilled.request_id);
                if !applied {
                    return;
                }
                if let Some(progress) = self.lock().get(&fulfilled.arg.key) {
                    progress.send_if_modified(|current| {
                        if current.data.is_some() {
                            return false;
                        }
                        current.data = Some(fulfilled.data.clone());
                        true
                    });
                }
            },
            ApiAction::QueryRemoved(key) => {
                if let Some(progress) = self.lock().remove(*key) {
                    Self::mark_removed(&progress);
                }
            },
            ApiAction::ResetApiState => {
                for (_, progress) in self.lock().drain() {
                    Self::mark_removed(&progress);
                }
            },
            _ => {},
        }
    }
}
