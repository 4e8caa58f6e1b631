//! Lifecycle handles passed to endpoint hooks

use crate::api::{ApiShared, update_cached_data};
use crate::error::{LifecycleError, QueryError};
use crate::state::{QueryCacheEntry, QueryCacheKey, RequestId};
use reflow_runtime::StoreApi;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// Progress of one cache entry as seen by its `on_cache_entry_added` hook.
#[derive(Debug, Clone, Default)]
pub(crate) struct EntryProgress {
    pub(crate) data: Option<Value>,
    pub(crate) removed: bool,
}

/// Outcome of one fetch as seen by its `on_query_started` hook.
pub(crate) type FetchOutcome = Option<Result<Value, Value>>;

#[derive(Clone)]
struct HookContext {
    api: StoreApi,
    shared: Arc<ApiShared>,
    key: QueryCacheKey,
    request_id: RequestId,
}

impl HookContext {
    fn cache_entry(&self) -> Option<QueryCacheEntry> {
        let state = self.api.get_state();
        self.shared.slice(&state)?.query(&self.key).cloned()
    }
}

/// Handle given to `on_cache_entry_added` hooks.
///
/// Lets the hook wait for the first data, rewrite cached data while the
/// entry lives, and clean up when it is evicted.
pub struct CacheLifecycle {
    context: HookContext,
    progress: watch::Receiver<EntryProgress>,
}

impl CacheLifecycle {
    pub(crate) fn new(
        api: StoreApi,
        shared: Arc<ApiShared>,
        key: QueryCacheKey,
        request_id: RequestId,
        progress: watch::Receiver<EntryProgress>,
    ) -> Self {
        Self {
            context: HookContext {
                api,
                shared,
                key,
                request_id,
            },
            progress,
        }
    }

    /// Wait for the first successful result.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::CacheEntryRemoved`] if the entry is removed first.
    pub async fn cache_data_loaded(&self) -> Result<Value, LifecycleError> {
        let mut progress = self.progress.clone();
        let data = match progress
            .wait_for(|current| current.data.is_some() || current.removed)
            .await
        {
            Ok(current) => current.data.clone(),
            Err(_) => None,
        };
        data.ok_or(LifecycleError::CacheEntryRemoved)
    }

    /// Wait until the entry is removed from the cache.
    pub async fn cache_entry_removed(&self) {
        let mut progress = self.progress.clone();
        // A closed channel means the middleware is gone, which also ends
        // the entry.
        let _ = progress.wait_for(|current| current.removed).await;
    }

    /// Rewrite the cached data. Returns `false` when there is none yet.
    ///
    /// # Errors
    ///
    /// Fails when the dispatch fails.
    pub fn update_cached_data(&self, update: impl FnOnce(&mut Value)) -> Result<bool, QueryError> {
        update_cached_data(
            &self.context.shared,
            &self.context.api,
            &self.context.key,
            update,
        )
    }

    /// The entry as currently stored.
    #[must_use]
    pub fn cache_entry(&self) -> Option<QueryCacheEntry> {
        self.context.cache_entry()
    }

    /// Key of the entry.
    #[must_use]
    pub const fn cache_key(&self) -> &QueryCacheKey {
        &self.context.key
    }

    /// Id of the fetch that created the entry.
    #[must_use]
    pub const fn request_id(&self) -> &RequestId {
        &self.context.request_id
    }

    /// The store, for reading state or dispatching.
    #[must_use]
    pub const fn store(&self) -> &StoreApi {
        &self.context.api
    }
}

impl fmt::Debug for CacheLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheLifecycle")
            .field("key", &self.context.key)
            .field("request_id", &self.context.request_id)
            .finish_non_exhaustive()
    }
}

/// Handle given to `on_query_started` hooks.
pub struct QueryLifecycle {
    context: HookContext,
    outcome: watch::Receiver<FetchOutcome>,
}

impl QueryLifecycle {
    pub(crate) fn new(
        api: StoreApi,
        shared: Arc<ApiShared>,
        key: QueryCacheKey,
        request_id: RequestId,
        outcome: watch::Receiver<FetchOutcome>,
    ) -> Self {
        Self {
            context: HookContext {
                api,
                shared,
                key,
                request_id,
            },
            outcome,
        }
    }

    /// Wait for this fetch to settle.
    ///
    /// # Errors
    ///
    /// [`LifecycleError::QueryFailed`] with the endpoint's error, or
    /// [`LifecycleError::QueryAbandoned`] if the api state was reset first.
    pub async fn query_fulfilled(&self) -> Result<Value, LifecycleError> {
        let mut outcome = self.outcome.clone();
        let settled = match outcome.wait_for(Option::is_some).await {
            Ok(settled) => settled.clone(),
            Err(_) => None,
        };
        match settled {
            Some(Ok(data)) => Ok(data),
            Some(Err(error)) => Err(LifecycleError::QueryFailed(error)),
            None => Err(LifecycleError::QueryAbandoned),
        }
    }

    /// Rewrite the cached data, e.g. for optimistic updates.
    ///
    /// # Errors
    ///
    /// Fails when the dispatch fails.
    pub fn update_cached_data(&self, update: impl FnOnce(&mut Value)) -> Result<bool, QueryError> {
        update_cached_data(
            &self.context.shared,
            &self.context.api,
            &self.context.key,
            update,
        )
    }

    /// The entry as currently stored.
    #[must_use]
    pub fn cache_entry(&self) -> Option<QueryCacheEntry> {
        self.context.cache_entry()
    }

    /// Key of the entry.
    #[must_use]
    pub const fn cache_key(&self) -> &QueryCacheKey {
        &self.context.key
    }

    /// Id of this fetch.
    #[must_use]
    pub const fn request_id(&self) -> &RequestId {
        &self.context.request_id
    }

    /// The store, for reading state or dispatching.
    #[must_use]
    pub const fn store(&self) -> &StoreApi {
        &self.context.api
    }
}

impl fmt::Debug for QueryLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryLifecycle")
            .field("key", &self.context.key)
            .field("request_id", &self.context.request_id)
            .finish_non_exhaustive()
    }
}

/// Run a lifecycle hook as its own task.
///
/// Errors that only mean "the entry went away" or "the fetch failed" are
/// expected and logged at debug level.
pub(crate) fn run_hook<F>(hook: &'static str, endpoint: String, future: F)
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let _ = reflow_runtime::spawn(hook, async move {
        let Err(error) = future.await else {
            return;
        };
        match error.downcast_ref::<LifecycleError>() {
            Some(LifecycleError::CacheEntryRemoved | LifecycleError::QueryFailed(_)) => {
                tracing::debug!(hook, endpoint = %endpoint, error = %error, "Lifecycle hook ended early");
            },
            _ => {
                tracing::error!(hook, endpoint = %endpoint, error = %error, "Lifecycle hook failed");
            },
        }
    });
}
