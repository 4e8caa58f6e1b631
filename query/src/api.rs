//! The api object: endpoints, fetch execution and subscriptions

use crate::actions::{ApiActions, FulfilledPayload, PendingPayload, QueryArg, RejectedPayload};
use crate::config::{ApiConfig, KeepAlive};
use crate::endpoint::EndpointDefinition;
use crate::error::QueryError;
use crate::middleware::CacheMiddleware;
use crate::reducer::ApiReducer;
use crate::state::{ApiState, QueryCacheEntry, QueryCacheKey, RequestId, SubscriptionOptions};
use crate::tags::Tag;
use reflow_core::{Clock, State, SystemClock};
use reflow_runtime::StoreApi;
use reflow_runtime::metrics::QueryMetrics;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Everything the reducer, middleware and subscriptions of one api share.
pub(crate) struct ApiShared {
    pub(crate) config: ApiConfig,
    pub(crate) api_uid: String,
    pub(crate) endpoints: BTreeMap<String, EndpointDefinition>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) actions: ApiActions,
}

impl ApiShared {
    pub(crate) fn path(&self) -> &str {
        &self.config.reducer_path
    }

    pub(crate) fn slice<'a>(&self, root: &'a State) -> Option<&'a ApiState> {
        ApiState::from_root(root, self.path())
    }

    pub(crate) fn endpoint(&self, name: &str) -> Result<&EndpointDefinition, QueryError> {
        self.endpoints
            .get(name)
            .ok_or_else(|| QueryError::UnknownEndpoint(name.to_string()))
    }

    pub(crate) fn keep_alive_for(&self, endpoint_name: &str) -> KeepAlive {
        self.endpoints
            .get(endpoint_name)
            .and_then(EndpointDefinition::keep_alive)
            .unwrap_or(self.config.keep_unused_data_for)
    }
}

impl fmt::Debug for ApiShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiShared")
            .field("reducer_path", &self.config.reducer_path)
            .field("api_uid", &self.api_uid)
            .field("endpoints", &self.endpoints.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Whether a fetch should start for `entry`.
///
/// Never while one is in flight. Always when forced or stale. Otherwise
/// only if no data was ever received.
fn should_fetch(entry: Option<&QueryCacheEntry>, force_refetch: bool) -> bool {
    match entry {
        Some(entry) if entry.is_fetching() => false,
        Some(entry) if force_refetch || entry.is_stale => true,
        Some(entry) => entry.fulfilled_at.is_none(),
        None => true,
    }
}

/// Start a fetch, or just register the subscriber when the cache can
/// serve it. Returns the request id, which doubles as subscriber id.
pub(crate) fn execute_query(
    shared: &Arc<ApiShared>,
    api: &StoreApi,
    arg: QueryArg,
) -> Result<RequestId, QueryError> {
    let endpoint = shared.endpoint(&arg.endpoint_name)?.clone();
    let request_id = RequestId::new();

    let serve_from_cache = {
        let state = api.get_state();
        let slice = shared
            .slice(&state)
            .ok_or_else(|| QueryError::SliceNotMounted(shared.path().to_string()))?;
        let entry = slice.query(&arg.key);
        let cached = !should_fetch(entry, arg.force_refetch);
        if cached && entry.is_some_and(|entry| entry.fulfilled_at.is_some()) {
            QueryMetrics::record_cache_hit();
        }
        cached
    };

    if serve_from_cache {
        tracing::debug!(key = %arg.key, subscribe = arg.subscribe, "Serving query from cache");
        if arg.subscribe {
            api.dispatch(shared.actions.subscription_added(
                arg.key,
                request_id.clone(),
                arg.subscription_options,
            ))?;
        }
        return Ok(request_id);
    }

    tracing::debug!(key = %arg.key, request_id = %request_id, forced = arg.force_refetch, "Starting query");
    api.dispatch(shared.actions.pending(PendingPayload {
        arg: arg.clone(),
        request_id: request_id.clone(),
        started_at: shared.clock.now(),
    }))?;
    QueryMetrics::record_fetch_started(&arg.endpoint_name);

    let request = endpoint.run(arg.original_args.clone());
    let task = {
        let shared = Arc::clone(shared);
        let api = api.clone();
        let arg = arg.clone();
        let request_id = request_id.clone();
        let endpoint = endpoint.clone();
        async move {
            let outcome = request.await;
            settle(&shared, &api, &endpoint, arg, request_id, outcome);
        }
    };
    if reflow_runtime::spawn("query-fetch", task).is_none() {
        settle(
            shared,
            api,
            &endpoint,
            arg,
            request_id.clone(),
            Err(json!("no async runtime available to run the query")),
        );
    }
    Ok(request_id)
}

fn settle(
    shared: &ApiShared,
    api: &StoreApi,
    endpoint: &EndpointDefinition,
    arg: QueryArg,
    request_id: RequestId,
    outcome: Result<Value, Value>,
) {
    let tags = endpoint.tags_for(outcome.as_ref(), &arg.original_args);
    let key = arg.key.clone();
    let action = match outcome {
        Ok(data) => {
            QueryMetrics::record_fetch_fulfilled(endpoint.name());
            shared.actions.fulfilled(FulfilledPayload {
                arg,
                request_id,
                data,
                fulfilled_at: shared.clock.now(),
                tags,
            })
        },
        Err(error) => {
            QueryMetrics::record_fetch_rejected(endpoint.name());
            tracing::debug!(key = %key, error = %error, "Query failed");
            shared.actions.rejected(RejectedPayload {
                arg,
                request_id,
                error,
                tags,
            })
        },
    };
    if let Err(error) = api.dispatch(action) {
        tracing::error!(key = %key, error = %error, "Failed to store query result");
    }
}

/// Force a refetch of an existing entry with its stored arguments. Does
/// nothing for unknown keys or entries already fetching.
pub(crate) fn refetch_key(
    shared: &Arc<ApiShared>,
    api: &StoreApi,
    key: &QueryCacheKey,
) -> Result<Option<RequestId>, QueryError> {
    let arg = {
        let state = api.get_state();
        let Some(entry) = shared.slice(&state).and_then(|slice| slice.query(key)) else {
            return Ok(None);
        };
        if entry.is_fetching() {
            return Ok(None);
        }
        QueryArg {
            key: key.clone(),
            endpoint_name: entry.endpoint_name.clone(),
            original_args: entry.original_args.clone(),
            subscribe: false,
            subscription_options: SubscriptionOptions::default(),
            force_refetch: true,
        }
    };
    execute_query(shared, api, arg).map(Some)
}

/// Rewrite the cached data of `key`. Returns `false` when there is no data
/// to update.
pub(crate) fn update_cached_data(
    shared: &ApiShared,
    api: &StoreApi,
    key: &QueryCacheKey,
    update: impl FnOnce(&mut Value),
) -> Result<bool, QueryError> {
    let state = api.get_state();
    let Some(mut data) = shared
        .slice(&state)
        .and_then(|slice| slice.query(key))
        .and_then(|entry| entry.data.clone())
    else {
        return Ok(false);
    };
    update(&mut data);
    api.dispatch(shared.actions.cache_data_updated(key.clone(), data))?;
    Ok(true)
}

/// Builder for [`QueryApi`].
pub struct QueryApiBuilder {
    config: ApiConfig,
    endpoints: BTreeMap<String, EndpointDefinition>,
    clock: Arc<dyn Clock>,
}

impl QueryApiBuilder {
    /// Add an endpoint. A later endpoint with the same name replaces an
    /// earlier one.
    #[must_use]
    pub fn endpoint(mut self, endpoint: EndpointDefinition) -> Self {
        self.endpoints.insert(endpoint.name().to_string(), endpoint);
        self
    }

    /// Use `clock` for entry timestamps.
    #[must_use]
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Finish the api.
    #[must_use]
    pub fn build(self) -> QueryApi {
        let actions = ApiActions::new(self.config.reducer_path.as_str());
        QueryApi {
            shared: Arc::new(ApiShared {
                config: self.config,
                api_uid: uuid::Uuid::new_v4().to_string(),
                endpoints: self.endpoints,
                clock: self.clock,
                actions,
            }),
        }
    }
}

/// A set of query endpoints sharing one cache slice.
///
/// Mount [`reducer`](Self::reducer) at the configured reducer path and
/// install [`middleware`](Self::middleware) on the store, then start
/// queries with [`initiate`](Self::initiate).
///
/// ```
/// use reflow_core::{ReducerTree, combine_reducers};
/// use reflow_query::{ApiConfig, EndpointDefinition, QueryApi, SubscriptionOptions};
/// use reflow_runtime::{ApplyMiddleware, create_store_with_enhancer};
/// use serde_json::{Value, json};
///
/// # tokio_test::block_on(async {
/// let api = QueryApi::builder(ApiConfig::default())
///     .endpoint(EndpointDefinition::query("getPosts", |_args: Value| async {
///         Ok(json!(["hello"]))
///     }))
///     .build();
///
/// let store = create_store_with_enhancer(
///     combine_reducers(ReducerTree::new().leaf("api", api.reducer())),
///     None,
///     ApplyMiddleware::new().with(api.middleware()),
/// )
/// .unwrap();
///
/// let subscription = api
///     .initiate(&store.api(), "getPosts", Value::Null, SubscriptionOptions::default())
///     .unwrap();
/// tokio::time::sleep(std::time::Duration::from_millis(1)).await;
///
/// let entry = subscription.current().unwrap();
/// assert_eq!(entry.data, Some(json!(["hello"])));
/// # });
/// ```
#[derive(Clone, Debug)]
pub struct QueryApi {
    shared: Arc<ApiShared>,
}

impl QueryApi {
    /// Start building an api.
    #[must_use]
    pub fn builder(config: ApiConfig) -> QueryApiBuilder {
        QueryApiBuilder {
            config,
            endpoints: BTreeMap::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// The reducer path.
    #[must_use]
    pub fn reducer_path(&self) -> &str {
        self.shared.path()
    }

    pub(crate) fn api_uid(&self) -> &str {
        &self.shared.api_uid
    }

    /// The configuration the api was built with.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.shared.config
    }

    /// Action creators for this api.
    #[must_use]
    pub fn actions(&self) -> &ApiActions {
        &self.shared.actions
    }

    /// The slice reducer, to be mounted at [`reducer_path`](Self::reducer_path).
    #[must_use]
    pub fn reducer(&self) -> ApiReducer {
        ApiReducer::new(Arc::clone(&self.shared))
    }

    /// The cache middleware. Install exactly one per store.
    #[must_use]
    pub fn middleware(&self) -> CacheMiddleware {
        CacheMiddleware::new(Arc::clone(&self.shared))
    }

    /// The cache key for `endpoint` called with `args`.
    #[must_use]
    pub fn cache_key(&self, endpoint: &str, args: &Value) -> QueryCacheKey {
        QueryCacheKey::new(endpoint, args)
    }

    /// Subscribe to `endpoint` with `args`, fetching unless the cache can
    /// serve the subscriber.
    ///
    /// # Errors
    ///
    /// Fails for unknown endpoints, when the slice is not mounted, or when a
    /// dispatch fails.
    pub fn initiate(
        &self,
        store: &StoreApi,
        endpoint: &str,
        args: Value,
        options: SubscriptionOptions,
    ) -> Result<QuerySubscription, QueryError> {
        self.shared.endpoint(endpoint)?;
        let key = QueryCacheKey::new(endpoint, &args);
        let request_id = execute_query(
            &self.shared,
            store,
            QueryArg {
                key: key.clone(),
                endpoint_name: endpoint.to_string(),
                original_args: args,
                subscribe: true,
                subscription_options: options,
                force_refetch: false,
            },
        )?;
        Ok(QuerySubscription {
            api: store.clone(),
            shared: Arc::clone(&self.shared),
            key,
            request_id,
            active: AtomicBool::new(true),
        })
    }

    /// [`initiate`](Self::initiate) with typed arguments.
    ///
    /// # Errors
    ///
    /// As [`initiate`](Self::initiate), plus [`QueryError::Args`] when the
    /// arguments do not serialize.
    pub fn initiate_with<A: Serialize>(
        &self,
        store: &StoreApi,
        endpoint: &str,
        args: &A,
        options: SubscriptionOptions,
    ) -> Result<QuerySubscription, QueryError> {
        self.initiate(store, endpoint, serde_json::to_value(args)?, options)
    }

    /// Force a refetch of the entry at `key`. Returns the new request id,
    /// or `None` when the entry is missing or already fetching.
    ///
    /// # Errors
    ///
    /// Fails when a dispatch fails.
    pub fn refetch(
        &self,
        store: &StoreApi,
        key: &QueryCacheKey,
    ) -> Result<Option<RequestId>, QueryError> {
        refetch_key(&self.shared, store, key)
    }

    /// Dispatch `invalidateTags`.
    ///
    /// # Errors
    ///
    /// Fails when the dispatch fails.
    pub fn invalidate_tags(&self, store: &StoreApi, tags: Vec<Tag>) -> Result<(), QueryError> {
        store.dispatch(self.shared.actions.invalidate_tags(tags))?;
        Ok(())
    }

    /// Dispatch `resetApiState`.
    ///
    /// # Errors
    ///
    /// Fails when the dispatch fails.
    pub fn reset_api_state(&self, store: &StoreApi) -> Result<(), QueryError> {
        store.dispatch(self.shared.actions.reset_api_state())?;
        Ok(())
    }

    /// Rewrite cached data for `endpoint` and `args`. Returns `false` when
    /// nothing is cached.
    ///
    /// # Errors
    ///
    /// Fails when the dispatch fails.
    pub fn update_query_data(
        &self,
        store: &StoreApi,
        endpoint: &str,
        args: &Value,
        update: impl FnOnce(&mut Value),
    ) -> Result<bool, QueryError> {
        update_cached_data(&self.shared, store, &QueryCacheKey::new(endpoint, args), update)
    }

    /// Borrow this api's slice from the root state.
    #[must_use]
    pub fn api_state<'a>(&self, root: &'a State) -> Option<&'a ApiState> {
        self.shared.slice(root)
    }

    /// The cache entry for `endpoint` and `args`.
    #[must_use]
    pub fn select(&self, root: &State, endpoint: &str, args: &Value) -> Option<QueryCacheEntry> {
        self.select_by_key(root, &QueryCacheKey::new(endpoint, args))
    }

    /// The cache entry at `key`.
    #[must_use]
    pub fn select_by_key(&self, root: &State, key: &QueryCacheKey) -> Option<QueryCacheEntry> {
        self.api_state(root)?.query(key).cloned()
    }
}

/// One subscriber of a cache entry.
///
/// The subscription stays registered until [`unsubscribe`](Self::unsubscribe)
/// is called. Dropping the handle does not unsubscribe.
pub struct QuerySubscription {
    api: StoreApi,
    shared: Arc<ApiShared>,
    key: QueryCacheKey,
    request_id: RequestId,
    active: AtomicBool,
}

impl QuerySubscription {
    /// The subscribed entry.
    #[must_use]
    pub const fn key(&self) -> &QueryCacheKey {
        &self.key
    }

    /// The subscriber id.
    #[must_use]
    pub const fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Whether [`unsubscribe`](Self::unsubscribe) has not been called yet.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// The current cache entry.
    #[must_use]
    pub fn current(&self) -> Option<QueryCacheEntry> {
        let state = self.api.get_state();
        self.shared.slice(&state)?.query(&self.key).cloned()
    }

    /// Remove this subscriber. Calling it again does nothing.
    ///
    /// # Errors
    ///
    /// Fails when the dispatch fails.
    pub fn unsubscribe(&self) -> Result<(), QueryError> {
        if !self.active.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.api.dispatch(
            self.shared
                .actions
                .subscription_removed(self.key.clone(), self.request_id.clone()),
        )?;
        Ok(())
    }

    /// Force a refetch of the subscribed entry.
    ///
    /// # Errors
    ///
    /// Fails when a dispatch fails.
    pub fn refetch(&self) -> Result<Option<RequestId>, QueryError> {
        refetch_key(&self.shared, &self.api, &self.key)
    }

    /// Replace this subscriber's options.
    ///
    /// # Errors
    ///
    /// Fails when the dispatch fails.
    pub fn update_options(&self, options: SubscriptionOptions) -> Result<(), QueryError> {
        if !self.is_active() {
            return Ok(());
        }
        self.api
            .dispatch(self.shared.actions.subscription_options_updated(
                self.key.clone(),
                self.request_id.clone(),
                options,
            ))?;
        Ok(())
    }
}

impl fmt::Debug for QuerySubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySubscription")
            .field("key", &self.key)
            .field("request_id", &self.request_id)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
