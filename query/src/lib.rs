//! # Reflow Query
//!
//! Data fetching and caching on top of the Reflow store.
//!
//! A [`QueryApi`] groups named [`EndpointDefinition`]s under one reducer
//! path. Mount [`QueryApi::reducer`] at that path and add
//! [`QueryApi::middleware`] to the store, then start fetches with
//! [`QueryApi::initiate`].
//!
//! ## Core Concepts
//!
//! - **Cache entries**: One per endpoint and serialized argument, keyed by
//!   [`QueryCacheKey`]
//! - **Subscriptions**: Entries stay cached while someone subscribes, and
//!   for a keep-alive period afterwards
//! - **Tags**: Fetches provide [`Tag`]s; invalidating a tag refetches or
//!   marks stale every entry that provided it
//! - **Environment signals**: Focus and reconnect can trigger refetches,
//!   see [`setup_listeners`]
//!
//! ## Example
//!
//! ```
//! use reflow_core::{ReducerTree, combine_reducers};
//! use reflow_query::{ApiConfig, EndpointDefinition, QueryApi, SubscriptionOptions, Tag};
//! use reflow_runtime::{ApplyMiddleware, create_store_with_enhancer};
//! use serde_json::{Value, json};
//!
//! # tokio_test::block_on(async {
//! let api = QueryApi::builder(ApiConfig::default().with_tag_types(["Post"]))
//!     .endpoint(
//!         EndpointDefinition::query("getPosts", |_args: Value| async { Ok(json!(["hello"])) })
//!             .provides(vec![Tag::new("Post")]),
//!     )
//!     .build();
//!
//! let store = create_store_with_enhancer(
//!     combine_reducers(ReducerTree::new().leaf("api", api.reducer())),
//!     None,
//!     ApplyMiddleware::new().with(api.middleware()),
//! )
//! .unwrap();
//!
//! let posts = api
//!     .initiate(&store.api(), "getPosts", json!(null), SubscriptionOptions::default())
//!     .unwrap();
//! tokio::time::sleep(std::time::Duration::from_millis(1)).await;
//! assert_eq!(posts.current().and_then(|entry| entry.data), Some(json!(["hello"])));
//! # });
//! ```

mod actions;
mod api;
mod config;
mod endpoint;
mod error;
mod lifecycle;
mod listeners;
mod middleware;
mod reducer;
pub mod signals;
mod state;
pub mod tags;

pub use actions::{
    ApiAction, ApiActions, CacheDataPayload, FulfilledPayload, PendingPayload, QueryArg,
    RejectedPayload, SubscriptionPayload,
};
pub use api::{QueryApi, QueryApiBuilder, QuerySubscription};
pub use config::{ApiConfig, DEFAULT_KEEP_UNUSED_DATA_FOR_SECS, KeepAlive};
pub use endpoint::{CacheEntryAddedFn, EndpointDefinition, ProvidesTagsFn, QueryFn, QueryStartedFn};
pub use error::{LifecycleError, QueryError};
pub use lifecycle::{CacheLifecycle, QueryLifecycle};
pub use listeners::setup_listeners;
pub use middleware::CacheMiddleware;
pub use reducer::ApiReducer;
pub use signals::EnvironmentSignal;
pub use state::{
    ApiState, ConfigState, MiddlewareRegistration, QueryCacheEntry, QueryCacheKey, QueryStatus,
    RequestId, SubscriptionOptions, SubscriptionTable,
};
pub use tags::{ProvidedTags, Tag};
