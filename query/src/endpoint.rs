//! Endpoint definitions

use crate::config::KeepAlive;
use crate::lifecycle::{CacheLifecycle, QueryLifecycle};
use crate::tags::Tag;
use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Runs the request for an endpoint.
pub type QueryFn = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, Value>> + Send + Sync>;

/// Computes the tags a settled fetch provides, from its outcome and
/// arguments.
pub type ProvidesTagsFn = Arc<dyn Fn(Result<&Value, &Value>, &Value) -> Vec<Tag> + Send + Sync>;

/// Hook run once when a cache entry is created.
pub type CacheEntryAddedFn =
    Arc<dyn Fn(Value, CacheLifecycle) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Hook run whenever a fetch starts.
pub type QueryStartedFn =
    Arc<dyn Fn(Value, QueryLifecycle) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// A named query endpoint.
///
/// ```
/// use reflow_query::{EndpointDefinition, Tag};
/// use serde_json::{Value, json};
/// use std::time::Duration;
///
/// let posts = EndpointDefinition::query("getPosts", |_args: Value| async {
///     Ok(json!([{ "id": 1 }]))
/// })
/// .provides_tags(|result, _args| match result {
///     Ok(Value::Array(items)) => items
///         .iter()
///         .filter_map(|item| item["id"].as_i64())
///         .map(|id| Tag::with_id("Post", id))
///         .chain([Tag::new("Post")])
///         .collect(),
///     _ => vec![Tag::new("Post")],
/// })
/// .polling_interval(Duration::from_secs(30));
///
/// assert_eq!(posts.name(), "getPosts");
/// ```
#[derive(Clone)]
pub struct EndpointDefinition {
    name: String,
    query: QueryFn,
    provides_tags: Option<ProvidesTagsFn>,
    keep_unused_data_for: Option<KeepAlive>,
    polling_interval: Option<Duration>,
    on_cache_entry_added: Option<CacheEntryAddedFn>,
    on_query_started: Option<QueryStartedFn>,
}

impl EndpointDefinition {
    /// Define a query endpoint.
    pub fn query<F, Fut>(name: impl Into<String>, query: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            query: Arc::new(move |args| Box::pin(query(args))),
            provides_tags: None,
            keep_unused_data_for: None,
            polling_interval: None,
            on_cache_entry_added: None,
            on_query_started: None,
        }
    }

    /// Compute provided tags from each settled fetch.
    #[must_use]
    pub fn provides_tags<F>(mut self, provides: F) -> Self
    where
        F: Fn(Result<&Value, &Value>, &Value) -> Vec<Tag> + Send + Sync + 'static,
    {
        self.provides_tags = Some(Arc::new(provides));
        self
    }

    /// Provide the same tags from every settled fetch.
    #[must_use]
    pub fn provides(self, tags: Vec<Tag>) -> Self {
        self.provides_tags(move |_, _| tags.clone())
    }

    /// Override the api-wide keep-alive.
    #[must_use]
    pub const fn keep_unused_data_for(mut self, keep_alive: KeepAlive) -> Self {
        self.keep_unused_data_for = Some(keep_alive);
        self
    }

    /// Default polling interval for subscribers that set none.
    #[must_use]
    pub const fn polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = Some(interval);
        self
    }

    /// Run `hook` when a cache entry for this endpoint is created.
    #[must_use]
    pub fn on_cache_entry_added<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Value, CacheLifecycle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_cache_entry_added = Some(Arc::new(move |args, lifecycle| {
            Box::pin(hook(args, lifecycle))
        }));
        self
    }

    /// Run `hook` whenever a fetch for this endpoint starts.
    #[must_use]
    pub fn on_query_started<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Value, QueryLifecycle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_query_started = Some(Arc::new(move |args, lifecycle| {
            Box::pin(hook(args, lifecycle))
        }));
        self
    }

    /// Endpoint name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn run(&self, args: Value) -> BoxFuture<'static, Result<Value, Value>> {
        (self.query)(args)
    }

    pub(crate) fn tags_for(&self, outcome: Result<&Value, &Value>, args: &Value) -> Vec<Tag> {
        self.provides_tags
            .as_ref()
            .map_or_else(Vec::new, |provides| provides(outcome, args))
    }

    pub(crate) const fn keep_alive(&self) -> Option<KeepAlive> {
        self.keep_unused_data_for
    }

    pub(crate) const fn default_polling_interval(&self) -> Option<Duration> {
        self.polling_interval
    }

    pub(crate) const fn cache_entry_added_hook(&self) -> Option<&CacheEntryAddedFn> {
        self.on_cache_entry_added.as_ref()
    }

    pub(crate) const fn query_started_hook(&self) -> Option<&QueryStartedFn> {
        self.on_query_started.as_ref()
    }
}

impl fmt::Debug for EndpointDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointDefinition")
            .field("name", &self.name)
            .field("provides_tags", &self.provides_tags.is_some())
            .field("keep_unused_data_for", &self.keep_unused_data_for)
            .field("polling_interval", &self.polling_interval)
            .field("on_cache_entry_added", &self.on_cache_entry_added.is_some())
            .field("on_query_started", &self.on_query_started.is_some())
            .finish_non_exhaustive()
    }
}
