//! The api slice stored under the reducer path

use crate::config::KeepAlive;
use crate::tags::{ProvidedTags, Tag};
use chrono::{DateTime, Utc};
use reflow_core::State;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Identifies one cache entry: endpoint name plus canonically serialized
/// arguments.
///
/// Object keys are serialized in sorted order, so argument objects that
/// differ only in key order share an entry.
///
/// ```
/// use reflow_query::QueryCacheKey;
/// use serde_json::json;
///
/// let a = QueryCacheKey::new("getPosts", &json!({ "page": 1, "limit": 10 }));
/// let b = QueryCacheKey::new("getPosts", &json!({ "limit": 10, "page": 1 }));
/// assert_eq!(a, b);
/// assert_eq!(a.as_str(), r#"getPosts({"limit":10,"page":1})"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryCacheKey(Arc<str>);

impl QueryCacheKey {
    /// Build the key for `endpoint` called with `args`.
    #[must_use]
    pub fn new(endpoint: &str, args: &Value) -> Self {
        // serde_json's default map is ordered, so this is canonical.
        Self(format!("{endpoint}({args})").into())
    }

    /// The key as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique id of one fetch, also used as the subscription id of the
/// subscriber that started it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(Arc<str>);

impl RequestId {
    /// A fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string().into())
    }

    /// The id as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
    /// Created but never fetched
    #[default]
    Uninitialized,
    /// A fetch is in flight
    Pending,
    /// The last fetch succeeded
    Fulfilled,
    /// The last fetch failed
    Rejected,
}

/// One cached query result.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryCacheEntry {
    /// Current status
    pub status: QueryStatus,
    /// Endpoint that produced the entry
    pub endpoint_name: String,
    /// Arguments the endpoint was called with
    pub original_args: Value,
    /// Id of the latest fetch; results of older fetches are ignored
    pub request_id: RequestId,
    /// Last successful result, kept across failed refetches
    pub data: Option<Value>,
    /// Error of the last failed fetch
    pub error: Option<Value>,
    /// When the latest fetch started
    pub started_at: Option<DateTime<Utc>>,
    /// When data last arrived
    pub fulfilled_at: Option<DateTime<Utc>>,
    /// Tags provided by the last settled fetch
    pub provided_tags: Vec<Tag>,
    /// Invalidated since the last fetch; the next subscriber refetches
    pub is_stale: bool,
}

impl QueryCacheEntry {
    pub(crate) fn new(endpoint_name: &str, original_args: Value, request_id: RequestId) -> Self {
        Self {
            status: QueryStatus::Uninitialized,
            endpoint_name: endpoint_name.to_string(),
            original_args,
            request_id,
            data: None,
            error: None,
            started_at: None,
            fulfilled_at: None,
            provided_tags: Vec::new(),
            is_stale: false,
        }
    }

    /// A fetch is in flight.
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.status == QueryStatus::Pending
    }

    /// A fetch is in flight and there is no data yet.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.is_fetching() && self.data.is_none()
    }

    /// The last fetch succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Fulfilled
    }

    /// The last fetch failed.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Rejected
    }
}

/// Per-subscriber options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubscriptionOptions {
    /// Poll at this interval; `Some(Duration::ZERO)` disables polling
    pub polling_interval: Option<Duration>,
    /// Override the api-wide refetch-on-focus flag
    pub refetch_on_focus: Option<bool>,
    /// Override the api-wide refetch-on-reconnect flag
    pub refetch_on_reconnect: Option<bool>,
}

impl SubscriptionOptions {
    /// Poll at `interval`.
    #[must_use]
    pub const fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = Some(interval);
        self
    }

    /// Override refetch-on-focus.
    #[must_use]
    pub const fn with_refetch_on_focus(mut self, enabled: bool) -> Self {
        self.refetch_on_focus = Some(enabled);
        self
    }

    /// Override refetch-on-reconnect.
    #[must_use]
    pub const fn with_refetch_on_reconnect(mut self, enabled: bool) -> Self {
        self.refetch_on_reconnect = Some(enabled);
        self
    }
}

/// Subscribers per cache entry.
pub type SubscriptionTable = BTreeMap<QueryCacheKey, BTreeMap<RequestId, SubscriptionOptions>>;

/// Whether the cache middleware has announced itself to this slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MiddlewareRegistration {
    /// No middleware seen yet
    #[default]
    Unregistered,
    /// The matching middleware is installed
    Registered,
    /// A middleware of a different api announced itself on this path
    Conflict,
}

/// Api-wide settings and environment flags.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigState {
    /// Middleware registration status
    pub middleware_registered: MiddlewareRegistration,
    /// Network reachable
    pub online: bool,
    /// Application focused
    pub focused: bool,
    /// Default keep-alive for unused entries
    pub keep_unused_data_for: KeepAlive,
    /// Default refetch-on-focus
    pub refetch_on_focus: bool,
    /// Default refetch-on-reconnect
    pub refetch_on_reconnect: bool,
}

/// The whole api slice.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiState {
    /// Cache entries
    pub queries: BTreeMap<QueryCacheKey, QueryCacheEntry>,
    /// Subscribers, as last flushed by the middleware
    pub subscriptions: SubscriptionTable,
    /// Tag registry
    pub provided: ProvidedTags,
    /// Settings and environment flags
    pub config: ConfigState,
}

impl ApiState {
    /// Borrow the slice stored at `path` in the root state.
    #[must_use]
    pub fn from_root<'a>(root: &'a State, path: &str) -> Option<&'a Self> {
        root.get(path)?.downcast_ref()
    }

    /// The entry for `key`.
    #[must_use]
    pub fn query(&self, key: &QueryCacheKey) -> Option<&QueryCacheEntry> {
        self.queries.get(key)
    }

    /// Number of flushed subscribers for `key`.
    #[must_use]
    pub fn subscriber_count(&self, key: &QueryCacheKey) -> usize {
        self.subscriptions.get(key).map_or(0, BTreeMap::len)
    }
}
