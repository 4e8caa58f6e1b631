//! Actions of one api
//!
//! Every action type is prefixed with the api's reducer path, e.g.
//! `api/executeQuery/pending`. [`ApiActions::parse`] turns a dispatched
//! action back into a typed [`ApiAction`].

use crate::state::{QueryCacheKey, RequestId, SubscriptionOptions, SubscriptionTable};
use crate::tags::Tag;
use chrono::{DateTime, Utc};
use reflow_core::Action;
use serde_json::Value;
use std::sync::Arc;

const PENDING: &str = "executeQuery/pending";
const FULFILLED: &str = "executeQuery/fulfilled";
const REJECTED: &str = "executeQuery/rejected";
const INVALIDATE_TAGS: &str = "invalidateTags";
const SUBSCRIPTION_ADDED: &str = "subscriptions/added";
const SUBSCRIPTION_REMOVED: &str = "subscriptions/removed";
const SUBSCRIPTION_OPTIONS_UPDATED: &str = "subscriptions/optionsUpdated";
const SUBSCRIPTIONS_UPDATED: &str = "subscriptions/updated";
const QUERY_REMOVED: &str = "queries/removed";
const CACHE_DATA_UPDATED: &str = "queries/cacheDataUpdated";
const RESET_API_STATE: &str = "resetApiState";
const MIDDLEWARE_REGISTERED: &str = "internal/middlewareRegistered";

/// What a fetch was started with.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryArg {
    /// Target entry
    pub key: QueryCacheKey,
    /// Endpoint name
    pub endpoint_name: String,
    /// Endpoint arguments
    pub original_args: Value,
    /// Whether the fetch also registers a subscriber
    pub subscribe: bool,
    /// Options of that subscriber
    pub subscription_options: SubscriptionOptions,
    /// Fetch even when cached data exists
    pub force_refetch: bool,
}

/// Payload of `executeQuery/pending`.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPayload {
    /// Fetch arguments
    pub arg: QueryArg,
    /// Id of this fetch
    pub request_id: RequestId,
    /// Start time
    pub started_at: DateTime<Utc>,
}

/// Payload of `executeQuery/fulfilled`.
#[derive(Debug, Clone, PartialEq)]
pub struct FulfilledPayload {
    /// Fetch arguments
    pub arg: QueryArg,
    /// Id of the fetch
    pub request_id: RequestId,
    /// Result
    pub data: Value,
    /// Completion time
    pub fulfilled_at: DateTime<Utc>,
    /// Tags provided by the result
    pub tags: Vec<Tag>,
}

/// Payload of `executeQuery/rejected`.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedPayload {
    /// Fetch arguments
    pub arg: QueryArg,
    /// Id of the fetch
    pub request_id: RequestId,
    /// Error returned by the endpoint
    pub error: Value,
    /// Tags provided by the failure
    pub tags: Vec<Tag>,
}

/// Payload of the per-subscriber actions.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionPayload {
    /// Entry subscribed to
    pub key: QueryCacheKey,
    /// Subscriber id
    pub request_id: RequestId,
    /// Subscriber options; ignored on removal
    pub options: SubscriptionOptions,
}

/// Payload of `queries/cacheDataUpdated`.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheDataPayload {
    /// Entry to update
    pub key: QueryCacheKey,
    /// Replacement data
    pub data: Value,
}

/// A dispatched api action, borrowed from its [`Action`].
#[derive(Debug, Clone, Copy)]
pub enum ApiAction<'a> {
    /// A fetch started
    Pending(&'a PendingPayload),
    /// A fetch succeeded
    Fulfilled(&'a FulfilledPayload),
    /// A fetch failed
    Rejected(&'a RejectedPayload),
    /// Tags were invalidated
    InvalidateTags(&'a [Tag]),
    /// A subscriber was added without starting a fetch
    SubscriptionAdded(&'a SubscriptionPayload),
    /// A subscriber went away
    SubscriptionRemoved(&'a SubscriptionPayload),
    /// A subscriber changed its options
    SubscriptionOptionsUpdated(&'a SubscriptionPayload),
    /// Batched snapshot of all subscribers
    SubscriptionsUpdated(&'a SubscriptionTable),
    /// An entry was evicted
    QueryRemoved(&'a QueryCacheKey),
    /// Cached data was rewritten by a lifecycle hook
    CacheDataUpdated(&'a CacheDataPayload),
    /// The slice was reset
    ResetApiState,
    /// A cache middleware announced itself
    MiddlewareRegistered(&'a str),
}

impl ApiAction<'_> {
    /// The cache key the action targets, if any.
    #[must_use]
    pub fn cache_key(&self) -> Option<&QueryCacheKey> {
        match self {
            Self::Pending(p) => Some(&p.arg.key),
            Self::Fulfilled(p) => Some(&p.arg.key),
            Self::Rejected(p) => Some(&p.arg.key),
            Self::SubscriptionAdded(p)
            | Self::SubscriptionRemoved(p)
            | Self::SubscriptionOptionsUpdated(p) => Some(&p.key),
            Self::QueryRemoved(key) => Some(key),
            Self::CacheDataUpdated(p) => Some(&p.key),
            Self::InvalidateTags(_)
            | Self::SubscriptionsUpdated(_)
            | Self::ResetApiState
            | Self::MiddlewareRegistered(_) => None,
        }
    }

    /// Per-subscriber actions absorbed by the cache middleware.
    #[must_use]
    pub const fn is_subscription_change(&self) -> bool {
        matches!(
            self,
            Self::SubscriptionAdded(_)
                | Self::SubscriptionRemoved(_)
                | Self::SubscriptionOptionsUpdated(_)
        )
    }
}

/// Action creators and matchers for one reducer path.
///
/// ```
/// use reflow_query::{ApiAction, ApiActions, Tag};
///
/// let actions = ApiActions::new("postsApi");
/// let action = actions.invalidate_tags(vec![Tag::new("Post")]);
///
/// assert!(action.is("postsApi/invalidateTags"));
/// assert!(actions.is_api_action(&action));
/// assert!(matches!(actions.parse(&action), Some(ApiAction::InvalidateTags(tags)) if tags.len() == 1));
/// ```
#[derive(Debug, Clone)]
pub struct ApiActions {
    path: Arc<str>,
}

impl ApiActions {
    /// Creators for the api at `path`.
    #[must_use]
    pub fn new(path: impl Into<Arc<str>>) -> Self {
        Self { path: path.into() }
    }

    /// The reducer path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    fn action<T: std::any::Any + Send + Sync>(&self, suffix: &str, payload: T) -> Action {
        Action::new(format!("{}/{suffix}", self.path)).with_payload(payload)
    }

    /// Whether the action type carries this api's prefix.
    #[must_use]
    pub fn is_api_action(&self, action: &Action) -> bool {
        self.suffix(action).is_some()
    }

    fn suffix<'a>(&self, action: &'a Action) -> Option<&'a str> {
        action
            .type_name()?
            .strip_prefix(&*self.path)?
            .strip_prefix('/')
    }

    /// Decode an action of this api. Returns `None` for foreign actions and
    /// for known types whose payload has the wrong shape.
    #[must_use]
    pub fn parse<'a>(&self, action: &'a Action) -> Option<ApiAction<'a>> {
        let parsed = match self.suffix(action)? {
            PENDING => ApiAction::Pending(action.payload()?),
            FULFILLED => ApiAction::Fulfilled(action.payload()?),
            REJECTED => ApiAction::Rejected(action.payload()?),
            INVALIDATE_TAGS => ApiAction::InvalidateTags(action.payload::<Vec<Tag>>()?),
            SUBSCRIPTION_ADDED => ApiAction::SubscriptionAdded(action.payload()?),
            SUBSCRIPTION_REMOVED => ApiAction::SubscriptionRemoved(action.payload()?),
            SUBSCRIPTION_OPTIONS_UPDATED => {
                ApiAction::SubscriptionOptionsUpdated(action.payload()?)
            },
            SUBSCRIPTIONS_UPDATED => ApiAction::SubscriptionsUpdated(action.payload()?),
            QUERY_REMOVED => ApiAction::QueryRemoved(action.payload()?),
            CACHE_DATA_UPDATED => ApiAction::CacheDataUpdated(action.payload()?),
            RESET_API_STATE => ApiAction::ResetApiState,
            MIDDLEWARE_REGISTERED => {
                ApiAction::MiddlewareRegistered(action.payload::<String>()?.as_str())
            },
            _ => return None,
        };
        Some(parsed)
    }

    /// `executeQuery/pending`
    #[must_use]
    pub fn pending(&self, payload: PendingPayload) -> Action {
        self.action(PENDING, payload)
    }

    /// `executeQuery/fulfilled`
    #[must_use]
    pub fn fulfilled(&self, payload: FulfilledPayload) -> Action {
        self.action(FULFILLED, payload)
    }

    /// `executeQuery/rejected`
    #[must_use]
    pub fn rejected(&self, payload: RejectedPayload) -> Action {
        self.action(REJECTED, payload)
    }

    /// Mark every entry providing one of `tags` as stale and refetch the
    /// subscribed ones.
    #[must_use]
    pub fn invalidate_tags(&self, tags: Vec<Tag>) -> Action {
        self.action(INVALIDATE_TAGS, tags)
    }

    /// `subscriptions/added`
    #[must_use]
    pub fn subscription_added(
        &self,
        key: QueryCacheKey,
        request_id: RequestId,
        options: SubscriptionOptions,
    ) -> Action {
        self.action(
            SUBSCRIPTION_ADDED,
            SubscriptionPayload {
                key,
                request_id,
                options,
            },
        )
    }

    /// `subscriptions/removed`
    #[must_use]
    pub fn subscription_removed(&self, key: QueryCacheKey, request_id: RequestId) -> Action {
        self.action(
            SUBSCRIPTION_REMOVED,
            SubscriptionPayload {
                key,
                request_id,
                options: SubscriptionOptions::default(),
            },
        )
    }

    /// `subscriptions/optionsUpdated`
    #[must_use]
    pub fn subscription_options_updated(
        &self,
        key: QueryCacheKey,
        request_id: RequestId,
        options: SubscriptionOptions,
    ) -> Action {
        self.action(
            SUBSCRIPTION_OPTIONS_UPDATED,
            SubscriptionPayload {
                key,
                request_id,
                options,
            },
        )
    }

    /// `subscriptions/updated`
    #[must_use]
    pub fn subscriptions_updated(&self, table: SubscriptionTable) -> Action {
        self.action(SUBSCRIPTIONS_UPDATED, table)
    }

    /// `queries/removed`
    #[must_use]
    pub fn query_removed(&self, key: QueryCacheKey) -> Action {
        self.action(QUERY_REMOVED, key)
    }

    /// `queries/cacheDataUpdated`
    #[must_use]
    pub fn cache_data_updated(&self, key: QueryCacheKey, data: Value) -> Action {
        self.action(CACHE_DATA_UPDATED, CacheDataPayload { key, data })
    }

    /// Reset the slice to its initial state.
    #[must_use]
    pub fn reset_api_state(&self) -> Action {
        Action::new(format!("{}/{RESET_API_STATE}", self.path))
    }

    /// `internal/middlewareRegistered`
    #[must_use]
    pub fn middleware_registered(&self, api_uid: &str) -> Action {
        self.action(MIDDLEWARE_REGISTERED, api_uid.to_string())
    }
}
