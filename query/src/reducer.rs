//! The api slice reducer
//!
//! Every case returns the input reference when nothing changes, so
//! invalidating already-stale entries or re-flushing an identical
//! subscription table is a no-op for listeners.

use crate::actions::ApiAction;
use crate::api::ApiShared;
use crate::signals::EnvironmentSignal;
use crate::state::{
    ApiState, ConfigState, MiddlewareRegistration, QueryCacheEntry, QueryStatus,
};
use crate::tags::{self, ProvidedTags};
use reflow_core::{Action, Reducer, ReducerError, ReducerResult, State};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Reducer for one api's slice. Mount it at the api's reducer path.
#[derive(Debug, Clone)]
pub struct ApiReducer {
    shared: Arc<ApiShared>,
}

impl ApiReducer {
    pub(crate) const fn new(shared: Arc<ApiShared>) -> Self {
        Self { shared }
    }

    /// The state before any action.
    #[must_use]
    pub fn initial_state(&self) -> ApiState {
        let config = &self.shared.config;
        ApiState {
            queries: BTreeMap::new(),
            subscriptions: BTreeMap::new(),
            provided: ProvidedTags::new(),
            config: ConfigState {
                middleware_registered: MiddlewareRegistration::Unregistered,
                online: true,
                focused: true,
                keep_unused_data_for: config.keep_unused_data_for,
                refetch_on_focus: config.refetch_on_focus,
                refetch_on_reconnect: config.refetch_on_reconnect,
            },
        }
    }

    /// Apply one action. `None` means unchanged.
    fn apply(&self, slice: &ApiState, action: ApiAction<'_>) -> Option<ApiState> {
        match action {
            ApiAction::Pending(pending) => {
                let arg = &pending.arg;
                if !arg.subscribe && !slice.queries.contains_key(&arg.key) {
                    return None;
                }
                let mut next = slice.clone();
                let entry = next.queries.entry(arg.key.clone()).or_insert_with(|| {
                    QueryCacheEntry::new(
                        &arg.endpoint_name,
                        arg.original_args.clone(),
                        pending.request_id.clone(),
                    )
                });
                entry.status = QueryStatus::Pending;
                entry.request_id = pending.request_id.clone();
                entry.original_args = arg.original_args.clone();
                entry.started_at = Some(pending.started_at);
                entry.is_stale = false;
                if arg.subscribe {
                    next.subscriptions
                        .entry(arg.key.clone())
                        .or_default()
                        .insert(pending.request_id.clone(), arg.subscription_options);
                }
                Some(next)
            },
            ApiAction::Fulfilled(fulfilled) => {
                let key = &fulfilled.arg.key;
                let current = slice.queries.get(key)?;
                if current.request_id != fulfilled.request_id {
                    return None;
                }
                let mut next = slice.clone();
                let entry = next.queries.get_mut(key)?;
                entry.status = QueryStatus::Fulfilled;
                entry.data = Some(fulfilled.data.clone());
                entry.error = None;
                entry.fulfilled_at = Some(fulfilled.fulfilled_at);
                entry.provided_tags.clone_from(&fulfilled.tags);
                tags::register(&mut next.provided, key, &fulfilled.tags);
                Some(next)
            },
            ApiAction::Rejected(rejected) => {
                let key = &rejected.arg.key;
                let current = slice.queries.get(key)?;
                if current.request_id != rejected.request_id {
                    return None;
                }
                let mut next = slice.clone();
                let entry = next.queries.get_mut(key)?;
                entry.status = QueryStatus::Rejected;
                entry.error = Some(rejected.error.clone());
                entry.provided_tags.clone_from(&rejected.tags);
                tags::register(&mut next.provided, key, &rejected.tags);
                Some(next)
            },
            ApiAction::InvalidateTags(invalidated) => {
                let targets: Vec<_> = tags::select_invalidated_by(&slice.provided, invalidated)
                    .into_iter()
                    .filter(|key| {
                        slice
                            .queries
                            .get(key)
                            .is_some_and(|entry| !entry.is_fetching() && !entry.is_stale)
                    })
                    .collect();
                if targets.is_empty() {
                    return None;
                }
                let mut next = slice.clone();
                for key in targets {
                    if let Some(entry) = next.queries.get_mut(&key) {
                        entry.is_stale = true;
                    }
                }
                Some(next)
            },
            ApiAction::SubscriptionAdded(added) => {
                let existing = slice
                    .subscriptions
                    .get(&added.key)
                    .and_then(|subscribers| subscribers.get(&added.request_id));
                if existing == Some(&added.options) {
                    return None;
                }
                let mut next = slice.clone();
                next.subscriptions
                    .entry(added.key.clone())
                    .or_default()
                    .insert(added.request_id.clone(), added.options);
                Some(next)
            },
            ApiAction::SubscriptionOptionsUpdated(updated) => {
                let existing = slice
                    .subscriptions
                    .get(&updated.key)
                    .and_then(|subscribers| subscribers.get(&updated.request_id))?;
                if *existing == updated.options {
                    return None;
                }
                let mut next = slice.clone();
                if let Some(options) = next
                    .subscriptions
                    .get_mut(&updated.key)
                    .and_then(|subscribers| subscribers.get_mut(&updated.request_id))
                {
                    *options = updated.options;
                }
                Some(next)
            },
            ApiAction::SubscriptionRemoved(removed) => {
                slice
                    .subscriptions
                    .get(&removed.key)?
                    .get(&removed.request_id)?;
                let mut next = slice.clone();
                if let Some(subscribers) = next.subscriptions.get_mut(&removed.key) {
                    subscribers.remove(&removed.request_id);
                }
                Some(next)
            },
            ApiAction::SubscriptionsUpdated(table) => {
                if *table == slice.subscriptions {
                    return None;
                }
                let mut next = slice.clone();
                next.subscriptions.clone_from(table);
                Some(next)
            },
            ApiAction::QueryRemoved(key) => {
                if !slice.queries.contains_key(key) && !slice.subscriptions.contains_key(key) {
                    return None;
                }
                let mut next = slice.clone();
                next.queries.remove(key);
                next.subscriptions.remove(key);
                tags::unregister(&mut next.provided, key);
                Some(next)
            },
            ApiAction::CacheDataUpdated(update) => {
                let current = slice.queries.get(&update.key)?;
                if current.data.as_ref() == Some(&update.data) {
                    return None;
                }
                let mut next = slice.clone();
                if let Some(entry) = next.queries.get_mut(&update.key) {
                    entry.data = Some(update.data.clone());
                }
                Some(next)
            },
            ApiAction::ResetApiState => {
                let mut fresh = self.initial_state();
                fresh.config.middleware_registered = slice.config.middleware_registered;
                fresh.config.online = slice.config.online;
                fresh.config.focused = slice.config.focused;
                (fresh != *slice).then_some(fresh)
            },
            ApiAction::MiddlewareRegistered(api_uid) => {
                let status = if slice.config.middleware_registered
                    == MiddlewareRegistration::Conflict
                    || api_uid != self.shared.api_uid
                {
                    MiddlewareRegistration::Conflict
                } else {
                    MiddlewareRegistration::Registered
                };
                if status == slice.config.middleware_registered {
                    return None;
                }
                let mut next = slice.clone();
                next.config.middleware_registered = status;
                Some(next)
            },
        }
    }
}

fn apply_signal(slice: &ApiState, signal: EnvironmentSignal) -> Option<ApiState> {
    let (focused, online) = match signal {
        EnvironmentSignal::Focus => (true, slice.config.online),
        EnvironmentSignal::FocusLost => (false, slice.config.online),
        EnvironmentSignal::Online => (slice.config.focused, true),
        EnvironmentSignal::Offline => (slice.config.focused, false),
    };
    if (focused, online) == (slice.config.focused, slice.config.online) {
        return None;
    }
    let mut next = slice.clone();
    next.config.focused = focused;
    next.config.online = online;
    Some(next)
}

impl Reducer for ApiReducer {
    fn reduce(&self, state: Option<&State>, action: &Action, _root: &State) -> ReducerResult {
        let Some(current) = state else {
            return Ok(Some(State::new(self.initial_state())));
        };
        let Some(slice) = current.downcast_ref::<ApiState>() else {
            return Err(ReducerError::failed(format!(
                "state at \"{}\" is a {}, not an api slice",
                self.shared.path(),
                current.type_name()
            )));
        };

        let next = if let Some(signal) = EnvironmentSignal::from_action(action) {
            apply_signal(slice, signal)
        } else {
            self.shared
                .actions
                .parse(action)
                .and_then(|parsed| self.apply(slice, parsed))
        };
        Ok(Some(next.map_or_else(|| current.clone(), State::new)))
    }
}
