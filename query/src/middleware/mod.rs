//! The cache middleware
//!
//! One middleware per api. For every action it:
//!
//! 1. announces itself with `internal/middlewareRegistered` on first use,
//! 2. lets the batching handler absorb per-subscriber actions,
//! 3. forwards everything else down the chain,
//! 4. runs the sub-handlers against the state before and after, provided
//!    the api slice is mounted,
//! 5. executes the follow-up dispatches the sub-handlers asked for.
//!
//! The window-event handler sees every action; the other handlers only
//! this api's actions, in a fixed order.

mod batch_actions;
mod cache_collection;
mod cache_lifecycle;
mod dev_check;
mod invalidation_by_tags;
mod polling;
mod query_lifecycle;
mod window_events;

use crate::actions::ApiAction;
use crate::api::{ApiShared, refetch_key};
use crate::state::{ApiState, QueryCacheKey};
use batch_actions::{BatchActions, LiveSubscriptions};
use cache_collection::CacheCollection;
use cache_lifecycle::CacheLifecycleHandler;
use dev_check::DevCheck;
use invalidation_by_tags::InvalidationByTags;
use polling::Polling;
use query_lifecycle::QueryLifecycleHandler;
use reflow_core::{Action, State};
use reflow_runtime::{DispatchResult, Middleware, Next, StoreApi};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use window_events::WindowEvents;

/// Work a sub-handler defers until every handler has seen the action.
#[derive(Debug)]
pub(crate) enum FollowUp {
    /// Force a refetch of an existing entry
    Refetch(QueryCacheKey),
    /// Dispatch through the full chain
    Dispatch(Action),
}

/// What a sub-handler can see and request while handling one action.
pub(crate) struct HandlerContext<'a> {
    pub(crate) api: &'a StoreApi,
    pub(crate) shared: &'a Arc<ApiShared>,
    pub(crate) live: &'a LiveSubscriptions,
    before: &'a State,
    after: &'a State,
    follow_ups: SmallVec<[FollowUp; 4]>,
}

impl<'a> HandlerContext<'a> {
    /// The slice before the action was reduced.
    pub(crate) fn before(&self) -> Option<&'a ApiState> {
        self.shared.slice(self.before)
    }

    /// The slice after the action was reduced.
    pub(crate) fn after(&self) -> Option<&'a ApiState> {
        self.shared.slice(self.after)
    }

    pub(crate) fn refetch(&mut self, key: QueryCacheKey) {
        self.follow_ups.push(FollowUp::Refetch(key));
    }

    pub(crate) fn dispatch(&mut self, action: Action) {
        self.follow_ups.push(FollowUp::Dispatch(action));
    }
}

/// A sub-handler reacting to this api's actions.
pub(crate) trait CacheHandler: Send + Sync {
    fn handle(&self, action: &ApiAction<'_>, cx: &mut HandlerContext<'_>);
}

/// Middleware driving fetches, subscriptions and cache lifetimes for one
/// api. Obtain it from [`QueryApi::middleware`](crate::QueryApi::middleware).
pub struct CacheMiddleware {
    shared: Arc<ApiShared>,
    registered: AtomicBool,
    live: LiveSubscriptions,
    batch: BatchActions,
    window: WindowEvents,
    handlers: [Box<dyn CacheHandler>; 6],
}

impl CacheMiddleware {
    pub(crate) fn new(shared: Arc<ApiShared>) -> Self {
        let live = LiveSubscriptions::default();
        Self {
            batch: BatchActions::new(Arc::clone(&shared), live.clone()),
            window: WindowEvents,
            handlers: [
                Box::new(DevCheck),
                Box::new(CacheCollection::default()),
                Box::new(InvalidationByTags),
                Box::new(Polling::default()),
                Box::new(CacheLifecycleHandler::default()),
                Box::new(QueryLifecycleHandler::default()),
            ],
            registered: AtomicBool::new(false),
            live,
            shared,
        }
    }

    fn run_follow_ups(&self, api: &StoreApi, follow_ups: SmallVec<[FollowUp; 4]>) {
        for follow_up in follow_ups {
            let outcome = match &follow_up {
                FollowUp::Refetch(key) => refetch_key(&self.shared, api, key).map(|_| ()),
                FollowUp::Dispatch(action) => api
                    .dispatch(action.clone())
                    .map(|_| ())
                    .map_err(Into::into),
            };
            if let Err(error) = outcome {
                tracing::error!(api = self.shared.path(), follow_up = ?follow_up, error = %error, "Cache follow-up failed");
            }
        }
    }
}

impl Middleware for CacheMiddleware {
    fn handle(&self, api: &StoreApi, action: Action, next: Next<'_>) -> DispatchResult {
        if !self.registered.swap(true, Ordering::SeqCst) {
            api.dispatch(self.shared.actions.middleware_registered(&self.shared.api_uid))?;
        }

        let before = api.get_state();
        let parsed = self.shared.actions.parse(&action);
        let proceed = self.batch.observe(parsed.as_ref(), api);

        let result = if proceed {
            next.run(action.clone())?
        } else {
            None
        };

        let after = api.get_state();
        if self.shared.slice(&after).is_some() {
            let mut cx = HandlerContext {
                api,
                shared: &self.shared,
                live: &self.live,
                before: &before,
                after: &after,
                follow_ups: SmallVec::new(),
            };
            self.window.handle(&action, &mut cx);
            if let Some(parsed) = &parsed {
                for handler in &self.handlers {
                    handler.handle(parsed, &mut cx);
                }
            }
            let follow_ups = cx.follow_ups;
            self.run_follow_ups(api, follow_ups);
        }

        if let Some(flush) = self.batch.take_inline_flush() {
            api.dispatch(flush)?;
        }
        Ok(result)
    }
}

impl fmt::Debug for CacheMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheMiddleware")
            .field("api", &self.shared.path())
            .field("registered", &self.registered.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
