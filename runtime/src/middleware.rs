//! The middleware chain
//!
//! Middleware intercept every dispatched action before it reaches the
//! reducer. The first middleware in the list is the outermost one; the
//! innermost [`Next`] runs the reducer and notifies listeners.
//!
//! A middleware may:
//! - pass the action on with `next.run(action)`
//! - transform it and pass on the replacement
//! - swallow it by returning `Ok(None)` without calling `next`
//! - dispatch other actions through [`StoreApi::dispatch`], which re-enters
//!   the whole chain
//!
//! # Example
//!
//! ```
//! use reflow_core::{Action, State, slice_reducer};
//! use reflow_runtime::{apply_middleware, create_store_with_enhancer, from_fn};
//!
//! let counter = slice_reducer(0_i64, |n: &i64, a: &Action| a.is("INC").then(|| n + 1));
//! let double = from_fn(|_api, action: Action, next| {
//!     if action.is("INC") {
//!         next.run(action.clone())?;
//!     }
//!     next.run(action)
//! });
//!
//! let store = create_store_with_enhancer(counter, None, apply_middleware(vec![double.into()])).unwrap();
//! store.dispatch(Action::new("INC")).unwrap();
//! assert_eq!(store.get_state(), State::new(2_i64));
//! ```

use crate::error::StoreError;
use crate::store::{DispatchResult, Store, StoreApi, StoreEnhancer};
use reflow_core::Action;
use std::sync::Arc;

/// An interceptor in the dispatch pipeline.
pub trait Middleware: Send + Sync {
    /// Called once while the chain is built, before any action goes
    /// through it. Dispatching from here fails with
    /// [`StoreError::DispatchDuringConstruction`].
    ///
    /// # Errors
    ///
    /// Returning an error aborts applying the chain.
    fn attach(&self, api: &StoreApi) -> Result<(), StoreError> {
        let _ = api;
        Ok(())
    }

    /// Handle one action.
    ///
    /// # Errors
    ///
    /// Propagates errors from `next` or from dispatches made by the
    /// middleware.
    fn handle(&self, api: &StoreApi, action: Action, next: Next<'_>) -> DispatchResult;
}

impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    fn attach(&self, api: &StoreApi) -> Result<(), StoreError> {
        (**self).attach(api)
    }

    fn handle(&self, api: &StoreApi, action: Action, next: Next<'_>) -> DispatchResult {
        (**self).handle(api, action, next)
    }
}

/// The remainder of the chain after the current middleware.
///
/// `Next` is `Copy`: a middleware may call it several times, or not at all.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    rest: &'a [Arc<dyn Middleware>],
    api: &'a StoreApi,
}

impl<'a> Next<'a> {
    pub(crate) const fn new(chain: &'a [Arc<dyn Middleware>], api: &'a StoreApi) -> Self {
        Self { rest: chain, api }
    }

    /// Pass an action to the rest of the chain.
    ///
    /// # Errors
    ///
    /// Returns whatever the inner middleware or the reducer returns.
    pub fn run(self, action: Action) -> DispatchResult {
        match self.rest.split_first() {
            Some((middleware, rest)) => middleware.handle(
                self.api,
                action,
                Next {
                    rest,
                    api: self.api,
                },
            ),
            None => self.api.base_dispatch(action),
        }
    }
}

/// A middleware backed by a closure. Created by [`from_fn`].
pub struct FnMiddleware<F>(F);

/// Turn a closure into a [`Middleware`].
pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: for<'a> Fn(&StoreApi, Action, Next<'a>) -> DispatchResult + Send + Sync,
{
    FnMiddleware(f)
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&StoreApi, Action, Next<'a>) -> DispatchResult + Send + Sync,
{
    fn handle(&self, api: &StoreApi, action: Action, next: Next<'_>) -> DispatchResult {
        (self.0)(api, action, next)
    }
}

impl<F> From<FnMiddleware<F>> for Arc<dyn Middleware>
where
    F: for<'a> Fn(&StoreApi, Action, Next<'a>) -> DispatchResult + Send + Sync + 'static,
{
    fn from(middleware: FnMiddleware<F>) -> Self {
        Arc::new(middleware)
    }
}

/// A [`StoreEnhancer`] installing a middleware chain.
#[derive(Clone, Default)]
pub struct ApplyMiddleware {
    middleware: Vec<Arc<dyn Middleware>>,
}

/// Build an enhancer from an ordered middleware list.
#[must_use]
pub fn apply_middleware(middleware: Vec<Arc<dyn Middleware>>) -> ApplyMiddleware {
    ApplyMiddleware { middleware }
}

impl ApplyMiddleware {
    /// An empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware. Earlier middleware wrap later ones.
    #[must_use]
    pub fn with(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Number of middleware in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    /// Whether the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }
}

impl StoreEnhancer for ApplyMiddleware {
    fn enhance(self, store: Store) -> Result<Store, StoreError> {
        tracing::debug!(count = self.middleware.len(), "Applying middleware");
        store.install_chain(self.middleware)?;
        Ok(store)
    }
}
