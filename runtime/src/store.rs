//! The Store
//!
//! A [`Store`] owns the current state tree and the root reducer. Every
//! change goes through [`Store::dispatch`], which runs the middleware chain
//! (if any), then the reducer, then notifies listeners, all synchronously.
//!
//! # Example
//!
//! ```
//! use reflow_core::{Action, State, slice_reducer};
//! use reflow_runtime::create_store;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let counter = slice_reducer(0_i64, |n: &i64, a: &Action| a.is("INC").then(|| n + 1));
//! let store = create_store(counter, None).unwrap();
//!
//! let notified = Arc::new(AtomicUsize::new(0));
//! let seen = Arc::clone(&notified);
//! let _handle = store.subscribe(move || {
//!     seen.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! store.dispatch(Action::new("INC")).unwrap();
//! assert_eq!(store.get_state(), State::new(1_i64));
//! assert_eq!(notified.load(Ordering::SeqCst), 1);
//! ```

use crate::error::StoreError;
use crate::metrics::StoreMetrics;
use crate::middleware::{Middleware, Next};
use reflow_core::{Action, Reducer, State, reserved};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock, Weak};
use std::thread::{self, ThreadId};
use std::time::Instant;

/// Result of a dispatch.
///
/// `Ok(Some(action))` is the action (or a middleware's replacement) that
/// went through; `Ok(None)` means a middleware absorbed it.
pub type DispatchResult = Result<Option<Action>, StoreError>;

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
struct ListenerEntry {
    id: u64,
    active: Arc<AtomicBool>,
    callback: Listener,
}

pub(crate) struct StoreInner {
    reducer: RwLock<Arc<dyn Reducer>>,
    state: Mutex<State>,
    reduce_lock: Mutex<()>,
    reducing_on: Mutex<Option<ThreadId>>,
    listeners: Mutex<Vec<ListenerEntry>>,
    next_listener_id: AtomicU64,
    chain: OnceLock<Vec<Arc<dyn Middleware>>>,
    constructing: AtomicBool,
}

impl StoreInner {
    fn current_state(&self) -> State {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_reducing_here(&self) -> bool {
        *self.reducing_on.lock().unwrap_or_else(PoisonError::into_inner)
            == Some(thread::current().id())
    }

    /// Full dispatch: through the middleware chain when one is applied.
    pub(crate) fn dispatch(self: &Arc<Self>, action: Action) -> DispatchResult {
        if self.constructing.load(Ordering::SeqCst) {
            return Err(StoreError::DispatchDuringConstruction);
        }
        match self.chain.get() {
            Some(chain) if !chain.is_empty() => {
                let api = StoreApi {
                    inner: Arc::clone(self),
                };
                Next::new(chain, &api).run(action)
            },
            _ => self.base_dispatch(action),
        }
    }

    /// Run the reducer and notify listeners, bypassing middleware.
    pub(crate) fn base_dispatch(&self, action: Action) -> DispatchResult {
        if self.is_reducing_here() {
            return Err(StoreError::DispatchWhileReducing);
        }

        let started = Instant::now();
        {
            let _serialized = self.reduce_lock.lock().unwrap_or_else(PoisonError::into_inner);
            let reducer = Arc::clone(&*self.reducer.read().unwrap_or_else(PoisonError::into_inner));
            let current = self.current_state();

            *self.reducing_on.lock().unwrap_or_else(PoisonError::into_inner) =
                Some(thread::current().id());
            let outcome = reducer.reduce(Some(&current), &action, &current);
            *self.reducing_on.lock().unwrap_or_else(PoisonError::into_inner) = None;

            let next = match outcome {
                Ok(Some(next)) => next,
                Ok(None) => {
                    StoreMetrics::record_error();
                    return Err(StoreError::UndefinedRootState {
                        action_type: action.action_type().clone(),
                    });
                },
                Err(error) => {
                    StoreMetrics::record_error();
                    return Err(error.into());
                },
            };
            *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
        }
        StoreMetrics::record_dispatch(started.elapsed());

        self.notify();
        Ok(Some(action))
    }

    fn notify(&self) {
        let snapshot: Vec<ListenerEntry> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in snapshot {
            if listener.active.load(Ordering::SeqCst) {
                (listener.callback)();
            }
        }
    }

    fn remove_listener(&self, id: u64) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|listener| listener.id != id);
    }
}

/// The state container.
///
/// Cloning a `Store` yields another handle to the same store.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

/// Create a store.
///
/// The reserved INIT action runs once before this returns, so every
/// reducer has established its default state.
///
/// # Errors
///
/// Returns the reducer's configuration error, or
/// [`StoreError::UndefinedRootState`] when the reducer yields no state.
pub fn create_store(
    reducer: impl Reducer + 'static,
    preloaded_state: Option<State>,
) -> Result<Store, StoreError> {
    let reducer: Arc<dyn Reducer> = Arc::new(reducer);
    let init = reserved::init_action();
    let root = preloaded_state.clone().unwrap_or_else(State::empty_tree);
    let initial = reducer
        .reduce(preloaded_state.as_ref(), &init, &root)?
        .ok_or_else(|| StoreError::UndefinedRootState {
            action_type: init.action_type().clone(),
        })?;

    tracing::debug!("Store created");
    Ok(Store {
        inner: Arc::new(StoreInner {
            reducer: RwLock::new(reducer),
            state: Mutex::new(initial),
            reduce_lock: Mutex::new(()),
            reducing_on: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            chain: OnceLock::new(),
            constructing: AtomicBool::new(false),
        }),
    })
}

/// Create a store and hand it to an enhancer, usually
/// [`apply_middleware`](crate::middleware::apply_middleware).
///
/// # Errors
///
/// Returns errors from store creation or from the enhancer.
pub fn create_store_with_enhancer(
    reducer: impl Reducer + 'static,
    preloaded_state: Option<State>,
    enhancer: impl StoreEnhancer,
) -> Result<Store, StoreError> {
    enhancer.enhance(create_store(reducer, preloaded_state)?)
}

/// Extends a freshly created store.
pub trait StoreEnhancer {
    /// Enhance the store.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the store cannot be enhanced.
    fn enhance(self, store: Store) -> Result<Store, StoreError>;
}

impl<F> StoreEnhancer for F
where
    F: FnOnce(Store) -> Result<Store, StoreError>,
{
    fn enhance(self, store: Store) -> Result<Store, StoreError> {
        self(store)
    }
}

impl Store {
    /// Dispatch an action through the middleware chain and the reducer.
    ///
    /// # Errors
    ///
    /// Returns reducer configuration errors, or
    /// [`StoreError::DispatchWhileReducing`] when called from a reducer.
    #[tracing::instrument(skip(self, action), fields(action = %action.action_type()), name = "store_dispatch")]
    pub fn dispatch(&self, action: Action) -> DispatchResult {
        self.inner.dispatch(action)
    }

    /// The current state.
    #[must_use]
    pub fn get_state(&self) -> State {
        self.inner.current_state()
    }

    /// Register a change listener, called after every dispatch.
    ///
    /// A listener added while listeners are being notified first fires on
    /// the next dispatch. Dropping the returned handle keeps the listener
    /// registered.
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> Unsubscribe {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ListenerEntry {
                id,
                active: Arc::clone(&active),
                callback: Arc::new(listener),
            });
        Unsubscribe {
            id,
            active,
            store: Arc::downgrade(&self.inner),
        }
    }

    /// Swap the root reducer and run INIT through it.
    ///
    /// # Errors
    ///
    /// Returns the new reducer's configuration errors. The new reducer stays
    /// installed either way.
    pub fn replace_reducer(&self, reducer: impl Reducer + 'static) -> Result<(), StoreError> {
        *self
            .inner
            .reducer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(reducer);
        tracing::debug!("Reducer replaced");
        self.inner.base_dispatch(reserved::init_action()).map(|_| ())
    }

    /// The restricted API handed to middleware.
    #[must_use]
    pub fn api(&self) -> StoreApi {
        StoreApi {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Install a middleware chain. Called by
    /// [`ApplyMiddleware`](crate::middleware::ApplyMiddleware).
    pub(crate) fn install_chain(&self, chain: Vec<Arc<dyn Middleware>>) -> Result<(), StoreError> {
        if self.inner.chain.get().is_some() {
            return Err(StoreError::MiddlewareAlreadyApplied);
        }
        let api = self.api();
        self.inner.constructing.store(true, Ordering::SeqCst);
        let attached = chain.iter().try_for_each(|middleware| middleware.attach(&api));
        self.inner.constructing.store(false, Ordering::SeqCst);
        attached?;

        self.inner
            .chain
            .set(chain)
            .map_err(|_| StoreError::MiddlewareAlreadyApplied)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.get_state())
            .field(
                "middleware",
                &self.inner.chain.get().map_or(0, Vec::len),
            )
            .finish_non_exhaustive()
    }
}

/// The part of the store visible to middleware and spawned tasks.
///
/// `dispatch` goes through the whole chain again, so actions dispatched by
/// a middleware are seen by every middleware.
#[derive(Clone)]
pub struct StoreApi {
    inner: Arc<StoreInner>,
}

impl StoreApi {
    /// The current state.
    #[must_use]
    pub fn get_state(&self) -> State {
        self.inner.current_state()
    }

    /// Dispatch through the full middleware chain.
    ///
    /// # Errors
    ///
    /// See [`Store::dispatch`]. Also fails with
    /// [`StoreError::DispatchDuringConstruction`] while the chain is being
    /// built.
    pub fn dispatch(&self, action: Action) -> DispatchResult {
        self.inner.dispatch(action)
    }

    pub(crate) fn base_dispatch(&self, action: Action) -> DispatchResult {
        self.inner.base_dispatch(action)
    }
}

impl fmt::Debug for StoreApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreApi").finish_non_exhaustive()
    }
}

/// Handle returned by [`Store::subscribe`].
#[derive(Debug)]
pub struct Unsubscribe {
    id: u64,
    active: Arc<AtomicBool>,
    store: Weak<StoreInner>,
}

impl Unsubscribe {
    /// Remove the listener. Calling this more than once has no effect.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(store) = self.store.upgrade() {
            store.remove_listener(self.id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reflow_core::{ReducerError, reducer_fn, slice_reducer};

    fn counter() -> impl Reducer {
        slice_reducer(0_i64, |n: &i64, a: &Action| a.is("INC").then(|| n + 1))
    }

    #[test]
    fn preloaded_state_is_passed_to_init() {
        let store = create_store(counter(), Some(State::new(41_i64))).unwrap();
        store.dispatch(Action::new("INC")).unwrap();
        assert_eq!(store.get_state(), State::new(42_i64));
    }

    #[test]
    fn undefined_root_state_fails_creation() {
        let result = create_store(
            reducer_fn(|_: Option<&State>, _: &Action, _: &State| Ok(None)),
            None,
        );
        assert!(matches!(
            result,
            Err(StoreError::UndefinedRootState { action_type }) if action_type.is_reserved()
        ));
    }

    #[test]
    fn reducer_errors_leave_state_untouched() {
        let store = create_store(
            reducer_fn(|state: Option<&State>, action: &Action, _: &State| {
                if action.is("boom") {
                    return Err(ReducerError::failed("boom"));
                }
                Ok(Some(state.cloned().unwrap_or_else(|| State::new(1_i64))))
            }),
            None,
        )
        .unwrap();
        let before = store.get_state();

        let err = store.dispatch(Action::new("boom")).unwrap_err();
        assert_eq!(err, StoreError::Reducer(ReducerError::failed("boom")));
        assert_eq!(err.to_string(), "boom");
        assert!(State::ptr_eq(&before, &store.get_state()));
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let store = create_store(counter(), None).unwrap();
        let handle = store.subscribe(|| {});
        handle.unsubscribe();
        handle.unsubscribe();
        assert!(store.inner.listeners.lock().unwrap().is_empty());
    }
}
