//! # Reflow Runtime
//!
//! The imperative shell around `reflow-core`: the [`Store`] that owns the
//! state tree, the middleware chain that intercepts dispatches, and the
//! task handles used by middleware to schedule deferred work.
//!
//! ## Core Components
//!
//! - **Store**: Holds the state, runs the reducer, notifies listeners
//! - **Middleware**: Ordered interceptors composed once by [`apply_middleware`]
//! - **Tasks**: Explicitly cancellable Tokio tasks for timers and fetches
//!
//! ## Example
//!
//! ```
//! use reflow_core::{Action, ReducerTree, combine_reducers, slice_reducer};
//! use reflow_runtime::{ApplyMiddleware, LoggingMiddleware, create_store_with_enhancer};
//!
//! let reducer = combine_reducers(ReducerTree::new().leaf(
//!     "counter",
//!     slice_reducer(0_i64, |n: &i64, a: &Action| a.is("INC").then(|| n + 1)),
//! ));
//! let store = create_store_with_enhancer(
//!     reducer,
//!     None,
//!     ApplyMiddleware::new().with(LoggingMiddleware),
//! )
//! .unwrap();
//!
//! store.dispatch(Action::new("INC")).unwrap();
//! assert_eq!(store.get_state().get("counter").and_then(|s| s.downcast_ref::<i64>()), Some(&1));
//! ```

pub mod error;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod store;
pub mod task;

pub use error::StoreError;
pub use logging::LoggingMiddleware;
pub use middleware::{ApplyMiddleware, FnMiddleware, Middleware, Next, apply_middleware, from_fn};
pub use store::{
    DispatchResult, Store, StoreApi, StoreEnhancer, Unsubscribe, create_store,
    create_store_with_enhancer,
};
pub use task::{TaskHandle, spawn, spawn_after};
