//! # Reflow Core
//!
//! Pure building blocks of the Reflow state container.
//!
//! ## Core Concepts
//!
//! - **State**: An immutable tree of values, shared by reference
//! - **Action**: A typed intent to change state, with an optional payload
//! - **Reducer**: Pure function `(slice, action, entire_state) → next_slice`
//! - **Composition**: [`combine_reducers`] builds one reducer from a tree of them
//!
//! Nothing in this crate performs I/O or spawns tasks; the store and the
//! middleware live in `reflow-runtime`.
//!
//! ## Example
//!
//! ```
//! use reflow_core::{Action, ReducerTree, State, combine_reducers, slice_reducer};
//!
//! let todos = slice_reducer(Vec::<String>::new(), |items: &Vec<String>, action: &Action| {
//!     let text = action.payload::<String>().filter(|_| action.is("todos/added"))?;
//!     let mut next = items.clone();
//!     next.push(text.clone());
//!     Some(next)
//! });
//! let visible = slice_reducer(true, |_: &bool, action: &Action| {
//!     action.payload::<bool>().filter(|_| action.is("filter/set")).copied()
//! });
//!
//! let reducer = combine_reducers(
//!     ReducerTree::new()
//!         .leaf("todos", todos)
//!         .branch("ui", ReducerTree::new().leaf("visible", visible)),
//! );
//!
//! let state = reducer.apply(None, &Action::new("todos/added").with_payload("ship".to_string())).unwrap();
//! assert_eq!(state.get("todos"), Some(&State::new(vec!["ship".to_string()])));
//! assert_eq!(state.get_path(&["ui", "visible"]), Some(&State::new(true)));
//! ```

pub mod action;
pub mod composition;
pub mod environment;
pub mod reducer;
pub mod reserved;
pub mod shape;
pub mod state;

pub use action::{Action, ActionType, Symbol};
pub use chrono::{DateTime, Utc};
pub use composition::{CombinedReducer, ReducerNode, ReducerTree, combine_reducers};
pub use environment::{Clock, SystemClock};
pub use reducer::{
    FnReducer, Reducer, ReducerError, ReducerResult, SliceReducer, reducer_fn, slice_reducer,
};
pub use state::{State, StateMap, StateValue};
