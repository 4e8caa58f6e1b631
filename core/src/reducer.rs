//! The reducer abstraction
//!
//! A reducer is a pure function
//! `(current_slice_state, action, entire_state) -> next_slice_state`.
//! `None` stands for "undefined": a reducer receives `None` when its slice
//! has no state yet, and must never *return* `None` for a defined action.

use crate::action::{Action, ActionType};
use crate::reserved;
use crate::state::{State, StateValue};
use std::sync::Arc;
use thiserror::Error;

/// Result of a reducer call.
pub type ReducerResult = Result<Option<State>, ReducerError>;

/// Configuration errors raised while reducing.
///
/// These are fatal: they always propagate to whoever called the reducer,
/// `dispatch` or `create_store`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReducerError {
    /// A reducer returned undefined for a concrete action
    #[error(
        "Given action \"{action_type}\", reducer \"{key}\" returned undefined. \
         To ignore an action, you must explicitly return the previous state."
    )]
    UndefinedState {
        /// Key of the failing reducer
        key: String,
        /// Type of the action being handled
        action_type: ActionType,
    },

    /// A reducer returned undefined when asked for its initial state
    #[error(
        "Reducer \"{key}\" returned undefined during initialization. \
         If the state passed to the reducer is undefined, you must explicitly return the initial state. \
         The initial state may not be undefined."
    )]
    UndefinedInitialState {
        /// Key of the failing reducer
        key: String,
    },

    /// A reducer handles the reserved INIT type but not unknown types
    #[error(
        "Reducer \"{key}\" returned undefined when probed with a random type. \
         Don't try to handle {init} or other actions in \"{namespace}*\" namespace. \
         They are considered private. Instead, you must return the current state for any unknown actions, \
         unless it is undefined, in which case you must return the initial state, regardless of the action type. \
         The initial state may not be undefined.",
        init = reserved::INIT,
        namespace = reserved::NAMESPACE
    )]
    PrivateActionType {
        /// Key of the failing reducer
        key: String,
    },

    /// Error raised by a reducer implementation itself
    #[error("{0}")]
    Failed(String),
}

impl ReducerError {
    /// Build a [`ReducerError::Failed`] from any message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// A reducer over one slice of the state tree.
///
/// `root` is the entire state received by the outermost combined reducer,
/// which lets a slice read its siblings.
pub trait Reducer: Send + Sync {
    /// Compute the next slice state.
    ///
    /// # Errors
    ///
    /// Returns a [`ReducerError`] for configuration errors or failures
    /// raised by the reducer itself.
    fn reduce(&self, state: Option<&State>, action: &Action, root: &State) -> ReducerResult;
}

impl<R: Reducer + ?Sized> Reducer for Arc<R> {
    fn reduce(&self, state: Option<&State>, action: &Action, root: &State) -> ReducerResult {
        (**self).reduce(state, action, root)
    }
}

impl<R: Reducer + ?Sized> Reducer for Box<R> {
    fn reduce(&self, state: Option<&State>, action: &Action, root: &State) -> ReducerResult {
        (**self).reduce(state, action, root)
    }
}

/// A reducer backed by a closure. Created by [`reducer_fn`].
#[derive(Clone)]
pub struct FnReducer<F>(F);

/// Turn a closure into a [`Reducer`].
///
/// # Example
///
/// ```
/// use reflow_core::{Action, Reducer, State, reducer_fn};
///
/// let counter = reducer_fn(|state: Option<&State>, action: &Action, _root: &State| {
///     let count = state.and_then(State::downcast_ref::<i64>).copied().unwrap_or(0);
///     Ok(Some(match action.type_name() {
///         Some("INC") => State::new(count + 1),
///         _ => state.cloned().unwrap_or_else(|| State::new(0_i64)),
///     }))
/// });
///
/// let next = counter.reduce(None, &Action::new("INC"), &State::empty_tree()).unwrap();
/// assert_eq!(next, Some(State::new(1_i64)));
/// ```
pub fn reducer_fn<F>(f: F) -> FnReducer<F>
where
    F: Fn(Option<&State>, &Action, &State) -> ReducerResult + Send + Sync,
{
    FnReducer(f)
}

impl<F> Reducer for FnReducer<F>
where
    F: Fn(Option<&State>, &Action, &State) -> ReducerResult + Send + Sync,
{
    fn reduce(&self, state: Option<&State>, action: &Action, root: &State) -> ReducerResult {
        (self.0)(state, action, root)
    }
}

/// A typed slice reducer with an initial value. Created by [`slice_reducer`].
#[derive(Clone)]
pub struct SliceReducer<T, F> {
    initial: T,
    update: F,
}

/// Build a reducer for a slice of type `T`.
///
/// `update` returns `Some(next)` to replace the slice, or `None` to keep
/// the current state reference untouched.
///
/// # Example
///
/// ```
/// use reflow_core::{Action, Reducer, State, slice_reducer};
///
/// let counter = slice_reducer(0_i64, |count: &i64, action: &Action| {
///     action.is("INC").then(|| count + 1)
/// });
///
/// let current = State::new(0_i64);
/// let same = counter.reduce(Some(&current), &Action::new("OTHER"), &current).unwrap();
/// assert!(State::ptr_eq(&same.unwrap(), &current));
/// ```
pub fn slice_reducer<T, F>(initial: T, update: F) -> SliceReducer<T, F>
where
    T: StateValue + Clone,
    F: Fn(&T, &Action) -> Option<T> + Send + Sync,
{
    SliceReducer { initial, update }
}

impl<T, F> Reducer for SliceReducer<T, F>
where
    T: StateValue + Clone,
    F: Fn(&T, &Action) -> Option<T> + Send + Sync,
{
    fn reduce(&self, state: Option<&State>, action: &Action, _root: &State) -> ReducerResult {
        let current = state
            .cloned()
            .unwrap_or_else(|| State::new(self.initial.clone()));
        let Some(value) = current.downcast_ref::<T>() else {
            return Err(ReducerError::failed(format!(
                "slice holds a value of type \"{}\" but its reducer expects \"{}\"",
                current.type_name(),
                std::any::type_name::<T>()
            )));
        };
        Ok(Some(match (self.update)(value, action) {
            Some(next) => State::new(next),
            None => current,
        }))
    }
}
