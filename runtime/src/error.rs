//! Error types for the Store runtime

use reflow_core::{ActionType, ReducerError};
use thiserror::Error;

/// Errors returned by store operations.
///
/// All of these are programming or configuration errors. They are returned
/// to the caller of `dispatch`, `create_store` or `replace_reducer` and
/// leave the current state untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A reducer reported a configuration error or failed
    #[error(transparent)]
    Reducer(#[from] ReducerError),

    /// `dispatch` was called from inside a reducer
    #[error("Reducers may not dispatch actions.")]
    DispatchWhileReducing,

    /// A middleware dispatched while the chain was being built
    #[error(
        "Dispatching while constructing your middleware is not allowed. \
         Other middleware would not be applied to this dispatch."
    )]
    DispatchDuringConstruction,

    /// The root reducer returned undefined
    #[error("The root reducer returned undefined for action \"{action_type}\"")]
    UndefinedRootState {
        /// Type of the action being handled
        action_type: ActionType,
    },

    /// A second middleware chain was applied to the same store
    #[error("Middleware has already been applied to this store")]
    MiddlewareAlreadyApplied,
}
