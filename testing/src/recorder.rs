//! Recording middleware

use reflow_core::Action;
use reflow_runtime::{DispatchResult, Middleware, Next, StoreApi};
use std::sync::{Arc, Mutex, PoisonError};

/// A pass-through middleware that records every action it sees.
///
/// Clones share the same log, so keep one clone for assertions and hand
/// the other to the store. Actions absorbed by middleware placed after the
/// recorder are still recorded.
#[derive(Debug, Clone, Default)]
pub struct ActionRecorder {
    actions: Arc<Mutex<Vec<Action>>>,
}

impl ActionRecorder {
    /// An empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded action, in dispatch order.
    #[must_use]
    pub fn actions(&self) -> Vec<Action> {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The recorded action types as strings.
    #[must_use]
    pub fn types(&self) -> Vec<String> {
        self.actions()
            .iter()
            .map(|action| action.action_type().to_string())
            .collect()
    }

    /// How many recorded actions have type `name`.
    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.actions().iter().filter(|action| action.is(name)).count()
    }

    /// Recorded actions of type `name`.
    #[must_use]
    pub fn of_type(&self, name: &str) -> Vec<Action> {
        self.actions()
            .into_iter()
            .filter(|action| action.is(name))
            .collect()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Middleware for ActionRecorder {
    fn handle(&self, _api: &StoreApi, action: Action, next: Next<'_>) -> DispatchResult {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(action.clone());
        next.run(action)
    }
}
