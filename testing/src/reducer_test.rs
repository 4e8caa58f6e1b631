//! Ergonomic testing utilities for reducers
//!
//! This module provides a fluent API for testing reducers with readable Given-When-Then syntax.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use reflow_core::{Action, Reducer, ReducerError, State};

/// Type alias for state assertion functions
type StateAssertion = Box<dyn FnOnce(&State)>;

/// Type alias for error assertion functions
type ErrorAssertion = Box<dyn FnOnce(&ReducerError)>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// Actions are applied in order; each call receives the state produced by
/// the previous one as both its slice and the entire state.
///
/// # Example
///
/// ```
/// use reflow_core::{Action, State, slice_reducer};
/// use reflow_testing::ReducerTest;
///
/// ReducerTest::new(slice_reducer(0_i64, |n: &i64, a: &Action| a.is("INC").then(|| n + 1)))
///     .given_state(State::new(1_i64))
///     .when_action(Action::new("INC"))
///     .when_action(Action::new("INC"))
///     .then_state(|state| assert_eq!(state, &State::new(3_i64)))
///     .run();
/// ```
pub struct ReducerTest<R: Reducer> {
    reducer: R,
    initial_state: Option<State>,
    actions: Vec<Action>,
    expect_unchanged: bool,
    state_assertions: Vec<StateAssertion>,
    error_assertion: Option<ErrorAssertion>,
}

impl<R: Reducer> ReducerTest<R> {
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            initial_state: None,
            actions: Vec::new(),
            expect_unchanged: false,
            state_assertions: Vec::new(),
            error_assertion: None,
        }
    }

    /// Set the initial state (Given). Without it the reducer starts from
    /// undefined.
    #[must_use]
    pub fn given_state(mut self, state: State) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Add an action to apply (When)
    #[must_use]
    pub fn when_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&State) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Assert that the result is the very reference given as initial state
    #[must_use]
    pub const fn then_unchanged(mut self) -> Self {
        self.expect_unchanged = true;
        self
    }

    /// Expect the reducer to fail, and assert on the error (Then)
    #[must_use]
    pub fn then_error<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&ReducerError) + 'static,
    {
        self.error_assertion = Some(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if no action is set, if the outcome (error or state) is not
    /// the expected one, or if any assertion fails.
    #[allow(clippy::panic)] // Test code can panic
    pub fn run(self) {
        assert!(!self.actions.is_empty(), "Action must be set with when_action()");

        match apply_all(&self.reducer, self.initial_state.clone(), &self.actions) {
            Ok(state) => {
                if self.error_assertion.is_some() {
                    panic!("Expected the reducer to fail, but it returned {state:?}");
                }
                if self.expect_unchanged {
                    let Some(initial) = &self.initial_state else {
                        panic!("then_unchanged() requires given_state()");
                    };
                    assert!(
                        State::ptr_eq(initial, &state),
                        "Expected the given state reference back, got {state:?}"
                    );
                }
                for assertion in self.state_assertions {
                    assertion(&state);
                }
            },
            Err(error) => match self.error_assertion {
                Some(assertion) => assertion(&error),
                None => panic!("Reducer failed: {error}"),
            },
        }
    }
}

fn apply_all<R: Reducer>(
    reducer: &R,
    initial: Option<State>,
    actions: &[Action],
) -> Result<State, ReducerError> {
    let mut state = initial;
    for action in actions {
        let root = state.clone().unwrap_or_else(State::empty_tree);
        let next = reducer.reduce(state.as_ref(), action, &root)?;
        state = Some(next.ok_or_else(|| ReducerError::UndefinedState {
            key: String::new(),
            action_type: action.action_type().clone(),
        })?);
    }
    Ok(state.unwrap_or_else(State::empty_tree))
}

/// Helper assertions for state references
pub mod assertions {
    use reflow_core::State;

    /// Assert that two states are the same reference
    ///
    /// # Panics
    ///
    /// Panics if the states are different allocations.
    pub fn assert_same_ref(a: &State, b: &State) {
        assert!(State::ptr_eq(a, b), "Expected the same reference: {a:?} vs {b:?}");
    }

    /// Assert that two states are different references
    ///
    /// # Panics
    ///
    /// Panics if the states share an allocation.
    pub fn assert_new_ref(a: &State, b: &State) {
        assert!(!State::ptr_eq(a, b), "Expected a new reference, got {a:?} twice");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflow_core::{ReducerTree, combine_reducers, slice_reducer};

    fn counter() -> impl Reducer {
        slice_reducer(0_i64, |n: &i64, a: &Action| match a.type_name() {
            Some("increment") => Some(n + 1),
            Some("decrement") => Some(n - 1),
            _ => None,
        })
    }

    #[test]
    fn test_reducer_test_increment() {
        ReducerTest::new(counter())
            .given_state(State::new(0_i64))
            .when_action(Action::new("increment"))
            .then_state(|state| {
                assert_eq!(state, &State::new(1_i64));
            })
            .run();
    }

    #[test]
    fn test_reducer_test_unknown_action_keeps_reference() {
        ReducerTest::new(counter())
            .given_state(State::new(5_i64))
            .when_action(Action::new("noop"))
            .then_unchanged()
            .run();
    }

    #[test]
    fn test_reducer_test_from_undefined() {
        ReducerTest::new(combine_reducers(ReducerTree::new().leaf("count", counter())))
            .when_action(Action::new("decrement"))
            .then_state(|state| {
                assert_eq!(state.get("count"), Some(&State::new(-1_i64)));
            })
            .run();
    }

    #[test]
    fn test_reducer_test_error() {
        let foreign = State::new("text".to_string());
        ReducerTest::new(counter())
            .given_state(foreign)
            .when_action(Action::new("increment"))
            .then_error(|error| assert!(matches!(error, ReducerError::Failed(_))))
            .run();
    }

    #[test]
    fn test_reference_assertions() {
        let a = State::new(1_i64);
        let b = State::new(1_i64);
        assertions::assert_same_ref(&a, &a.clone());
        assertions::assert_new_ref(&a, &b);
    }
}
