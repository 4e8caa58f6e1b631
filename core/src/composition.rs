//! Reducer composition
//!
//! [`combine_reducers`] turns a [`ReducerTree`] into one [`CombinedReducer`]
//! whose state is a tree with the same keys.
//!
//! - Branches are composed recursively, once, when the tree is combined. A
//!   branch shared between several places (same `Arc<ReducerTree>`) is
//!   composed a single time and reused.
//! - Every leaf is called with `(its_slice, action, entire_state)`; the
//!   entire state is the one received by the outermost combined reducer and
//!   is forwarded unchanged through every level.
//! - When every child returns the reference it was given, the combined
//!   reducer returns the input state itself.
//!
//! # Example
//!
//! ```
//! use reflow_core::{Action, ReducerTree, State, combine_reducers, slice_reducer};
//!
//! let reducer = combine_reducers(
//!     ReducerTree::new()
//!         .leaf("counter", slice_reducer(0_i64, |n: &i64, a: &Action| a.is("INC").then(|| n + 1))),
//! );
//!
//! let state = State::tree([("counter", State::new(0_i64))]);
//! let next = reducer.apply(Some(&state), &Action::new("INC")).unwrap();
//! assert_eq!(next, State::tree([("counter", State::new(1_i64))]));
//! ```

use crate::action::Action;
use crate::reducer::{Reducer, ReducerError, ReducerResult, reducer_fn};
use crate::reserved;
use crate::shape;
use crate::state::{State, StateMap};
use std::collections::HashMap;
use std::sync::Arc;

/// One entry of a reducer tree.
#[derive(Clone)]
pub enum ReducerNode {
    /// A reducer for one slice
    Leaf(Arc<dyn Reducer>),
    /// A nested mapping, composed recursively
    Branch(Arc<ReducerTree>),
}

/// An ordered mapping from slice key to [`ReducerNode`].
#[derive(Clone, Default)]
pub struct ReducerTree {
    entries: Vec<(String, ReducerNode)>,
}

impl ReducerTree {
    /// An empty tree.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add (or replace) a node.
    #[must_use]
    pub fn node(mut self, key: impl Into<String>, node: ReducerNode) -> Self {
        let key = key.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = node;
        } else {
            self.entries.push((key, node));
        }
        self
    }

    /// Add a leaf reducer.
    #[must_use]
    pub fn leaf(self, key: impl Into<String>, reducer: impl Reducer + 'static) -> Self {
        self.node(key, ReducerNode::Leaf(Arc::new(reducer)))
    }

    /// Add a closure leaf reducer.
    #[must_use]
    pub fn leaf_fn<F>(self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(Option<&State>, &Action, &State) -> ReducerResult + Send + Sync + 'static,
    {
        self.leaf(key, reducer_fn(f))
    }

    /// Add a nested tree.
    #[must_use]
    pub fn branch(self, key: impl Into<String>, tree: impl Into<Arc<ReducerTree>>) -> Self {
        self.node(key, ReducerNode::Branch(tree.into()))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the tree has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct Combined {
    reducers: Vec<(String, Arc<dyn Reducer>)>,
    sanity_error: Option<ReducerError>,
}

/// The reducer produced by [`combine_reducers`].
#[derive(Clone)]
pub struct CombinedReducer(Arc<Combined>);

/// Compose a reducer tree into a single reducer.
///
/// Empty branches are dropped with a warning. Configuration errors found
/// while probing the leaves are not returned here; they are returned by
/// every call of the combined reducer instead.
///
/// A branch shared between several keys of `tree` (the same
/// `Arc<ReducerTree>`) is composed once and reused. That cache lives for
/// this call only: combining the same tree again composes it afresh.
#[must_use]
pub fn combine_reducers(tree: impl Into<Arc<ReducerTree>>) -> CombinedReducer {
    compose(&tree.into(), &mut HashMap::new())
}

fn compose(tree: &Arc<ReducerTree>, cache: &mut HashMap<usize, CombinedReducer>) -> CombinedReducer {
    let id = Arc::as_ptr(tree) as usize;
    if let Some(existing) = cache.get(&id) {
        return existing.clone();
    }

    let mut reducers: Vec<(String, Arc<dyn Reducer>)> = Vec::with_capacity(tree.len());
    for (key, node) in &tree.entries {
        match node {
            ReducerNode::Leaf(reducer) => reducers.push((key.clone(), Arc::clone(reducer))),
            ReducerNode::Branch(branch) if branch.is_empty() => {
                tracing::warn!(
                    key = %key,
                    "Reducer tree entry \"{key}\" is an empty mapping and will be ignored"
                );
            },
            ReducerNode::Branch(branch) => {
                let nested = compose(branch, cache);
                reducers.push((key.clone(), Arc::new(nested)));
            },
        }
    }

    let combined = CombinedReducer::from_reducers(reducers);
    cache.insert(id, combined.clone());
    combined
}

/// Call every reducer with the reserved INIT action and a random probe.
fn assert_reducer_sanity(reducers: &[(String, Arc<dyn Reducer>)]) -> Result<(), ReducerError> {
    let root = State::empty_tree();
    for (key, reducer) in reducers {
        if reducer.reduce(None, &reserved::init_action(), &root)?.is_none() {
            return Err(ReducerError::UndefinedInitialState { key: key.clone() });
        }
        if reducer.reduce(None, &reserved::probe_action(), &root)?.is_none() {
            return Err(ReducerError::PrivateActionType { key: key.clone() });
        }
    }
    Ok(())
}

impl CombinedReducer {
    fn from_reducers(reducers: Vec<(String, Arc<dyn Reducer>)>) -> Self {
        let sanity_error = assert_reducer_sanity(&reducers).err();
        Self(Arc::new(Combined {
            reducers,
            sanity_error,
        }))
    }

    /// Keys of the composed state, in tree order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.reducers.iter().map(|(key, _)| key.as_str())
    }

    /// Reduce with `state` itself as the entire state.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Reducer::reduce`].
    pub fn apply(&self, state: Option<&State>, action: &Action) -> Result<State, ReducerError> {
        let root = state.cloned().unwrap_or_else(State::empty_tree);
        let next = self.reduce(state, action, &root)?;
        Ok(next.unwrap_or(root))
    }
}

impl Reducer for CombinedReducer {
    fn reduce(&self, state: Option<&State>, action: &Action, root: &State) -> ReducerResult {
        if let Some(error) = &self.0.sanity_error {
            return Err(error.clone());
        }

        let input = state.cloned().unwrap_or_else(State::empty_tree);
        let keys: Vec<&str> = self.keys().collect();
        if let Some(message) = shape::unexpected_state_shape_message(&input, &keys, action) {
            tracing::warn!("{message}");
        }

        let previous = input.as_tree();
        let mut has_changed = previous.is_none_or(|map| map.len() != keys.len());
        let mut next = StateMap::new();

        for (key, reducer) in &self.0.reducers {
            let previous_for_key = previous.and_then(|map| map.get(key));
            let Some(next_for_key) = reducer.reduce(previous_for_key, action, root)? else {
                return Err(ReducerError::UndefinedState {
                    key: key.clone(),
                    action_type: action.action_type().clone(),
                });
            };
            has_changed = has_changed
                || previous_for_key.is_none_or(|prev| !State::ptr_eq(prev, &next_for_key));
            next.insert(key.clone(), next_for_key);
        }

        Ok(Some(if has_changed {
            State::from_map(next)
        } else {
            input
        }))
    }
}
