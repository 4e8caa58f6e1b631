//! The state tree
//!
//! A [`State`] is an immutable, reference-counted value. It is either a
//! *leaf* holding any slice value, or a *tree* mapping slice keys to child
//! states. Cloning a `State` clones the reference, never the data, so
//! reducers can hand back the exact state they received and callers can
//! detect "nothing changed" with [`State::ptr_eq`].
//!
//! # Example
//!
//! ```
//! use reflow_core::State;
//!
//! let counter = State::new(1_i64);
//! let root = State::tree([("counter", counter.clone())]);
//!
//! assert!(State::ptr_eq(root.get("counter").unwrap(), &counter));
//! assert_eq!(root.get("counter").and_then(State::downcast_ref::<i64>), Some(&1));
//! ```

use std::any::{Any, type_name};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Values that can live in a leaf of the state tree.
///
/// Implemented for every `Send + Sync + Debug + PartialEq + 'static` type.
pub trait StateValue: Any + Send + Sync + fmt::Debug + PartialEq {}

impl<T> StateValue for T where T: Any + Send + Sync + fmt::Debug + PartialEq {}

/// Mapping from slice key to child state.
pub type StateMap = BTreeMap<String, State>;

type DynValue = dyn Any + Send + Sync;

/// A node of the state tree (leaf value or keyed subtree).
#[derive(Clone)]
pub struct State(Arc<Node>);

enum Node {
    Leaf(Leaf),
    Tree(StateMap),
}

struct Leaf {
    value: Box<DynValue>,
    type_name: &'static str,
    debug: fn(&DynValue, &mut fmt::Formatter<'_>) -> fmt::Result,
    eq: fn(&DynValue, &DynValue) -> bool,
}

fn debug_leaf<T: StateValue>(value: &DynValue, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match value.downcast_ref::<T>() {
        Some(value) => fmt::Debug::fmt(value, f),
        None => f.write_str("<opaque>"),
    }
}

fn eq_leaf<T: StateValue>(a: &DynValue, b: &DynValue) -> bool {
    match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

impl State {
    /// Wrap a value as a leaf state.
    #[must_use]
    pub fn new<T: StateValue>(value: T) -> Self {
        Self(Arc::new(Node::Leaf(Leaf {
            value: Box::new(value),
            type_name: type_name::<T>(),
            debug: debug_leaf::<T>,
            eq: eq_leaf::<T>,
        })))
    }

    /// Build a tree state from `(key, state)` pairs.
    #[must_use]
    pub fn tree<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, State)>,
        K: Into<String>,
    {
        Self::from_map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a tree state from an existing map.
    #[must_use]
    pub fn from_map(map: StateMap) -> Self {
        Self(Arc::new(Node::Tree(map)))
    }

    /// An empty tree, used as the default for an undefined root.
    #[must_use]
    pub fn empty_tree() -> Self {
        Self::from_map(StateMap::new())
    }

    /// Whether both handles point at the same allocation.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Returns `true` for tree nodes.
    #[must_use]
    pub fn is_tree(&self) -> bool {
        matches!(*self.0, Node::Tree(_))
    }

    /// The children of a tree node, or `None` for a leaf.
    #[must_use]
    pub fn as_tree(&self) -> Option<&StateMap> {
        match &*self.0 {
            Node::Tree(map) => Some(map),
            Node::Leaf(_) => None,
        }
    }

    /// Look up a direct child by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&State> {
        self.as_tree().and_then(|map| map.get(key))
    }

    /// Look up a nested child by path.
    #[must_use]
    pub fn get_path(&self, path: &[&str]) -> Option<&State> {
        path.iter()
            .try_fold(self, |node, key| node.get(key))
    }

    /// Keys of a tree node in sorted order; empty for a leaf.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.as_tree()
            .into_iter()
            .flat_map(|map| map.keys().map(String::as_str))
    }

    /// Borrow the leaf value as `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match &*self.0 {
            Node::Leaf(leaf) => leaf.value.as_ref().downcast_ref::<T>(),
            Node::Tree(_) => None,
        }
    }

    /// Name of the value's type, `"Tree"` for tree nodes.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match &*self.0 {
            Node::Leaf(leaf) => leaf.type_name,
            Node::Tree(_) => "Tree",
        }
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        if Self::ptr_eq(self, other) {
            return true;
        }
        match (&*self.0, &*other.0) {
            (Node::Tree(a), Node::Tree(b)) => a == b,
            (Node::Leaf(a), Node::Leaf(b)) => {
                a.type_name == b.type_name && (a.eq)(a.value.as_ref(), b.value.as_ref())
            },
            _ => false,
        }
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            Node::Tree(map) => f.debug_map().entries(map.iter()).finish(),
            Node::Leaf(leaf) => (leaf.debug)(leaf.value.as_ref(), f),
        }
    }
}
