//! Actions and action types
//!
//! An [`Action`] is an immutable record describing an intent to change
//! state. Its [`ActionType`] is either a string name or a unique
//! [`Symbol`]; an optional payload of any type can be attached and read
//! back by reducers and middleware.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A unique action type token.
///
/// Two symbols created with the same description are still distinct.
#[derive(Clone)]
pub struct Symbol {
    id: u64,
    description: Arc<str>,
}

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(1);

impl Symbol {
    /// Create a fresh symbol.
    #[must_use]
    pub fn new(description: impl Into<Arc<str>>) -> Self {
        Self {
            id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed),
            description: description.into(),
        }
    }

    /// The description given at creation.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl std::hash::Hash for Symbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description)
    }
}

/// The discriminant of an action.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ActionType {
    /// A string action type such as `"todos/added"`
    Named(Arc<str>),
    /// A unique symbol action type
    Symbol(Symbol),
}

impl ActionType {
    /// The string name, if this is a named type.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            Self::Symbol(_) => None,
        }
    }

    /// Whether this type belongs to the reserved namespace.
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        self.as_str()
            .is_some_and(|name| name.starts_with(crate::reserved::NAMESPACE))
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Symbol(symbol) => write!(f, "Symbol({})", symbol.description),
        }
    }
}

impl From<&str> for ActionType {
    fn from(name: &str) -> Self {
        Self::Named(Arc::from(name))
    }
}

impl From<String> for ActionType {
    fn from(name: String) -> Self {
        Self::Named(Arc::from(name))
    }
}

impl From<Symbol> for ActionType {
    fn from(symbol: Symbol) -> Self {
        Self::Symbol(symbol)
    }
}

impl From<&Symbol> for ActionType {
    fn from(symbol: &Symbol) -> Self {
        Self::Symbol(symbol.clone())
    }
}

#[derive(Clone)]
struct Payload {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

/// An immutable action record.
///
/// # Example
///
/// ```
/// use reflow_core::Action;
///
/// let action = Action::new("todos/added").with_payload("write docs".to_string());
/// assert!(action.is("todos/added"));
/// assert_eq!(action.payload::<String>().map(String::as_str), Some("write docs"));
/// ```
#[derive(Clone)]
pub struct Action {
    action_type: ActionType,
    payload: Option<Payload>,
}

impl Action {
    /// Create an action without payload.
    #[must_use]
    pub fn new(action_type: impl Into<ActionType>) -> Self {
        Self {
            action_type: action_type.into(),
            payload: None,
        }
    }

    /// Attach a payload, replacing any previous one.
    #[must_use]
    pub fn with_payload<T: Any + Send + Sync>(mut self, payload: T) -> Self {
        self.payload = Some(Payload {
            value: Arc::new(payload),
            type_name: type_name::<T>(),
        });
        self
    }

    /// The action type.
    #[must_use]
    pub const fn action_type(&self) -> &ActionType {
        &self.action_type
    }

    /// The action type name, `None` for symbol types.
    #[must_use]
    pub fn type_name(&self) -> Option<&str> {
        self.action_type.as_str()
    }

    /// Whether this action has the given named type.
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.type_name() == Some(name)
    }

    /// Whether this action has exactly the given type.
    #[must_use]
    pub fn matches(&self, action_type: &ActionType) -> bool {
        &self.action_type == action_type
    }

    /// Borrow the payload as `T`.
    #[must_use]
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload
            .as_ref()
            .and_then(|payload| payload.value.as_ref().downcast_ref::<T>())
    }

    /// Whether a payload is attached.
    #[must_use]
    pub const fn has_payload(&self) -> bool {
        self.payload.is_some()
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Action");
        out.field("type", &format_args!("{}", self.action_type));
        if let Some(payload) = &self.payload {
            out.field("payload", &format_args!("<{}>", payload.type_name));
        }
        out.finish()
    }
}
