//! Reserved action types
//!
//! Every type under [`NAMESPACE`] is private to the library. Reducers must
//! never branch on them: they should treat them like any unknown action and
//! return their current (or initial) state. [`combine_reducers`] probes
//! each reducer with a random type from this namespace and rejects reducers
//! that only cope with [`INIT`].
//!
//! [`combine_reducers`]: crate::composition::combine_reducers

use crate::action::Action;
use rand::Rng;
use rand::distributions::Alphanumeric;

/// Prefix shared by all reserved action types.
pub const NAMESPACE: &str = "@@reflow/";

/// Dispatched by the store on creation and on reducer replacement.
pub const INIT: &str = "@@reflow/INIT";

/// Prefix of the random action types used to probe reducers.
pub const PROBE_UNKNOWN_ACTION: &str = "@@reflow/PROBE_UNKNOWN_ACTION_";

/// The INIT action.
#[must_use]
pub fn init_action() -> Action {
    Action::new(INIT)
}

/// A fresh probe action with a random suffix, e.g.
/// `@@reflow/PROBE_UNKNOWN_ACTION_k.3.z.q.0.p.a`.
#[must_use]
pub fn probe_action() -> Action {
    let suffix: Vec<String> = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(|c| char::from(c).to_ascii_lowercase().to_string())
        .collect();
    Action::new(format!("{PROBE_UNKNOWN_ACTION}{}", suffix.join(".")))
}

/// Whether the action is the reserved INIT action.
#[must_use]
pub fn is_init(action: &Action) -> bool {
    action.is(INIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_types_are_reserved_and_random() {
        let a = probe_action();
        let b = probe_action();
        assert!(a.action_type().is_reserved());
        assert!(a.type_name().is_some_and(|t| t.starts_with(PROBE_UNKNOWN_ACTION)));
        assert_ne!(a.type_name(), b.type_name());
    }

    #[test]
    fn init_is_reserved() {
        assert!(is_init(&init_action()));
        assert!(init_action().action_type().is_reserved());
    }
}
