//! Shape diagnostics for combined reducers
//!
//! These checks never fail a dispatch. They produce human readable
//! messages that the combined reducer emits as warnings.

use crate::action::Action;
use crate::reserved;
use crate::state::State;

fn quoted_list<'a>(keys: impl IntoIterator<Item = &'a str>) -> String {
    keys.into_iter().collect::<Vec<_>>().join("\", \"")
}

/// Describe how `input` deviates from the shape expected by `reducer_keys`.
///
/// Returns `None` when the input is acceptable. Missing keys are never
/// reported: reducers fill them with their defaults.
#[must_use]
pub fn unexpected_state_shape_message(
    input: &State,
    reducer_keys: &[&str],
    action: &Action,
) -> Option<String> {
    let argument_name = if reserved::is_init(action) {
        "preloaded state passed to create_store"
    } else {
        "previous state received by the reducer"
    };

    if reducer_keys.is_empty() {
        return Some(
            "Store does not have a valid reducer. Make sure the tree passed \
             to combine_reducers contains at least one reducer."
                .to_string(),
        );
    }

    let Some(map) = input.as_tree() else {
        return Some(format!(
            "The {argument_name} has unexpected type of \"{}\". \
             Expected argument to be a tree with the following keys: \"{}\"",
            input.type_name(),
            quoted_list(reducer_keys.iter().copied())
        ));
    };

    let unexpected: Vec<&str> = map
        .keys()
        .map(String::as_str)
        .filter(|key| !reducer_keys.contains(key))
        .collect();
    if unexpected.is_empty() {
        return None;
    }

    Some(format!(
        "Unexpected {} \"{}\" found in {argument_name}. \
         Expected to find one of the known reducer keys instead: \"{}\". \
         Unexpected keys will be ignored.",
        if unexpected.len() > 1 { "keys" } else { "key" },
        quoted_list(unexpected),
        quoted_list(reducer_keys.iter().copied())
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn foo_state() -> State {
        State::tree([("foo", State::new(1_i64))])
    }

    #[test]
    fn matching_or_partial_state_is_accepted() {
        let action = Action::new("x");
        assert!(unexpected_state_shape_message(&foo_state(), &["foo"], &action).is_none());
        assert!(unexpected_state_shape_message(&State::empty_tree(), &["foo"], &action).is_none());
    }

    #[test]
    fn empty_reducer_set() {
        let message =
            unexpected_state_shape_message(&State::empty_tree(), &[], &Action::new("x")).unwrap();
        assert!(message.starts_with("Store does not have a valid reducer"));
    }

    #[test]
    fn unexpected_single_key_names_preloaded_state_on_init() {
        let input = State::tree([("bar", State::new(2_i64))]);
        let message =
            unexpected_state_shape_message(&input, &["foo"], &reserved::init_action()).unwrap();
        assert_eq!(
            message,
            "Unexpected key \"bar\" found in preloaded state passed to create_store. \
             Expected to find one of the known reducer keys instead: \"foo\". \
             Unexpected keys will be ignored."
        );
    }

    #[test]
    fn unexpected_keys_are_listed() {
        let input = State::tree([("bar", State::new(2_i64)), ("qux", State::new(4_i64))]);
        let message = unexpected_state_shape_message(&input, &["foo"], &Action::new("x")).unwrap();
        assert!(message.starts_with(
            "Unexpected keys \"bar\", \"qux\" found in previous state received by the reducer."
        ));
        assert!(message.contains("instead: \"foo\""));
    }

    #[test]
    fn leaf_input_reports_type_and_expected_keys() {
        let message =
            unexpected_state_shape_message(&State::new(1_i64), &["foo", "baz"], &Action::new("x"))
                .unwrap();
        assert!(message.contains("unexpected type of \"i64\""));
        assert!(message.contains("keys: \"foo\", \"baz\""));
    }
}
