//! Store behavior: dispatch, listeners, initialization and reducer guards.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use reflow_core::{
    Action, ReducerError, ReducerTree, State, combine_reducers, reducer_fn, reserved,
    slice_reducer,
};
use reflow_runtime::{StoreApi, StoreError, create_store};
use reflow_testing::capture_diagnostics;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

fn todos() -> impl reflow_core::Reducer {
    slice_reducer(Vec::<String>::new(), |items: &Vec<String>, action: &Action| {
        let text = action.payload::<String>().filter(|_| action.is("ADD_TODO"))?;
        let mut next = items.clone();
        next.push(text.clone());
        Some(next)
    })
}

fn add_todo(text: &str) -> Action {
    Action::new("ADD_TODO").with_payload(text.to_string())
}

#[test]
fn counter_store_end_to_end() {
    let reducer = combine_reducers(ReducerTree::new().leaf(
        "counter",
        slice_reducer(0_i64, |n: &i64, a: &Action| a.is("INC").then(|| n + 1)),
    ));
    let store = create_store(reducer, Some(State::tree([("counter", State::new(0_i64))]))).unwrap();

    let result = store.dispatch(Action::new("INC")).unwrap();
    assert!(result.unwrap().is("INC"));
    assert_eq!(
        store.get_state(),
        State::tree([("counter", State::new(1_i64))])
    );
}

#[test]
fn get_state_returns_the_same_reference_between_dispatches() {
    let store = create_store(todos(), None).unwrap();
    let a = store.get_state();
    let b = store.get_state();
    assert!(State::ptr_eq(&a, &b));

    store.dispatch(Action::new("unknown")).unwrap();
    assert!(State::ptr_eq(&a, &store.get_state()));

    store.dispatch(add_todo("Hello")).unwrap();
    assert!(!State::ptr_eq(&a, &store.get_state()));
}

#[test]
fn listeners_fire_in_subscription_order() {
    let store = create_store(todos(), None).unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));
    for name in ["a", "b", "c"] {
        let calls = Arc::clone(&calls);
        let _ = store.subscribe(move || calls.lock().unwrap().push(name));
    }

    store.dispatch(add_todo("x")).unwrap();
    assert_eq!(*calls.lock().unwrap(), vec!["a", "b", "c"]);
}

#[test]
fn listeners_see_the_new_state() {
    let store = create_store(todos(), None).unwrap();
    let observed = Arc::new(Mutex::new(None));
    let api = store.api();
    let sink = Arc::clone(&observed);
    let _ = store.subscribe(move || *sink.lock().unwrap() = Some(api.get_state()));

    store.dispatch(add_todo("Hello")).unwrap();
    assert_eq!(
        observed.lock().unwrap().clone().unwrap(),
        State::new(vec!["Hello".to_string()])
    );
}

#[test]
fn unsubscribing_stops_notifications() {
    let store = create_store(todos(), None).unwrap();
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let handle = store.subscribe(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    store.dispatch(add_todo("a")).unwrap();
    handle.unsubscribe();
    handle.unsubscribe();
    store.dispatch(add_todo("b")).unwrap();

    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn only_the_given_listener_is_removed() {
    let store = create_store(todos(), None).unwrap();
    let a = Arc::new(AtomicUsize::new(0));
    let b = Arc::new(AtomicUsize::new(0));
    let (a2, b2) = (Arc::clone(&a), Arc::clone(&b));
    let handle_a = store.subscribe(move || {
        a2.fetch_add(1, Ordering::SeqCst);
    });
    let _handle_b = store.subscribe(move || {
        b2.fetch_add(1, Ordering::SeqCst);
    });

    handle_a.unsubscribe();
    store.dispatch(add_todo("x")).unwrap();

    assert_eq!(a.load(Ordering::SeqCst), 0);
    assert_eq!(b.load(Ordering::SeqCst), 1);
}

#[test]
fn listener_removed_during_notification_is_skipped_for_that_round() {
    let store = create_store(todos(), None).unwrap();
    let second_calls = Arc::new(AtomicUsize::new(0));
    let second_handle = Arc::new(OnceLock::new());

    let to_remove = Arc::clone(&second_handle);
    let _first = store.subscribe(move || {
        if let Some(handle) = to_remove.get() {
            reflow_runtime::Unsubscribe::unsubscribe(handle);
        }
    });
    let counter = Arc::clone(&second_calls);
    let handle = store.subscribe(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    second_handle.set(handle).unwrap();

    store.dispatch(add_todo("x")).unwrap();
    store.dispatch(add_todo("y")).unwrap();

    assert_eq!(second_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn listener_added_during_notification_fires_from_next_dispatch() {
    let store = create_store(todos(), None).unwrap();
    let late_calls = Arc::new(AtomicUsize::new(0));
    let subscribed = Arc::new(AtomicUsize::new(0));

    let inner_store = store.clone();
    let late = Arc::clone(&late_calls);
    let once = Arc::clone(&subscribed);
    let _ = store.subscribe(move || {
        if once.fetch_add(1, Ordering::SeqCst) == 0 {
            let late = Arc::clone(&late);
            let _ = inner_store.subscribe(move || {
                late.fetch_add(1, Ordering::SeqCst);
            });
        }
    });

    store.dispatch(add_todo("x")).unwrap();
    assert_eq!(late_calls.load(Ordering::SeqCst), 0);

    store.dispatch(add_todo("y")).unwrap();
    assert_eq!(late_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn listeners_may_dispatch() {
    let store = create_store(todos(), None).unwrap();
    let api = store.api();
    let _ = store.subscribe(move || {
        let state = api.get_state();
        let len = state.downcast_ref::<Vec<String>>().map_or(0, Vec::len);
        if len < 3 {
            api.dispatch(add_todo("again")).unwrap();
        }
    });

    store.dispatch(add_todo("first")).unwrap();
    let state = store.get_state();
    assert_eq!(state.downcast_ref::<Vec<String>>().unwrap().len(), 3);
}

#[test]
fn reducers_may_not_dispatch() {
    let api_slot: Arc<OnceLock<StoreApi>> = Arc::new(OnceLock::new());
    let errors = Arc::new(Mutex::new(Vec::new()));

    let slot = Arc::clone(&api_slot);
    let sink = Arc::clone(&errors);
    let reducer = reducer_fn(move |state: Option<&State>, action: &Action, _: &State| {
        if action.is("DISPATCH_IN_MIDDLE") {
            if let Some(api) = slot.get() {
                sink.lock().unwrap().push(api.dispatch(Action::new("nested")));
            }
        }
        Ok(Some(state.cloned().unwrap_or_else(|| State::new(0_i64))))
    });

    let store = create_store(reducer, None).unwrap();
    api_slot.set(store.api()).unwrap();
    store.dispatch(Action::new("DISPATCH_IN_MIDDLE")).unwrap();

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], Err(StoreError::DispatchWhileReducing)));
}

#[test]
fn replace_reducer_runs_init_and_keeps_known_slices() {
    let first = combine_reducers(ReducerTree::new().leaf("todos", todos()));
    let store = create_store(first, None).unwrap();
    store.dispatch(add_todo("kept")).unwrap();

    let seen_init = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen_init);
    let second = combine_reducers(
        ReducerTree::new().leaf("todos", todos()).leaf_fn(
            "extra",
            move |state: Option<&State>, action: &Action, _: &State| {
                if reserved::is_init(action) {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
                Ok(Some(state.cloned().unwrap_or_else(|| State::new(true))))
            },
        ),
    );
    let init_calls_during_combine = seen_init.load(Ordering::SeqCst);

    store.replace_reducer(second).unwrap();

    assert_eq!(seen_init.load(Ordering::SeqCst), init_calls_during_combine + 1);
    let state = store.get_state();
    assert_eq!(state.get("todos"), Some(&State::new(vec!["kept".to_string()])));
    assert_eq!(state.get("extra"), Some(&State::new(true)));
}

#[test]
fn sanity_errors_surface_from_create_store() {
    let reducer = combine_reducers(ReducerTree::new().leaf_fn(
        "counter",
        |state: Option<&State>, action: &Action, _: &State| {
            Ok(if reserved::is_init(action) {
                Some(State::new(0_i64))
            } else {
                state.cloned()
            })
        },
    ));

    let err = create_store(reducer, None).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Reducer(ReducerError::PrivateActionType { ref key }) if key == "counter"
    ));
}

#[test]
fn undefined_state_is_returned_from_dispatch() {
    let reducer = combine_reducers(ReducerTree::new().leaf_fn(
        "counter",
        |state: Option<&State>, action: &Action, _: &State| {
            if action.is("whatever") {
                return Ok(None);
            }
            Ok(Some(state.cloned().unwrap_or_else(|| State::new(0_i64))))
        },
    ));
    let store = create_store(reducer, None).unwrap();
    let before = store.get_state();

    let err = store.dispatch(Action::new("whatever")).unwrap_err();
    assert!(err.to_string().contains(r#"reducer "counter""#));
    assert!(State::ptr_eq(&before, &store.get_state()));
}

#[test]
fn preloaded_state_with_unknown_keys_warns_once_at_creation() {
    let reducer = combine_reducers(ReducerTree::new().leaf("todos", todos()));
    let preloaded = State::tree([
        ("todos", State::new(Vec::<String>::new())),
        ("bogus", State::new(1_i64)),
    ]);

    let (store, events) = capture_diagnostics(|| create_store(reducer, Some(preloaded)).unwrap());

    let warnings: Vec<_> = events
        .iter()
        .filter(|event| event.level == tracing::Level::WARN)
        .collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("Unexpected key \"bogus\""));
    assert!(warnings[0].message.contains("preloaded state"));
    assert_eq!(store.get_state().keys().collect::<Vec<_>>(), vec!["todos"]);
}
