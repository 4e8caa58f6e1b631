//! Endpoint hooks, development checks and file configuration.

#![allow(clippy::unwrap_used)]

mod common;

use common::{Harness, echoed, settle};
use reflow_query::{
    ApiConfig, EndpointDefinition, KeepAlive, LifecycleError, QueryApi, SubscriptionOptions, Tag,
};
use reflow_testing::{Diagnostics, MockQuery};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Log = Arc<Mutex<Vec<String>>>;

fn tracked_entry(log: &Log, source: &MockQuery) -> EndpointDefinition {
    let source = source.clone();
    let log = Arc::clone(log);
    EndpointDefinition::query("getFeed", move |args| source.call(args)).on_cache_entry_added(
        move |_args: Value, lifecycle| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push("added".to_string());
                let data = lifecycle.cache_data_loaded().await?;
                log.lock().unwrap().push(format!("loaded {data}"));
                lifecycle.update_cached_data(|data| data["seen"] = json!(true))?;
                lifecycle.cache_entry_removed().await;
                log.lock().unwrap().push("removed".to_string());
                anyhow::Ok(())
            }
        },
    )
}

#[tokio::test(start_paused = true)]
async fn cache_entry_hook_runs_once_per_entry() {
    let log = Log::default();
    let feed = MockQuery::new();
    let h = Harness::with_endpoint(
        ApiConfig::default().with_keep_unused_data_for(KeepAlive::For(Duration::from_secs(1))),
        tracked_entry(&log, &feed),
    );
    let store = h.store_api();

    let sub = h
        .api
        .initiate(&store, "getFeed", json!(null), SubscriptionOptions::default())
        .unwrap();
    settle().await;
    sub.refetch().unwrap();
    settle().await;

    assert_eq!(
        *log.lock().unwrap(),
        vec!["added".to_string(), format!("loaded {}", echoed(json!(null), 1))]
    );
    assert_eq!(feed.calls(), 2);

    sub.unsubscribe().unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(log.lock().unwrap().last().unwrap(), "removed");
}

#[tokio::test(start_paused = true)]
async fn cache_entry_hook_can_rewrite_data() {
    let log = Log::default();
    let feed = MockQuery::new();
    let h = Harness::with_endpoint(ApiConfig::default(), tracked_entry(&log, &feed));

    let _sub = h
        .api
        .initiate(&h.store_api(), "getFeed", json!(null), SubscriptionOptions::default())
        .unwrap();
    settle().await;

    assert_eq!(
        h.entry("getFeed", json!(null)).unwrap().data,
        Some(json!({ "args": null, "call": 1, "seen": true }))
    );
}

#[tokio::test(start_paused = true)]
async fn removal_before_data_ends_the_wait_with_an_error() {
    let outcome = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&outcome);
    let slow = MockQuery::new().with_delay(Duration::from_secs(10));
    let source = slow.clone();
    let h = Harness::with_endpoint(
        ApiConfig::default().with_keep_unused_data_for(KeepAlive::For(Duration::from_secs(1))),
        EndpointDefinition::query("getFeed", move |args| source.call(args)).on_cache_entry_added(
            move |_args: Value, lifecycle| {
                let seen = Arc::clone(&seen);
                async move {
                    let loaded = lifecycle.cache_data_loaded().await;
                    *seen.lock().unwrap() = Some(loaded);
                    Ok(())
                }
            },
        ),
    );

    let sub = h
        .api
        .initiate(&h.store_api(), "getFeed", json!(null), SubscriptionOptions::default())
        .unwrap();
    sub.unsubscribe().unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(
        *outcome.lock().unwrap(),
        Some(Err(LifecycleError::CacheEntryRemoved))
    );
}

fn tracked_fetches(outcomes: &Arc<Mutex<Vec<Result<Value, LifecycleError>>>>, source: &MockQuery) -> EndpointDefinition {
    let source = source.clone();
    let outcomes = Arc::clone(outcomes);
    EndpointDefinition::query("getFeed", move |args| source.call(args)).on_query_started(
        move |_args: Value, lifecycle| {
            let outcomes = Arc::clone(&outcomes);
            async move {
                let outcome = lifecycle.query_fulfilled().await;
                outcomes.lock().unwrap().push(outcome);
                Ok(())
            }
        },
    )
}

#[tokio::test(start_paused = true)]
async fn query_started_hook_sees_every_fetch() {
    let outcomes = Arc::default();
    let feed = MockQuery::new();
    feed.respond_err(json!("boom")).respond_ok(json!("fresh"));
    let h = Harness::with_endpoint(ApiConfig::default(), tracked_fetches(&outcomes, &feed));

    let sub = h
        .api
        .initiate(&h.store_api(), "getFeed", json!(null), SubscriptionOptions::default())
        .unwrap();
    settle().await;
    sub.refetch().unwrap();
    settle().await;

    assert_eq!(
        *outcomes.lock().unwrap(),
        vec![
            Err(LifecycleError::QueryFailed(json!("boom"))),
            Ok(json!("fresh")),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn reset_abandons_fetches_in_flight() {
    let outcomes = Arc::default();
    let slow = MockQuery::new().with_delay(Duration::from_secs(5));
    let h = Harness::with_endpoint(ApiConfig::default(), tracked_fetches(&outcomes, &slow));
    let store = h.store_api();

    let _sub = h
        .api
        .initiate(&store, "getFeed", json!(null), SubscriptionOptions::default())
        .unwrap();
    settle().await;
    h.api.reset_api_state(&store).unwrap();
    settle().await;

    assert_eq!(
        *outcomes.lock().unwrap(),
        vec![Err(LifecycleError::QueryAbandoned)]
    );

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(h.entry("getFeed", json!(null)).is_none());
}

#[tokio::test(start_paused = true)]
async fn undeclared_tag_types_are_reported() {
    let (diagnostics, _guard) = Diagnostics::install();
    let comments = MockQuery::new();
    let h = Harness::with_endpoint(
        ApiConfig::default().with_tag_types(["Post"]),
        EndpointDefinition::query("getComments", move |args| comments.call(args))
            .provides(vec![Tag::new("Comment")]),
    );
    let store = h.store_api();

    let _posts = h
        .api
        .initiate(&store, "getPosts", json!(null), SubscriptionOptions::default())
        .unwrap();
    settle().await;
    assert!(diagnostics.warnings().is_empty());

    let _comments = h
        .api
        .initiate(&store, "getComments", json!(null), SubscriptionOptions::default())
        .unwrap();
    settle().await;

    assert!(diagnostics.has_warning("Tag type \"Comment\" is not declared"));
}

#[test]
fn two_apis_on_one_path_are_reported() {
    let (diagnostics, _guard) = Diagnostics::install();
    let mounted = QueryApi::builder(ApiConfig::default()).build();
    let other = QueryApi::builder(ApiConfig::default()).build();

    let store = reflow_runtime::create_store_with_enhancer(
        reflow_core::combine_reducers(reflow_core::ReducerTree::new().leaf("api", mounted.reducer())),
        None,
        reflow_runtime::ApplyMiddleware::new().with(other.middleware()),
    )
    .unwrap();
    store.dispatch(reflow_core::Action::new("noop")).unwrap();

    assert_eq!(
        mounted.api_state(&store.get_state()).unwrap().config.middleware_registered,
        reflow_query::MiddlewareRegistration::Conflict
    );
    assert!(diagnostics.has_warning("There is a mismatch between slice and middleware"));
    assert!(diagnostics.has_warning("You can only have one api per reducer path"));
}

#[tokio::test(start_paused = true)]
async fn configuration_can_come_from_toml() {
    let config = ApiConfig::from_toml_str(
        r#"
            reducer_path = "content"
            keep_unused_data_for = 5
            tag_types = ["Post"]
        "#,
    )
    .unwrap();
    let h = Harness::new(config);
    let store = h.store_api();

    let sub = h
        .api
        .initiate(&store, "getPost", json!(1), SubscriptionOptions::default())
        .unwrap();
    settle().await;
    assert!(h.state().get("content").is_some());

    sub.unsubscribe().unwrap();
    tokio::time::sleep(Duration::from_secs(6)).await;

    assert!(h.entry("getPost", json!(1)).is_none());
    assert_eq!(h.recorder.count("content/queries/removed"), 1);
}
