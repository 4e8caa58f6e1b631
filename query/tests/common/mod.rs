//! Shared store wiring for the query integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use reflow_core::{ReducerTree, State, combine_reducers};
use reflow_query::{
    ApiConfig, ApiState, EndpointDefinition, QueryApi, QueryCacheEntry, QueryCacheKey, Tag,
};
use reflow_runtime::{ApplyMiddleware, Store, StoreApi, create_store_with_enhancer};
use reflow_testing::{ActionRecorder, MockQuery};
use serde_json::{Value, json};
use std::time::Duration;

pub struct Harness {
    pub api: QueryApi,
    pub store: Store,
    pub recorder: ActionRecorder,
    pub posts: MockQuery,
    pub post: MockQuery,
}

/// `getPosts` provides the `Post` list tag, `getPost(id)` provides `Post:id`.
pub fn endpoints(posts: &MockQuery, post: &MockQuery) -> Vec<EndpointDefinition> {
    let posts = posts.clone();
    let post = post.clone();
    vec![
        EndpointDefinition::query("getPosts", move |args| posts.call(args))
            .provides(vec![Tag::new("Post")]),
        EndpointDefinition::query("getPost", move |args| post.call(args))
            .provides_tags(|_, args| vec![Tag::with_id("Post", args)]),
    ]
}

impl Harness {
    pub fn new(config: ApiConfig) -> Self {
        Self::with_post(config, MockQuery::new())
    }

    pub fn with_post(config: ApiConfig, post: MockQuery) -> Self {
        let posts = MockQuery::new();
        let builder = endpoints(&posts, &post)
            .into_iter()
            .fold(QueryApi::builder(config), |builder, endpoint| builder.endpoint(endpoint));
        Self::from_api(builder.build(), posts, post)
    }

    /// The standard endpoints plus `extra`.
    pub fn with_endpoint(config: ApiConfig, extra: EndpointDefinition) -> Self {
        let posts = MockQuery::new();
        let post = MockQuery::new();
        let builder = endpoints(&posts, &post)
            .into_iter()
            .chain([extra])
            .fold(QueryApi::builder(config), |builder, endpoint| builder.endpoint(endpoint));
        Self::from_api(builder.build(), posts, post)
    }

    pub fn from_api(api: QueryApi, posts: MockQuery, post: MockQuery) -> Self {
        let recorder = ActionRecorder::new();
        let store = create_store_with_enhancer(
            combine_reducers(ReducerTree::new().leaf(api.reducer_path(), api.reducer())),
            None,
            ApplyMiddleware::new()
                .with(recorder.clone())
                .with(api.middleware()),
        )
        .unwrap();
        Self {
            api,
            store,
            recorder,
            posts,
            post,
        }
    }

    pub fn store_api(&self) -> StoreApi {
        self.store.api()
    }

    pub fn state(&self) -> State {
        self.store.get_state()
    }

    pub fn slice(&self) -> ApiState {
        self.api.api_state(&self.state()).unwrap().clone()
    }

    pub fn key(&self, endpoint: &str, args: Value) -> QueryCacheKey {
        self.api.cache_key(endpoint, &args)
    }

    pub fn entry(&self, endpoint: &str, args: Value) -> Option<QueryCacheEntry> {
        self.api.select(&self.state(), endpoint, &args)
    }

    /// The full action type for this api.
    pub fn action_type(&self, suffix: &str) -> String {
        format!("{}/{suffix}", self.api.reducer_path())
    }
}

/// Let spawned fetches, flushes and hooks run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub fn echoed(args: Value, call: usize) -> Value {
    json!({ "args": args, "call": call })
}
