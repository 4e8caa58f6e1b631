//! Error types for the query layer

use crate::state::QueryCacheKey;
use reflow_runtime::StoreError;
use serde_json::Value;
use thiserror::Error;

/// Errors returned by [`QueryApi`](crate::QueryApi) operations.
#[derive(Error, Debug)]
pub enum QueryError {
    /// No endpoint with this name was defined
    #[error("Unknown endpoint \"{0}\"")]
    UnknownEndpoint(String),

    /// No cache entry exists for this key
    #[error("No cache entry for \"{0}\"")]
    UnknownCacheKey(QueryCacheKey),

    /// The api reducer is not mounted at its reducer path
    #[error(
        "No api state found at \"{0}\". Did you forget to add the api reducer to the store?"
    )]
    SliceNotMounted(String),

    /// Query arguments could not be converted to JSON
    #[error("Query arguments could not be serialized: {0}")]
    Args(#[from] serde_json::Error),

    /// The configuration could not be parsed
    #[error("Invalid api configuration: {0}")]
    Config(String),

    /// A dispatch failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors surfaced to lifecycle hooks.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LifecycleError {
    /// The cache entry was removed before any data arrived
    #[error("Promise never resolved before cache_entry_removed.")]
    CacheEntryRemoved,

    /// The fetch settled with an error
    #[error("Query failed: {0}")]
    QueryFailed(Value),

    /// The fetch was dropped (api state reset) before it settled
    #[error("Query was abandoned before it settled")]
    QueryAbandoned,
}
