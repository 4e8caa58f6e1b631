//! Api configuration
//!
//! ```
//! use reflow_query::{ApiConfig, KeepAlive};
//! use std::time::Duration;
//!
//! let config = ApiConfig::from_toml_str(r#"
//!     reducer_path = "postsApi"
//!     keep_unused_data_for = 30
//!     refetch_on_focus = true
//!     tag_types = ["Post", "User"]
//! "#).unwrap();
//!
//! assert_eq!(config.reducer_path, "postsApi");
//! assert_eq!(config.keep_unused_data_for, KeepAlive::For(Duration::from_secs(30)));
//! assert!(config.refetch_on_focus);
//! assert!(!config.refetch_on_reconnect);
//! ```

use crate::error::QueryError;
use serde::Deserialize;
use std::time::Duration;

/// Default number of seconds unused cache data is kept.
pub const DEFAULT_KEEP_UNUSED_DATA_FOR_SECS: u64 = 60;

/// How long a cache entry without subscribers is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawKeepAlive")]
pub enum KeepAlive {
    /// Evict after this duration
    For(Duration),
    /// Never evict
    Forever,
}

impl Default for KeepAlive {
    fn default() -> Self {
        Self::For(Duration::from_secs(DEFAULT_KEEP_UNUSED_DATA_FOR_SECS))
    }
}

/// `keep_unused_data_for = 30` or `keep_unused_data_for = "forever"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawKeepAlive {
    Seconds(f64),
    Word(String),
}

impl TryFrom<RawKeepAlive> for KeepAlive {
    type Error = String;

    fn try_from(raw: RawKeepAlive) -> Result<Self, Self::Error> {
        match raw {
            RawKeepAlive::Seconds(secs) => Duration::try_from_secs_f64(secs)
                .map(Self::For)
                .map_err(|e| format!("invalid keep_unused_data_for {secs}: {e}")),
            RawKeepAlive::Word(word) if word.eq_ignore_ascii_case("forever") => Ok(Self::Forever),
            RawKeepAlive::Word(word) => Err(format!(
                "invalid keep_unused_data_for \"{word}\", expected seconds or \"forever\""
            )),
        }
    }
}

/// Configuration shared by every endpoint of an api.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// Key of the api slice in the root state
    pub reducer_path: String,
    /// Keep-alive for entries without subscribers
    pub keep_unused_data_for: KeepAlive,
    /// Refetch subscribed queries when the application regains focus
    pub refetch_on_focus: bool,
    /// Refetch subscribed queries when the network comes back
    pub refetch_on_reconnect: bool,
    /// Declared tag types
    pub tag_types: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            reducer_path: "api".to_string(),
            keep_unused_data_for: KeepAlive::default(),
            refetch_on_focus: false,
            refetch_on_reconnect: false,
            tag_types: Vec::new(),
        }
    }
}

impl ApiConfig {
    /// Parse a TOML document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Config`] for malformed documents or unknown
    /// fields.
    pub fn from_toml_str(source: &str) -> Result<Self, QueryError> {
        toml::from_str(source).map_err(|e| QueryError::Config(e.to_string()))
    }

    /// Set the reducer path.
    #[must_use]
    pub fn with_reducer_path(mut self, path: impl Into<String>) -> Self {
        self.reducer_path = path.into();
        self
    }

    /// Set the keep-alive for unused entries.
    #[must_use]
    pub const fn with_keep_unused_data_for(mut self, keep_alive: KeepAlive) -> Self {
        self.keep_unused_data_for = keep_alive;
        self
    }

    /// Enable or disable refetching on focus.
    #[must_use]
    pub const fn with_refetch_on_focus(mut self, enabled: bool) -> Self {
        self.refetch_on_focus = enabled;
        self
    }

    /// Enable or disable refetching on reconnect.
    #[must_use]
    pub const fn with_refetch_on_reconnect(mut self, enabled: bool) -> Self {
        self.refetch_on_reconnect = enabled;
        self
    }

    /// Declare the tag types used by endpoints.
    #[must_use]
    pub fn with_tag_types<I, S>(mut self, tag_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tag_types = tag_types.into_iter().map(Into::into).collect();
        self
    }
}
