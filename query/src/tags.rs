//! Cache tags and the provided-tag registry
//!
//! Endpoints attach tags to their results. Invalidating a tag marks every
//! entry that provided it as stale. A tag without an id matches every id
//! of its type.

use crate::state::QueryCacheKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A cache tag: a type plus an optional id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag {
    /// Tag type, e.g. `"Post"`
    pub tag_type: String,
    /// Optional id within the type
    pub id: Option<String>,
}

impl Tag {
    /// A tag covering the whole type.
    #[must_use]
    pub fn new(tag_type: impl Into<String>) -> Self {
        Self {
            tag_type: tag_type.into(),
            id: None,
        }
    }

    /// A tag for one id of a type.
    #[must_use]
    pub fn with_id(tag_type: impl Into<String>, id: impl fmt::Display) -> Self {
        Self {
            tag_type: tag_type.into(),
            id: Some(id.to_string()),
        }
    }
}

impl From<&str> for Tag {
    fn from(tag_type: &str) -> Self {
        Self::new(tag_type)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}:{id}", self.tag_type),
            None => f.write_str(&self.tag_type),
        }
    }
}

/// Tag type, then tag id (`None` for id-less tags), then the cache keys
/// that provided it.
pub type ProvidedTags = BTreeMap<String, BTreeMap<Option<String>, BTreeSet<QueryCacheKey>>>;

/// Cache keys affected by invalidating `tags`.
///
/// ```
/// use reflow_query::{QueryCacheKey, Tag, tags};
/// use serde_json::json;
/// use std::collections::BTreeSet;
///
/// let list = QueryCacheKey::new("getPosts", &json!(null));
/// let one = QueryCacheKey::new("getPost", &json!(1));
/// let mut provided = Default::default();
/// tags::register(&mut provided, &list, &[Tag::new("Post")]);
/// tags::register(&mut provided, &one, &[Tag::with_id("Post", 1)]);
///
/// assert_eq!(tags::select_invalidated_by(&provided, &[Tag::new("Post")]).len(), 2);
/// assert_eq!(
///     tags::select_invalidated_by(&provided, &[Tag::with_id("Post", 1)]),
///     BTreeSet::from([one])
/// );
/// ```
#[must_use]
pub fn select_invalidated_by(provided: &ProvidedTags, tags: &[Tag]) -> BTreeSet<QueryCacheKey> {
    let mut keys = BTreeSet::new();
    for tag in tags {
        let Some(by_id) = provided.get(&tag.tag_type) else {
            continue;
        };
        match &tag.id {
            Some(_) => {
                if let Some(found) = by_id.get(&tag.id) {
                    keys.extend(found.iter().cloned());
                }
            },
            None => keys.extend(by_id.values().flatten().cloned()),
        }
    }
    keys
}

/// Record `tags` as provided by `key`, replacing whatever it provided
/// before.
pub fn register(provided: &mut ProvidedTags, key: &QueryCacheKey, tags: &[Tag]) {
    unregister(provided, key);
    for tag in tags {
        provided
            .entry(tag.tag_type.clone())
            .or_default()
            .entry(tag.id.clone())
            .or_default()
            .insert(key.clone());
    }
}

/// Forget every tag provided by `key`.
pub fn unregister(provided: &mut ProvidedTags, key: &QueryCacheKey) {
    for by_id in provided.values_mut() {
        for keys in by_id.values_mut() {
            keys.remove(key);
        }
        by_id.retain(|_, keys| !keys.is_empty());
    }
    provided.retain(|_, by_id| !by_id.is_empty());
}
