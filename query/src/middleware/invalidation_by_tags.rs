//! Tag invalidation
//!
//! The reducer marks invalidated entries stale. This handler refetches the
//! ones that still have subscribers; the rest refetch on their next
//! subscription.

use super::{CacheHandler, HandlerContext};
use crate::actions::ApiAction;
use crate::tags::select_invalidated_by;
use reflow_runtime::metrics::QueryMetrics;

pub(crate) struct InvalidationByTags;

impl CacheHandler for InvalidationByTags {
    fn handle(&self, action: &ApiAction<'_>, cx: &mut HandlerContext<'_>) {
        let ApiAction::InvalidateTags(tags) = action else {
            return;
        };
        let (Some(before), Some(after)) = (cx.before(), cx.after()) else {
            return;
        };

        let refetch: Vec<_> = select_invalidated_by(&before.provided, tags)
            .into_iter()
            .filter(|key| {
                after
                    .query(key)
                    .is_some_and(|entry| !entry.is_fetching())
                    && cx.live.count(key) > 0
            })
            .collect();

        for key in refetch {
            tracing::debug!(api = cx.shared.path(), key = %key, "Refetching invalidated query");
            QueryMetrics::record_invalidation_refetch();
            cx.refetch(key);
        }
    }
}
