//! Refetch on focus and reconnect

use super::HandlerContext;
use crate::signals::EnvironmentSignal;
use crate::state::{QueryStatus, SubscriptionOptions};
use reflow_core::Action;
use std::collections::BTreeMap;

pub(crate) struct WindowEvents;

impl WindowEvents {
    pub(crate) fn handle(&self, action: &Action, cx: &mut HandlerContext<'_>) {
        let Some(signal) = EnvironmentSignal::from_action(action) else {
            return;
        };
        let Some(slice) = cx.after() else {
            return;
        };
        let (enabled, per_subscriber) = match signal {
            EnvironmentSignal::Focus => (slice.config.refetch_on_focus, on_focus as Flag),
            EnvironmentSignal::Online => (slice.config.refetch_on_reconnect, on_reconnect as Flag),
            EnvironmentSignal::FocusLost | EnvironmentSignal::Offline => return,
        };

        for (key, subscribers) in cx.live.snapshot() {
            let Some(entry) = slice.query(&key) else {
                continue;
            };
            if !wants_refetch(&subscribers, enabled, per_subscriber) {
                continue;
            }
            if subscribers.is_empty() {
                tracing::debug!(api = cx.shared.path(), key = %key, "Dropping unsubscribed entry on {signal:?}");
                let removal = cx.shared.actions.query_removed(key);
                cx.dispatch(removal);
            } else if entry.status != QueryStatus::Uninitialized {
                cx.refetch(key);
            }
        }
    }
}

type Flag = fn(&SubscriptionOptions) -> Option<bool>;

const fn on_focus(options: &SubscriptionOptions) -> Option<bool> {
    options.refetch_on_focus
}

const fn on_reconnect(options: &SubscriptionOptions) -> Option<bool> {
    options.refetch_on_reconnect
}

/// An explicit `true` from any subscriber wins. Otherwise the api-wide
/// flag applies, unless some subscriber opted out.
fn wants_refetch<K>(
    subscribers: &BTreeMap<K, SubscriptionOptions>,
    enabled: bool,
    per_subscriber: Flag,
) -> bool {
    let mut any_opt_out = false;
    for options in subscribers.values() {
        match per_subscriber(options) {
            Some(true) => return true,
            Some(false) => any_opt_out = true,
            None => {},
        }
    }
    enabled && !any_opt_out
}
