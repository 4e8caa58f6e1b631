//! `on_query_started` hooks
//!
//! One hook per fetch, resolved by request id when the fetch settles.

use super::{CacheHandler, HandlerContext};
use crate::actions::ApiAction;
use crate::lifecycle::{FetchOutcome, QueryLifecycle, run_hook};
use crate::state::RequestId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

#[derive(Default)]
pub(crate) struct QueryLifecycleHandler {
    in_flight: Mutex<HashMap<RequestId, watch::Sender<FetchOutcome>>>,
}

impl QueryLifecycleHandler {
    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, watch::Sender<FetchOutcome>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, request_id: &RequestId, outcome: Result<serde_json::Value, serde_json::Value>) {
        if let Some(sender) = self.lock().remove(request_id) {
            sender.send_replace(Some(outcome));
        }
    }
}

impl CacheHandler for QueryLifecycleHandler {
    fn handle(&self, action: &ApiAction<'_>, cx: &mut HandlerContext<'_>) {
        match action {
            ApiAction::Pending(pending) => {
                let Some(hook) = cx
                    .shared
                    .endpoints
                    .get(&pending.arg.endpoint_name)
                    .and_then(|endpoint| endpoint.query_started_hook())
                else {
                    return;
                };
                let (sender, receiver) = watch::channel(None);
                self.lock().insert(pending.request_id.clone(), sender);
                let lifecycle = QueryLifecycle::new(
                    cx.api.clone(),
                    Arc::clone(cx.shared),
                    pending.arg.key.clone(),
                    pending.request_id.clone(),
                    receiver,
                );
                run_hook(
                    "on-query-started",
                    pending.arg.endpoint_name.clone(),
                    hook(pending.arg.original_args.clone(), lifecycle),
                );
            },
            ApiAction::Fulfilled(fulfilled) => {
                self.settle(&fulfilled.request_id, Ok(fulfilled.data.clone()));
            },
            ApiAction::Rejected(rejected) => {
                self.settle(&rejected.request_id, Err(rejected.error.clone()));
            },
            // Dropping the senders tells waiting hooks the fetch was abandoned.
            ApiAction::ResetApiState => self.lock().clear(),
            _ => {},
        }
    }
}
