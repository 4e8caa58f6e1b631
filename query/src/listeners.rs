//! Environment listener wiring

use crate::signals::EnvironmentSignal;
use reflow_runtime::{StoreApi, TaskHandle};
use tokio::sync::mpsc;

/// Forward environment signals to the store until the sender side closes.
///
/// Hosts translate their own focus and connectivity events into
/// [`EnvironmentSignal`]s and push them into the channel. Returns `None`
/// outside a Tokio runtime.
///
/// ```
/// use reflow_query::{EnvironmentSignal, setup_listeners};
/// # use reflow_core::{ReducerTree, combine_reducers};
/// # use reflow_query::{ApiConfig, QueryApi};
/// # use reflow_runtime::create_store;
/// # tokio_test::block_on(async {
/// # let api = QueryApi::builder(ApiConfig::default()).build();
/// # let store = create_store(combine_reducers(ReducerTree::new().leaf("api", api.reducer())), None).unwrap();
/// let (signals, receiver) = tokio::sync::mpsc::channel(8);
/// let listener = setup_listeners(store.api(), receiver);
/// assert!(listener.is_some());
/// signals.send(EnvironmentSignal::Offline).await.unwrap();
/// # });
/// ```
pub fn setup_listeners(
    store: StoreApi,
    mut signals: mpsc::Receiver<EnvironmentSignal>,
) -> Option<TaskHandle> {
    reflow_runtime::spawn("environment-listener", async move {
        while let Some(signal) = signals.recv().await {
            tracing::trace!(?signal, "Environment signal");
            if let Err(error) = store.dispatch(signal.action()) {
                tracing::error!(?signal, error = %error, "Failed to dispatch environment signal");
            }
        }
    })
}
