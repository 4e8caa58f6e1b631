//! Capture of `tracing` events
//!
//! Shape warnings and dev-check messages are emitted through `tracing`.
//! Tests install a capturing subscriber for the current thread and assert
//! on the collected messages.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Registry;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// One captured event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Event level
    pub level: Level,
    /// Event target (module path unless overridden)
    pub target: String,
    /// The formatted message
    pub message: String,
}

/// A shared buffer of captured events.
///
/// # Example
///
/// ```
/// use reflow_testing::Diagnostics;
///
/// let (diagnostics, _guard) = Diagnostics::install();
/// tracing::warn!("Unexpected key \"bar\"");
/// assert!(diagnostics.has_warning("Unexpected key"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    events: Arc<Mutex<Vec<Diagnostic>>>,
}

impl Diagnostics {
    /// Capture every event emitted on the current thread until the guard
    /// is dropped.
    ///
    /// With a current-thread Tokio runtime this includes spawned tasks.
    #[must_use]
    pub fn install() -> (Self, DefaultGuard) {
        let diagnostics = Self::default();
        let subscriber = Registry::default().with(CaptureLayer {
            events: Arc::clone(&diagnostics.events),
        });
        let guard = tracing::subscriber::set_default(subscriber);
        (diagnostics, guard)
    }

    /// Every captured event.
    #[must_use]
    pub fn all(&self) -> Vec<Diagnostic> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Messages captured at `level`.
    #[must_use]
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.all()
            .into_iter()
            .filter(|event| event.level == level)
            .map(|event| event.message)
            .collect()
    }

    /// Warning messages.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.messages(Level::WARN)
    }

    /// Error messages.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.messages(Level::ERROR)
    }

    /// Whether a warning containing `needle` was captured.
    #[must_use]
    pub fn has_warning(&self, needle: &str) -> bool {
        self.warnings().iter().any(|message| message.contains(needle))
    }

    /// Drop everything captured so far.
    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Run `f` with a capturing subscriber and return its result with the
/// captured events.
pub fn capture_diagnostics<R>(f: impl FnOnce() -> R) -> (R, Vec<Diagnostic>) {
    let (diagnostics, guard) = Diagnostics::install();
    let result = f();
    drop(guard);
    (result, diagnostics.all())
}

struct CaptureLayer {
    events: Arc<Mutex<Vec<Diagnostic>>>,
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let metadata = event.metadata();
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Diagnostic {
                level: *metadata.level(),
                target: metadata.target().to_string(),
                message: visitor.message,
            });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}
