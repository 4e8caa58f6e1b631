//! Environment signals
//!
//! Focus and connectivity changes are global actions, shared by every api
//! mounted in the store. [`setup_listeners`](crate::setup_listeners) turns
//! a channel of [`EnvironmentSignal`]s into these actions.

use reflow_core::Action;

/// The application regained focus.
pub const FOCUSED: &str = "reflow-query/focused";
/// The application lost focus.
pub const UNFOCUSED: &str = "reflow-query/unfocused";
/// The network came back.
pub const ONLINE: &str = "reflow-query/online";
/// The network went away.
pub const OFFLINE: &str = "reflow-query/offline";

/// A change in the application's environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvironmentSignal {
    /// Focus gained
    Focus,
    /// Focus lost
    FocusLost,
    /// Network reachable
    Online,
    /// Network unreachable
    Offline,
}

impl EnvironmentSignal {
    /// The action type for this signal.
    #[must_use]
    pub const fn action_type(self) -> &'static str {
        match self {
            Self::Focus => FOCUSED,
            Self::FocusLost => UNFOCUSED,
            Self::Online => ONLINE,
            Self::Offline => OFFLINE,
        }
    }

    /// The action for this signal.
    #[must_use]
    pub fn action(self) -> Action {
        Action::new(self.action_type())
    }

    /// Decode a signal action.
    #[must_use]
    pub fn from_action(action: &Action) -> Option<Self> {
        match action.type_name()? {
            FOCUSED => Some(Self::Focus),
            UNFOCUSED => Some(Self::FocusLost),
            ONLINE => Some(Self::Online),
            OFFLINE => Some(Self::Offline),
            _ => None,
        }
    }
}
