//! Per-capability lifecycle

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Where a capability is in its run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityState {
    /// Not yet considered
    Pending,
    /// Checking required settings
    Validating,
    /// Retrieving the artifact
    Fetching,
    /// Merging contributions into the store
    Merging,
    /// Contributed (or skipped as already contributed)
    Done,
    /// Aborted the run
    Failed,
    /// Turned off by the operator
    Disabled,
}

impl CapabilityState {
    /// Whether no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        allowed_transitions(self).is_empty()
    }
}

impl Display for CapabilityState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Validating => "validating",
            Self::Fetching => "fetching",
            Self::Merging => "merging",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Disabled => "disabled",
        })
    }
}

/// Rejected state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal state transition {from} -> {to}")]
pub struct IllegalTransition {
    /// Current state
    pub from: CapabilityState,
    /// Requested state
    pub to: CapabilityState,
}

/// Validate a state transition
///
/// # Errors
/// Returns [`IllegalTransition`] if `to` is not reachable from `from`
pub fn validate_transition(
    from: CapabilityState,
    to: CapabilityState,
) -> Result<(), IllegalTransition> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(IllegalTransition { from, to })
    }
}

/// States reachable in one step from `from`
#[must_use]
pub fn allowed_transitions(from: CapabilityState) -> Vec<CapabilityState> {
    use CapabilityState::*;
    match from {
        // Done directly: already contributed on an earlier run
        Pending => vec![Validating, Disabled, Done],
        Validating => vec![Fetching, Failed],
        Fetching => vec![Merging, Failed],
        Merging => vec![Done, Failed],
        Done | Failed | Disabled => vec![],
    }
}
