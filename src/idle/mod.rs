//! Activity state tracking with a restartable inactivity deadline.

mod machine;

use serde::{Deserialize, Serialize};

pub use machine::{ActivityStateMachine, DeadlineMarker, TransitionSink};

/// User activity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityState {
    /// Activity was observed within the inactivity delay.
    Active,
    /// The inactivity delay elapsed with no activity.
    Inactive,
}

impl ActivityState {
    pub fn is_active(self) -> bool {
        matches!(self, ActivityState::Active)
    }
}

impl From<bool> for ActivityState {
    fn from(active: bool) -> Self {
        if active {
            ActivityState::Active
        } else {
            ActivityState::Inactive
        }
    }
}
