use std::sync::Arc;
use tracing::trace;

use super::{GestureEvent, PanHandlers};
use crate::idle::ActivityStateMachine;

/// Reports one activity event per capture hook and never claims a gesture.
#[derive(Clone)]
pub struct ActivityObserver {
    machine: Arc<ActivityStateMachine>,
}

impl ActivityObserver {
    pub fn new(machine: Arc<ActivityStateMachine>) -> Self {
        Self { machine }
    }

    fn observe(&self, hook: &'static str, event: &GestureEvent) -> bool {
        trace!("{} at ({}, {})", hook, event.x, event.y);
        self.machine.report_activity();
        false
    }
}

impl PanHandlers for ActivityObserver {
    fn on_start_should_set_capture(&self, event: &GestureEvent) -> bool {
        self.observe("start capture", event)
    }

    fn on_move_should_set_capture(&self, event: &GestureEvent) -> bool {
        self.observe("move capture", event)
    }

    fn on_termination_request(&self, event: &GestureEvent) -> bool {
        self.observe("termination request", event)
    }
}
