//! Minimal capture/bubble dispatcher standing in for the host gesture system.
//!
//! Capture hooks run root to target on start and move. A claiming ancestor
//! takes the gesture away from the target, asking the target first if it
//! already holds it. Otherwise the target is asked in the bubble phase and,
//! once granted, receives the rest of the sequence.

use std::sync::Arc;
use tracing::trace;

use super::{GestureEvent, PanHandlers, TouchPhase};

/// Gesture handling of a descendant view.
pub trait Responder {
    fn on_start_should_set_responder(&mut self, _event: &GestureEvent) -> bool {
        false
    }

    fn on_move_should_set_responder(&mut self, _event: &GestureEvent) -> bool {
        false
    }

    fn on_responder_grant(&mut self, _event: &GestureEvent) {}

    fn on_responder_move(&mut self, _event: &GestureEvent) {}

    fn on_responder_release(&mut self, _event: &GestureEvent) {}

    fn on_responder_terminate(&mut self, _event: &GestureEvent) {}

    /// Whether the target lets an ancestor take over.
    fn on_responder_termination_request(&mut self, _event: &GestureEvent) -> bool {
        true
    }
}

/// Who holds the current gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Holder {
    /// The ancestor at this index, counted from the root.
    Ancestor(usize),
    Target,
}

/// A single root-to-target path through the view tree.
pub struct ResponderTree<R> {
    ancestors: Vec<Arc<dyn PanHandlers>>,
    target: R,
    holder: Option<Holder>,
}

impl<R: Responder> ResponderTree<R> {
    pub fn new(ancestors: Vec<Arc<dyn PanHandlers>>, target: R) -> Self {
        Self {
            ancestors,
            target,
            holder: None,
        }
    }

    pub fn target(&self) -> &R {
        &self.target
    }

    pub fn holder(&self) -> Option<Holder> {
        self.holder
    }

    /// Route one event and return who holds the gesture afterwards.
    pub fn dispatch(&mut self, event: &GestureEvent) -> Option<Holder> {
        match event.phase {
            TouchPhase::Start => self.dispatch_start(event),
            TouchPhase::Move => self.dispatch_move(event),
            TouchPhase::End => self.dispatch_end(event),
        }
        trace!("Gesture {:?} held by {:?}", event.phase, self.holder);
        self.holder
    }

    fn dispatch_start(&mut self, event: &GestureEvent) {
        self.holder = None;

        let claimed = self
            .ancestors
            .iter()
            .position(|a| a.on_start_should_set_capture(event));
        if let Some(idx) = claimed {
            self.holder = Some(Holder::Ancestor(idx));
            return;
        }

        if self.target.on_start_should_set_responder(event) {
            self.holder = Some(Holder::Target);
            self.target.on_responder_grant(event);
        }
    }

    fn dispatch_move(&mut self, event: &GestureEvent) {
        let claimed = self
            .ancestors
            .iter()
            .position(|a| a.on_move_should_set_capture(event));

        if let Some(idx) = claimed {
            match self.holder {
                Some(Holder::Target) => {
                    if self.target.on_responder_termination_request(event) {
                        self.target.on_responder_terminate(event);
                        self.holder = Some(Holder::Ancestor(idx));
                    } else {
                        self.target.on_responder_move(event);
                    }
                }
                _ => self.holder = Some(Holder::Ancestor(idx)),
            }
            return;
        }

        match self.holder {
            Some(Holder::Target) => self.target.on_responder_move(event),
            Some(Holder::Ancestor(idx)) => {
                if self.target.on_move_should_set_responder(event)
                    && self.ancestors[idx].on_termination_request(event)
                {
                    self.holder = Some(Holder::Target);
                    self.target.on_responder_grant(event);
                }
            }
            None => {
                if self.target.on_move_should_set_responder(event) {
                    self.holder = Some(Holder::Target);
                    self.target.on_responder_grant(event);
                }
            }
        }
    }

    fn dispatch_end(&mut self, event: &GestureEvent) {
        if self.holder == Some(Holder::Target) {
            self.target.on_responder_release(event);
        }
        self.holder = None;
    }
}
