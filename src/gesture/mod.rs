//! Gesture capture hooks and the non-consuming activity observer.
//!
//! The host gesture system asks every ancestor of a touched view whether it
//! wants to capture the gesture before the view itself gets a say. The
//! observer answers those questions, reports activity each time, and always
//! declines.

mod observer;
mod responder;

use serde::{Deserialize, Serialize};

pub use observer::ActivityObserver;
pub use responder::{Holder, Responder, ResponderTree};

/// Touch lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TouchPhase {
    Start,
    Move,
    End,
}

/// A raw touch event as delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GestureEvent {
    pub phase: TouchPhase,
    /// Location in the container's coordinate space.
    pub x: f32,
    pub y: f32,
}

impl GestureEvent {
    pub fn new(phase: TouchPhase, x: f32, y: f32) -> Self {
        Self { phase, x, y }
    }

    pub fn start(x: f32, y: f32) -> Self {
        Self::new(TouchPhase::Start, x, y)
    }

    pub fn moved(x: f32, y: f32) -> Self {
        Self::new(TouchPhase::Move, x, y)
    }

    pub fn end(x: f32, y: f32) -> Self {
        Self::new(TouchPhase::End, x, y)
    }
}

/// Capture-phase hooks a container attaches to the gesture system.
///
/// Each returns whether the container claims (or keeps) the gesture.
pub trait PanHandlers: Send + Sync {
    /// Asked on touch start, before descendants.
    fn on_start_should_set_capture(&self, event: &GestureEvent) -> bool;

    /// Asked on every move, before descendants.
    fn on_move_should_set_capture(&self, event: &GestureEvent) -> bool;

    /// Asked when another view wants to take over a gesture held here.
    fn on_termination_request(&self, event: &GestureEvent) -> bool;
}
