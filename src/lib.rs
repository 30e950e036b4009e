//! User inactivity watchdog.
//!
//! [`UserInactivity`] wraps a subtree of an interactive UI. Its capture-phase
//! gesture hooks see every touch in that subtree without claiming any of
//! them, and every touch restarts an inactivity deadline. When the deadline
//! runs out the `on_action(false)` callback fires; the next touch (or a
//! forced activation) fires `on_action(true)`.
//!
//! ```no_run
//! use std::time::Duration;
//! use user_inactivity::UserInactivity;
//!
//! # async fn mount() -> Result<(), user_inactivity::ConfigError> {
//! let watchdog = UserInactivity::builder()
//!     .time_for_inactivity(Duration::from_secs(30))
//!     .on_action(|active| println!("active: {active}"))
//!     .build()?;
//! # drop(watchdog);
//! # Ok(())
//! # }
//! ```

pub mod component;
pub mod config;
pub mod error;
pub mod gesture;
pub mod idle;
pub mod scheduler;

pub use component::{ContainerView, Style, UserInactivity, UserInactivityBuilder};
pub use config::{Config, InactivityConfig};
pub use error::ConfigError;
pub use gesture::{
    ActivityObserver, GestureEvent, PanHandlers, Responder, ResponderTree, TouchPhase,
};
pub use idle::{ActivityState, ActivityStateMachine, DeadlineMarker};
pub use scheduler::{CancelHandle, ManualScheduler, TimeoutScheduler, TokioScheduler};
