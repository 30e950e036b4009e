//! The `UserInactivity` container: wires force-active input, gesture
//! observation and transition callbacks around one state machine.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::{default_time_for_inactivity_ms, InactivityConfig};
use crate::error::{ConfigError, Result};
use crate::gesture::ActivityObserver;
use crate::idle::{ActivityState, ActivityStateMachine, TransitionSink};
use crate::scheduler::{TimeoutScheduler, TokioScheduler};

/// Opaque container style, handed to the renderer untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Style(Value);

impl Style {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Fills the parent.
impl Default for Style {
    fn default() -> Self {
        Self(json!({ "flex": 1 }))
    }
}

/// What the container hands to the rendering layer.
pub struct ContainerView<'a, C> {
    pub style: &'a Style,
    /// Always `false`: the container must stay in the native tree to
    /// receive capture-phase callbacks.
    pub collapsable: bool,
    pub pan_handlers: Arc<ActivityObserver>,
    pub children: &'a C,
}

/// Activity watchdog wrapped around a subtree of children.
///
/// `on_action(true)` and `on_action(false)` are invoked on transitions only,
/// never at mount. Dropping the value unmounts it.
pub struct UserInactivity<C = ()> {
    machine: Arc<ActivityStateMachine>,
    observer: Arc<ActivityObserver>,
    is_active: Option<bool>,
    style: Style,
    children: C,
}

impl UserInactivity<()> {
    pub fn builder() -> UserInactivityBuilder<()> {
        UserInactivityBuilder::new()
    }
}

impl<C> UserInactivity<C> {
    /// Get the current activity state.
    pub fn state(&self) -> ActivityState {
        self.machine.state()
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    pub fn time_for_inactivity(&self) -> Duration {
        self.machine.delay()
    }

    /// Update the force-active input.
    ///
    /// A change to `Some(true)` resets the timer. Any other value is inert:
    /// inactivity is only reached by expiry.
    pub fn set_is_active(&mut self, is_active: Option<bool>) {
        if self.is_active == is_active {
            return;
        }
        self.is_active = is_active;

        if is_active == Some(true) {
            debug!("Forced activity");
            self.machine.report_activity();
        }
    }

    /// Subscribe to activity state changes.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ActivityState> {
        self.machine.subscribe()
    }

    /// The gesture observer, created once at mount.
    pub fn pan_handlers(&self) -> Arc<ActivityObserver> {
        self.observer.clone()
    }

    pub fn render(&self) -> ContainerView<'_, C> {
        ContainerView {
            style: &self.style,
            collapsable: false,
            pan_handlers: self.observer.clone(),
            children: &self.children,
        }
    }

    pub fn children_mut(&mut self) -> &mut C {
        &mut self.children
    }

    /// Cancel the pending expiry. Also done on drop.
    pub fn unmount(&self) {
        self.machine.teardown();
    }
}

impl<C> Drop for UserInactivity<C> {
    fn drop(&mut self) {
        self.machine.teardown();
    }
}

impl<C> fmt::Debug for UserInactivity<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserInactivity")
            .field("state", &self.state())
            .field("is_active", &self.is_active)
            .field("time_for_inactivity", &self.time_for_inactivity())
            .field("style", &self.style)
            .finish_non_exhaustive()
    }
}

/// Builder for [`UserInactivity`].
pub struct UserInactivityBuilder<C> {
    time_for_inactivity: Duration,
    is_active: Option<bool>,
    on_action: Option<TransitionSink>,
    timeout_handler: Option<Arc<dyn TimeoutScheduler>>,
    style: Option<Style>,
    children: C,
}

impl UserInactivityBuilder<()> {
    fn new() -> Self {
        Self {
            time_for_inactivity: Duration::from_millis(default_time_for_inactivity_ms()),
            is_active: None,
            on_action: None,
            timeout_handler: None,
            style: None,
            children: (),
        }
    }
}

impl<C> UserInactivityBuilder<C> {
    /// Take delay, force-active flag and style from a loaded config.
    pub fn config(mut self, config: &InactivityConfig) -> Self {
        self.time_for_inactivity = config.time_for_inactivity();
        self.is_active = config.is_active;
        if let Some(style) = &config.style {
            self.style = Some(style.clone());
        }
        self
    }

    pub fn time_for_inactivity(mut self, delay: Duration) -> Self {
        self.time_for_inactivity = delay;
        self
    }

    pub fn is_active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    pub fn on_action(mut self, on_action: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.on_action = Some(Arc::new(on_action));
        self
    }

    pub fn timeout_handler(mut self, scheduler: Arc<dyn TimeoutScheduler>) -> Self {
        self.timeout_handler = Some(scheduler);
        self
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = Some(style);
        self
    }

    pub fn children<D>(self, children: D) -> UserInactivityBuilder<D> {
        UserInactivityBuilder {
            time_for_inactivity: self.time_for_inactivity,
            is_active: self.is_active,
            on_action: self.on_action,
            timeout_handler: self.timeout_handler,
            style: self.style,
            children,
        }
    }

    /// Mount the watchdog.
    ///
    /// Without a `timeout_handler` this must run inside a tokio runtime.
    pub fn build(self) -> Result<UserInactivity<C>> {
        if self.time_for_inactivity.is_zero() {
            return Err(ConfigError::NonPositiveDelay(self.time_for_inactivity));
        }
        let on_action = self.on_action.ok_or(ConfigError::MissingOnAction)?;
        let scheduler: Arc<dyn TimeoutScheduler> = match self.timeout_handler {
            Some(scheduler) => scheduler,
            None => Arc::new(TokioScheduler::current()?),
        };

        let initial = ActivityState::from(self.is_active.unwrap_or(true));
        let machine = ActivityStateMachine::new(
            initial,
            self.time_for_inactivity,
            scheduler,
            Some(on_action),
        );
        if self.is_active == Some(true) {
            machine.report_activity();
        }

        debug!(
            "Mounted inactivity watchdog ({:?}, delay {:?})",
            initial, self.time_for_inactivity
        );

        Ok(UserInactivity {
            observer: Arc::new(ActivityObserver::new(machine.clone())),
            machine,
            is_active: self.is_active,
            style: self.style.unwrap_or_default(),
            children: self.children,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<bool>>>, impl Fn(bool) + Send + Sync + 'static) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let calls2 = calls.clone();
        (calls, move |active: bool| calls2.lock().unwrap().push(active))
    }

    #[test]
    fn missing_on_action_is_rejected() {
        let err = UserInactivity::builder()
            .timeout_handler(Arc::new(ManualScheduler::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingOnAction));
    }

    #[test]
    fn zero_delay_is_rejected() {
        let err = UserInactivity::builder()
            .time_for_inactivity(Duration::ZERO)
            .on_action(|_| {})
            .timeout_handler(Arc::new(ManualScheduler::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::NonPositiveDelay(_)));
    }

    #[test]
    fn default_scheduler_needs_a_runtime() {
        let err = UserInactivity::builder()
            .on_action(|_| {})
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::NoRuntime));
    }

    #[test]
    fn defaults_are_applied() {
        let watchdog = UserInactivity::builder()
            .on_action(|_| {})
            .timeout_handler(Arc::new(ManualScheduler::new()))
            .build()
            .unwrap();

        assert_eq!(watchdog.time_for_inactivity(), Duration::from_secs(10));
        assert!(watchdog.is_active());

        let view = watchdog.render();
        assert_eq!(view.style, &Style::default());
        assert!(!view.collapsable);
    }

    #[test]
    fn render_forwards_style_and_children_and_reuses_observer() {
        let style = Style::new(json!({ "flex": 1, "backgroundColor": "#000" }));
        let watchdog = UserInactivity::builder()
            .on_action(|_| {})
            .timeout_handler(Arc::new(ManualScheduler::new()))
            .style(style.clone())
            .children(vec!["header", "list"])
            .build()
            .unwrap();

        let first = watchdog.render();
        assert_eq!(first.style, &style);
        assert_eq!(first.children, &vec!["header", "list"]);

        let second = watchdog.render();
        assert!(Arc::ptr_eq(&first.pan_handlers, &second.pan_handlers));
        assert!(Arc::ptr_eq(&first.pan_handlers, &watchdog.pan_handlers()));
    }

    #[test]
    fn config_is_applied_to_builder() {
        let config = InactivityConfig {
            time_for_inactivity_ms: 1500,
            is_active: Some(false),
            style: Some(Style::new(json!({ "flex": 2 }))),
        };
        let watchdog = UserInactivity::builder()
            .config(&config)
            .on_action(|_| {})
            .timeout_handler(Arc::new(ManualScheduler::new()))
            .build()
            .unwrap();

        assert_eq!(watchdog.time_for_inactivity(), Duration::from_millis(1500));
        assert_eq!(watchdog.state(), ActivityState::Inactive);
        assert_eq!(watchdog.render().style.get("flex"), Some(&json!(2)));
    }

    #[test]
    fn reasserting_same_force_value_is_not_a_change() {
        let scheduler = ManualScheduler::new();
        let (calls, on_action) = recorder();
        let mut watchdog = UserInactivity::builder()
            .time_for_inactivity(Duration::from_millis(100))
            .is_active(true)
            .on_action(on_action)
            .timeout_handler(Arc::new(scheduler.clone()))
            .build()
            .unwrap();

        scheduler.advance(Duration::from_millis(100));
        watchdog.set_is_active(Some(true));
        assert!(!watchdog.is_active());
        assert_eq!(*calls.lock().unwrap(), vec![false]);
    }

    #[test]
    fn on_action_may_reenter_the_watchdog() {
        let scheduler = ManualScheduler::new();
        let slot: Arc<Mutex<Option<Arc<ActivityObserver>>>> = Arc::new(Mutex::new(None));

        let slot2 = slot.clone();
        let watchdog = UserInactivity::builder()
            .time_for_inactivity(Duration::from_millis(100))
            .on_action(move |active| {
                if !active {
                    if let Some(observer) = slot2.lock().unwrap().as_ref() {
                        use crate::gesture::{GestureEvent, PanHandlers};
                        observer.on_start_should_set_capture(&GestureEvent::start(0.0, 0.0));
                    }
                }
            })
            .timeout_handler(Arc::new(scheduler.clone()))
            .build()
            .unwrap();
        *slot.lock().unwrap() = Some(watchdog.pan_handlers());

        scheduler.advance(Duration::from_millis(100));
        assert!(watchdog.is_active());
        assert_eq!(scheduler.pending(), 1);

        slot.lock().unwrap().take();
    }
}
