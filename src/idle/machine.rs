//! The Active/Inactive state machine driven by activity reports and expiries.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use super::ActivityState;
use crate::scheduler::{CancelHandle, TimeoutScheduler};

/// Receives each state transition as `is_active`.
pub type TransitionSink = Arc<dyn Fn(bool) + Send + Sync>;

/// Generation token naming the expiry that is currently live.
///
/// Every reset produces a fresh value; an expiry carries the value it was
/// scheduled under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeadlineMarker(u64);

impl DeadlineMarker {
    fn next(self) -> Self {
        DeadlineMarker(self.0.wrapping_add(1))
    }
}

/// State owned by the machine and mutated only through its operations.
struct MachineState {
    /// Current activity value.
    state: ActivityState,
    /// Marker of the live deadline.
    marker: DeadlineMarker,
    /// Handle of the one uncancelled expiry, if any.
    pending: Option<CancelHandle>,
    /// Set once by teardown; every later operation is inert.
    torn_down: bool,
    /// Transitions not yet handed to the sink, oldest first.
    outbox: VecDeque<ActivityState>,
    /// Some caller is draining `outbox`.
    delivering: bool,
}

/// Clears the delivering flag if a sink panics mid-drain.
struct Delivering<'a>(&'a ActivityStateMachine);

impl Drop for Delivering<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock().delivering = false;
        }
    }
}

/// Tracks activity and flips to Inactive when the deadline expires.
///
/// At most one expiry is pending at a time. Reporting activity cancels it and
/// schedules a new one before returning, so an expiry that was due after the
/// report can never run.
///
/// Transitions are queued under the state lock and delivered by one caller
/// at a time, so the sink and subscribers see them in the order they
/// happened even when expiries fire on another thread. A transition made
/// while another thread is delivering is handed to that thread.
pub struct ActivityStateMachine {
    /// Silence required before going Inactive.
    delay: Duration,
    /// Where expiries are scheduled.
    scheduler: Arc<dyn TimeoutScheduler>,
    /// Mutable state.
    inner: Mutex<MachineState>,
    /// Transition callback, invoked outside the state lock.
    sink: Option<TransitionSink>,
    /// Broadcast sender for state changes.
    state_tx: broadcast::Sender<ActivityState>,
    /// Handed to expiry callbacks so they never keep the machine alive.
    this: Weak<ActivityStateMachine>,
}

impl ActivityStateMachine {
    /// Create a machine in `initial` state.
    ///
    /// Starting Active arms the first deadline. Nothing is announced.
    pub fn new(
        initial: ActivityState,
        delay: Duration,
        scheduler: Arc<dyn TimeoutScheduler>,
        sink: Option<TransitionSink>,
    ) -> Arc<Self> {
        let (state_tx, _) = broadcast::channel(16);

        let machine = Arc::new_cyclic(|this| Self {
            delay,
            scheduler,
            inner: Mutex::new(MachineState {
                state: initial,
                marker: DeadlineMarker(0),
                pending: None,
                torn_down: false,
                outbox: VecDeque::new(),
                delivering: false,
            }),
            sink,
            state_tx,
            this: this.clone(),
        });

        if initial.is_active() {
            let mut inner = machine.lock();
            machine.arm(&mut inner);
        }
        debug!(
            "Activity state machine created ({:?}, delay {:?})",
            initial, delay
        );

        machine
    }

    /// Subscribe to activity state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ActivityState> {
        self.state_tx.subscribe()
    }

    /// Get the current activity state.
    pub fn state(&self) -> ActivityState {
        self.lock().state
    }

    /// Marker of the live deadline.
    ///
    /// Expiring a deadline is reserved to the scheduled callback; holders of
    /// the machine cannot force inactivity with it:
    ///
    /// ```compile_fail
    /// use user_inactivity::ActivityStateMachine;
    ///
    /// fn force_inactive(machine: &ActivityStateMachine) {
    ///     machine.on_expiry(machine.marker());
    /// }
    /// ```
    pub fn marker(&self) -> DeadlineMarker {
        self.lock().marker
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether an expiry is currently scheduled.
    pub fn has_pending_expiry(&self) -> bool {
        self.lock().pending.is_some()
    }

    /// Record activity: restart the deadline and go Active.
    ///
    /// Returns `true` when this caused an Inactive to Active transition.
    pub fn report_activity(&self) -> bool {
        let transitioned = {
            let mut inner = self.lock();
            if inner.torn_down {
                trace!("Ignoring activity after teardown");
                return false;
            }

            if let Some(pending) = inner.pending.take() {
                pending.cancel();
            }
            let was = inner.state;
            inner.state = ActivityState::Active;
            self.arm(&mut inner);

            let transitioned = was == ActivityState::Inactive;
            if transitioned {
                inner.outbox.push_back(ActivityState::Active);
            }
            transitioned
        };

        if transitioned {
            self.deliver();
        }
        transitioned
    }

    /// Deadline expiry for `marker`.
    ///
    /// Returns `true` when this caused the Active to Inactive transition.
    /// A marker that is no longer live is ignored; cancellation already keeps
    /// such callbacks from running, this only covers an expiry that had
    /// started on another thread when it was cancelled.
    fn on_expiry(&self, marker: DeadlineMarker) -> bool {
        {
            let mut inner = self.lock();
            if inner.torn_down || inner.marker != marker || !inner.state.is_active() {
                debug!("Discarding stale expiry {:?}", marker);
                return false;
            }

            // Fired, nothing left to cancel.
            inner.pending = None;
            inner.state = ActivityState::Inactive;
            inner.outbox.push_back(ActivityState::Inactive);
        }

        self.deliver();
        true
    }

    /// Cancel any pending expiry and stop reacting. Idempotent.
    pub fn teardown(&self) {
        let mut inner = self.lock();
        if inner.torn_down {
            return;
        }
        inner.torn_down = true;

        if let Some(pending) = inner.pending.take() {
            pending.cancel();
        }
        debug!("Activity state machine torn down");
    }

    /// Bump the marker and schedule the expiry bound to it.
    fn arm(&self, inner: &mut MachineState) {
        inner.marker = inner.marker.next();
        let marker = inner.marker;
        let this = self.this.clone();

        inner.pending = Some(self.scheduler.schedule(
            self.delay,
            Box::new(move || {
                if let Some(machine) = this.upgrade() {
                    machine.on_expiry(marker);
                }
            }),
        ));
        trace!("Deadline {:?} armed for {:?}", marker, self.delay);
    }

    /// Drain queued transitions unless another caller already is.
    fn deliver(&self) {
        {
            let mut inner = self.lock();
            if inner.delivering {
                return;
            }
            inner.delivering = true;
        }
        let _delivering = Delivering(self);

        loop {
            let next = {
                let mut inner = self.lock();
                match inner.outbox.pop_front() {
                    Some(state) => state,
                    None => {
                        inner.delivering = false;
                        return;
                    }
                }
            };
            self.announce(next);
        }
    }

    fn announce(&self, state: ActivityState) {
        match state {
            ActivityState::Active => info!("User became active"),
            ActivityState::Inactive => info!("User inactive for {:?}", self.delay),
        }

        // No subscribers is fine.
        let _ = self.state_tx.send(state);

        if let Some(sink) = &self.sink {
            sink(state.is_active());
        }
    }

    fn lock(&self) -> MutexGuard<'_, MachineState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ActivityStateMachine {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{ManualScheduler, TimeoutCallback};
    use std::sync::mpsc;
    use std::thread;

    /// Keeps callbacks for the test to fire on a thread of its choosing.
    #[derive(Default)]
    struct HeldScheduler {
        held: Mutex<Vec<TimeoutCallback>>,
    }

    impl TimeoutScheduler for HeldScheduler {
        fn schedule(&self, _delay: Duration, callback: TimeoutCallback) -> CancelHandle {
            self.held.lock().unwrap().push(callback);
            CancelHandle::noop()
        }
    }

    const DELAY: Duration = Duration::from_millis(1000);

    fn recording_machine(
        initial: ActivityState,
    ) -> (Arc<ActivityStateMachine>, ManualScheduler, Arc<Mutex<Vec<bool>>>) {
        let scheduler = ManualScheduler::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let calls2 = calls.clone();
        let sink: TransitionSink =
            Arc::new(move |active: bool| calls2.lock().unwrap().push(active));

        let machine =
            ActivityStateMachine::new(initial, DELAY, Arc::new(scheduler.clone()), Some(sink));
        (machine, scheduler, calls)
    }

    #[test]
    fn construction_arms_without_announcing() {
        let (machine, scheduler, calls) = recording_machine(ActivityState::Active);

        assert_eq!(machine.state(), ActivityState::Active);
        assert!(machine.has_pending_expiry());
        assert_eq!(scheduler.pending(), 1);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn inactive_start_schedules_nothing() {
        let (machine, scheduler, calls) = recording_machine(ActivityState::Inactive);

        assert!(!machine.has_pending_expiry());
        assert_eq!(scheduler.pending(), 0);
        scheduler.advance(DELAY * 5);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn each_report_yields_a_fresh_marker_and_single_pending_expiry() {
        let (machine, scheduler, calls) = recording_machine(ActivityState::Active);

        let first = machine.marker();
        for _ in 0..5 {
            assert!(!machine.report_activity());
        }
        assert_ne!(machine.marker(), first);
        assert_eq!(scheduler.pending(), 1);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn expiry_transitions_once() {
        let (machine, scheduler, calls) = recording_machine(ActivityState::Active);

        scheduler.advance(DELAY);
        assert_eq!(machine.state(), ActivityState::Inactive);
        assert!(!machine.has_pending_expiry());

        scheduler.advance(DELAY * 3);
        assert_eq!(*calls.lock().unwrap(), vec![false]);
    }

    #[test]
    fn stale_marker_is_ignored() {
        let (machine, _scheduler, calls) = recording_machine(ActivityState::Active);

        let stale = machine.marker();
        machine.report_activity();

        assert!(!machine.on_expiry(stale));
        assert_eq!(machine.state(), ActivityState::Active);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn activity_after_expiry_announces_active() {
        let (machine, scheduler, calls) = recording_machine(ActivityState::Active);

        scheduler.advance(DELAY);
        assert!(machine.report_activity());
        assert!(!machine.report_activity());

        assert_eq!(*calls.lock().unwrap(), vec![false, true]);
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn teardown_cancels_and_is_idempotent() {
        let (machine, scheduler, calls) = recording_machine(ActivityState::Active);

        machine.teardown();
        machine.teardown();
        assert_eq!(scheduler.pending(), 0);

        assert!(!machine.report_activity());
        scheduler.advance(DELAY * 2);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn dropping_machine_cancels_pending_expiry() {
        let (machine, scheduler, _calls) = recording_machine(ActivityState::Active);

        drop(machine);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn subscribers_see_transitions() {
        let (machine, scheduler, _calls) = recording_machine(ActivityState::Active);
        let mut rx = machine.subscribe();

        scheduler.advance(DELAY);
        machine.report_activity();

        assert_eq!(rx.try_recv().unwrap(), ActivityState::Inactive);
        assert_eq!(rx.try_recv().unwrap(), ActivityState::Active);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn cross_thread_delivery_keeps_transition_order() {
        let scheduler = Arc::new(HeldScheduler::default());
        let log = Arc::new(Mutex::new(Vec::new()));
        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let entered_tx = Mutex::new(entered_tx);
        let release_rx = Mutex::new(release_rx);

        let log2 = log.clone();
        let sink: TransitionSink = Arc::new(move |active: bool| {
            log2.lock().unwrap().push(active);
            if !active {
                // Hold the expiry thread inside its notification.
                entered_tx.lock().unwrap().send(()).unwrap();
                release_rx.lock().unwrap().recv().unwrap();
            }
        });
        let machine =
            ActivityStateMachine::new(ActivityState::Active, DELAY, scheduler.clone(), Some(sink));

        let expiry = scheduler.held.lock().unwrap().pop().unwrap();
        let worker = thread::spawn(expiry);

        entered_rx.recv().unwrap();
        assert!(machine.report_activity());
        assert_eq!(*log.lock().unwrap(), vec![false]);

        release_tx.send(()).unwrap();
        worker.join().unwrap();

        let log = log.lock().unwrap().clone();
        assert_eq!(log, vec![false, true]);
        assert_eq!(log.last().copied(), Some(machine.state().is_active()));
    }
}
