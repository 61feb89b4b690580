//! Background session renewal.
//!
//! One [`RefreshScheduler`] per page lifetime. Four triggers (mount, interval,
//! focus, visibility) can fire within milliseconds of each other; the guards
//! make sure at most one refresh call is in flight and that a dead session
//! causes exactly one logout and one redirect.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::routes::{is_auth_page, is_protected};
use super::transport::{Navigator, SessionTransport, TransportError};

/// Renewal cadence, shorter than the 15-minute access token lifetime.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(13 * 60);

/// Attempts closer together than this are dropped.
pub const DEBOUNCE: Duration = Duration::from_secs(5);

const OUTCOME_BUFFER: usize = 32;

/// What asked for a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Mount,
    Interval,
    Focus,
    Visible,
}

/// Why a trigger did not result in a network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AuthPage,
    InFlight,
    AlreadyRedirected,
    Debounced,
}

/// Result of handling one trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Skipped(SkipReason),
    Refreshed,
    /// Session dead on a protected page: logged out and sent to login.
    Redirected,
    /// Session dead on a public page: nothing else happens.
    Ignored(TransportError),
    /// Anything else; the next tick tries again.
    Transient(TransportError),
}

#[derive(Debug, Default)]
struct SchedulerState {
    is_refreshing: bool,
    has_redirected: bool,
    last_attempt: Option<Instant>,
}

pub struct RefreshScheduler {
    transport: Arc<dyn SessionTransport>,
    navigator: Arc<dyn Navigator>,
    state: Mutex<SchedulerState>,
    interval: Duration,
    debounce: Duration,
}

/// Clears `is_refreshing` when the attempt ends, including when its task is aborted.
struct InFlight<'a> {
    scheduler: &'a RefreshScheduler,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.scheduler.state().is_refreshing = false;
    }
}

impl RefreshScheduler {
    pub fn new(transport: Arc<dyn SessionTransport>, navigator: Arc<dyn Navigator>) -> Self {
        Self::with_timing(transport, navigator, REFRESH_INTERVAL, DEBOUNCE)
    }

    pub fn with_timing(
        transport: Arc<dyn SessionTransport>,
        navigator: Arc<dyn Navigator>,
        interval: Duration,
        debounce: Duration,
    ) -> Self {
        Self {
            transport,
            navigator,
            state: Mutex::new(SchedulerState::default()),
            interval,
            debounce,
        }
    }

    // Never held across an await.
    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check every guard and claim the in-flight slot if they all pass.
    fn begin(&self) -> Result<InFlight<'_>, SkipReason> {
        if is_auth_page(&self.navigator.current_path()) {
            return Err(SkipReason::AuthPage);
        }

        let mut state = self.state();
        if state.is_refreshing {
            return Err(SkipReason::InFlight);
        }
        if state.has_redirected {
            return Err(SkipReason::AlreadyRedirected);
        }
        let now = Instant::now();
        if state
            .last_attempt
            .is_some_and(|last| now.duration_since(last) < self.debounce)
        {
            return Err(SkipReason::Debounced);
        }

        state.is_refreshing = true;
        state.last_attempt = Some(now);
        Ok(InFlight { scheduler: self })
    }

    /// Handle one trigger. Safe to call concurrently; overlapping calls
    /// are skipped rather than queued.
    pub async fn on_trigger(&self, trigger: Trigger) -> AttemptOutcome {
        let _in_flight = match self.begin() {
            Ok(guard) => guard,
            Err(reason) => {
                debug!(?trigger, ?reason, "Refresh skipped");
                return AttemptOutcome::Skipped(reason);
            }
        };

        let error = match self.transport.refresh().await {
            Ok(()) => {
                debug!(?trigger, "Session refreshed");
                return AttemptOutcome::Refreshed;
            }
            Err(e) => e,
        };

        if !error.is_session_dead() {
            warn!(?trigger, error = %error, "Refresh failed, will retry on next tick");
            return AttemptOutcome::Transient(error);
        }

        let path = self.navigator.current_path();
        if !is_protected(&path) {
            info!(?trigger, path = %path, error = %error, "Session ended on a public page");
            return AttemptOutcome::Ignored(error);
        }

        {
            let mut state = self.state();
            if state.has_redirected {
                return AttemptOutcome::Skipped(SkipReason::AlreadyRedirected);
            }
            state.has_redirected = true;
        }

        info!(?trigger, path = %path, error = %error, "Session ended, redirecting to login");
        if let Err(e) = self.transport.logout().await {
            debug!(error = %e, "Logout during redirect failed");
        }
        self.navigator.redirect_to_login();
        AttemptOutcome::Redirected
    }
}

/// Running scheduler loop. Dropping the handle stops the timer and abandons
/// any attempt still in flight.
pub struct SchedulerHandle {
    triggers: mpsc::UnboundedSender<Trigger>,
    outcomes: mpsc::Receiver<AttemptOutcome>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Forward a focus or visibility event. Returns false once the loop has stopped.
    pub fn trigger(&self, trigger: Trigger) -> bool {
        self.triggers.send(trigger).is_ok()
    }

    /// Next attempt outcome. Outcomes are dropped when nobody reads them.
    pub async fn next_outcome(&mut self) -> Option<AttemptOutcome> {
        self.outcomes.recv().await
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start the loop: one `Mount` attempt right away, then one `Interval`
/// attempt per interval, plus whatever arrives through [`SchedulerHandle::trigger`].
/// Each attempt runs as its own task, so attempts can overlap and the
/// in-flight guard decides.
pub fn spawn(scheduler: Arc<RefreshScheduler>) -> SchedulerHandle {
    let (trigger_tx, mut trigger_rx) = mpsc::unbounded_channel();
    let (outcome_tx, outcome_rx) = mpsc::channel(OUTCOME_BUFFER);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(
            Instant::now() + scheduler.interval,
            scheduler.interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut attempts = JoinSet::new();
        let dispatch = |attempts: &mut JoinSet<AttemptOutcome>, trigger: Trigger| {
            let scheduler = scheduler.clone();
            attempts.spawn(async move { scheduler.on_trigger(trigger).await });
        };

        dispatch(&mut attempts, Trigger::Mount);

        loop {
            tokio::select! {
                _ = ticker.tick() => dispatch(&mut attempts, Trigger::Interval),
                trigger = trigger_rx.recv() => match trigger {
                    Some(trigger) => dispatch(&mut attempts, trigger),
                    None => break,
                },
                Some(joined) = attempts.join_next(), if !attempts.is_empty() => {
                    if let Ok(outcome) = joined {
                        let _ = outcome_tx.try_send(outcome);
                    }
                }
            }
        }
    });

    SchedulerHandle {
        triggers: trigger_tx,
        outcomes: outcome_rx,
        task,
    }
}
