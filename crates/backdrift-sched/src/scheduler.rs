/*!
 * Interval- and cron-driven task scheduling with an overlap-drop policy.
 *
 * Grounded on `orbit_sentinel::daemon::Sentinel::run`'s
 * `loop { interval.tick().await; sweep().await }` shape, re-expressed with a
 * blocking `std::thread` timer rather than a `tokio` interval, since the rest
 * of this workspace's pipeline is thread-based rather than async. The cron
 * variant pulls in the `cron` crate fresh - nothing in the teacher's
 * dependency stack computes cron schedules; see `DESIGN.md`.
 */

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use tracing::{debug, error};

use crate::error::{Result, SchedulerError};

const POLL_GRANULARITY: Duration = Duration::from_millis(50);

/// A cheap, cloneable handle observed by a running task so it can cooperate
/// with `ScheduledTask::cancel`.
#[derive(Clone, Default)]
pub struct CancellationSignal(Arc<AtomicBool>);

impl CancellationSignal {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a [`ScheduledTask`] decides when to fire next.
#[derive(Debug, Clone)]
pub enum SchedulePlan {
    /// Fire every `interval` against a fixed grid anchored at the first
    /// tick. A run that overruns its interval does not push later ticks
    /// back - the colliding tick is attempted and dropped by the overlap
    /// guard instead, and ticks are never queued to catch up.
    Interval { interval: Duration, immediate: bool },
    /// Fire at the next instant a cron expression matches, recomputed after
    /// every run - cron ticks are already calendar-aligned, so recomputing
    /// from the current time cannot drift the grid the way a naive
    /// `now + interval` would for the interval variant.
    Cron { expression: String },
}

impl SchedulePlan {
    pub fn interval(interval: Duration, immediate: bool) -> Result<Self> {
        if interval.is_zero() {
            return Err(SchedulerError::InvalidInterval(
                "interval must be greater than zero".to_string(),
            ));
        }
        Ok(Self::Interval { interval, immediate })
    }

    pub fn cron(expression: impl Into<String>) -> Result<Self> {
        let expression = expression.into();
        Schedule::from_str(&expression).map_err(|e| SchedulerError::InvalidCronExpression {
            expression: expression.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self::Cron { expression })
    }
}

struct TaskState {
    plan: SchedulePlan,
    schedule: Option<Schedule>,
    running: AtomicBool,
    stopped: AtomicBool,
    disposed: AtomicBool,
    cancel: CancellationSignal,
    next_run: Mutex<Option<DateTime<Utc>>>,
}

/// A live handle to a background-scheduled task.
///
/// `start()` is idempotent. After `dispose()`, every other method returns
/// [`SchedulerError::Disposed`].
pub struct ScheduledTask {
    state: Arc<TaskState>,
    action: Arc<dyn Fn(&CancellationSignal) + Send + Sync>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ScheduledTask {
    /// Build a task from a plan and an action. The task is not started -
    /// call [`ScheduledTask::start`] to spawn its background thread.
    pub fn new<F>(plan: SchedulePlan, action: F) -> Result<Self>
    where
        F: Fn(&CancellationSignal) + Send + Sync + 'static,
    {
        let schedule = match &plan {
            SchedulePlan::Cron { expression } => Some(
                Schedule::from_str(expression).map_err(|e| SchedulerError::InvalidCronExpression {
                    expression: expression.clone(),
                    reason: e.to_string(),
                })?,
            ),
            SchedulePlan::Interval { .. } => None,
        };

        Ok(Self {
            state: Arc::new(TaskState {
                plan,
                schedule,
                running: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                cancel: CancellationSignal::new(),
                next_run: Mutex::new(None),
            }),
            action: Arc::new(action),
            handle: Mutex::new(None),
        })
    }

    /// Spawn the background timer thread. A second call is a no-op.
    pub fn start(&self) -> Result<()> {
        self.ensure_not_disposed()?;
        let mut handle = self.handle.lock().unwrap();
        if handle.is_some() {
            return Ok(());
        }

        let state = self.state.clone();
        let action = self.action.clone();
        *handle = Some(thread::spawn(move || run_loop(state, action)));
        Ok(())
    }

    /// Suspend future fires. A task currently running is not interrupted.
    pub fn stop(&self) -> Result<()> {
        self.ensure_not_disposed()?;
        self.state.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Suspend future fires and signal cooperative cancellation to a running
    /// invocation.
    pub fn cancel(&self) -> Result<()> {
        self.ensure_not_disposed()?;
        self.state.stopped.store(true, Ordering::SeqCst);
        self.state.cancel.raise();
        Ok(())
    }

    /// Fire immediately, out of band, respecting the overlap guard: a no-op
    /// (returns `false`) if an invocation is already running.
    pub fn trigger_now(&self) -> Result<bool> {
        self.ensure_not_disposed()?;
        Ok(fire(&self.state, &self.action))
    }

    /// The wall-clock instant of the next scheduled fire, if the task has
    /// been started and has computed one.
    pub fn next_run_time(&self) -> Result<Option<DateTime<Utc>>> {
        self.ensure_not_disposed()?;
        Ok(*self.state.next_run.lock().unwrap())
    }

    pub fn is_running(&self) -> Result<bool> {
        self.ensure_not_disposed()?;
        Ok(self.state.running.load(Ordering::SeqCst))
    }

    /// Permanently stop the task and join its background thread. Every other
    /// method call after this returns [`SchedulerError::Disposed`].
    pub fn dispose(&self) {
        self.state.disposed.store(true, Ordering::SeqCst);
        self.state.stopped.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    fn ensure_not_disposed(&self) -> Result<()> {
        if self.state.disposed.load(Ordering::SeqCst) {
            Err(SchedulerError::Disposed)
        } else {
            Ok(())
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.state.disposed.store(true, Ordering::SeqCst);
        self.state.stopped.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

fn fire(state: &Arc<TaskState>, action: &Arc<dyn Fn(&CancellationSignal) + Send + Sync>) -> bool {
    if state
        .running
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        debug!("previous invocation still running, dropping this fire");
        return false;
    }

    let cancel = state.cancel.clone();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| action(&cancel)));
    if let Err(panic) = result {
        error!(?panic, "scheduled task panicked");
    }

    state.running.store(false, Ordering::SeqCst);
    true
}

fn run_loop(state: Arc<TaskState>, action: Arc<dyn Fn(&CancellationSignal) + Send + Sync>) {
    // The interval grid is anchored to the first tick, then advanced by
    // whole multiples of `interval` regardless of how long each fire takes.
    // A fire that lands on a tick while the previous one is still running
    // is attempted anyway and dropped by `fire`'s overlap guard - it is
    // never skipped ahead to "catch up", and the grid never drifts by
    // however long an action overran.
    let mut next_tick: Option<DateTime<Utc>> = None;

    loop {
        if state.disposed.load(Ordering::SeqCst) {
            return;
        }
        if state.stopped.load(Ordering::SeqCst) {
            thread::sleep(POLL_GRANULARITY);
            continue;
        }

        let next = match &state.plan {
            SchedulePlan::Interval { interval, immediate } => match next_tick {
                Some(prev) => prev + to_chrono_duration(*interval),
                None => {
                    let origin = Utc::now();
                    if *immediate {
                        origin
                    } else {
                        origin + to_chrono_duration(*interval)
                    }
                }
            },
            SchedulePlan::Cron { .. } => {
                let now = Utc::now();
                state
                    .schedule
                    .as_ref()
                    .expect("cron plan always carries a parsed schedule")
                    .after(&now)
                    .next()
                    .unwrap_or(now)
            }
        };
        next_tick = Some(next);
        *state.next_run.lock().unwrap() = Some(next);

        if !wait_until(&state, next) {
            continue;
        }
        if state.disposed.load(Ordering::SeqCst) {
            return;
        }
        if state.stopped.load(Ordering::SeqCst) {
            continue;
        }

        fire(&state, &action);
    }
}

fn to_chrono_duration(interval: Duration) -> chrono::Duration {
    chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::zero())
}

/// Sleep in small increments until `deadline`, waking early (and returning
/// `false`) if the task is stopped or disposed in the meantime.
fn wait_until(state: &Arc<TaskState>, deadline: DateTime<Utc>) -> bool {
    loop {
        if state.disposed.load(Ordering::SeqCst) || state.stopped.load(Ordering::SeqCst) {
            return false;
        }
        let remaining = deadline - Utc::now();
        let remaining_std = remaining.to_std().unwrap_or(Duration::ZERO);
        if remaining_std.is_zero() {
            return true;
        }
        thread::sleep(remaining_std.min(POLL_GRANULARITY));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn interval_task_fires_roughly_on_schedule() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let plan = SchedulePlan::interval(Duration::from_millis(40), true).unwrap();
        let task = ScheduledTask::new(plan, move |_cancel| {
            count2.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        task.start().unwrap();
        thread::sleep(Duration::from_millis(220));
        task.dispose();

        let fired = count.load(Ordering::SeqCst);
        assert!(fired >= 3, "expected at least 3 fires, got {fired}");
    }

    #[test]
    fn overlapping_long_running_task_never_runs_concurrently() {
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));
        let total_fires = Arc::new(AtomicUsize::new(0));

        let concurrent2 = concurrent.clone();
        let max2 = max_concurrent.clone();
        let total2 = total_fires.clone();

        let plan = SchedulePlan::interval(Duration::from_millis(100), true).unwrap();
        let task = ScheduledTask::new(plan, move |_cancel| {
            let now = concurrent2.fetch_add(1, Ordering::SeqCst) + 1;
            max2.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(250));
            concurrent2.fetch_sub(1, Ordering::SeqCst);
            total2.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        task.start().unwrap();
        thread::sleep(Duration::from_millis(1000));
        task.dispose();

        assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
        let fires = total_fires.load(Ordering::SeqCst);
        assert!((3..=5).contains(&fires), "expected ~4 fires on a 100ms grid with 250ms runs over 1s, got {fires}");
    }

    #[test]
    fn stop_prevents_future_fires_without_killing_in_flight_one() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let plan = SchedulePlan::interval(Duration::from_millis(30), true).unwrap();
        let task = ScheduledTask::new(plan, move |_cancel| {
            count2.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(80));
        })
        .unwrap();

        task.start().unwrap();
        thread::sleep(Duration::from_millis(20));
        task.stop().unwrap();
        let at_stop = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(200));
        let after = count.load(Ordering::SeqCst);
        task.dispose();

        assert_eq!(at_stop, after, "no fires should occur after stop()");
    }

    #[test]
    fn cancel_signals_the_running_task() {
        let observed = Arc::new(AtomicBool::new(false));
        let observed2 = observed.clone();
        let plan = SchedulePlan::interval(Duration::from_millis(20), true).unwrap();
        let task = ScheduledTask::new(plan, move |cancel| {
            thread::sleep(Duration::from_millis(100));
            if cancel.is_cancelled() {
                observed2.store(true, Ordering::SeqCst);
            }
        })
        .unwrap();

        task.start().unwrap();
        thread::sleep(Duration::from_millis(30));
        task.cancel().unwrap();
        thread::sleep(Duration::from_millis(150));
        task.dispose();

        assert!(observed.load(Ordering::SeqCst));
    }

    #[test]
    fn methods_fail_after_dispose() {
        let plan = SchedulePlan::interval(Duration::from_millis(50), false).unwrap();
        let task = ScheduledTask::new(plan, |_| {}).unwrap();
        task.start().unwrap();
        task.dispose();
        assert!(matches!(task.start(), Err(SchedulerError::Disposed)));
        assert!(matches!(task.stop(), Err(SchedulerError::Disposed)));
        assert!(matches!(task.trigger_now(), Err(SchedulerError::Disposed)));
    }

    #[test]
    fn start_is_idempotent() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let plan = SchedulePlan::interval(Duration::from_millis(500), false).unwrap();
        let task = ScheduledTask::new(plan, move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        task.start().unwrap();
        task.start().unwrap();
        task.start().unwrap();
        thread::sleep(Duration::from_millis(50));
        task.dispose();
        // No assertion on count: idempotency is about not spawning a second
        // thread, which a leaked-thread/panic-on-second-join would reveal.
    }

    #[test]
    fn panicking_action_does_not_kill_the_timer_thread() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let plan = SchedulePlan::interval(Duration::from_millis(30), true).unwrap();
        let task = ScheduledTask::new(plan, move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
            panic!("intentional test panic");
        })
        .unwrap();

        task.start().unwrap();
        thread::sleep(Duration::from_millis(150));
        task.dispose();

        assert!(count.load(Ordering::SeqCst) >= 2, "timer thread should survive panics and keep firing");
    }

    #[test]
    fn rejects_malformed_cron_expression() {
        let err = SchedulePlan::cron("not a cron expression").unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidCronExpression { .. }));
    }

    #[test]
    fn rejects_zero_interval() {
        let err = SchedulePlan::interval(Duration::ZERO, false).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidInterval(_)));
    }
}
