use super::*;
use quiz_core::*;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::Weak;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Drives every time-gated transition of a session.
///
/// Holds exactly one current task, armed against a single tokio timer, plus a
/// stack of tasks preempted by [`TaskRunner::pause_execution`]. When the timer
/// expires the executor receives the task and its argument.
///
/// - One internal lock guards all timer state and is never held while the
///   executor runs
/// - Re-arming bumps a generation counter, so a stale timer fires as a no-op
/// - The timer task only holds a weak reference; dropping the runner stops it
/// - Must be armed from within a tokio runtime
pub struct TaskRunner<T: Task> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    firing: tokio::sync::Mutex<()>,
    executor: Box<dyn TaskExecutor<T>>,
    config: RunnerConfig,
}

struct State<T> {
    current: T,
    argument: i32,
    running: bool,
    pending: Units,
    planned: Instant,
    suspended: Vec<Suspended<T>>,
    generation: u64,
    timer: Option<JoinHandle<()>>,
    disposed: bool,
}

impl<T: Task> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Task> State<T> {
    fn disarm(&mut self) {
        self.running = false;
        self.generation += 1;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
    fn remaining(&self, now: Instant) -> Units {
        match self.running {
            true => units(self.planned.saturating_duration_since(now)),
            false => self.pending,
        }
    }
}

impl<T: Task> TaskRunner<T> {
    pub fn new(executor: impl TaskExecutor<T> + 'static) -> Self {
        Self::with_config(executor, RunnerConfig::default())
    }
    pub fn with_config(executor: impl TaskExecutor<T> + 'static, config: RunnerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    current: T::NONE,
                    argument: 0,
                    running: false,
                    pending: 0,
                    planned: Instant::now(),
                    suspended: Vec::new(),
                    generation: 0,
                    timer: None,
                    disposed: false,
                }),
                firing: tokio::sync::Mutex::new(()),
                executor: Box::new(executor),
                config,
            }),
        }
    }
    pub fn config(&self) -> &RunnerConfig {
        &self.inner.config
    }
}

impl<T: Task> TaskRunner<T> {
    /// Makes `task` current. Unarmed, it only remembers `delay` for a later
    /// pause; armed, it fires after `delay` units, capped at the ceiling.
    pub fn schedule_execution(&self, task: T, delay: Units, argument: i32, arm: bool) {
        let now = Instant::now();
        let mut state = self.inner.lock();
        self.schedule(&mut state, task, delay, argument, arm, now);
    }
    /// Suspends the current timer and pushes `task` with whatever time it had
    /// left. Pauses nest.
    pub fn pause_execution(&self, task: T, argument: i32) {
        let now = Instant::now();
        let mut state = self.inner.lock();
        if state.disposed {
            return;
        }
        let remaining = state.remaining(now);
        state.suspended.push(Suspended {
            task,
            argument,
            remaining,
        });
        state.disarm();
        state.current = T::NONE;
        state.pending = 0;
        log::debug!("[runner] paused {:?}({}) with {} left", task, argument, remaining);
    }
    /// Reschedules the most recently paused task, for `explicit` units when
    /// given and positive, otherwise for its saved time but at least one unit.
    /// Returns the units used.
    pub fn resume_execution(&self, explicit: Option<Units>, arm: bool) -> Result<Units, RunnerError> {
        let now = Instant::now();
        let mut state = self.inner.lock();
        if state.disposed {
            return Err(RunnerError::Disposed);
        }
        let saved = state.suspended.pop().ok_or(RunnerError::NoSavedTask)?;
        let delay = explicit
            .filter(|&units| units > 0)
            .unwrap_or(saved.remaining.max(1));
        log::debug!("[runner] resuming {:?}({}) in {}", saved.task, saved.argument, delay);
        self.schedule(&mut state, saved.task, delay, saved.argument, arm, now);
        Ok(delay)
    }
    /// Replaces the most recently paused entry.
    pub fn update_paused_task(&self, task: T, argument: i32, remaining: Units) -> Result<(), RunnerError> {
        let mut state = self.inner.lock();
        let top = state.suspended.last_mut().ok_or(RunnerError::NoSavedTask)?;
        *top = Suspended {
            task,
            argument,
            remaining,
        };
        Ok(())
    }
    /// Fires the current task after a short fixed delay.
    pub fn execute_immediate(&self) {
        let now = Instant::now();
        let mut state = self.inner.lock();
        if state.disposed || state.current.is_none() {
            return;
        }
        let delay = self.inner.config.immediate;
        self.arm(&mut state, delay, now);
    }
    pub fn clear_old_tasks(&self) {
        self.inner.lock().suspended.clear();
    }
    /// Drops the current task without firing it.
    pub fn stop(&self) {
        let mut state = self.inner.lock();
        state.disarm();
        state.current = T::NONE;
        state.pending = 0;
    }
    /// Disarms, forgets every task, and waits for an in-flight fire to finish,
    /// for at most the configured deadline. The executor is not called again
    /// once this returns.
    pub async fn dispose(&self) {
        {
            let mut state = self.inner.lock();
            if !state.disposed {
                log::debug!("[runner] disposing");
            }
            state.disposed = true;
            state.disarm();
            state.current = T::NONE;
            state.pending = 0;
            state.suspended.clear();
        }
        let deadline = self.inner.config.dispose_deadline;
        if tokio::time::timeout(deadline, self.inner.firing.lock())
            .await
            .is_err()
        {
            log::warn!("[runner] in-flight task outlived dispose deadline");
        }
    }
}

impl<T: Task> TaskRunner<T> {
    pub fn current_task(&self) -> T {
        self.inner.lock().current
    }
    pub fn argument(&self) -> i32 {
        self.inner.lock().argument
    }
    pub fn is_running(&self) -> bool {
        self.inner.lock().running
    }
    pub fn is_disposed(&self) -> bool {
        self.inner.lock().disposed
    }
    /// Units left on the armed timer, or the remembered delay when unarmed.
    pub fn remaining_units(&self) -> Units {
        let now = Instant::now();
        self.inner.lock().remaining(now)
    }
    pub fn suspended_len(&self) -> usize {
        self.inner.lock().suspended.len()
    }
    pub fn peek_suspended(&self) -> Option<Suspended<T>> {
        self.inner.lock().suspended.last().copied()
    }
}

impl<T: Task> TaskRunner<T> {
    fn schedule(&self, state: &mut State<T>, task: T, delay: Units, argument: i32, arm: bool, now: Instant) {
        if state.disposed {
            log::trace!("[runner] disposed, ignoring {:?}", task);
            return;
        }
        state.current = task;
        state.argument = argument;
        match arm {
            false => {
                state.disarm();
                state.pending = delay;
            }
            true => {
                let delay = delay.min(self.inner.config.ceiling);
                state.pending = delay;
                self.arm(state, span(delay), now);
            }
        }
        log::trace!("[runner] scheduled {:?}({}) in {} armed={}", task, argument, delay, arm);
    }
    fn arm(&self, state: &mut State<T>, delay: Duration, now: Instant) {
        state.disarm();
        state.running = true;
        state.planned = now + delay;
        let planned = state.planned;
        let generation = state.generation;
        let inner = Arc::downgrade(&self.inner);
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(planned).await;
            fire(inner, generation).await;
        }));
    }
}

async fn fire<T: Task>(inner: Weak<Inner<T>>, generation: u64) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let _firing = inner.firing.lock().await;
    let (task, argument) = {
        let mut state = inner.lock();
        if state.disposed || state.generation != generation || !state.running {
            return;
        }
        state.running = false;
        state.pending = 0;
        state.timer = None;
        let task = std::mem::replace(&mut state.current, T::NONE);
        (task, state.argument)
    };
    if task.is_none() {
        return;
    }
    log::debug!("[runner] firing {:?}({})", task, argument);
    inner.executor.execute(task, argument);
}

impl<T: Task> Drop for TaskRunner<T> {
    fn drop(&mut self) {
        self.inner.lock().disarm();
    }
}

impl<T: Task> std::fmt::Debug for TaskRunner<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("TaskRunner")
            .field("current", &state.current)
            .field("argument", &state.argument)
            .field("running", &state.running)
            .field("suspended", &state.suspended)
            .field("disposed", &state.disposed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Step {
        Idle,
        Ask,
        Move,
    }

    impl Task for Step {
        const NONE: Self = Step::Idle;
    }

    type Log = Arc<Mutex<Vec<(Step, i32)>>>;

    fn runner() -> (TaskRunner<Step>, Log) {
        runner_with(RunnerConfig::default())
    }
    fn runner_with(config: RunnerConfig) -> (TaskRunner<Step>, Log) {
        let fired = Log::default();
        let sink = fired.clone();
        let executor = move |task: Step, argument: i32| sink.lock().unwrap().push((task, argument));
        (TaskRunner::with_config(executor, config), fired)
    }
    fn fired(log: &Log) -> Vec<(Step, i32)> {
        log.lock().unwrap().clone()
    }
    async fn sleep(millis: u64) {
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let (runner, log) = runner();
        runner.schedule_execution(Step::Ask, 5, 7, true);
        assert!(runner.is_running());
        assert_eq!(runner.current_task(), Step::Ask);
        sleep(450).await;
        assert!(fired(&log).is_empty());
        sleep(100).await;
        assert_eq!(fired(&log), vec![(Step::Ask, 7)]);
        assert!(!runner.is_running());
        assert_eq!(runner.current_task(), Step::Idle);
    }
    #[tokio::test(start_paused = true)]
    async fn pause_keeps_remaining_time() {
        let (runner, log) = runner();
        runner.schedule_execution(Step::Ask, 50, 1, true);
        sleep(2050).await;
        runner.pause_execution(Step::Ask, 1);
        assert!(!runner.is_running());
        assert_eq!(runner.current_task(), Step::Idle);
        assert_eq!(
            runner.peek_suspended(),
            Some(Suspended {
                task: Step::Ask,
                argument: 1,
                remaining: 29
            })
        );
        sleep(10_000).await;
        assert!(fired(&log).is_empty());
        assert_eq!(runner.resume_execution(None, true), Ok(29));
        sleep(2850).await;
        assert!(fired(&log).is_empty());
        sleep(100).await;
        assert_eq!(fired(&log), vec![(Step::Ask, 1)]);
    }
    #[tokio::test(start_paused = true)]
    async fn pauses_nest_last_in_first_out() {
        let (runner, log) = runner();
        runner.schedule_execution(Step::Ask, 50, 1, true);
        sleep(1050).await;
        runner.pause_execution(Step::Ask, 1);
        runner.schedule_execution(Step::Move, 20, 2, true);
        sleep(550).await;
        runner.pause_execution(Step::Move, 2);
        assert_eq!(runner.suspended_len(), 2);
        assert_eq!(runner.resume_execution(None, true), Ok(14));
        assert_eq!(runner.peek_suspended().map(|s| s.remaining), Some(39));
        sleep(1450).await;
        assert_eq!(fired(&log), vec![(Step::Move, 2)]);
        assert_eq!(runner.resume_execution(None, true), Ok(39));
        sleep(3950).await;
        assert_eq!(fired(&log), vec![(Step::Move, 2), (Step::Ask, 1)]);
    }
    #[tokio::test(start_paused = true)]
    async fn nothing_to_resume() {
        let (runner, _) = runner();
        assert_eq!(runner.resume_execution(None, true), Err(RunnerError::NoSavedTask));
        assert_eq!(
            runner.update_paused_task(Step::Ask, 0, 5),
            Err(RunnerError::NoSavedTask)
        );
    }
    #[tokio::test(start_paused = true)]
    async fn resume_uses_explicit_or_at_least_one_unit() {
        let (runner, _) = runner();
        runner.schedule_execution(Step::Ask, 10, 0, true);
        sleep(950).await;
        runner.pause_execution(Step::Ask, 0);
        assert_eq!(runner.peek_suspended().map(|s| s.remaining), Some(0));
        assert_eq!(runner.resume_execution(None, true), Ok(1));
        runner.pause_execution(Step::Ask, 0);
        assert_eq!(runner.resume_execution(Some(0), true), Ok(1));
        runner.pause_execution(Step::Ask, 0);
        assert_eq!(runner.resume_execution(Some(25), true), Ok(25));
        assert_eq!(runner.remaining_units(), 25);
    }
    #[tokio::test(start_paused = true)]
    async fn arm_is_capped_at_ceiling() {
        let config = RunnerConfig {
            ceiling: 10,
            ..RunnerConfig::default()
        };
        let (runner, log) = runner_with(config);
        runner.schedule_execution(Step::Ask, 50, 3, true);
        assert_eq!(runner.remaining_units(), 10);
        sleep(1050).await;
        assert_eq!(fired(&log), vec![(Step::Ask, 3)]);
    }
    #[tokio::test(start_paused = true)]
    async fn unarmed_schedule_remembers_delay() {
        let (runner, log) = runner();
        runner.schedule_execution(Step::Ask, 40, 3, false);
        assert!(!runner.is_running());
        assert_eq!(runner.remaining_units(), 40);
        sleep(10_000).await;
        assert!(fired(&log).is_empty());
        runner.pause_execution(Step::Ask, 3);
        assert_eq!(runner.peek_suspended().map(|s| s.remaining), Some(40));
        assert_eq!(runner.resume_execution(None, true), Ok(40));
        assert!(runner.is_running());
    }
    #[tokio::test(start_paused = true)]
    async fn update_replaces_top_entry() {
        let (runner, log) = runner();
        runner.schedule_execution(Step::Ask, 30, 1, true);
        runner.pause_execution(Step::Ask, 1);
        assert_eq!(runner.update_paused_task(Step::Move, 9, 5), Ok(()));
        assert_eq!(runner.resume_execution(None, true), Ok(5));
        sleep(550).await;
        assert_eq!(fired(&log), vec![(Step::Move, 9)]);
    }
    #[tokio::test(start_paused = true)]
    async fn execute_immediate_fires_current_task_soon() {
        let (runner, log) = runner();
        runner.schedule_execution(Step::Ask, 100, 4, true);
        runner.execute_immediate();
        sleep(50).await;
        assert_eq!(fired(&log), vec![(Step::Ask, 4)]);
        runner.execute_immediate();
        assert!(!runner.is_running());
    }
    #[tokio::test(start_paused = true)]
    async fn none_task_is_silent() {
        let (runner, log) = runner();
        runner.schedule_execution(Step::Idle, 1, 0, true);
        sleep(200).await;
        assert!(fired(&log).is_empty());
    }
    #[tokio::test(start_paused = true)]
    async fn stop_cancels_without_firing() {
        let (runner, log) = runner();
        runner.schedule_execution(Step::Ask, 5, 0, true);
        runner.stop();
        sleep(1000).await;
        assert!(fired(&log).is_empty());
        assert_eq!(runner.current_task(), Step::Idle);
    }
    #[tokio::test(start_paused = true)]
    async fn rearm_replaces_previous_timer() {
        let (runner, log) = runner();
        runner.schedule_execution(Step::Ask, 10, 1, true);
        runner.schedule_execution(Step::Move, 20, 2, true);
        sleep(3000).await;
        assert_eq!(fired(&log), vec![(Step::Move, 2)]);
    }
    #[tokio::test(start_paused = true)]
    async fn clear_drops_suspended() {
        let (runner, _) = runner();
        runner.schedule_execution(Step::Ask, 10, 1, true);
        runner.pause_execution(Step::Ask, 1);
        runner.pause_execution(Step::Move, 2);
        assert_eq!(runner.suspended_len(), 2);
        runner.clear_old_tasks();
        assert_eq!(runner.suspended_len(), 0);
    }
    #[tokio::test(start_paused = true)]
    async fn nothing_fires_after_dispose() {
        let (runner, log) = runner();
        runner.schedule_execution(Step::Ask, 5, 0, true);
        runner.dispose().await;
        runner.dispose().await;
        assert!(runner.is_disposed());
        runner.schedule_execution(Step::Move, 1, 0, true);
        assert!(!runner.is_running());
        assert_eq!(runner.resume_execution(None, true), Err(RunnerError::Disposed));
        sleep(1000).await;
        assert!(fired(&log).is_empty());
    }
    #[tokio::test(start_paused = true)]
    async fn dropping_runner_stops_timer() {
        let (runner, log) = runner();
        runner.schedule_execution(Step::Ask, 5, 0, true);
        drop(runner);
        sleep(1000).await;
        assert!(fired(&log).is_empty());
    }
    /// Executor that marks entry and exit around a blocking pause.
    fn blocking(config: RunnerConfig, hold: Duration) -> (TaskRunner<Step>, Arc<[AtomicUsize; 2]>) {
        let counts = Arc::new([AtomicUsize::new(0), AtomicUsize::new(0)]);
        let sink = counts.clone();
        let executor = move |_: Step, _: i32| {
            sink[0].fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(hold);
            sink[1].fetch_add(1, Ordering::SeqCst);
        };
        (TaskRunner::with_config(executor, config), counts)
    }
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn dispose_waits_for_inflight_fire() {
        for _ in 0..200 {
            let (runner, counts) = blocking(RunnerConfig::default(), Duration::from_millis(2));
            runner.schedule_execution(Step::Ask, 0, 0, true);
            tokio::task::yield_now().await;
            runner.dispose().await;
            let entered = counts[0].load(Ordering::SeqCst);
            assert_eq!(counts[1].load(Ordering::SeqCst), entered);
            runner.schedule_execution(Step::Move, 0, 0, true);
            runner.execute_immediate();
            tokio::time::sleep(Duration::from_millis(5)).await;
            assert_eq!(counts[0].load(Ordering::SeqCst), entered);
        }
    }
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn dispose_deadline_bounds_the_wait() {
        let config = RunnerConfig {
            dispose_deadline: Duration::from_millis(10),
            ..RunnerConfig::default()
        };
        let (runner, counts) = blocking(config, Duration::from_millis(300));
        runner.schedule_execution(Step::Ask, 0, 0, true);
        tokio::time::timeout(Duration::from_secs(5), async {
            while counts[0].load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("executor entered");
        let started = std::time::Instant::now();
        runner.dispose().await;
        assert!(started.elapsed() < Duration::from_millis(300));
        assert_eq!(counts[1].load(Ordering::SeqCst), 0);
        runner.schedule_execution(Step::Move, 0, 0, true);
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(counts[0].load(Ordering::SeqCst), 1);
        assert_eq!(counts[1].load(Ordering::SeqCst), 1);
    }
}
