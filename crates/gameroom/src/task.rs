use quiz_core::Units;

/// A closed set of scheduled transitions.
///
/// `NONE` is the idle value: the runner treats a current task equal to it as
/// "nothing to do", and firing it is a silent no-op.
pub trait Task: Copy + Eq + std::fmt::Debug + Send + Sync + 'static {
    const NONE: Self;
    fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

/// Runs a task once its timer expires.
pub trait TaskExecutor<T>: Send + Sync {
    fn execute(&self, task: T, argument: i32);
}

impl<T, F> TaskExecutor<T> for F
where
    F: Fn(T, i32) + Send + Sync,
{
    fn execute(&self, task: T, argument: i32) {
        self(task, argument)
    }
}

/// A task preempted by a pause, with the time it still had left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Suspended<T> {
    pub task: T,
    pub argument: i32,
    pub remaining: Units,
}
