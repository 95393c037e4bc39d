/// Misuse of the [`crate::TaskRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerError {
    /// Resume or update requested with nothing paused.
    NoSavedTask,
    /// The runner was disposed.
    Disposed,
}

impl std::fmt::Display for RunnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSavedTask => write!(f, "no saved task to resume"),
            Self::Disposed => write!(f, "task runner disposed"),
        }
    }
}

impl std::error::Error for RunnerError {}

/// Marks a handler failure as fatal rather than a warning.
#[derive(Debug)]
pub struct Fatal(pub String);

impl std::fmt::Display for Fatal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fatal: {}", self.0)
    }
}

impl std::error::Error for Fatal {}
