use quiz_core::*;
use std::time::Duration;

/// Timing parameters for a [`crate::TaskRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Longest single arm, in units.
    pub ceiling: Units,
    /// Delay used by `execute_immediate`.
    pub immediate: Duration,
    /// How long disposal waits for an in-flight fire.
    pub dispose_deadline: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            ceiling: TIMER_CEILING,
            immediate: IMMEDIATE_DELAY,
            dispose_deadline: DISPOSE_DEADLINE,
        }
    }
}

impl RunnerConfig {
    /// Reads `QUIZ_TIMER_CEILING` (units) and `QUIZ_DISPOSE_DEADLINE`
    /// (e.g. `500ms`, `2s`), falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }
    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();
        let ceiling = get("QUIZ_TIMER_CEILING")
            .and_then(|s| s.trim().parse::<Units>().ok())
            .filter(|&units| units > 0)
            .unwrap_or(default.ceiling);
        let dispose_deadline = get("QUIZ_DISPOSE_DEADLINE")
            .and_then(|s| parse_duration(&s))
            .unwrap_or(default.dispose_deadline);
        Self {
            ceiling,
            dispose_deadline,
            ..default
        }
    }
}
