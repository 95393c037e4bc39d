use quiz_core::*;
use quiz_gameroom::RunnerConfig;

/// Timeouts and roles for a [`crate::Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Units a deleter gets before a theme is deleted for them.
    pub delete_timeout: Units,
    /// Units a staker gets before bidding for them.
    pub stake_timeout: Units,
    /// Units between a deletion and the next turn.
    pub advance_delay: Units,
    /// Client name allowed to run the game.
    pub host: String,
    pub runner: RunnerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            delete_timeout: DELETE_TIMEOUT,
            stake_timeout: STAKE_TIMEOUT,
            advance_delay: ADVANCE_DELAY,
            host: "host".to_string(),
            runner: RunnerConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Defaults, with scheduler overrides read from the environment.
    pub fn from_env() -> Self {
        Self {
            runner: RunnerConfig::from_env(),
            ..Self::default()
        }
    }
}
