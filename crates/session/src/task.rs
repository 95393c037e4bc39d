use quiz_gameroom::Task;

/// Timed transitions of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameTask {
    None,
    /// The current deleter ran out of time.
    AskDelete,
    /// The current staker ran out of time.
    AskStake,
    /// Pause between deletions elapsed.
    MoveNext,
}

impl Task for GameTask {
    const NONE: Self = GameTask::None;
}

impl TryFrom<&str> for GameTask {
    type Error = anyhow::Error;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "none" => Ok(Self::None),
            "ask-delete" => Ok(Self::AskDelete),
            "ask-stake" => Ok(Self::AskStake),
            "move-next" => Ok(Self::MoveNext),
            _ => Err(anyhow::anyhow!("unknown task: {}", s)),
        }
    }
}

impl std::fmt::Display for GameTask {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::AskDelete => write!(f, "ask-delete"),
            Self::AskStake => write!(f, "ask-stake"),
            Self::MoveNext => write!(f, "move-next"),
        }
    }
}
