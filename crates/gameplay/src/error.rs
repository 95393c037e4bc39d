use quiz_core::Position;

/// Misuse of the theme-deleter rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
    /// The cursor is not on a slot.
    NoCurrent,
    /// The current slot already names a single player.
    NotTied(Position),
    /// The chosen player does not contest the current tie.
    NotInTie(Position),
}

impl std::fmt::Display for SequenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoCurrent => write!(f, "no current deleter"),
            Self::NotTied(p) => write!(f, "current deleter is already P{}", p),
            Self::NotInTie(p) => write!(f, "P{} is not part of the current tie", p),
        }
    }
}

impl std::error::Error for SequenceError {}

/// Misuse of the staking tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StakeError {
    /// Staker index outside the live player list.
    OutOfRange { index: Position, len: usize },
    /// Nobody is currently obligated to bid.
    NoStaker,
    /// The bid is not allowed in the current state.
    Illegal(String),
}

impl std::fmt::Display for StakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfRange { index, len } => {
                write!(f, "staker index {} out of range for {} players", index, len)
            }
            Self::NoStaker => write!(f, "no current staker"),
            Self::Illegal(s) => write!(f, "illegal bid: {}", s),
        }
    }
}

impl std::error::Error for StakeError {}
