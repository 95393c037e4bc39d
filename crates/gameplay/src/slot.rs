use quiz_core::Position;

/// Handle to a tie group stored in the [`crate::Deleters`] arena.
///
/// Every slot holding the same handle sees the same live group, so resolving
/// or shrinking it through one slot is visible through all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TieId(usize);

impl TieId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }
    pub(crate) fn index(&self) -> usize {
        self.0
    }
}

/// One position in the deletion rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Resolved to a single player.
    Fixed(Position),
    /// Pending a tie-break among the members of a shared group.
    Tied(TieId),
}

impl Slot {
    /// The resolved player, if any.
    pub fn player(&self) -> Option<Position> {
        match self {
            Self::Fixed(p) => Some(*p),
            Self::Tied(_) => None,
        }
    }
    pub fn is_tied(&self) -> bool {
        matches!(self, Self::Tied(_))
    }
}
