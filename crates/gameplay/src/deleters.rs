use super::*;
use quiz_core::Position;
use std::collections::BTreeSet;

/// Rotation of players deleting themes before the final question.
///
/// Holds one [`Slot`] per eligible player. Players with equal scores cannot be
/// ordered among themselves until the host breaks the tie, so they share one
/// tie group and each contributes a [`Slot::Tied`] pointing at it. The group
/// shrinks as ties are resolved or members leave.
///
/// # Invariant
///
/// For every tie group, the number of slots referencing it equals its size.
///
/// # Rotation
///
/// Eligible players are ranked by descending score into a base order `D` of
/// length `L`. With `t` themes on the board there are `t - 1` deletions, and
/// the leader must make the last one, so slot `j` holds `D[(t - 2 - j) mod L]`.
#[derive(Debug, Clone, Default)]
pub struct Deleters {
    slots: Vec<Slot>,
    ties: Vec<BTreeSet<Position>>,
    visited: usize,
}

impl Deleters {
    pub fn new(players: &[crate::Account], themes: usize) -> Self {
        let mut deleters = Self::default();
        deleters.reset(players, themes);
        deleters
    }
    /// Rebuilds the rotation for the current standings and theme count.
    pub fn reset(&mut self, players: &[crate::Account], themes: usize) {
        self.slots.clear();
        self.ties.clear();
        self.visited = 0;
        let order = self.ranking(players);
        let n = order.len() as i64;
        if n > 0 {
            self.slots = (0..n)
                .map(|j| (themes as i64 - 2 - j).rem_euclid(n) as usize)
                .map(|i| order[i])
                .collect();
        }
        log::debug!("[deleters] {} themes: {}", themes, self);
    }
    /// Restarts the cursor without touching the slots.
    pub fn rewind(&mut self) {
        self.visited = 0;
    }
    /// Appends a slot resolved to `player`.
    pub fn push_fixed(&mut self, player: Position) -> &mut Self {
        self.slots.push(Slot::Fixed(player));
        self
    }
    /// Appends a new tie group and one slot per member.
    pub fn push_tied<I>(&mut self, members: I) -> TieId
    where
        I: IntoIterator<Item = Position>,
    {
        let id = self.tie(members);
        let n = self.ties[id.index()].len();
        self.slots.extend(std::iter::repeat_n(Slot::Tied(id), n));
        id
    }
}

impl Deleters {
    /// Advances the cursor; false once every slot has been visited.
    pub fn move_next(&mut self) -> bool {
        if self.visited < self.slots.len() {
            self.visited += 1;
            true
        } else {
            self.visited = self.slots.len() + 1;
            false
        }
    }
    pub fn current(&self) -> Option<Slot> {
        self.cursor().map(|i| self.slots[i])
    }
    /// The current deleter, if the current slot is resolved.
    pub fn player(&self) -> Option<Position> {
        self.current().and_then(|slot| slot.player())
    }
    /// Players contesting the current slot, if it is still tied.
    pub fn candidates(&self) -> Option<&BTreeSet<Position>> {
        match self.current()? {
            Slot::Tied(id) => Some(self.members(id)),
            Slot::Fixed(_) => None,
        }
    }
    pub fn members(&self, id: TieId) -> &BTreeSet<Position> {
        &self.ties[id.index()]
    }
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }
    /// Resolved player per slot, `None` where a tie is pending.
    pub fn order(&self) -> Vec<Option<Position>> {
        self.slots.iter().map(Slot::player).collect()
    }
    pub fn len(&self) -> usize {
        self.slots.len()
    }
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
    /// Checks the slot-count-per-group invariant.
    pub fn is_consistent(&self) -> bool {
        self.ties.iter().enumerate().all(|(i, group)| {
            self.slots
                .iter()
                .filter(|slot| **slot == Slot::Tied(TieId::new(i)))
                .count()
                == group.len()
        })
    }
}

impl Deleters {
    /// Resolves the current tied slot to `chosen`.
    ///
    /// `chosen` leaves the shared group, so every other slot aliasing the
    /// group sees one fewer candidate; only the current slot becomes fixed.
    pub fn set_index(&mut self, chosen: Position) -> Result<(), SequenceError> {
        let cursor = self.cursor().ok_or(SequenceError::NoCurrent)?;
        let id = match self.slots[cursor] {
            Slot::Fixed(p) => return Err(SequenceError::NotTied(p)),
            Slot::Tied(id) => id,
        };
        if !self.ties[id.index()].remove(&chosen) {
            return Err(SequenceError::NotInTie(chosen));
        }
        self.slots[cursor] = Slot::Fixed(chosen);
        log::debug!("[deleters] tie resolved to P{}: {}", chosen, self);
        Ok(())
    }
    /// Removes `player` from the rotation and shifts higher indices down.
    ///
    /// Returns whether the player held a slot. A tied player takes one slot
    /// of its group with it, preferring one not yet visited.
    ///
    /// Removing a visited slot steps the cursor back one slot, so `current`
    /// reports the slot visited before it until the next `move_next` lands
    /// on the slot that followed the removed one.
    pub fn remove_at(&mut self, player: Position) -> bool {
        let removed = self
            .slots
            .iter()
            .position(|slot| *slot == Slot::Fixed(player))
            .or_else(|| self.untie(player));
        if let Some(k) = removed {
            self.slots.remove(k);
            if k < self.visited {
                self.visited -= 1;
            }
        }
        self.renumber(player);
        debug_assert!(self.is_consistent());
        log::debug!("[deleters] removed P{}: {}", player, self);
        removed.is_some()
    }
}

impl Deleters {
    fn cursor(&self) -> Option<usize> {
        self.visited
            .checked_sub(1)
            .filter(|&i| i < self.slots.len())
    }
    fn tie<I>(&mut self, members: I) -> TieId
    where
        I: IntoIterator<Item = Position>,
    {
        self.ties.push(members.into_iter().collect());
        TieId::new(self.ties.len() - 1)
    }
    fn ranking(&mut self, players: &[crate::Account]) -> Vec<Slot> {
        let mut eligible = players
            .iter()
            .enumerate()
            .filter(|(_, account)| account.is_eligible())
            .map(|(i, account)| (i, account.sum()))
            .collect::<Vec<_>>();
        eligible.sort_by(|a, b| b.1.cmp(&a.1));
        let mut order = Vec::with_capacity(eligible.len());
        for group in eligible.chunk_by(|a, b| a.1 == b.1) {
            match group {
                [(p, _)] => order.push(Slot::Fixed(*p)),
                _ => {
                    let id = self.tie(group.iter().map(|(p, _)| *p));
                    order.extend(std::iter::repeat_n(Slot::Tied(id), group.len()));
                }
            }
        }
        order
    }
    fn untie(&mut self, player: Position) -> Option<usize> {
        let id = self
            .ties
            .iter_mut()
            .position(|group| group.remove(&player))
            .map(TieId::new)?;
        let start = self.visited.min(self.slots.len());
        let refers = |slot: &Slot| *slot == Slot::Tied(id);
        self.slots[start..]
            .iter()
            .rposition(refers)
            .map(|k| k + start)
            .or_else(|| self.slots.iter().rposition(refers))
    }
    fn renumber(&mut self, player: Position) {
        for slot in self.slots.iter_mut() {
            if let Slot::Fixed(p) = slot {
                if *p > player {
                    *p -= 1;
                }
            }
        }
        for group in self.ties.iter_mut() {
            *group = std::mem::take(group)
                .into_iter()
                .map(|m| if m > player { m - 1 } else { m })
                .collect();
        }
    }
}

impl std::fmt::Display for Deleters {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let slots = self
            .slots
            .iter()
            .map(|slot| match slot {
                Slot::Fixed(p) => p.to_string(),
                Slot::Tied(id) => format!(
                    "({})",
                    self.members(*id)
                        .iter()
                        .map(|m| m.to_string())
                        .collect::<Vec<_>>()
                        .join(",")
                ),
            })
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "[{}]", slots)
    }
}
