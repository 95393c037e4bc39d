use super::*;
use quiz_core::Position;
use quiz_core::Score;

/// Who must bid next on a stake question, and who currently leads.
///
/// The tracker never owns the player list: every operation borrows the live
/// list so indices are checked against what is actually seated. `None` for
/// the staker means nobody is obligated right now, pending the host's choice
/// or because the auction is over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stakes {
    staker: Option<Position>,
    leader: Option<Position>,
    nominal: Score,
    stake: Score,
    all_in: bool,
}

impl Stakes {
    /// Opens an auction at `nominal`, starting from `first` or the next
    /// stake-making player after it.
    pub fn begin(
        players: &mut [Account],
        nominal: Score,
        first: Position,
    ) -> Result<Self, StakeError> {
        if first >= players.len() {
            return Err(StakeError::OutOfRange {
                index: first,
                len: players.len(),
            });
        }
        for account in players.iter_mut() {
            account.set_stake_making(account.is_eligible());
        }
        let mut stakes = Self {
            nominal,
            stake: nominal,
            ..Self::default()
        };
        stakes.staker = match players[first].stake_making() {
            true => Some(first),
            false => stakes.after(players, first),
        };
        log::debug!("[stakes] auction opens at {} with {:?}", nominal, stakes.staker);
        Ok(stakes)
    }
    pub fn staker(&self) -> Option<Position> {
        self.staker
    }
    pub fn leader(&self) -> Option<Position> {
        self.leader
    }
    pub fn stake(&self) -> Score {
        self.stake
    }
    pub fn nominal(&self) -> Score {
        self.nominal
    }
    pub fn is_all_in(&self) -> bool {
        self.all_in
    }
    /// Auction is over once at most one player is still bidding.
    pub fn is_finished(&self, players: &[Account]) -> bool {
        players.iter().filter(|a| a.stake_making()).count() <= 1
    }
    /// The leading bidder once the auction is over.
    pub fn winner(&self, players: &[Account]) -> Option<Position> {
        self.is_finished(players).then_some(self.leader).flatten()
    }
}

impl Stakes {
    /// Sets the staker directly, e.g. when the host picks one.
    pub fn reset(&mut self, players: &[Account], staker: Option<Position>) -> Result<(), StakeError> {
        match staker {
            Some(index) if index >= players.len() => Err(StakeError::OutOfRange {
                index,
                len: players.len(),
            }),
            _ => {
                self.staker = staker;
                Ok(())
            }
        }
    }
    /// Renumbers after `dropped` left; `players` no longer contains it.
    /// Returns whether the staker or leader changed. A departing leader
    /// leaves its stake standing.
    pub fn handle_player_drop(&mut self, players: &[Account], dropped: Position) -> bool {
        let led = match self.leader {
            Some(l) if l > dropped => {
                self.leader = Some(l - 1);
                true
            }
            Some(l) if l == dropped => {
                self.leader = None;
                true
            }
            _ => false,
        };
        let staked = match self.staker {
            Some(s) if s > dropped => {
                self.staker = Some(s - 1);
                true
            }
            Some(s) if s == dropped => {
                self.drop_current_staker(players);
                true
            }
            _ => false,
        };
        led || staked
    }
    /// The staker left: the sole remaining bidder takes over, otherwise
    /// nobody does until the host decides.
    pub fn drop_current_staker(&mut self, players: &[Account]) {
        let mut bidders = players
            .iter()
            .enumerate()
            .filter(|(_, a)| a.stake_making())
            .map(|(i, _)| i);
        self.staker = match (bidders.next(), bidders.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        };
        log::debug!("[stakes] staker dropped, now {:?}", self.staker);
    }
}

impl Stakes {
    /// Whether the current staker may make `bid`.
    pub fn allows(&self, players: &[Account], bid: Bid) -> bool {
        let Some(account) = self.staker.and_then(|s| players.get(s)) else {
            return false;
        };
        if !account.stake_making() {
            return false;
        }
        match bid {
            Bid::Nominal => self.is_opening(),
            Bid::Sum(n) => !self.all_in && n > self.stake && n <= account.sum(),
            Bid::Pass => !self.is_opening() && self.leader != self.staker,
            Bid::AllIn => {
                account.sum() > self.stake || (self.is_opening() && account.sum() >= self.stake)
            }
        }
    }
    /// Nobody has raised yet. A stake left behind by a departed leader
    /// still counts as raised.
    fn is_opening(&self) -> bool {
        self.leader.is_none() && self.stake == self.nominal && !self.all_in
    }
    /// Bids the current staker may make, with the smallest legal raise.
    pub fn legal(&self, players: &[Account]) -> Vec<Bid> {
        [Bid::Nominal, Bid::Sum(self.stake + 1), Bid::Pass, Bid::AllIn]
            .into_iter()
            .filter(|bid| self.allows(players, *bid))
            .collect()
    }
    /// Records the current staker's bid and moves the obligation on.
    pub fn apply(&mut self, players: &mut [Account], bid: Bid) -> Result<(), StakeError> {
        let staker = self.staker.ok_or(StakeError::NoStaker)?;
        if !self.allows(players, bid) {
            return Err(StakeError::Illegal(format!("P{} cannot bid {}", staker, bid)));
        }
        match bid {
            Bid::Nominal => self.lead(staker, self.nominal),
            Bid::Sum(n) => self.lead(staker, n),
            Bid::Pass => players[staker].set_stake_making(false),
            Bid::AllIn => {
                self.lead(staker, players[staker].sum());
                self.all_in = true;
                players
                    .iter_mut()
                    .enumerate()
                    .filter(|(i, a)| *i != staker && a.sum() <= self.stake)
                    .for_each(|(_, a)| a.set_stake_making(false));
            }
        }
        log::debug!("[stakes] P{} bids {} (stake {})", staker, bid, self.stake);
        self.advance(players);
        Ok(())
    }
    /// Passes the obligation to the next bidder in seating order.
    pub fn advance(&mut self, players: &[Account]) {
        if self.is_finished(players) {
            if self.leader.is_none() {
                self.leader = players.iter().position(|a| a.stake_making());
            }
            self.staker = None;
            log::debug!("[stakes] auction won by {:?} at {}", self.leader, self.stake);
            return;
        }
        self.staker = self.after(players, self.staker.unwrap_or(players.len() - 1));
    }
    fn lead(&mut self, staker: Position, stake: Score) {
        self.leader = Some(staker);
        self.stake = stake;
    }
    fn after(&self, players: &[Account], from: Position) -> Option<Position> {
        let n = players.len();
        (1..=n)
            .map(|k| (from + k) % n)
            .find(|&i| players[i].stake_making())
    }
}
