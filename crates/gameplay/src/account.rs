use quiz_core::Score;

/// A seated player as seen by the turn sequencers.
///
/// `in_game` decides eligibility for the round; `stake_making` is only
/// meaningful while a stake question is being auctioned.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub struct Account {
    name: String,
    sum: Score,
    in_game: bool,
    stake_making: bool,
}

impl Account {
    pub fn new(name: impl Into<String>, sum: Score) -> Self {
        Self {
            name: name.into(),
            sum,
            in_game: true,
            stake_making: false,
        }
    }
    /// Same account, excluded from the current round.
    pub fn benched(self) -> Self {
        Self {
            in_game: false,
            ..self
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn sum(&self) -> Score {
        self.sum
    }
    pub fn in_game(&self) -> bool {
        self.in_game
    }
    pub fn stake_making(&self) -> bool {
        self.stake_making
    }
    /// Still allowed to take part in the current round.
    pub fn is_eligible(&self) -> bool {
        self.in_game
    }
    pub fn set_sum(&mut self, sum: Score) {
        self.sum = sum;
    }
    pub fn set_in_game(&mut self, in_game: bool) {
        self.in_game = in_game;
    }
    pub fn set_stake_making(&mut self, stake_making: bool) {
        self.stake_making = stake_making;
    }
}

impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn new_account_is_eligible() {
        let account = Account::new("alice", 300);
        assert!(account.is_eligible());
        assert!(!account.stake_making());
        assert_eq!(account.to_string(), "alice (300)");
    }
    #[test]
    fn benched_account_is_not_eligible() {
        let account = Account::new("bob", -60).benched();
        assert!(!account.is_eligible());
        assert_eq!(account.sum(), -60);
    }
}
