use quiz_core::Score;

/// A single decision while a stake question is auctioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub enum Bid {
    /// Take the question at its nominal price. Opening bid only.
    Nominal,
    /// Raise the stake to an exact amount.
    Sum(Score),
    /// Leave the auction.
    Pass,
    /// Stake the whole score.
    AllIn,
}

impl TryFrom<&str> for Bid {
    type Error = anyhow::Error;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim().to_lowercase().as_str() {
            "nominal" => Ok(Self::Nominal),
            "pass" => Ok(Self::Pass),
            "allin" | "all-in" => Ok(Self::AllIn),
            n => n
                .parse::<Score>()
                .map(Self::Sum)
                .map_err(|_| anyhow::anyhow!("unrecognized bid: {}", s)),
        }
    }
}

impl std::fmt::Display for Bid {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Nominal => write!(f, "nominal"),
            Self::Sum(n) => write!(f, "{}", n),
            Self::Pass => write!(f, "pass"),
            Self::AllIn => write!(f, "allin"),
        }
    }
}
