//! Turn sequencing for live quiz rounds.
//!
//! Both structures here are plain in-memory state with a single writer: the
//! session handler that the gameroom actor serializes into. Neither locks.
//!
//! ## Players
//!
//! - [`Account`]: Score and participation flags the sequencers read
//!
//! ## Final Round
//!
//! - [`Deleters`]: Who deletes the next theme, with tied players sharing slots
//! - [`Slot`]: One position in that rotation, fixed or pending a tie-break
//! - [`TieId`]: Handle to a shared tie group
//!
//! ## Stake Questions
//!
//! - [`Stakes`]: Who must bid next, and who currently leads
//! - [`Bid`]: A single bidding decision
//!
//! ## Errors
//!
//! - [`SequenceError`]: Misuse of the deleter rotation
//! - [`StakeError`]: Misuse of the staking tracker
mod account;
mod bid;
mod deleters;
mod error;
mod slot;
mod stakes;

pub use account::*;
pub use bid::*;
pub use deleters::*;
pub use error::*;
pub use slot::*;
pub use stakes::*;
