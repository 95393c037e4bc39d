//! Live quiz session built on the gameroom runtime.
//!
//! A [`Session`] is the message handler behind the session's own client. It
//! owns the seated accounts, the final-round deletion rotation and any stake
//! auction in progress, and drives every timeout through a
//! [`quiz_gameroom::TaskRunner`] whose fired tasks come back as messages on
//! the same queue, so game state only ever has one writer.
//!
//! ## Protocol
//!
//! Host: `FINAL`, `AUCTION <nominal> <first>`, `PICK <player>`, `PAUSE`, `RESUME`.
//! Players: `DELETE <theme>`, `STAKE nominal|pass|allin|<n>`, `LEAVE`.
mod config;
mod session;
mod task;

pub use config::*;
pub use session::*;
pub use task::*;
