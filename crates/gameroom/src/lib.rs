//! Async runtime for live quiz sessions.
//!
//! Every participant connection is an ordered actor, and every timed
//! transition of a session runs through a resumable scheduler.
//!
//! ## Architecture
//!
//! - [`Client`]: Per-connection actor delivering messages to one handler, in order
//! - [`Node`]: Fan-out target a client attaches to and reports failures to
//! - [`Hub`]: In-memory node routing by receiver name
//! - [`TaskRunner`]: Single-timer scheduler with a stack of paused tasks
//!
//! ## Messages
//!
//! - [`Message`]: Immutable envelope between participants and the session
//! - [`MessageHandler`]: Trait for whatever consumes a client's queue
//! - [`TaskExecutor`]: Callback receiving fired tasks
mod client;
mod error;
mod handler;
mod hub;
mod message;
mod node;
mod runner;
mod task;
mod timer;

pub use client::*;
pub use error::*;
pub use handler::*;
pub use hub::*;
pub use message::*;
pub use node::*;
pub use runner::*;
pub use task::*;
pub use timer::*;
