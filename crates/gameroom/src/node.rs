use super::*;
use std::sync::Arc;

/// Fan-out target a [`Client`] attaches to.
///
/// A node keeps only non-owning registrations: the connection layer that
/// created a client stays its sole owner.
pub trait Node: Send + Sync {
    /// Makes `client` addressable as a message destination.
    fn register(&self, client: &Arc<Client>);
    /// Receives a failure raised while a client handled a message.
    fn report_error(&self, error: &anyhow::Error, is_warning: bool);
    /// Routes an outbound message to its receiver(s).
    fn dispatch(&self, message: Message);
}
