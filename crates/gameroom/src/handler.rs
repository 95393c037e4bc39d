use super::*;
use tokio::sync::mpsc::UnboundedSender;

/// Consumer of a client's inbound queue.
///
/// The owning [`Client`] awaits each call before starting the next one, so an
/// implementation never sees two messages at once and needs no locking of its
/// own. Returning an error reports it to the attached [`Node`] and moves on to
/// the next message; wrap it in [`Fatal`] to flag it as more than a warning.
#[async_trait::async_trait]
pub trait MessageHandler: Send {
    async fn handle(&mut self, message: Message) -> anyhow::Result<()>;
}

/// Forwards every delivered message into a channel, e.g. toward a socket writer.
#[async_trait::async_trait]
impl MessageHandler for UnboundedSender<Message> {
    async fn handle(&mut self, message: Message) -> anyhow::Result<()> {
        self.send(message)
            .map_err(|e| anyhow::anyhow!("forward channel closed: {}", e.0))
    }
}
