use super::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::Weak;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

/// In-memory fan-out node.
///
/// Keeps non-owning registrations keyed by client name and routes each
/// dispatched message to its receiver, or to every other client on
/// [`quiz_core::BROADCAST`]. Registrations whose client was dropped or
/// disposed are pruned as they are encountered.
#[derive(Debug, Default)]
pub struct Hub {
    clients: RwLock<HashMap<String, Weak<Client>>>,
    errors: AtomicUsize,
    warnings: AtomicUsize,
}

impl Hub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
    /// Live registrations.
    pub fn clients(&self) -> usize {
        self.read()
            .values()
            .filter_map(Weak::upgrade)
            .filter(|c| !c.is_disposed())
            .count()
    }
    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }
    pub fn warnings(&self) -> usize {
        self.warnings.load(Ordering::SeqCst)
    }
    /// Delivers to a single client by name.
    pub fn unicast(&self, name: &str, message: Message) -> bool {
        log::trace!("[hub] unicast {}", message);
        let client = self.read().get(name).and_then(Weak::upgrade);
        match client.filter(|c| !c.is_disposed()) {
            Some(client) => client.enqueue(message),
            None => {
                log::warn!("[hub] unicast to {}: no such client", name);
                self.write().remove(name);
                false
            }
        }
    }
    /// Delivers to every live client except the sender.
    pub fn broadcast(&self, message: Message) {
        log::trace!("[hub] broadcast {}", message);
        let clients = self
            .read()
            .iter()
            .filter(|(name, _)| name.as_str() != message.sender())
            .map(|(name, client)| (name.clone(), client.upgrade()))
            .collect::<Vec<_>>();
        for (name, client) in clients {
            match client.filter(|c| !c.is_disposed()) {
                Some(client) => {
                    if !client.enqueue(message.clone()) {
                        log::warn!("[hub] broadcast to {} dropped", name);
                    }
                }
                None => {
                    self.write().remove(&name);
                }
            }
        }
    }
    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Weak<Client>>> {
        self.clients.read().unwrap_or_else(PoisonError::into_inner)
    }
    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Weak<Client>>> {
        self.clients.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Node for Hub {
    fn register(&self, client: &Arc<Client>) {
        log::debug!("[hub] registered {}", client.name());
        self.write()
            .insert(client.name().to_string(), Arc::downgrade(client));
    }
    fn report_error(&self, error: &anyhow::Error, is_warning: bool) {
        match is_warning {
            true => {
                self.warnings.fetch_add(1, Ordering::SeqCst);
                log::warn!("[hub] client warning: {:#}", error);
            }
            false => {
                self.errors.fetch_add(1, Ordering::SeqCst);
                log::error!("[hub] client error: {:#}", error);
            }
        }
    }
    fn dispatch(&self, message: Message) {
        match message.is_broadcast() {
            true => self.broadcast(message),
            false => {
                let receiver = message.receiver().to_string();
                self.unicast(&receiver, message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::sync::mpsc::unbounded_channel;

    fn join(hub: &Arc<Hub>, name: &str) -> (Arc<Client>, UnboundedReceiver<Message>) {
        let (tx, rx) = unbounded_channel();
        let node: Arc<dyn Node> = hub.clone();
        (Client::attached(name, tx, &node), rx)
    }
    async fn next(rx: &mut UnboundedReceiver<Message>) -> Message {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("delivery timed out")
            .expect("channel open")
    }

    /// Fails on "bad", flags "fatal" as fatal, panics on "panic".
    struct Picky;

    #[async_trait::async_trait]
    impl MessageHandler for Picky {
        async fn handle(&mut self, message: Message) -> anyhow::Result<()> {
            match message.text() {
                "bad" => anyhow::bail!("bad input"),
                "fatal" => Err(Fatal("broken".into()).into()),
                "panic" => panic!("picky panicked"),
                _ => Ok(()),
            }
        }
    }

    #[tokio::test]
    async fn unicast_reaches_only_receiver() {
        let hub = Hub::new();
        let (alice, mut a) = join(&hub, "alice");
        let (_bob, mut b) = join(&hub, "bob");
        alice.send("hi bob", "bob");
        let message = next(&mut b).await;
        assert_eq!(message.text(), "hi bob");
        assert_eq!(message.sender(), "alice");
        assert!(!message.is_system());
        assert!(a.try_recv().is_err());
    }
    #[tokio::test]
    async fn broadcast_skips_sender() {
        let hub = Hub::new();
        let (alice, mut a) = join(&hub, "alice");
        let (_bob, mut b) = join(&hub, "bob");
        let (_carol, mut c) = join(&hub, "carol");
        alice.send_system("ROUND 1", quiz_core::BROADCAST);
        assert_eq!(next(&mut b).await.text(), "ROUND 1");
        assert_eq!(next(&mut c).await.text(), "ROUND 1");
        tokio::task::yield_now().await;
        assert!(a.try_recv().is_err());
    }
    #[tokio::test]
    async fn private_message_keeps_flags() {
        let hub = Hub::new();
        let (alice, _a) = join(&hub, "alice");
        let (_host, mut h) = join(&hub, "host");
        alice.send_private("TIE 1 2", "host");
        let message = next(&mut h).await;
        assert!(message.is_private());
        assert!(message.is_system());
    }
    #[tokio::test]
    async fn disposed_clients_are_pruned() {
        let hub = Hub::new();
        let (alice, _a) = join(&hub, "alice");
        let (bob, _b) = join(&hub, "bob");
        assert_eq!(hub.clients(), 2);
        bob.dispose();
        assert_eq!(hub.clients(), 1);
        assert!(!hub.unicast("bob", Message::new("late", "alice", "bob")));
        drop(alice);
        assert_eq!(hub.clients(), 0);
    }
    #[tokio::test]
    async fn handler_failures_are_counted() {
        let hub = Hub::new();
        let node: Arc<dyn Node> = hub.clone();
        let picky = Client::attached("picky", Picky, &node);
        for text in ["bad", "panic", "fatal", "fine"] {
            picky.enqueue(Message::new(text, "x", "picky"));
        }
        tokio::time::timeout(Duration::from_secs(5), async {
            while hub.warnings() + hub.errors() < 3 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("failures reported");
        assert_eq!(hub.warnings(), 2);
        assert_eq!(hub.errors(), 1);
    }
}
