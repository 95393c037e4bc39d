use super::*;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::Weak;
use tokio::sync::mpsc::*;
use tokio::sync::watch;

type Link = Arc<RwLock<Option<Weak<dyn Node>>>>;

/// One participant's connection to the session.
///
/// Owns an unbounded inbound queue drained by a dedicated task, which hands
/// messages to a single [`MessageHandler`] strictly one at a time and in
/// enqueue order, however many producers push concurrently.
///
/// - Producers call [`Client::enqueue`]; it never blocks
/// - The loop awaits each handler call before taking the next message
/// - Handler failures are reported to the attached [`Node`], never fatal to the loop
/// - [`Client::dispose`] closes the queue; already-buffered messages still drain
pub struct Client {
    name: String,
    inbox: Mutex<Option<UnboundedSender<Message>>>,
    node: Link,
    disposed: watch::Sender<bool>,
    cancel: watch::Sender<bool>,
}

impl Client {
    /// Creates the client and spawns its delivery loop.
    pub fn spawn<H>(name: &str, handler: H) -> Arc<Self>
    where
        H: MessageHandler + 'static,
    {
        let (tx, rx) = unbounded_channel();
        let (cancel, cancelled) = watch::channel(false);
        let client = Arc::new(Self {
            name: name.to_string(),
            inbox: Mutex::new(Some(tx)),
            node: Link::default(),
            disposed: watch::channel(false).0,
            cancel,
        });
        let worker = Worker {
            name: client.name.clone(),
            handler: Box::new(handler),
            inbox: rx,
            cancelled,
            node: client.node.clone(),
        };
        tokio::spawn(worker.run());
        client
    }
    /// Creates the client already attached to `node`.
    pub fn attached<H>(name: &str, handler: H, node: &Arc<dyn Node>) -> Arc<Self>
    where
        H: MessageHandler + 'static,
    {
        let client = Self::spawn(name, handler);
        client.attach(node);
        client
    }
    /// Binds to a fan-out node and registers as one of its destinations.
    pub fn attach(self: &Arc<Self>, node: &Arc<dyn Node>) {
        *self.node.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::downgrade(node));
        node.register(self);
        log::debug!("[client {}] attached", self.name);
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn is_disposed(&self) -> bool {
        *self.disposed.borrow()
    }
    /// Notification raised once the client is disposed.
    pub fn disposed(&self) -> watch::Receiver<bool> {
        self.disposed.subscribe()
    }
}

impl Client {
    /// Appends to the inbound queue. Returns false, dropping the message,
    /// once the queue is closed.
    pub fn enqueue(&self, message: Message) -> bool {
        let inbox = self.inbox.lock().unwrap_or_else(PoisonError::into_inner);
        match inbox.as_ref().map(|tx| tx.send(message)) {
            Some(Ok(())) => true,
            Some(Err(e)) => {
                log::trace!("[client {}] loop gone, dropped {}", self.name, e.0);
                false
            }
            None => {
                log::trace!("[client {}] closed, dropped message", self.name);
                false
            }
        }
    }
    /// Closes the inbound queue and raises the disposed notification.
    /// Safe to call repeatedly and from several threads.
    pub fn dispose(&self) {
        let closed = self
            .inbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if closed.is_some() {
            log::debug!("[client {}] disposed", self.name);
            self.disposed.send_replace(true);
        }
    }
    /// Stops the loop after the in-flight message, leaving the rest undelivered.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }
}

impl Client {
    /// Sends a chat-level message through the attached node.
    pub fn send(&self, text: impl Into<String>, receiver: &str) {
        self.dispatch(Message::new(text, &self.name, receiver));
    }
    /// Sends a game-protocol message through the attached node.
    pub fn send_system(&self, text: impl Into<String>, receiver: &str) {
        self.dispatch(Message::system(text, &self.name, receiver));
    }
    /// Sends a protocol message only `receiver` may see.
    pub fn send_private(&self, text: impl Into<String>, receiver: &str) {
        self.dispatch(Message::private(text, &self.name, receiver));
    }
    fn dispatch(&self, message: Message) {
        match upgrade(&self.node) {
            Some(node) => node.dispatch(message),
            None => log::warn!("[client {}] no node, dropped {}", self.name, message),
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("name", &self.name)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

fn upgrade(link: &Link) -> Option<Arc<dyn Node>> {
    link.read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .and_then(Weak::upgrade)
}

/// Delivery loop owned by the spawned task.
///
/// Holds no strong reference to its [`Client`], so dropping the client
/// closes the queue just like disposing it.
struct Worker {
    name: String,
    handler: Box<dyn MessageHandler>,
    inbox: UnboundedReceiver<Message>,
    cancelled: watch::Receiver<bool>,
    node: Link,
}

impl Worker {
    async fn run(mut self) {
        'queue: loop {
            let first = tokio::select! {
                biased;
                Ok(_) = self.cancelled.wait_for(|c| *c) => break 'queue,
                message = self.inbox.recv() => match message {
                    Some(message) => message,
                    None => break 'queue,
                },
            };
            self.deliver(first).await;
            'drain: while let Ok(message) = self.inbox.try_recv() {
                if *self.cancelled.borrow() {
                    break 'drain;
                }
                self.deliver(message).await;
            }
        }
        match *self.cancelled.borrow() {
            true => log::debug!("[client {}] loop cancelled", self.name),
            false => log::debug!("[client {}] queue closed", self.name),
        }
    }
    async fn deliver(&mut self, message: Message) {
        log::trace!("[client {}] <- {}", self.name, message);
        let error = match AssertUnwindSafe(self.handler.handle(message))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e,
            Err(panic) => anyhow::anyhow!("handler panicked: {}", reason(&panic)),
        };
        let is_warning = !error.is::<Fatal>();
        log::error!("[client {}] handler failed: {:#}", self.name, error);
        match upgrade(&self.node) {
            Some(node) => node.report_error(&error, is_warning),
            None => log::warn!("[client {}] no node to report to", self.name),
        }
    }
}

fn reason(panic: &Box<dyn std::any::Any + Send>) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    /// Records deliveries and flags any overlapping handler calls.
    struct Probe {
        busy: Arc<AtomicBool>,
        overlapped: Arc<AtomicBool>,
        out: UnboundedSender<Message>,
    }

    #[async_trait::async_trait]
    impl MessageHandler for Probe {
        async fn handle(&mut self, message: Message) -> anyhow::Result<()> {
            if self.busy.swap(true, Ordering::SeqCst) {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            tokio::task::yield_now().await;
            self.busy.store(false, Ordering::SeqCst);
            match message.text() {
                "bad" => Err(anyhow::anyhow!("bad message")),
                "fatal" => Err(Fatal("corrupted state".into()).into()),
                "panic" => panic!("handler blew up"),
                _ => {
                    let _ = self.out.send(message);
                    Ok(())
                }
            }
        }
    }

    fn watched(name: &str) -> (Arc<Client>, UnboundedReceiver<Message>, Arc<AtomicBool>) {
        let (out, rx) = unbounded_channel();
        let overlapped = Arc::new(AtomicBool::new(false));
        let handler = Probe {
            busy: Arc::new(AtomicBool::new(false)),
            overlapped: overlapped.clone(),
            out,
        };
        (Client::spawn(name, handler), rx, overlapped)
    }
    async fn collect(rx: &mut UnboundedReceiver<Message>, n: usize) -> Vec<String> {
        let mut texts = Vec::with_capacity(n);
        for _ in 0..n {
            let message = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("delivery timed out")
                .expect("handler channel open");
            texts.push(message.text().to_string());
        }
        texts
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_producers_keep_their_order() {
        let (client, mut rx, overlapped) = watched("alice");
        let producers = (0..4)
            .map(|p| {
                let client = client.clone();
                tokio::spawn(async move {
                    for k in 0..100 {
                        assert!(client.enqueue(Message::new(format!("{}:{}", p, k), "x", "alice")));
                        if k % 10 == 0 {
                            tokio::task::yield_now().await;
                        }
                    }
                })
            })
            .collect::<Vec<_>>();
        futures::future::join_all(producers).await;
        let texts = collect(&mut rx, 400).await;
        for p in 0..4 {
            let seen = texts
                .iter()
                .filter_map(|t| t.split_once(':'))
                .filter(|(q, _)| *q == p.to_string())
                .map(|(_, k)| k.parse::<usize>().unwrap())
                .collect::<Vec<_>>();
            assert_eq!(seen, (0..100).collect::<Vec<_>>());
        }
        assert!(!overlapped.load(Ordering::SeqCst));
    }
    #[tokio::test]
    async fn single_producer_order_is_exact() {
        let (client, mut rx, _) = watched("bob");
        for k in 0..50 {
            client.enqueue(Message::new(k.to_string(), "x", "bob"));
        }
        let expected = (0..50).map(|k| k.to_string()).collect::<Vec<_>>();
        assert_eq!(collect(&mut rx, 50).await, expected);
    }
    #[tokio::test]
    async fn failures_do_not_stop_the_loop() {
        let (client, mut rx, _) = watched("carol");
        for text in ["one", "bad", "two", "panic", "fatal", "three"] {
            client.enqueue(Message::new(text, "x", "carol"));
        }
        assert_eq!(collect(&mut rx, 3).await, vec!["one", "two", "three"]);
    }
    #[tokio::test]
    async fn dispose_drains_buffered_then_rejects() {
        let (client, mut rx, _) = watched("dave");
        let mut disposed = client.disposed();
        client.enqueue(Message::new("before", "x", "dave"));
        client.dispose();
        client.dispose();
        assert!(client.is_disposed());
        assert!(!client.enqueue(Message::new("after", "x", "dave")));
        assert_eq!(collect(&mut rx, 1).await, vec!["before"]);
        assert!(rx.recv().await.is_none());
        assert!(disposed.wait_for(|d| *d).await.is_ok());
    }
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dispose_from_many_threads() {
        let (client, _rx, _) = watched("erin");
        let disposers = (0..8)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move { client.dispose() })
            })
            .collect::<Vec<_>>();
        for result in futures::future::join_all(disposers).await {
            assert!(result.is_ok());
        }
        assert!(client.is_disposed());
    }
    #[tokio::test]
    async fn cancel_stops_delivery() {
        let (client, mut rx, _) = watched("frank");
        client.enqueue(Message::new("first", "x", "frank"));
        assert_eq!(collect(&mut rx, 1).await, vec!["first"]);
        client.cancel();
        tokio::task::yield_now().await;
        client.enqueue(Message::new("second", "x", "frank"));
        let late = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(matches!(late, Ok(None) | Err(_)));
    }
    #[tokio::test]
    async fn dropping_client_ends_loop() {
        let (client, mut rx, _) = watched("gina");
        client.enqueue(Message::new("last", "x", "gina"));
        drop(client);
        assert_eq!(collect(&mut rx, 1).await, vec!["last"]);
        assert!(rx.recv().await.is_none());
    }
}
