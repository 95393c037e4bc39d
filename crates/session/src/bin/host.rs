//! Host Binary
//!
//! Plays a scripted final round against an in-memory hub with short
//! timeouts, logging every announcement. Scheduler overrides are read from
//! `QUIZ_TIMER_CEILING` and `QUIZ_DISPOSE_DEADLINE`.

use quiz_core::*;
use quiz_gameplay::Account;
use quiz_gameroom::*;
use quiz_session::*;
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    log();
    let hub = Hub::new();
    let node: Arc<dyn Node> = hub.clone();
    let players = vec![
        Account::new("alice", 300),
        Account::new("bob", 200),
        Account::new("carol", 200),
    ];
    let seats = players
        .iter()
        .map(|a| Client::attached(a.name(), Silent, &node))
        .collect::<Vec<_>>();
    let (tx, mut inbox) = tokio::sync::mpsc::unbounded_channel();
    let host = Client::attached("host", tx, &node);
    let config = SessionConfig {
        delete_timeout: 20,
        advance_delay: 5,
        ..SessionConfig::from_env()
    };
    let themes = ["Rivers", "Films", "Poets", "Chess"]
        .map(String::from)
        .to_vec();
    let session = Session::spawn(players, themes, config, &node);
    let mut done = session.disposed();
    host.send("FINAL", SESSION);
    while let Some(message) = inbox.recv().await {
        log::info!("[host] {}", message.text());
        match message.text().split_once(' ') {
            Some(("TIE", names)) => {
                let chosen = names.split(' ').next().unwrap_or_default();
                host.send(format!("PICK {}", chosen), SESSION);
            }
            Some(("FINAL", _)) => break,
            _ => {}
        }
    }
    session.dispose();
    let _ = done.wait_for(|d| *d).await;
    seats.iter().for_each(|seat| seat.dispose());
    log::info!("[host] {} warnings, {} errors", hub.warnings(), hub.errors());
    Ok(())
}

/// Player that never answers, so every turn times out.
struct Silent;

#[async_trait::async_trait]
impl MessageHandler for Silent {
    async fn handle(&mut self, message: Message) -> anyhow::Result<()> {
        log::debug!("[silent] {}", message);
        Ok(())
    }
}
