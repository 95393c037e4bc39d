use super::*;
use anyhow::Context;
use anyhow::anyhow;
use anyhow::bail;
use anyhow::ensure;
use quiz_core::*;
use quiz_gameplay::*;
use quiz_gameroom::*;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::Weak;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Final,
    Auction,
    Done,
}

/// Game state behind the session's own [`Client`].
///
/// Every command, and every fired timeout, arrives through the same ordered
/// queue, so nothing here needs locking. Timeouts carry a turn serial as
/// their argument; one that no longer matches the awaited turn is stale and
/// ignored.
pub struct Session {
    players: Vec<Account>,
    themes: Vec<String>,
    deleters: Deleters,
    stakes: Option<Stakes>,
    runner: TaskRunner<GameTask>,
    config: SessionConfig,
    phase: Phase,
    turn: i32,
    awaiting: Option<(GameTask, i32)>,
    paused: bool,
    outbox: Arc<OnceLock<Weak<Client>>>,
}

impl Session {
    /// Seats the players and attaches the session to `node` as [`SESSION`].
    pub fn spawn(
        players: Vec<Account>,
        themes: Vec<String>,
        config: SessionConfig,
        node: &Arc<dyn Node>,
    ) -> Arc<Client> {
        let outbox = Arc::new(OnceLock::<Weak<Client>>::new());
        let sink = outbox.clone();
        let executor = move |task: GameTask, argument: i32| {
            match sink.get().and_then(Weak::upgrade) {
                Some(client) => {
                    let text = format!("TASK {} {}", task, argument);
                    client.enqueue(Message::system(text, SESSION, SESSION));
                }
                None => log::warn!("[session] gone before {} fired", task),
            }
        };
        let session = Self {
            players,
            themes,
            deleters: Deleters::default(),
            stakes: None,
            runner: TaskRunner::with_config(executor, config.runner),
            config,
            phase: Phase::Idle,
            turn: 0,
            awaiting: None,
            paused: false,
            outbox: outbox.clone(),
        };
        log::info!(
            "[session] {} players, {} themes",
            session.players.len(),
            session.themes.len()
        );
        let client = Client::attached(SESSION, session, node);
        let _ = outbox.set(Arc::downgrade(&client));
        client
    }
}

#[async_trait::async_trait]
impl MessageHandler for Session {
    async fn handle(&mut self, message: Message) -> anyhow::Result<()> {
        let sender = message.sender();
        let text = message.text().trim();
        let result = match sender {
            SESSION => self.on_task(text).await,
            s if s == self.config.host => self.on_host(text).await,
            s => self.on_player(s, text).await,
        };
        if let Err(ref e) = result {
            if sender != SESSION {
                self.reply(sender, format!("ERROR {}", e));
            }
        }
        result.with_context(|| format!("{} from {}", text, sender))
    }
}

// ============================================================================
// COMMANDS
// ============================================================================
impl Session {
    async fn on_host(&mut self, text: &str) -> anyhow::Result<()> {
        let (command, rest) = split(text);
        match command {
            "FINAL" => {
                ensure!(self.phase == Phase::Idle, "final round cannot start now");
                self.phase = Phase::Final;
                self.deleters = Deleters::default();
                self.next_turn().await
            }
            "AUCTION" => {
                ensure!(self.phase == Phase::Idle, "auction cannot start now");
                let (nominal, first) = split(rest);
                let nominal = nominal
                    .parse::<Score>()
                    .map_err(|_| anyhow!("bad nominal {}", nominal))?;
                let first = self.seat(first)?;
                self.stakes = Some(Stakes::begin(&mut self.players, nominal, first)?);
                self.phase = Phase::Auction;
                self.prompt_staker()
            }
            "PICK" => {
                ensure!(!self.paused, "game is paused");
                let chosen = self.seat(rest)?;
                match self.phase {
                    Phase::Final => {
                        ensure!(self.awaiting.is_none(), "no tie to break");
                        self.deleters.set_index(chosen)?;
                        self.prompt_deleter()
                    }
                    Phase::Auction => {
                        ensure!(self.awaiting.is_none(), "staker already chosen");
                        ensure!(
                            self.players[chosen].stake_making(),
                            "{} is out of the auction",
                            rest
                        );
                        let stakes = self.stakes.as_mut().context("no auction")?;
                        stakes.reset(&self.players, Some(chosen))?;
                        self.prompt_staker()
                    }
                    _ => bail!("nothing to pick"),
                }
            }
            "PAUSE" => {
                ensure!(!self.paused, "already paused");
                ensure!(self.runner.is_running(), "nothing to pause");
                self.runner
                    .pause_execution(self.runner.current_task(), self.runner.argument());
                self.paused = true;
                self.announce("PAUSED");
                Ok(())
            }
            "RESUME" => {
                let saved = self.runner.peek_suspended();
                if saved.is_some_and(|s| self.awaiting != Some((s.task, s.argument))) {
                    self.runner.clear_old_tasks();
                    self.paused = false;
                    bail!("paused turn is over");
                }
                let units = self.runner.resume_execution(None, true)?;
                self.paused = false;
                self.announce(format!("RESUMED {}", units));
                Ok(())
            }
            _ => bail!("unknown command {}", command),
        }
    }
    async fn on_player(&mut self, name: &str, text: &str) -> anyhow::Result<()> {
        let player = self.seat(name)?;
        let (command, rest) = split(text);
        if command != "LEAVE" {
            ensure!(!self.paused, "game is paused");
        }
        match command {
            "DELETE" => {
                ensure!(self.phase == Phase::Final, "no final round");
                ensure!(self.deleters.player() == Some(player), "not your turn");
                let theme = self
                    .themes
                    .iter()
                    .position(|t| t == rest)
                    .ok_or_else(|| anyhow!("no theme {}", rest))?;
                self.delete(player, theme);
                Ok(())
            }
            "STAKE" => {
                ensure!(self.phase == Phase::Auction, "no auction");
                let stakes = self.stakes.as_ref().context("no auction")?;
                ensure!(stakes.staker() == Some(player), "not your bid");
                self.bid(player, Bid::try_from(rest)?)
            }
            "LEAVE" => self.leave(player),
            _ => bail!("unknown command {}", command),
        }
    }
    async fn on_task(&mut self, text: &str) -> anyhow::Result<()> {
        let (task, argument) = parse_task(text).map_err(|e| Fatal(e.to_string()))?;
        if self.awaiting != Some((task, argument)) {
            log::trace!("[session] stale {} {}", task, argument);
            return Ok(());
        }
        self.awaiting = None;
        log::debug!("[session] timeout {} {}", task, argument);
        match task {
            GameTask::None => Ok(()),
            GameTask::MoveNext => self.next_turn().await,
            GameTask::AskDelete => {
                let player = self.deleters.player().context("no deleter")?;
                self.delete(player, 0);
                Ok(())
            }
            GameTask::AskStake => {
                let stakes = self.stakes.as_mut().context("no auction")?;
                let player = stakes.staker().context("no staker")?;
                match stakes.allows(&self.players, Bid::Pass) {
                    true => self.bid(player, Bid::Pass),
                    false => match stakes.legal(&self.players).first().copied() {
                        Some(bid) => self.bid(player, bid),
                        None => {
                            self.players[player].set_stake_making(false);
                            stakes.advance(&self.players);
                            self.prompt_staker()
                        }
                    },
                }
            }
        }
    }
}

// ============================================================================
// FINAL ROUND
// ============================================================================
impl Session {
    async fn next_turn(&mut self) -> anyhow::Result<()> {
        if self.themes.len() <= 1 {
            return self.finish().await;
        }
        if !self.deleters.move_next() {
            self.deleters.reset(&self.players, self.themes.len());
            if !self.deleters.move_next() {
                log::warn!("[session] nobody left to delete themes");
                return self.finish().await;
            }
        }
        self.prompt_deleter()
    }
    fn prompt_deleter(&mut self) -> anyhow::Result<()> {
        match self.deleters.current().context("no current deleter")? {
            Slot::Fixed(player) => {
                self.announce(format!("TURN {}", self.players[player].name()));
                self.start_turn(GameTask::AskDelete, self.config.delete_timeout);
                Ok(())
            }
            Slot::Tied(_) => {
                let candidates = self
                    .deleters
                    .candidates()
                    .map(|group| group.iter().copied().collect::<Vec<_>>())
                    .unwrap_or_default();
                match candidates.as_slice() {
                    [only] => {
                        self.deleters.set_index(*only)?;
                        self.prompt_deleter()
                    }
                    _ => {
                        self.wait_for_host();
                        let names = self.names(&candidates);
                        self.reply(&self.config.host, format!("TIE {}", names));
                        Ok(())
                    }
                }
            }
        }
    }
    fn delete(&mut self, player: Position, theme: usize) {
        let theme = self.themes.remove(theme);
        log::info!("[session] {} deletes {}", self.players[player].name(), theme);
        self.announce(format!("DELETED {} {}", theme, self.players[player].name()));
        self.runner.stop();
        self.start_turn(GameTask::MoveNext, self.config.advance_delay);
    }
    async fn finish(&mut self) -> anyhow::Result<()> {
        let theme = self.themes.first().cloned().unwrap_or_default();
        log::info!("[session] final theme {}", theme);
        self.phase = Phase::Done;
        self.awaiting = None;
        self.announce(format!("FINAL {}", theme));
        self.runner.dispose().await;
        Ok(())
    }
}

// ============================================================================
// STAKE AUCTION
// ============================================================================
impl Session {
    fn bid(&mut self, player: Position, bid: Bid) -> anyhow::Result<()> {
        let stakes = self.stakes.as_mut().context("no auction")?;
        stakes.apply(&mut self.players, bid)?;
        self.announce(format!("BID {} {}", self.players[player].name(), bid));
        self.prompt_staker()
    }
    fn prompt_staker(&mut self) -> anyhow::Result<()> {
        let stakes = self.stakes.as_mut().context("no auction")?;
        if stakes.is_finished(&self.players) {
            stakes.advance(&self.players);
            let stake = stakes.stake();
            let winner = stakes.winner(&self.players);
            self.stakes = None;
            self.phase = Phase::Idle;
            self.wait_for_host();
            let name = winner.map(|w| self.players[w].name()).unwrap_or("?");
            log::info!("[session] auction won by {} at {}", name, stake);
            self.announce(format!("WON {} {}", name, stake));
            return Ok(());
        }
        match stakes.staker() {
            Some(player) => {
                self.announce(format!("STAKER {}", self.players[player].name()));
                self.start_turn(GameTask::AskStake, self.config.stake_timeout);
            }
            None => {
                self.wait_for_host();
                self.announce("STAKER ?");
            }
        }
        Ok(())
    }
}

// ============================================================================
// SEATING
// ============================================================================
impl Session {
    fn leave(&mut self, player: Position) -> anyhow::Result<()> {
        let account = self.players.remove(player);
        log::info!("[session] {} leaves", account.name());
        self.announce(format!("LEFT {}", account.name()));
        match self.phase {
            Phase::Final => {
                let was_current = self.deleters.player() == Some(player);
                let was_candidate = self
                    .deleters
                    .candidates()
                    .is_some_and(|group| group.contains(&player));
                self.deleters.remove_at(player);
                if was_current {
                    self.runner.stop();
                    self.start_turn(GameTask::MoveNext, self.config.advance_delay);
                } else if was_candidate {
                    self.prompt_deleter()?;
                }
                Ok(())
            }
            Phase::Auction => {
                let stakes = self.stakes.as_mut().context("no auction")?;
                let was_staker = stakes.staker() == Some(player);
                stakes.handle_player_drop(&self.players, player);
                if was_staker || stakes.is_finished(&self.players) {
                    self.prompt_staker()?;
                }
                Ok(())
            }
            Phase::Idle | Phase::Done => Ok(()),
        }
    }
    fn seat(&self, name: &str) -> anyhow::Result<Position> {
        self.players
            .iter()
            .position(|a| a.name() == name)
            .ok_or_else(|| anyhow!("unknown player {}", name))
    }
    fn names(&self, players: &[Position]) -> String {
        players
            .iter()
            .map(|&p| self.players[p].name())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ============================================================================
// TIMING & OUTPUT
// ============================================================================
impl Session {
    /// Arms `task` for a fresh turn; only its timeout will be honored.
    /// Any pause of an earlier turn is abandoned.
    fn start_turn(&mut self, task: GameTask, delay: Units) {
        self.runner.clear_old_tasks();
        self.paused = false;
        self.turn += 1;
        self.awaiting = Some((task, self.turn));
        self.runner.schedule_execution(task, delay, self.turn, true);
    }
    /// Stops the clock until the host decides.
    fn wait_for_host(&mut self) {
        self.awaiting = None;
        self.paused = false;
        self.runner.clear_old_tasks();
        self.runner.stop();
    }
    fn announce(&self, text: impl Into<String>) {
        match self.outbox.get().and_then(Weak::upgrade) {
            Some(client) => client.send_system(text, BROADCAST),
            None => log::warn!("[session] no client to announce through"),
        }
    }
    fn reply(&self, receiver: &str, text: String) {
        match self.outbox.get().and_then(Weak::upgrade) {
            Some(client) => client.send_private(text, receiver),
            None => log::warn!("[session] no client to reply through"),
        }
    }
}

fn split(text: &str) -> (&str, &str) {
    text.split_once(' ')
        .map(|(head, rest)| (head, rest.trim()))
        .unwrap_or((text, ""))
}

fn parse_task(text: &str) -> anyhow::Result<(GameTask, i32)> {
    match text.split_whitespace().collect::<Vec<_>>().as_slice() {
        ["TASK", task, argument] => Ok((GameTask::try_from(*task)?, argument.parse()?)),
        _ => bail!("malformed task message {}", text),
    }
}
