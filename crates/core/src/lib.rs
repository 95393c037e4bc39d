//! Core type aliases, timing constants, and runtime utilities for quizroom.
//!
//! This crate provides the foundational types and configuration parameters
//! shared by the gameplay, gameroom, and session crates.
use std::time::Duration;

// ============================================================================
// TYPE ALIASES
// ============================================================================
/// Index of a player in the live player list.
pub type Position = usize;
/// Player score; may go negative after wrong answers.
pub type Score = i32;
/// Scheduler time in ticks of [`UNIT`].
pub type Units = u32;

// ============================================================================
// SCHEDULER TIMING
// ============================================================================
/// Base granularity of every scheduled transition.
pub const UNIT: Duration = Duration::from_millis(100);
/// Longest single timer span; longer waits are re-armed by the caller.
pub const TIMER_CEILING: Units = 6_000;
/// Delay used to force a near-immediate fire of the current task.
pub const IMMEDIATE_DELAY: Duration = Duration::from_millis(20);
/// Upper bound on how long disposal waits for an in-flight fire.
pub const DISPOSE_DEADLINE: Duration = Duration::from_millis(500);

// ============================================================================
// SESSION TIMING (units)
// ============================================================================
/// Time a player gets to pick a theme to delete.
pub const DELETE_TIMEOUT: Units = 150;
/// Time a player gets to place a stake.
pub const STAKE_TIMEOUT: Units = 150;
/// Pause between automatic transitions.
pub const ADVANCE_DELAY: Units = 10;

// ============================================================================
// ADDRESSING
// ============================================================================
/// Receiver name that fans a message out to every participant.
pub const BROADCAST: &str = "*";
/// Sender name used by the session itself.
pub const SESSION: &str = "@";

// ============================================================================
// RUNTIME UTILITIES
// ============================================================================
/// Converts a span to whole scheduler units, rounding down.
pub fn units(span: Duration) -> Units {
    (span.as_millis() / UNIT.as_millis()).min(Units::MAX as u128) as Units
}

/// Converts scheduler units back to a span.
pub fn span(units: Units) -> Duration {
    UNIT * units
}

/// Parse duration string like "250ms", "30s", "5m", "2h" into Duration.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(num) = s.strip_suffix("ms") {
        return num.parse().ok().map(Duration::from_millis);
    }
    let (num, unit) = s.split_at(s.len().saturating_sub(1));
    let value: u64 = num.parse().ok()?;
    match unit {
        "s" => Some(Duration::from_secs(value)),
        "m" => Some(Duration::from_secs(value * 60)),
        "h" => Some(Duration::from_secs(value * 3600)),
        _ => None,
    }
}

/// Initialize dual logging (terminal + file) with timestamped log files.
/// Creates `logs/` directory and writes DEBUG level to file, INFO to terminal.
#[cfg(feature = "server")]
pub fn log() {
    std::fs::create_dir_all("logs").expect("create logs directory");
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let time = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time moves slow")
        .as_secs();
    let file = simplelog::WriteLogger::new(
        log::LevelFilter::Debug,
        config.clone(),
        std::fs::File::create(format!("logs/{}.log", time)).expect("create log file"),
    );
    let term = simplelog::TermLogger::new(
        log::LevelFilter::Info,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    simplelog::CombinedLogger::init(vec![term, file]).expect("initialize logger");
}
