//! Core data model: engine configuration, openings, and completed-match
//! records. Grounded on `gears::GameOverReason`/`AdjudicationReason`
//! (`gears/src/lib.rs`), extended with the termination kinds the
//! distilled spec requires that the teacher's two-variant enum doesn't
//! distinguish (stalled engines, disconnects, user interrupts).

use crate::time_control::TimeControl;
use std::time::{Duration, SystemTime};

/// Which protocol dialect an engine speaks on its stdin/stdout pipe.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Protocol {
    Uci,
    Ugi,
}

/// Everything needed to spawn and configure one engine for a match.
/// Cloned once per worker thread's engine cache entry (see
/// `engine_cache.rs`); never shared behind a `Mutex` across threads.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub display_name: String,
    pub cmd: String,
    pub dir: Option<String>,
    pub args: Vec<String>,
    pub proto: Protocol,
    pub tc: TimeControl,
    pub time_margin: Duration,
    pub fixed_move_time: Option<Duration>,
    pub nodes: Option<u64>,
    pub depth: Option<u32>,
    pub options: Vec<(String, String)>,
    /// File each engine's stderr is redirected to, named after
    /// `display_name` following the teacher's `{name}_stderr.log`
    /// convention (`player.rs::build_engine`).
    pub log_name: String,
    pub restart: bool,
}

/// A starting position shared by both games of a round.
#[derive(Debug, Clone)]
pub struct Opening {
    pub id: usize,
    pub fen: String,
    pub moves: Vec<String>,
}

/// A single recorded ply, including whatever diagnostic info the engine
/// volunteered via `info` lines. These fields are optional because
/// adjudicator-terminated or human-originated moves may lack them.
#[derive(Debug, Clone)]
pub struct MoveRecord {
    pub mov: String,
    pub time_taken: Duration,
    pub score_cp: Option<i64>,
    pub score_mate: Option<i32>,
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
    pub hashfull: Option<u32>,
    pub tbhits: Option<u64>,
    /// Wall-clock time taken minus the engine's own self-reported `time`,
    /// i.e. communication/process overhead on top of the engine's search.
    pub latency: Option<Duration>,
    /// The mover's clock remaining after this move was charged.
    pub time_left: Option<Duration>,
    pub pv: Vec<String>,
}

/// The seven ways a match can end. `Normal` covers checkmate/stalemate/
/// draw-by-rule; everything else is an early, non-rules-based stop.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Termination {
    Normal,
    Adjudication,
    Timeout,
    Disconnect,
    Stall,
    IllegalMove,
    Interrupt,
}

impl Termination {
    /// Matches `gears::output::pgn`'s tag strings plus the new kinds.
    pub fn pgn_string(self, detail: Option<&str>) -> String {
        match self {
            Termination::Normal => "normal".to_string(),
            Termination::Adjudication => {
                detail.map(str::to_string).unwrap_or_else(|| "adjudication".to_string())
            }
            Termination::Timeout => "time forfeit".to_string(),
            Termination::Disconnect => "abandoned".to_string(),
            Termination::Stall => "emergency".to_string(),
            Termination::IllegalMove => "rules infraction".to_string(),
            Termination::Interrupt => "abandoned".to_string(),
        }
    }
}

/// Outcome of a finished game from white's perspective.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GameResult {
    WhiteWin,
    BlackWin,
    Draw,
}

impl GameResult {
    pub fn to_canonical_string(self) -> &'static str {
        match self {
            GameResult::WhiteWin => "1-0",
            GameResult::BlackWin => "0-1",
            GameResult::Draw => "1/2-1/2",
        }
    }
}

/// A fully played, fully recorded game. This is what the output funnel
/// hands to the archive writer and the scoreboard.
#[derive(Debug, Clone)]
pub struct MatchData {
    pub round_id: usize,
    pub game_id: usize,
    pub white: String,
    pub black: String,
    pub opening: Opening,
    pub result: GameResult,
    pub termination: Termination,
    pub termination_detail: Option<String>,
    pub moves: Vec<MoveRecord>,
    pub start_time: SystemTime,
    pub end_time: SystemTime,
    pub event: String,
    pub site: String,
}

/// Identifies an unordered pair of engines for scoreboard bookkeeping.
/// Always constructed with the lexicographically smaller name first so
/// that `(a, b)` and `(b, a)` hash identically (distilled spec's "Names
/// are unique per tournament" invariant, `player.rs`'s `make_name_unique`).
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct PairKey(pub String, pub String);

impl PairKey {
    pub fn new(a: &str, b: &str) -> (Self, bool) {
        if a <= b {
            (PairKey(a.to_string(), b.to_string()), false)
        } else {
            (PairKey(b.to_string(), a.to_string()), true)
        }
    }
}
