//! Tournament-wide configuration and the small collaborator seams the
//! distilled spec keeps external: an opening-book source and an archive
//! writer. Neither seam ships a real file-format implementation (PGN/EPD
//! parsing and writing stay out of scope per §1); what's here is just
//! enough for the scheduler loop to call through a real trait object
//! rather than owning the file-format logic itself.

use crate::adjudication::ScoreThreshold;
use crate::data::{EngineConfig, MatchData, Opening};
use crate::sprt::ScoreModel;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum Variant {
    #[default]
    Standard,
    Chess960,
}

/// SPRT parameters as given on the command line, validated into a
/// [`crate::sprt::Sprt`] at startup.
#[derive(Debug, Clone)]
pub struct SprtParams {
    pub elo0: f64,
    pub elo1: f64,
    pub alpha: f64,
    pub beta: f64,
    pub model: ScoreModel,
}

#[derive(Debug, Clone, Default)]
pub struct ResignConfig {
    pub rule: ScoreThreshold,
    pub two_sided: bool,
}

/// Everything the scheduler needs to run a tournament, assembled by
/// `cli::parse_cli` from the `-engine`/`-each`/... flags of distilled §6.
#[derive(Debug, Clone)]
pub struct TournamentConfig {
    pub engines: Vec<EngineConfig>,
    pub rounds: usize,
    pub games_per_encounter: usize,
    pub noswap: bool,
    pub reverse: bool,
    pub concurrency: usize,
    pub recover: bool,
    pub use_affinity: bool,
    pub force_concurrency: bool,
    pub variant: Variant,
    pub report_penta: bool,
    pub draw: Option<ScoreThreshold>,
    pub resign: Option<ResignConfig>,
    pub max_moves: Option<usize>,
    pub sprt: Option<SprtParams>,
    pub event: String,
    pub site: String,
    pub pgn_out: Option<PathBuf>,
    pub epd_out: Option<PathBuf>,
    pub srand: Option<u64>,
    pub autosave_interval: Option<usize>,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            engines: Vec::new(),
            rounds: 1,
            games_per_encounter: 1,
            noswap: false,
            reverse: false,
            concurrency: 1,
            recover: false,
            use_affinity: false,
            force_concurrency: false,
            variant: Variant::Standard,
            report_penta: false,
            draw: None,
            resign: None,
            max_moves: None,
            sprt: None,
            event: "?".to_string(),
            site: "?".to_string(),
            pgn_out: None,
            epd_out: None,
            srand: None,
            autosave_interval: None,
        }
    }
}

/// The fetch-next-opening iterator the match executor pulls from, keyed
/// by round id so both games of a round-pair see the same opening
/// (distilled spec's "Opening selection uses opening_id = r").
pub trait OpeningBook: Send + Sync {
    fn opening_for_round(&self, round_id: usize) -> Opening;
    fn len(&self) -> usize {
        1
    }
}

/// Always the standard starting position; the default when `-openings`
/// isn't given.
pub struct StartposBook;

impl OpeningBook for StartposBook {
    fn opening_for_round(&self, _round_id: usize) -> Opening {
        Opening {
            id: 0,
            fen: "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1".to_string(),
            moves: Vec::new(),
        }
    }
}

/// A book already loaded into memory by the (external) book-file parser,
/// polled in round-robin fashion so `opening_id = round_id % len`, as the
/// distilled spec's pairing generator expects.
pub struct SequentialOpeningBook {
    openings: Vec<Opening>,
}

impl SequentialOpeningBook {
    pub fn new(openings: Vec<Opening>) -> Self {
        assert!(!openings.is_empty(), "opening book must not be empty");
        Self { openings }
    }
}

impl OpeningBook for SequentialOpeningBook {
    fn opening_for_round(&self, round_id: usize) -> Opening {
        self.openings[round_id % self.openings.len()].clone()
    }

    fn len(&self) -> usize {
        self.openings.len()
    }
}

/// Where completed games go once the output funnel has serialized them.
/// PGN/EPD file-format writing is an external concern; this is the seam
/// the scheduler calls through, with a PGN-text-only implementation good
/// enough to satisfy the archival requirement without owning directory
/// management or EPD emission.
pub trait ArchiveWriter: Send {
    fn write_game(&mut self, data: &MatchData, pgn_text: &str);
}

pub struct NullArchiveWriter;

impl ArchiveWriter for NullArchiveWriter {
    fn write_game(&mut self, _data: &MatchData, _pgn_text: &str) {}
}

/// Appends each game's PGN text to a file, soft-wrapped per distilled
/// §6 by the caller (`archive::pgn::format`) before this ever sees it.
pub struct PgnFileWriter {
    file: Mutex<std::fs::File>,
}

impl PgnFileWriter {
    pub fn create(path: &PathBuf) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file: Mutex::new(file) })
    }
}

impl ArchiveWriter for PgnFileWriter {
    fn write_game(&mut self, _data: &MatchData, pgn_text: &str) {
        let mut file = self.file.lock().unwrap();
        let _ = writeln!(file, "{pgn_text}\n");
    }
}
