//! Ordered output funnel: every finished game passes through one mutex
//! so archival, scoreboard bookkeeping, the SPRT check, and the periodic
//! progress report happen in game-completion order regardless of which
//! worker thread finished first. Grounded on
//! `original_source/app/src/matchmaking/tournament/tournament.cpp`'s
//! single `results_mutex_`-guarded `onMatchFinished` callback.

use crate::archive::pgn::{format, CommentFields};
use crate::config::{ArchiveWriter, Variant};
use crate::data::{GameResult, MatchData, PairKey};
use crate::log::MultiLogger;
use crate::scoreboard::Scoreboard;
use crate::sprt::{Sprt, SprtResult};
use std::collections::HashMap;
use std::sync::Mutex;

fn white_score(result: GameResult) -> f32 {
    match result {
        GameResult::WhiteWin => 1.0,
        GameResult::BlackWin => 0.0,
        GameResult::Draw => 0.5,
    }
}

struct FunnelState {
    scoreboard: Scoreboard,
    archive: Box<dyn ArchiveWriter>,
    completed: usize,
    /// The one pair an `-sprt` test tracks: the distilled spec always
    /// compares the first two `-engine` entries, mirroring cutechess-cli's
    /// single-pair SPRT mode.
    sprt: Option<Sprt>,
    sprt_decided: Option<SprtResult>,
    /// Half-resolved round-pairs: the first of a round's two games is
    /// buffered here (score from the pair's canonical-first engine's
    /// point of view) until its twin arrives, then both are folded into
    /// one pentanomial bin and the entry is dropped. Distilled spec
    /// §4.7/§9's "Empty → Half(result, round) → resolved" state machine.
    pending_round_pairs: HashMap<(PairKey, usize), f32>,
}

pub struct OutputFunnel {
    state: Mutex<FunnelState>,
    total_games: usize,
    variant: Variant,
    comment_fields: CommentFields,
    report_every: usize,
}

impl OutputFunnel {
    pub fn new(
        archive: Box<dyn ArchiveWriter>,
        sprt: Option<Sprt>,
        total_games: usize,
        variant: Variant,
        comment_fields: CommentFields,
        report_every: usize,
    ) -> Self {
        Self {
            state: Mutex::new(FunnelState {
                scoreboard: Scoreboard::new(),
                archive,
                completed: 0,
                sprt,
                sprt_decided: None,
                pending_round_pairs: HashMap::new(),
            }),
            total_games,
            variant,
            comment_fields,
            report_every: report_every.max(1),
        }
    }

    /// Records one finished game and logs progress through `logger`.
    /// Returns `Some` once the configured SPRT test reaches a decision,
    /// which tells the scheduler to stop dispatching new games.
    pub fn record(&self, data: MatchData, logger: &MultiLogger) -> Option<SprtResult> {
        let pgn_text = format(&data, self.variant, self.comment_fields);
        let mut state = self.state.lock().unwrap();
        state.archive.write_game(&data, &pgn_text);
        state.scoreboard.record_game(&data.white, &data.black, white_score(data.result));
        self.fold_into_round_pair(&mut state, &data);
        state.completed += 1;

        let decided = if state.sprt_decided.is_none() {
            state.sprt.as_ref().and_then(|sprt| {
                let stats = state.scoreboard.get(&data.white, &data.black);
                let llr = sprt.llr(stats);
                match sprt.decide(llr) {
                    SprtResult::Continue => None,
                    decided => Some(decided),
                }
            })
        } else {
            None
        };
        if let Some(decided) = decided {
            state.sprt_decided = Some(decided);
        }

        if state.completed % self.report_every == 0 || state.completed == self.total_games {
            logger.info(&format!(
                "completed {}/{} games ({} {} vs {}: {})",
                state.completed,
                self.total_games,
                data.termination.pgn_string(data.termination_detail.as_deref()),
                data.white,
                data.black,
                data.result.to_canonical_string(),
            ));
        }
        if let Some(decided) = decided {
            logger.info(&format!("SPRT test concluded: {decided:?}"));
        }
        decided
    }

    /// Buffers or resolves the pentanomial bin for the round-pair `data`
    /// belongs to. A round-pair is complete exactly when both of its
    /// games have been registered (distilled spec §3's invariant); the
    /// canonical-first engine's name (`PairKey::new`'s lexicographic
    /// ordering) is what both halves' scores are expressed in, so color
    /// swaps between the two games of the pair don't matter.
    fn fold_into_round_pair(&self, state: &mut FunnelState, data: &MatchData) {
        let (key, swapped) = PairKey::new(&data.white, &data.black);
        let white = white_score(data.result);
        let first_score = if swapped { 1.0 - white } else { white };
        let bucket = (key.clone(), data.round_id);
        match state.pending_round_pairs.remove(&bucket) {
            Some(other_first_score) => {
                state.scoreboard.record_pair(&key.0, &key.1, other_first_score, first_score);
            }
            None => {
                state.pending_round_pairs.insert(bucket, first_score);
            }
        }
    }

    /// A JSON snapshot of the current scoreboard, for the autosave
    /// feature; distinct from `finish`, which consumes the funnel.
    pub fn snapshot_json(&self) -> serde_json::Result<String> {
        self.state.lock().unwrap().scoreboard.to_json()
    }

    pub fn finish(self) -> Scoreboard {
        self.state.into_inner().unwrap().scoreboard
    }
}
