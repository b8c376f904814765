//! Scoreboard and pair statistics. Grounded on
//! `original_source/src/matchmaking/stats.hpp`'s `Stats` struct: plain
//! win/loss/draw counters plus six pentanomial pair-outcome bins, with an
//! `operator~()` that inverts the struct into the other player's frame
//! of reference.

use crate::data::PairKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Trinomial + pentanomial counters for one ordered pair of engines
/// (first-named vs second-named in the owning [`PairKey`]).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairStats {
    pub wins: u64,
    pub losses: u64,
    pub draws: u64,
    /// win-win, win-draw, win-loss, draw-draw, loss-draw, loss-loss pair
    /// outcomes across the two games of a round with reversed colors.
    pub penta_ww: u64,
    pub penta_wd: u64,
    pub penta_wl: u64,
    pub penta_dd: u64,
    pub penta_ld: u64,
    pub penta_ll: u64,
}

impl PairStats {
    pub fn add_game(&mut self, first_won: bool, first_lost: bool) {
        if first_won {
            self.wins += 1;
        } else if first_lost {
            self.losses += 1;
        } else {
            self.draws += 1;
        }
    }

    /// Folds in one pentanomial outcome bin, classified from the *pair*
    /// of individual game results (each in {0, 0.5, 1}) that the
    /// canonical-first engine scored across the round's two games — not
    /// from their sum, which can't distinguish `{W,L}` (sum 1.0) from
    /// `{D,D}` (sum 1.0). Order between the two games doesn't matter:
    /// the unordered multiset of the two scores is what the six bins
    /// key off (distilled spec §4.7/§8).
    pub fn add_pair(&mut self, first_game: f32, second_game: f32) {
        let (lo, hi) = if first_game <= second_game { (first_game, second_game) } else { (second_game, first_game) };
        if lo == 1.0 && hi == 1.0 {
            self.penta_ww += 1;
        } else if lo == 0.5 && hi == 1.0 {
            self.penta_wd += 1;
        } else if lo == 0.0 && hi == 1.0 {
            self.penta_wl += 1;
        } else if lo == 0.5 && hi == 0.5 {
            self.penta_dd += 1;
        } else if lo == 0.0 && hi == 0.5 {
            self.penta_ld += 1;
        } else {
            self.penta_ll += 1;
        }
    }

    pub fn total_games(&self) -> u64 {
        self.wins + self.losses + self.draws
    }

    pub fn total_pairs(&self) -> u64 {
        self.penta_ww + self.penta_wd + self.penta_wl + self.penta_dd + self.penta_ld + self.penta_ll
    }

    /// The view of these statistics from the other engine's perspective:
    /// wins and losses swap, `WW`/`LL` swap, `WD`/`LD` swap; `WL` and
    /// `DD` are each self-symmetric in the flipped frame and stay put,
    /// exactly mirroring `Stats::operator~()`.
    pub fn invert(&self) -> PairStats {
        PairStats {
            wins: self.losses,
            losses: self.wins,
            draws: self.draws,
            penta_ww: self.penta_ll,
            penta_ll: self.penta_ww,
            penta_wd: self.penta_ld,
            penta_ld: self.penta_wd,
            penta_wl: self.penta_wl,
            penta_dd: self.penta_dd,
        }
    }
}

impl std::ops::Add for PairStats {
    type Output = PairStats;

    fn add(self, rhs: PairStats) -> PairStats {
        PairStats {
            wins: self.wins + rhs.wins,
            losses: self.losses + rhs.losses,
            draws: self.draws + rhs.draws,
            penta_ww: self.penta_ww + rhs.penta_ww,
            penta_wd: self.penta_wd + rhs.penta_wd,
            penta_wl: self.penta_wl + rhs.penta_wl,
            penta_dd: self.penta_dd + rhs.penta_dd,
            penta_ld: self.penta_ld + rhs.penta_ld,
            penta_ll: self.penta_ll + rhs.penta_ll,
        }
    }
}

/// Aggregate scoreboard across every engine pair in the tournament, plus
/// a JSON-serializable snapshot for the autosave feature (distilled spec
/// §6's "persisted snapshot"; `stats.hpp`'s
/// `NLOHMANN_DEFINE_TYPE_NON_INTRUSIVE_ORDERED_JSON`).
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Scoreboard {
    #[serde(with = "pair_map_serde")]
    pairs: HashMap<PairKey, PairStats>,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one played game. `engine_a`/`engine_b` are the white/black
    /// engine names as actually assigned for this game; stats are always
    /// stored keyed by the pair's canonical (sorted) order, inverted on
    /// read if the canonical first engine was black this game.
    pub fn record_game(&mut self, white: &str, black: &str, white_score: f32) {
        let (key, swapped) = PairKey::new(white, black);
        let stats = self.pairs.entry(key).or_default();
        let (first_score, second_score) = if swapped {
            (1.0 - white_score, white_score)
        } else {
            (white_score, 1.0 - white_score)
        };
        let first_won = first_score > 0.5;
        let first_lost = first_score < 0.5;
        stats.add_game(first_won, first_lost);
    }

    /// Records a completed round-pair (two games between the same two
    /// engines with colors swapped) as one pentanomial outcome.
    /// `a_game1`/`a_game2` are `engine_a`'s individual score (0/0.5/1) in
    /// each of the round's two games, in the order they were played.
    pub fn record_pair(&mut self, engine_a: &str, engine_b: &str, a_game1: f32, a_game2: f32) {
        let (key, swapped) = PairKey::new(engine_a, engine_b);
        let stats = self.pairs.entry(key).or_default();
        if swapped {
            stats.add_pair(1.0 - a_game1, 1.0 - a_game2);
        } else {
            stats.add_pair(a_game1, a_game2);
        }
    }

    /// Stats for `engine` against `opponent`, from `engine`'s point of
    /// view regardless of which one is stored canonically-first.
    pub fn get(&self, engine: &str, opponent: &str) -> PairStats {
        let (key, swapped) = PairKey::new(engine, opponent);
        let stats = self.pairs.get(&key).copied().unwrap_or_default();
        if swapped {
            stats.invert()
        } else {
            stats
        }
    }

    /// Every recorded pair and its stats, canonical-first order, for the
    /// final tournament report.
    pub fn iter(&self) -> impl Iterator<Item = (&PairKey, &PairStats)> {
        self.pairs.iter()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

mod pair_map_serde {
    use super::PairStats;
    use crate::data::PairKey;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::HashMap;

    #[derive(Serialize, Deserialize)]
    struct Entry {
        first: String,
        second: String,
        stats: PairStats,
    }

    pub fn serialize<S: Serializer>(
        map: &HashMap<PairKey, PairStats>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        let entries: Vec<Entry> = map
            .iter()
            .map(|(k, v)| Entry { first: k.0.clone(), second: k.1.clone(), stats: *v })
            .collect();
        entries.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<HashMap<PairKey, PairStats>, D::Error> {
        let entries = Vec::<Entry>::deserialize(d)?;
        Ok(entries.into_iter().map(|e| (PairKey(e.first, e.second), e.stats)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_pair_distinguishes_win_loss_from_draw_draw() {
        let mut stats = PairStats::default();
        stats.add_pair(1.0, 0.0); // {W, L}
        stats.add_pair(0.5, 0.5); // {D, D}
        assert_eq!(stats.penta_wl, 1);
        assert_eq!(stats.penta_dd, 1);
        assert_eq!(stats.total_pairs(), 2);
    }

    #[test]
    fn record_pair_classifies_every_bin_from_individual_game_scores() {
        let mut board = Scoreboard::new();
        board.record_pair("A", "B", 1.0, 1.0);
        board.record_pair("A", "B", 1.0, 0.5);
        board.record_pair("A", "B", 1.0, 0.0);
        board.record_pair("A", "B", 0.5, 0.5);
        board.record_pair("A", "B", 0.5, 0.0);
        board.record_pair("A", "B", 0.0, 0.0);
        let stats = board.get("A", "B");
        assert_eq!(stats.penta_ww, 1);
        assert_eq!(stats.penta_wd, 1);
        assert_eq!(stats.penta_wl, 1);
        assert_eq!(stats.penta_dd, 1);
        assert_eq!(stats.penta_ld, 1);
        assert_eq!(stats.penta_ll, 1);
        assert_eq!(stats.total_pairs(), 6);
    }

    #[test]
    fn invert_swaps_wins_losses_and_outer_pentanomial_bins() {
        let stats = PairStats {
            wins: 5,
            losses: 2,
            draws: 1,
            penta_ww: 3,
            penta_wd: 2,
            penta_wl: 1,
            penta_dd: 4,
            penta_ld: 1,
            penta_ll: 0,
        };
        let inv = stats.invert();
        assert_eq!(inv.wins, 2);
        assert_eq!(inv.losses, 5);
        assert_eq!(inv.draws, 1);
        assert_eq!(inv.penta_ww, 0);
        assert_eq!(inv.penta_ll, 3);
        assert_eq!(inv.penta_wd, 1);
        assert_eq!(inv.penta_ld, 2);
        assert_eq!(inv.penta_wl, 1);
        assert_eq!(inv.penta_dd, 4);
    }

    #[test]
    fn scoreboard_symmetry_regardless_of_name_order() {
        let mut board = Scoreboard::new();
        board.record_game("Alpha", "Zeta", 1.0);
        board.record_game("Zeta", "Alpha", 0.0);
        let from_alpha = board.get("Alpha", "Zeta");
        let from_zeta = board.get("Zeta", "Alpha");
        assert_eq!(from_alpha.wins, from_zeta.losses);
        assert_eq!(from_alpha.losses, from_zeta.wins);
    }

    #[test]
    fn json_round_trip() {
        let mut board = Scoreboard::new();
        board.record_game("A", "B", 1.0);
        let json = board.to_json().unwrap();
        let restored = Scoreboard::from_json(&json).unwrap();
        assert_eq!(board.get("A", "B"), restored.get("A", "B"));
    }
}
