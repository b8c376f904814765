//! Round-robin pairing generator. Grounded on
//! `original_source/app/src/matchmaking/tournament/roundrobin/roundrobin.cpp`'s
//! `create()`/`createMatch()`: every unordered pair of engines plays
//! `rounds * games` times, colors alternate by game parity unless
//! `noswap` is set, and `reverse` flips that alternation; both games of a
//! round share the same opening.

use std::sync::Mutex;

/// One scheduled game: which two (0-based) engine indices play, in which
/// color assignment, on which opening, tagged with round/game ids for
/// archival and pentanomial pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    pub round_id: usize,
    pub game_id: usize,
    pub white: usize,
    pub black: usize,
    pub opening_id: usize,
}

pub struct PairingGenerator {
    num_engines: usize,
    rounds: usize,
    games_per_encounter: usize,
    noswap: bool,
    reverse: bool,
    num_openings: usize,
    state: Mutex<GenState>,
}

struct GenState {
    next_game_id: usize,
}

impl PairingGenerator {
    pub fn new(
        num_engines: usize,
        rounds: usize,
        games_per_encounter: usize,
        noswap: bool,
        reverse: bool,
        num_openings: usize,
    ) -> Self {
        Self {
            num_engines,
            rounds,
            games_per_encounter,
            noswap,
            reverse,
            num_openings: num_openings.max(1),
            state: Mutex::new(GenState { next_game_id: 0 }),
        }
    }

    pub fn total(&self) -> usize {
        let pairs = self.num_engines * self.num_engines.saturating_sub(1) / 2;
        pairs * self.rounds * self.games_per_encounter
    }

    fn pairing_for_game_id(&self, game_id: usize) -> Option<Pairing> {
        if game_id >= self.total() {
            return None;
        }
        let per_round_pair = self.games_per_encounter;
        let pairs_per_round = self.num_engines * self.num_engines.saturating_sub(1) / 2;
        let games_per_round = pairs_per_round * per_round_pair;
        let round_id = game_id / games_per_round;
        let within_round = game_id % games_per_round;
        let pair_index = within_round / per_round_pair;
        let game_in_pair = within_round % per_round_pair;

        let (first, second) = unordered_pair(pair_index, self.num_engines)?;
        let (mut white, mut black) = (first, second);
        if game_in_pair % 2 == 0 && !self.noswap {
            std::mem::swap(&mut white, &mut black);
        }
        if self.reverse {
            std::mem::swap(&mut white, &mut black);
        }
        Some(Pairing {
            round_id,
            game_id,
            white,
            black,
            opening_id: round_id % self.num_openings,
        })
    }

    /// Pops the next pairing to run, mutex-guarded so many worker threads
    /// can call this concurrently (`roundrobin.cpp`'s `game_gen_mutex_`).
    pub fn next(&self) -> Option<Pairing> {
        let mut state = self.state.lock().unwrap();
        let game_id = state.next_game_id;
        let pairing = self.pairing_for_game_id(game_id)?;
        state.next_game_id += 1;
        Some(pairing)
    }
}

/// The `pair_index`-th unordered pair out of `n` engines in lexicographic
/// order: (0,1), (0,2), ..., (0,n-1), (1,2), ...
fn unordered_pair(mut pair_index: usize, n: usize) -> Option<(usize, usize)> {
    for i in 0..n {
        let remaining = n - i - 1;
        if pair_index < remaining {
            return Some((i, i + 1 + pair_index));
        }
        pair_index -= remaining;
    }
    None
}
