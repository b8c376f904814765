//! Cross-module integration tests that need no engine process: pairing
//! generation feeding the scoreboard's pentanomial accounting, and the
//! adjudication chain feeding an SPRT decision. Each module already has
//! its own `#[cfg(test)]` unit tests; these exercise the seams between
//! them the way a real tournament run would.

use arbiter::adjudication::{Adjudicator, ScoreThreshold};
use arbiter::data::GameResult;
use arbiter::pairing::PairingGenerator;
use arbiter::scoreboard::Scoreboard;
use arbiter::sprt::{ScoreModel, Sprt, SprtResult};

/// Plays out a whole round-robin's worth of pairings against a scoreboard,
/// folding each round's two same-opening games (one per color) into one
/// pentanomial bin, exactly as `output::OutputFunnel::fold_into_round_pair`
/// does at runtime.
#[test]
fn pairing_generator_feeds_scoreboard_pentanomial_bins() {
    let gen = PairingGenerator::new(2, 4, 2, false, false, 1);
    let mut board = Scoreboard::new();
    let names = ["Alpha", "Bravo"];

    let mut half: Option<(usize, f32)> = None;
    while let Some(pairing) = gen.next() {
        let white = names[pairing.white];
        let black = names[pairing.black];
        // White always wins in this synthetic run.
        board.record_game(white, black, 1.0);

        let (key, swapped) = arbiter::data::PairKey::new(white, black);
        let _ = key;
        let first_score = if swapped { 0.0 } else { 1.0 };
        match half.take() {
            Some((round, other)) if round == pairing.round_id => {
                board.record_pair(names[0], names[1], other, first_score);
            }
            _ => half = Some((pairing.round_id, first_score)),
        }
    }

    let stats = board.get("Alpha", "Bravo");
    assert_eq!(stats.total_games(), 8);
    assert_eq!(stats.total_pairs(), 4);
    // Every round splits 1-1 (each color wins once), so every pair is a
    // draw-draw outcome from Alpha's perspective.
    assert_eq!(stats.penta_dd, 4);
}

#[test]
fn adjudication_feeds_sprt_to_a_decision() {
    let sprt = Sprt::new(0.0, 10.0, 0.05, 0.05, ScoreModel::Logistic, false).unwrap();
    let mut adj = Adjudicator::new(
        Some(ScoreThreshold { move_number: 3, score_cp: 500, start_after_ply: 0 }),
        false,
        None,
        None,
    );
    let mut board = Scoreboard::new();

    // Drive enough decisive games through the adjudicator and scoreboard
    // that the SPRT test reaches AcceptH1 in favor of the stronger engine.
    let mut decided = SprtResult::Continue;
    for game in 0..400 {
        let (result, _, _) = adj
            .adjudicate("irrelevant fen", 3, -600, 0)
            .expect("resign rule fires every game since white is always losing");
        assert_eq!(result, GameResult::BlackWin);
        board.record_game("Strong", "Weak", 0.0);
        let stats = board.get("Strong", "Weak");
        decided = sprt.decide(sprt.llr(stats));
        if decided != SprtResult::Continue {
            assert_eq!(game > 0, true);
            break;
        }
        // reset the resign tracker's counters for the next synthetic game
        adj.resign = arbiter::adjudication::ResignTracker::new(
            Some(ScoreThreshold { move_number: 3, score_cp: 500, start_after_ply: 0 }),
            false,
        );
        adj.resign.observe(1, -600, 0);
        adj.resign.observe(2, -600, 0);
    }
    assert_eq!(decided, SprtResult::AcceptH1);
}
