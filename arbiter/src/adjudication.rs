//! Adjudicators: rules for declaring a result before the engines
//! themselves reach checkmate/stalemate. Generalizes the teacher's single
//! bundled `Adjudicator` (`adjudication.rs`) into independent trackers
//! chained in the distilled spec's priority order — Tablebase > Resign >
//! Draw > MaxMoves — which differs from the teacher's draw-then-resign
//! order.

use crate::data::{GameResult, Termination};

/// A probe into an external tablebase. No implementation ships with this
/// crate (tablebase file formats are out of scope); this is a seam a
/// caller can wire up, checked first in the adjudication chain because a
/// tablebase-proven result is never wrong.
pub trait TablebaseProbe: Send {
    fn probe(&self, fen: &str) -> Option<GameResult>;
}

/// Score-threshold adjudication shared by resign and draw trackers.
/// Direct port of `adjudication.rs::ScoreAdjudication`'s consecutive-ply
/// counter.
#[derive(Debug, Copy, Clone, Default)]
pub struct ScoreThreshold {
    pub move_number: usize,
    pub score_cp: i64,
    pub start_after_ply: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ResignTracker {
    pub rule: Option<ScoreThreshold>,
    pub two_sided: bool,
    white_counter: usize,
    black_counter: usize,
}

impl ResignTracker {
    pub fn new(rule: Option<ScoreThreshold>, two_sided: bool) -> Self {
        Self { rule, two_sided, white_counter: 0, black_counter: 0 }
    }

    /// `white_score_cp`/`black_score_cp` are each side's own evaluation of
    /// the current position, from that side's point of view. In one-sided
    /// mode a side resigns once its own score has stayed at or below
    /// `-score_cp` for `move_number` consecutive plies; in `twosided` mode
    /// the opponent's own score must simultaneously confirm the same
    /// conclusion (at or above `+score_cp`) each of those plies.
    pub fn observe(
        &mut self,
        ply: usize,
        white_score_cp: i64,
        black_score_cp: i64,
    ) -> Option<(GameResult, String)> {
        let rule = self.rule?;
        if ply < rule.start_after_ply {
            return None;
        }
        let white_losing = white_score_cp <= -rule.score_cp
            && (!self.two_sided || black_score_cp >= rule.score_cp);
        let black_losing = black_score_cp <= -rule.score_cp
            && (!self.two_sided || white_score_cp >= rule.score_cp);
        self.white_counter = if white_losing { self.white_counter + 1 } else { 0 };
        self.black_counter = if black_losing { self.black_counter + 1 } else { 0 };
        let msg = |counter: usize| {
            format!("Limit of {} cp exceeded for {counter} plies in a row", rule.score_cp)
        };
        if self.white_counter >= rule.move_number {
            return Some((GameResult::BlackWin, msg(self.white_counter)));
        }
        if self.black_counter >= rule.move_number {
            return Some((GameResult::WhiteWin, msg(self.black_counter)));
        }
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct DrawTracker {
    pub rule: Option<ScoreThreshold>,
    counter: usize,
}

impl DrawTracker {
    pub fn new(rule: Option<ScoreThreshold>) -> Self {
        Self { rule, counter: 0 }
    }

    pub fn observe(
        &mut self,
        ply: usize,
        white_score_cp: i64,
        black_score_cp: i64,
    ) -> Option<(GameResult, String)> {
        let rule = self.rule?;
        if ply < rule.start_after_ply {
            return None;
        }
        let both_quiet = white_score_cp.abs() < rule.score_cp && black_score_cp.abs() < rule.score_cp;
        self.counter = if both_quiet { self.counter + 1 } else { 0 };
        if self.counter >= rule.move_number {
            Some((
                GameResult::Draw,
                format!(
                    "Both engine's score was less than {} cp for {} plies in a row",
                    rule.score_cp, self.counter
                ),
            ))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MaxMovesTracker {
    pub max_full_moves: Option<usize>,
}

impl MaxMovesTracker {
    pub fn observe(&self, ply: usize) -> Option<(GameResult, String)> {
        let max = self.max_full_moves?;
        if ply >= max * 2 {
            Some((GameResult::Draw, format!("maximum of {max} moves was reached")))
        } else {
            None
        }
    }
}

/// Chains all adjudicators in priority order: a tablebase hit is
/// authoritative and checked first, then resignation, then the quiet-
/// position draw rule, then the hard move cap.
pub struct Adjudicator {
    pub tablebase: Option<Box<dyn TablebaseProbe>>,
    pub resign: ResignTracker,
    pub draw: DrawTracker,
    pub max_moves: MaxMovesTracker,
}

impl Adjudicator {
    pub fn new(
        resign: Option<ScoreThreshold>,
        resign_two_sided: bool,
        draw: Option<ScoreThreshold>,
        max_full_moves: Option<usize>,
    ) -> Self {
        Self {
            tablebase: None,
            resign: ResignTracker::new(resign, resign_two_sided),
            draw: DrawTracker::new(draw),
            max_moves: MaxMovesTracker { max_full_moves },
        }
    }

    pub fn adjudicate(
        &mut self,
        fen: &str,
        ply: usize,
        white_score_cp: i64,
        black_score_cp: i64,
    ) -> Option<(GameResult, Termination, String)> {
        if let Some(tb) = &self.tablebase {
            if let Some(result) = tb.probe(fen) {
                return Some((result, Termination::Adjudication, "tablebase".to_string()));
            }
        }
        if let Some((result, msg)) = self.resign.observe(ply, white_score_cp, black_score_cp) {
            return Some((result, Termination::Adjudication, msg));
        }
        if let Some((result, msg)) = self.draw.observe(ply, white_score_cp, black_score_cp) {
            return Some((result, Termination::Adjudication, msg));
        }
        if let Some((result, msg)) = self.max_moves.observe(ply) {
            return Some((result, Termination::Adjudication, msg));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(move_number: usize, score_cp: i64) -> ScoreThreshold {
        ScoreThreshold { move_number, score_cp, start_after_ply: 0 }
    }

    #[test]
    fn resign_fires_after_consecutive_plies() {
        let mut t = ResignTracker::new(Some(rule(3, 600)), true);
        assert!(t.observe(1, -700, 700).is_none());
        assert!(t.observe(2, -700, 700).is_none());
        let result = t.observe(3, -700, 700);
        assert_eq!(result.unwrap().0, GameResult::BlackWin);
    }

    #[test]
    fn resign_counter_resets_on_recovery() {
        let mut t = ResignTracker::new(Some(rule(3, 600)), true);
        assert!(t.observe(1, -700, 700).is_none());
        assert!(t.observe(2, 0, 0).is_none());
        assert!(t.observe(3, -700, 700).is_none());
    }

    #[test]
    fn one_sided_resign_needs_no_opponent_confirmation() {
        let mut t = ResignTracker::new(Some(rule(2, 600)), false);
        assert!(t.observe(1, 0, -700).is_none());
        let result = t.observe(2, 0, -700);
        assert_eq!(result.unwrap().0, GameResult::WhiteWin);
    }

    #[test]
    fn two_sided_resign_requires_opponent_agreement() {
        let mut t = ResignTracker::new(Some(rule(2, 600)), true);
        assert!(t.observe(1, -700, 0).is_none());
        assert!(t.observe(2, -700, 0).is_none());
        assert!(t.observe(3, -700, 0).is_none());
    }

    #[test]
    fn draw_fires_when_both_quiet() {
        let mut t = DrawTracker::new(Some(rule(2, 50)));
        assert!(t.observe(1, 10, -10).is_none());
        let result = t.observe(2, 10, -10);
        assert_eq!(result.unwrap().0, GameResult::Draw);
    }

    #[test]
    fn priority_order_is_resign_before_draw() {
        let mut adj = Adjudicator::new(Some(rule(1, 600)), false, Some(rule(1, 700)), None);
        let (result, kind, _) = adj.adjudicate("startpos", 1, -650, 0).unwrap();
        assert_eq!(result, GameResult::BlackWin);
        assert_eq!(kind, Termination::Adjudication);
    }

    #[test]
    fn max_moves_fires_when_nothing_else_does() {
        let mut adj = Adjudicator::new(None, true, None, Some(1));
        let (result, _, _) = adj.adjudicate("startpos", 2, 0, 0).unwrap();
        assert_eq!(result, GameResult::Draw);
    }
}
