//! Deterministic PGN text formatting from a completed [`MatchData`].
//! Generalizes `gears::output::pgn::match_to_pgn_string`, which formats a
//! live `GameState` as it's still being played, into a formatter driven
//! off an already-finished, already-recorded match: it needs the
//! recorded start/end timestamps and round/variant metadata instead of a
//! board reference it can walk move-by-move.

use crate::config::Variant;
use crate::data::{MatchData, MoveRecord, Termination};
use chrono::{DateTime, Utc};

const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
const WRAP_COLUMN: usize = 80;

/// Which optional per-move comment fields to emit, each independently
/// enabled (distilled §6: "Optional comment fields per move ... enabled
/// individually").
#[derive(Debug, Copy, Clone, Default)]
pub struct CommentFields {
    pub score: bool,
    pub depth: bool,
    pub seldepth: bool,
    pub nodes: bool,
    pub nps: bool,
    pub hashfull: bool,
    pub tbhits: bool,
    pub time_left: bool,
    pub latency: bool,
    pub pv: bool,
}

impl CommentFields {
    pub fn all() -> Self {
        Self {
            score: true,
            depth: true,
            seldepth: true,
            nodes: true,
            nps: true,
            hashfull: true,
            tbhits: true,
            time_left: true,
            latency: true,
            pv: true,
        }
    }

    fn any(&self) -> bool {
        self.score
            || self.depth
            || self.seldepth
            || self.nodes
            || self.nps
            || self.hashfull
            || self.tbhits
            || self.time_left
            || self.latency
            || self.pv
    }
}

/// Formats a centipawn score as `+cc.cc`/`-cc.cc`, or a mate score as
/// `+Mk`/`-Mk` where `k` is plies-to-mate, per distilled §4.2's scoring
/// rule (`k = score*2 - 1` for a positive mate count, `-score*2` for a
/// negative one).
pub fn format_score(score_cp: Option<i64>, score_mate: Option<i32>) -> Option<String> {
    if let Some(mate) = score_mate {
        let plies = if mate > 0 { mate * 2 - 1 } else { -mate * 2 };
        let sign = if mate > 0 { '+' } else { '-' };
        return Some(format!("{sign}M{plies}"));
    }
    score_cp.map(|cp| format!("{:+.2}", cp as f64 / 100.0))
}

fn move_comment(mov: &MoveRecord, fields: CommentFields) -> Option<String> {
    if !fields.any() {
        return None;
    }
    let mut parts = Vec::new();
    if fields.score {
        if let Some(s) = format_score(mov.score_cp, mov.score_mate) {
            parts.push(s);
        }
    }
    if fields.depth {
        if let Some(d) = mov.depth {
            parts.push(format!("d={d}"));
        }
    }
    if fields.seldepth {
        if let Some(sd) = mov.seldepth {
            parts.push(format!("sd={sd}"));
        }
    }
    if fields.nodes {
        if let Some(n) = mov.nodes {
            parts.push(format!("n={n}"));
        }
    }
    if fields.nps {
        if let Some(nps) = mov.nps {
            parts.push(format!("nps={nps}"));
        }
    }
    if fields.hashfull {
        if let Some(h) = mov.hashfull {
            parts.push(format!("hashfull={h}"));
        }
    }
    if fields.tbhits {
        if let Some(tb) = mov.tbhits {
            parts.push(format!("tbhits={tb}"));
        }
    }
    if fields.time_left {
        if let Some(tl) = mov.time_left {
            parts.push(format!("tl={:.3}", tl.as_secs_f64()));
        }
    }
    if fields.latency {
        if let Some(lat) = mov.latency {
            parts.push(format!("latency={:.3}", lat.as_secs_f64()));
        }
    }
    parts.push(format!("{:.3}s", mov.time_taken.as_secs_f64()));
    if fields.pv && !mov.pv.is_empty() {
        parts.push(format!("pv=\"{}\"", mov.pv.join(" ")));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Builds the full PGN text for one finished game, required tags first
/// (Event/Site/Date/Round/White/Black/Result, plus FEN/SetUp when the
/// game didn't start from the normal starting array), then the movetext,
/// soft-wrapped at 80 columns, terminated with the canonical result
/// token.
pub fn format(data: &MatchData, variant: Variant, fields: CommentFields) -> String {
    let date: DateTime<Utc> = data.start_time.into();
    let non_standard_start = data.opening.fen != STARTPOS_FEN || variant == Variant::Chess960;

    let mut header = format!(
        "[Event \"{}\"]\n[Site \"{}\"]\n[Date \"{}\"]\n[Round \"{}\"]\n[White \"{}\"]\n[Black \"{}\"]\n[Result \"{}\"]\n",
        data.event,
        data.site,
        date.format("%Y.%m.%d"),
        data.round_id + 1,
        data.white,
        data.black,
        data.result.to_canonical_string(),
    );
    if non_standard_start {
        header += &format!("[FEN \"{}\"]\n[SetUp \"1\"]\n", data.opening.fen);
    }
    header += &format!("[PlyCount \"{}\"]\n", data.moves.len());
    header += &format!(
        "[Termination \"{}\"]\n",
        data.termination.pgn_string(data.termination_detail.as_deref())
    );

    let mut line = String::new();
    let mut body = String::new();
    let mut push_token = |body: &mut String, line: &mut String, token: &str| {
        if !line.is_empty() && line.len() + 1 + token.len() > WRAP_COLUMN {
            body.push('\n');
            line.clear();
        } else if !line.is_empty() {
            body.push(' ');
            line.push(' ');
        }
        body.push_str(token);
        line.push_str(token);
    };

    let start_black = starting_side_is_black(&data.opening.moves);
    for (ply, mov) in data.moves.iter().enumerate() {
        let move_number = ply / 2 + 1;
        let white_to_move = (ply % 2 == 0) != start_black;
        if white_to_move {
            push_token(&mut body, &mut line, &format!("{move_number}."));
        } else if ply == 0 {
            push_token(&mut body, &mut line, &format!("{move_number}..."));
        }
        push_token(&mut body, &mut line, &mov.mov);
        if let Some(comment) = move_comment(mov, fields) {
            push_token(&mut body, &mut line, &format!("{{{comment}}}"));
        }
    }
    let terminator = match data.termination {
        Termination::Interrupt => "*",
        _ => data.result.to_canonical_string(),
    };
    push_token(&mut body, &mut line, terminator);

    format!("{header}\n{body}\n")
}

fn starting_side_is_black(opening_moves: &[String]) -> bool {
    opening_moves.len() % 2 == 1
}

/// Convenience used by tests and by the unconfigured default: a PGN with
/// every comment field enabled.
pub fn format_verbose(data: &MatchData) -> String {
    format(data, Variant::Standard, CommentFields::all())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{GameResult, Opening, Termination};
    use std::time::{Duration, SystemTime};

    fn sample_match() -> MatchData {
        MatchData {
            round_id: 0,
            game_id: 0,
            white: "EngineA".to_string(),
            black: "EngineB".to_string(),
            opening: Opening { id: 0, fen: STARTPOS_FEN.to_string(), moves: vec![] },
            result: GameResult::WhiteWin,
            termination: Termination::Normal,
            termination_detail: None,
            moves: vec![
                MoveRecord {
                    mov: "e2e4".to_string(),
                    time_taken: Duration::from_millis(100),
                    score_cp: Some(30),
                    score_mate: None,
                    depth: Some(10),
                    seldepth: Some(14),
                    nodes: Some(1000),
                    nps: Some(500_000),
                    hashfull: Some(12),
                    tbhits: Some(0),
                    latency: Some(Duration::from_millis(5)),
                    time_left: Some(Duration::from_secs(59)),
                    pv: vec!["e2e4".to_string()],
                },
                MoveRecord {
                    mov: "e7e5".to_string(),
                    time_taken: Duration::from_millis(120),
                    score_cp: Some(-20),
                    score_mate: None,
                    depth: Some(9),
                    seldepth: Some(12),
                    nodes: Some(900),
                    nps: Some(450_000),
                    hashfull: Some(10),
                    tbhits: Some(0),
                    latency: Some(Duration::from_millis(6)),
                    time_left: Some(Duration::from_secs(58)),
                    pv: vec![],
                },
            ],
            start_time: SystemTime::now(),
            end_time: SystemTime::now(),
            event: "Test Event".to_string(),
            site: "Test Site".to_string(),
        }
    }

    #[test]
    fn deterministic_for_fixed_input() {
        let data = sample_match();
        let a = format_verbose(&data);
        let b = format_verbose(&data);
        assert_eq!(a, b);
    }

    #[test]
    fn omits_fen_tag_for_standard_start() {
        let data = sample_match();
        let text = format(&data, Variant::Standard, CommentFields::default());
        assert!(!text.contains("[FEN"));
    }

    #[test]
    fn includes_fen_tag_for_chess960() {
        let data = sample_match();
        let text = format(&data, Variant::Chess960, CommentFields::default());
        assert!(text.contains("[FEN"));
        assert!(text.contains("[SetUp \"1\"]"));
    }

    #[test]
    fn ends_with_canonical_result_token() {
        let data = sample_match();
        let text = format(&data, Variant::Standard, CommentFields::default());
        assert!(text.trim_end().ends_with("1-0"));
    }

    #[test]
    fn mate_score_formats_as_plies_to_mate() {
        assert_eq!(format_score(None, Some(3)).unwrap(), "+M5");
        assert_eq!(format_score(None, Some(-2)).unwrap(), "-M4");
    }

    #[test]
    fn cp_score_formats_as_signed_decimal() {
        assert_eq!(format_score(Some(123), None).unwrap(), "+1.23");
        assert_eq!(format_score(Some(-45), None).unwrap(), "-0.45");
    }
}
