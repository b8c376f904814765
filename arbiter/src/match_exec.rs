//! The match executor: drives one chess game between two already-spawned
//! engines to a result. Generalizes `run_match.rs`'s unfinished
//! `BuiltInMatch` loop (handshake once, then alternate `position`/`go`/
//! `bestmove` until the rules or the clock end the game) into a
//! synchronous, single-threaded per-game loop that a worker thread in
//! `scheduler.rs` owns outright — no shared mutable match state, so the
//! only cross-thread seam is the [`CancellationToken`] checked once per
//! ply.

use crate::adjudication::Adjudicator;
use crate::data::{EngineConfig, GameResult, MatchData, MoveRecord, Opening, Termination};
use crate::protocol::{BestMoveOutcome, Driver};
use crate::time_control::Clock;
use gears::games::chess::moves::ChessMove;
use gears::games::chess::Chessboard;
use gears::games::{BoardHistory, ZobristHistory};
use gears::general::board::Board;
use gears::general::moves::Move;
use gears::PlayerResult;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// Grace window added on top of an engine's own clock budget before a
/// non-responding engine is treated as stalled rather than merely slow;
/// also the absolute watchdog for engines on an infinite time control,
/// since `go infinite` has no clock of its own to bound the wait by.
const STALL_GRACE: Duration = Duration::from_secs(5);
const STALL_ABSOLUTE_CAP: Duration = Duration::from_secs(600);
const READYOK_TIMEOUT: Duration = Duration::from_secs(10);
/// Bound on draining a timed-out engine's output after sending `stop`, so a
/// still-thinking process doesn't block the worker past its game.
const TIMEOUT_DRAIN_DEADLINE: Duration = Duration::from_secs(10);

/// Shared cooperative-cancellation flag. Checked once per ply rather than
/// inside the transport's read loop: a worker thread polling every ply
/// responds to a tournament-wide stop within one engine move, which is
/// good enough, and keeps the blocking read loop in `transport.rs` free
/// of a second synchronization primitive.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything identifying one game, as opposed to the engines playing it
/// (those are passed separately since the scheduler owns their lifetime
/// across multiple games via `engine_cache.rs`).
pub struct GameSpec {
    pub round_id: usize,
    pub game_id: usize,
    pub white_config: EngineConfig,
    pub black_config: EngineConfig,
    pub opening: Opening,
    pub event: String,
    pub site: String,
}

/// Plays one game to completion and returns its full record. `white`/
/// `black` must already be past their handshake; this function sends
/// `ucinewgame`/`uginewgame` itself.
pub fn play_game(
    white: &mut Driver,
    black: &mut Driver,
    spec: &GameSpec,
    adjudicator: &mut Adjudicator,
    stop: &CancellationToken,
) -> MatchData {
    let start_time = SystemTime::now();
    let mut board = Chessboard::from_fen(&spec.opening.fen)
        .expect("opening FEN must already be validated when the book was loaded");

    let mut history = ZobristHistory::default();
    history.push(&board);
    let mut moves: Vec<String> = Vec::new();
    for mov_text in &spec.opening.moves {
        let mov = ChessMove::from_compact_text(mov_text, &board)
            .expect("opening book moves must already be validated when the book was loaded");
        board = board.make_move(mov).expect("opening book move must be legal");
        history.push(&board);
        moves.push(mov_text.clone());
    }

    for (driver, config) in [(&mut *white, &spec.white_config), (&mut *black, &spec.black_config)] {
        if driver.new_game().is_err() {
            return finish(spec, Vec::new(), disconnect_result(&board), Termination::Disconnect, None, start_time);
        }
        for (name, value) in &config.options {
            let _ = driver.set_option(name, value);
        }
    }

    let mut white_clock = Clock::new(spec.white_config.tc, spec.white_config.time_margin);
    let mut black_clock = Clock::new(spec.black_config.tc, spec.black_config.time_margin);
    let mut white_last_score_cp: i64 = 0;
    let mut black_last_score_cp: i64 = 0;
    let mut move_records = Vec::new();

    loop {
        if stop.is_cancelled() {
            return finish(spec, move_records, disconnect_result(&board), Termination::Interrupt, None, start_time);
        }

        if let Some(player_result) = board.player_result_slow(&history) {
            let result = player_result_to_game_result(player_result, &board);
            return finish(spec, move_records, result, Termination::Normal, None, start_time);
        }

        if let Some((result, kind, detail)) = adjudicator.adjudicate(
            &board.as_fen(),
            board.halfmove_ctr_since_start(),
            white_last_score_cp,
            black_last_score_cp,
        ) {
            return finish(spec, move_records, result, kind, Some(detail), start_time);
        }

        let white_to_move = board.active_player().is_first();
        let (driver, config, side_name) = if white_to_move {
            (&mut *white, &spec.white_config, "white")
        } else {
            (&mut *black, &spec.black_config, "black")
        };

        match driver.is_ready(READYOK_TIMEOUT) {
            Ok(true) => {}
            Ok(false) => {
                let result = disconnect_result(&board);
                return finish(
                    spec,
                    move_records,
                    result,
                    Termination::Stall,
                    Some(format!("{side_name} did not answer isready in time")),
                    start_time,
                );
            }
            Err(_) => {
                let result = disconnect_result(&board);
                return finish(
                    spec,
                    move_records,
                    result,
                    Termination::Disconnect,
                    Some(format!("{side_name}'s process disconnected while probing readiness")),
                    start_time,
                );
            }
        }

        if driver.set_position(&spec.opening.fen, &moves).is_err() {
            let result = disconnect_result(&board);
            return finish(spec, move_records, result, Termination::Disconnect, None, start_time);
        }

        let go_cmd = build_go_for(driver, white_to_move, &white_clock, &black_clock, config);
        if driver.go(&go_cmd).is_err() {
            let result = disconnect_result(&board);
            return finish(spec, move_records, result, Termination::Disconnect, None, start_time);
        }

        let clock = if white_to_move { &mut white_clock } else { &mut black_clock };
        let budget = if clock.tc.is_infinite() { STALL_ABSOLUTE_CAP } else { clock.remaining + clock.margin };
        let deadline = Instant::now() + budget + STALL_GRACE;
        let started = Instant::now();
        let outcome = driver.wait_for_best_move(deadline);
        let elapsed = started.elapsed();

        let (mov_text, ponder_unused, info) = match outcome {
            Err(_) | Ok(BestMoveOutcome::Disconnected) => {
                let result = disconnect_result(&board);
                return finish(
                    spec,
                    move_records,
                    result,
                    Termination::Disconnect,
                    Some(format!("{side_name}'s process terminated unexpectedly")),
                    start_time,
                );
            }
            Ok(BestMoveOutcome::Timeout) => {
                let result = disconnect_result(&board);
                return finish(
                    spec,
                    move_records,
                    result,
                    Termination::Stall,
                    Some(format!("{side_name} did not respond within the communication timeout")),
                    start_time,
                );
            }
            Ok(BestMoveOutcome::Move { mov, ponder, last_info }) => (mov, ponder, last_info),
        };
        let _ = ponder_unused;

        if clock.consume(elapsed) {
            let result = if white_to_move { GameResult::BlackWin } else { GameResult::WhiteWin };
            // Don't leave a still-thinking engine behind: ask it to stop and
            // drain until it replies or the bounded wait runs out.
            let _ = driver.send_stop();
            let _ = driver.wait_for_best_move(Instant::now() + TIMEOUT_DRAIN_DEADLINE);
            return finish(
                spec,
                move_records,
                result,
                Termination::Timeout,
                Some(format!("{side_name} forfeits on time")),
                start_time,
            );
        }

        let parsed = ChessMove::from_compact_text(&mov_text, &board)
            .ok()
            .filter(|m| board.is_move_legal(*m));
        let Some(mov) = parsed else {
            let result = if white_to_move { GameResult::BlackWin } else { GameResult::WhiteWin };
            return finish(
                spec,
                move_records,
                result,
                Termination::IllegalMove,
                Some(format!("{side_name} played illegal move '{mov_text}'")),
                start_time,
            );
        };

        if white_to_move {
            white_last_score_cp = info.score_cp.unwrap_or(white_last_score_cp);
        } else {
            black_last_score_cp = info.score_cp.unwrap_or(black_last_score_cp);
        }
        // PGN comments read conventionally from White's perspective, unlike
        // the engine's own side-to-move-relative `score cp`/`score mate`.
        let pgn_score_cp = info.score_cp.map(|cp| if white_to_move { cp } else { -cp });
        let pgn_score_mate = info.score_mate.map(|m| if white_to_move { m } else { -m });
        let latency = info.time.map(|reported| elapsed.saturating_sub(reported));

        move_records.push(MoveRecord {
            mov: mov_text.clone(),
            time_taken: elapsed,
            score_cp: pgn_score_cp,
            score_mate: pgn_score_mate,
            depth: info.depth,
            seldepth: info.seldepth,
            nodes: info.nodes,
            nps: info.nps,
            hashfull: info.hashfull,
            tbhits: info.tbhits,
            latency,
            time_left: Some(clock.remaining),
            pv: info.pv,
        });
        moves.push(mov_text);
        board = board.make_move(mov).expect("is_move_legal already checked make_move succeeds");
        history.push(&board);
    }
}

/// Builds the `go` command for whichever side is to move, carrying the
/// *true* clocks of both sides (distilled §4.2's `go(our_tc, their_tc,
/// side_to_move)`) rather than reusing the mover's own remaining time for
/// both `wtime` and `btime`.
fn build_go_for(
    driver: &Driver,
    white_to_move: bool,
    white_clock: &Clock,
    black_clock: &Clock,
    config: &EngineConfig,
) -> String {
    let mover_clock = if white_to_move { white_clock } else { black_clock };
    let (wtime, btime) = if mover_clock.tc.is_infinite() {
        (None, None)
    } else if config.fixed_move_time.is_none() {
        (Some(white_clock.remaining), Some(black_clock.remaining))
    } else {
        (None, None)
    };
    driver.build_go(
        wtime,
        btime,
        white_clock.tc.increment,
        black_clock.tc.increment,
        mover_clock.moves_until_reset,
        config.fixed_move_time,
        config.depth,
        config.nodes,
    )
}

/// `player_result_slow` is reported from the active player's point of
/// view; convert it into an absolute white/black result.
fn player_result_to_game_result(result: PlayerResult, board: &Chessboard) -> GameResult {
    let white_to_move = board.active_player().is_first();
    match result {
        PlayerResult::Draw => GameResult::Draw,
        PlayerResult::Win => {
            if white_to_move {
                GameResult::WhiteWin
            } else {
                GameResult::BlackWin
            }
        }
        PlayerResult::Lose => {
            if white_to_move {
                GameResult::BlackWin
            } else {
                GameResult::WhiteWin
            }
        }
    }
}

/// A disconnect/interrupt doesn't decide a winner on the board; callers
/// that need a `GameResult` to feed the scoreboard record it as a draw,
/// matching the teacher's `Aborted` handling of "no winner can be
/// declared" (see DESIGN.md's resolution of the abandoned-game scoring
/// open question).
fn disconnect_result(_board: &Chessboard) -> GameResult {
    GameResult::Draw
}

fn finish(
    spec: &GameSpec,
    moves: Vec<MoveRecord>,
    result: GameResult,
    termination: Termination,
    detail: Option<String>,
    start_time: SystemTime,
) -> MatchData {
    MatchData {
        round_id: spec.round_id,
        game_id: spec.game_id,
        white: spec.white_config.display_name.clone(),
        black: spec.black_config.display_name.clone(),
        opening: spec.opening.clone(),
        result,
        termination,
        termination_detail: detail,
        moves,
        start_time,
        end_time: SystemTime::now(),
        event: spec.event.clone(),
        site: spec.site.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Protocol;
    use crate::protocol::Driver;
    use crate::transport::EngineProcess;
    use std::path::PathBuf;

    fn engine_config(name: &str, script: &str) -> EngineConfig {
        EngineConfig {
            display_name: name.to_string(),
            cmd: "/bin/sh".to_string(),
            dir: None,
            args: vec!["-c".to_string(), script.to_string()],
            proto: Protocol::Uci,
            tc: "1+0".parse().unwrap(),
            time_margin: Duration::from_millis(100),
            fixed_move_time: None,
            nodes: None,
            depth: None,
            options: Vec::new(),
            log_name: format!("{name}_stderr.log"),
            restart: false,
        }
    }

    fn spawn_and_handshake(config: &EngineConfig) -> Driver {
        let log = PathBuf::from(format!("/tmp/{}.stderr", config.display_name));
        let process = EngineProcess::spawn(&config.display_name, &config.cmd, &config.args, config.dir.as_deref(), &log)
            .expect("spawn sh");
        let mut driver = Driver::new(process, config.proto);
        driver.handshake().expect("handshake with scripted shell engine");
        driver
    }

    /// A minimal shell "engine" that always replies with a fixed legal
    /// opening move, used to exercise the normal-termination path without
    /// depending on a real chess engine binary.
    const ALWAYS_E4: &str = r#"
while read -r line; do
  case "$line" in
    uci) echo "uciok" ;;
    isready) echo "readyok" ;;
    go*) echo "bestmove e2e4" ;;
  esac
done
"#;

    #[test]
    fn illegal_move_ends_the_game_immediately() {
        let always_bad_move = r#"
while read -r line; do
  case "$line" in
    uci) echo "uciok" ;;
    isready) echo "readyok" ;;
    go*) echo "bestmove z9z9" ;;
  esac
done
"#;
        let white_config = engine_config("white", ALWAYS_E4);
        let black_config = engine_config("black", always_bad_move);
        let mut white = spawn_and_handshake(&white_config);
        let mut black = spawn_and_handshake(&black_config);
        let spec = GameSpec {
            round_id: 0,
            game_id: 0,
            white_config,
            black_config,
            opening: Opening {
                id: 0,
                fen: "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1".to_string(),
                moves: Vec::new(),
            },
            event: "test".to_string(),
            site: "test".to_string(),
        };
        let mut adjudicator = Adjudicator::new(None, false, None, None);
        let stop = CancellationToken::new();
        let data = play_game(&mut white, &mut black, &spec, &mut adjudicator, &stop);
        assert_eq!(data.termination, Termination::IllegalMove);
        assert_eq!(data.result, GameResult::WhiteWin);
        assert_eq!(data.moves.len(), 1);
    }

    #[test]
    fn cancellation_token_stops_the_next_ply() {
        let white_config = engine_config("white", ALWAYS_E4);
        let black_config = engine_config("black", ALWAYS_E4);
        let mut white = spawn_and_handshake(&white_config);
        let mut black = spawn_and_handshake(&black_config);
        let spec = GameSpec {
            round_id: 0,
            game_id: 1,
            white_config,
            black_config,
            opening: Opening {
                id: 0,
                fen: "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1".to_string(),
                moves: Vec::new(),
            },
            event: "test".to_string(),
            site: "test".to_string(),
        };
        let mut adjudicator = Adjudicator::new(None, false, None, None);
        let stop = CancellationToken::new();
        stop.cancel();
        let data = play_game(&mut white, &mut black, &spec, &mut adjudicator, &stop);
        assert_eq!(data.termination, Termination::Interrupt);
        assert!(data.moves.is_empty());
    }
}
