//! Scheduler and worker pool: dispatches every pairing from a
//! [`PairingGenerator`] onto a fixed-size pool of worker threads, each
//! driving its own [`EngineCache`] so engines stay warm across games,
//! funneling finished games back to one consumer thread in completion
//! order via `crossbeam-channel`. Grounded on
//! `original_source/app/src/matchmaking/tournament/roundrobin/roundrobin.cpp`'s
//! `start`/`startNext`/`pool_.enqueue` dispatch loop, re-expressed with
//! `std::thread` + a channel instead of a bespoke thread pool class.

use crate::adjudication::Adjudicator;
use crate::config::{ArchiveWriter, OpeningBook, TournamentConfig};
use crate::data::EngineConfig;
use crate::engine_cache::EngineCache;
use crate::log::MultiLogger;
use crate::match_exec::{play_game, CancellationToken, GameSpec};
use crate::output::OutputFunnel;
use crate::pairing::PairingGenerator;
use crate::scoreboard::Scoreboard;
use crate::sprt::Sprt;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Cross-thread counters and flags the worker pool and its consumer both
/// watch. Not the per-ply [`CancellationToken`] (that's cloned per worker
/// from a single source so a stop request reaches every in-flight game).
#[derive(Default)]
pub struct SchedulerState {
    pub finished: AtomicUsize,
    pub abnormal_termination: AtomicBool,
}

/// Bound on per-pairing restart attempts after a disconnect/stall before
/// the scheduler gives up on that pairing entirely (distinct from
/// `EngineCache`'s own per-engine restart cap: this bounds how many times
/// a single game is retried against a freshly restarted engine).
const MAX_GAME_RETRIES: u32 = 2;

pub struct RunSummary {
    pub scoreboard: Scoreboard,
    pub games_played: usize,
    pub aborted_early: bool,
}

/// Runs the whole tournament: spawns `concurrency` worker threads, each
/// pulling pairings from `pairing_gen` until it's exhausted or a stop is
/// requested, and drains results on the calling thread through `funnel`.
pub fn run(
    config: &TournamentConfig,
    pairing_gen: Arc<PairingGenerator>,
    opening_book: Arc<dyn OpeningBook>,
    archive: Box<dyn ArchiveWriter>,
    sprt: Option<Sprt>,
    log_dir: PathBuf,
    logger: Arc<MultiLogger>,
    autosave_path: Option<PathBuf>,
) -> RunSummary {
    let concurrency = resolve_concurrency(config);
    if config.use_affinity {
        logger.warning("CPU affinity pinning was requested but is not implemented; running unpinned");
    }

    let funnel = Arc::new(OutputFunnel::new(
        archive,
        sprt,
        pairing_gen.total(),
        config.variant,
        crate::archive::pgn::CommentFields::all(),
        config.autosave_interval.unwrap_or(pairing_gen.total().max(1)),
    ));

    let state = Arc::new(SchedulerState::default());
    let stop = CancellationToken::new();
    let (tx, rx): (Sender<crate::data::MatchData>, Receiver<crate::data::MatchData>) = bounded(concurrency * 2 + 1);

    let mut handles = Vec::with_capacity(concurrency);
    for worker_id in 0..concurrency {
        let pairing_gen = Arc::clone(&pairing_gen);
        let opening_book = Arc::clone(&opening_book);
        let state = Arc::clone(&state);
        let stop = stop.clone();
        let tx = tx.clone();
        let logger = Arc::clone(&logger);
        let config = config.clone();
        let log_dir = log_dir.clone();
        handles.push(std::thread::spawn(move || {
            worker_loop(worker_id, &config, &pairing_gen, &opening_book, &state, &stop, &tx, &logger, &log_dir);
        }));
    }
    drop(tx);

    let mut games_played = 0usize;
    for data in rx.iter() {
        games_played += 1;
        state.finished.fetch_add(1, Ordering::SeqCst);
        if let Some(decided) = funnel.record(data, &logger) {
            logger.info(&format!("stopping tournament: SPRT decided {decided:?}"));
            stop.cancel();
        }
        if let Some(path) = &autosave_path {
            if games_played % config.autosave_interval.unwrap_or(usize::MAX) == 0 {
                // best-effort snapshot; failures are logged, never fatal
                if let Ok(json) = funnel.snapshot_json() {
                    if let Err(e) = std::fs::write(path, json) {
                        logger.warning(&format!("failed to write autosave snapshot: {e}"));
                    }
                }
            }
        }
    }

    for handle in handles {
        let _ = handle.join();
    }

    let aborted_early = state.abnormal_termination.load(Ordering::SeqCst) || stop.is_cancelled();
    let funnel = Arc::try_unwrap(funnel).unwrap_or_else(|_| unreachable!("all workers joined"));
    RunSummary { scoreboard: funnel.finish(), games_played, aborted_early }
}

fn resolve_concurrency(config: &TournamentConfig) -> usize {
    let available = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    if config.force_concurrency {
        config.concurrency.max(1)
    } else {
        config.concurrency.max(1).min(available)
    }
}

#[allow(clippy::too_many_arguments)]
fn worker_loop(
    worker_id: usize,
    config: &TournamentConfig,
    pairing_gen: &PairingGenerator,
    opening_book: &dyn OpeningBook,
    state: &SchedulerState,
    stop: &CancellationToken,
    tx: &Sender<crate::data::MatchData>,
    logger: &MultiLogger,
    log_dir: &std::path::Path,
) {
    let mut cache = EngineCache::new(log_dir.to_path_buf());
    while !stop.is_cancelled() {
        let Some(pairing) = pairing_gen.next() else { break };
        let white_config = config.engines[pairing.white].clone();
        let black_config = config.engines[pairing.black].clone();
        let opening = opening_book.opening_for_round(pairing.opening_id);

        let mut attempt = 0;
        loop {
            let result = run_one_game(&mut cache, &white_config, &black_config, &opening, &pairing, config, stop);
            match result {
                Ok(data) => {
                    if tx.send(data).is_err() {
                        return;
                    }
                    break;
                }
                Err(reason) => {
                    attempt += 1;
                    logger.warning(&format!(
                        "worker {worker_id}: game {} between {} and {} failed ({reason}), attempt {attempt}",
                        pairing.game_id, white_config.display_name, black_config.display_name
                    ));
                    if !config.recover || attempt > MAX_GAME_RETRIES {
                        state.abnormal_termination.store(true, Ordering::SeqCst);
                        if !config.recover {
                            stop.cancel();
                        }
                        return;
                    }
                }
            }
        }
    }
}

/// Spawns (or reuses) both engines, plays one game, and returns its
/// record, or an error string describing why the pairing couldn't be
/// completed (always recoverable by restarting the named engine when
/// `recover` is set).
fn run_one_game(
    cache: &mut EngineCache,
    white_config: &EngineConfig,
    black_config: &EngineConfig,
    opening: &crate::data::Opening,
    pairing: &crate::pairing::Pairing,
    config: &TournamentConfig,
    stop: &CancellationToken,
) -> Result<crate::data::MatchData, String> {
    {
        let white = cache.get_or_spawn(white_config).map_err(|e| format!("white spawn: {e}"))?;
        let _ = white;
    }
    {
        let black = cache.get_or_spawn(black_config).map_err(|e| format!("black spawn: {e}"))?;
        let _ = black;
    }

    let mut adjudicator = adjudicator_for(config);
    let spec = GameSpec {
        round_id: pairing.round_id,
        game_id: pairing.game_id,
        white_config: white_config.clone(),
        black_config: black_config.clone(),
        opening: opening.clone(),
        event: config.event.clone(),
        site: config.site.clone(),
    };

    // Re-borrow both drivers mutably at once: `EngineCache` stores them in
    // one map, so two `get_mut`s can't be taken simultaneously through the
    // safe API without an intermediate split.
    let (white, black) = cache
        .get_pair_mut(&white_config.display_name, &black_config.display_name)
        .ok_or_else(|| "engine vanished from cache between spawn and use".to_string())?;

    let data = play_game(white, black, &spec, &mut adjudicator, stop);
    if matches!(data.termination, crate::data::Termination::Disconnect | crate::data::Termination::Stall) {
        // Whoever was on move when the game ended is the side that went
        // quiet: total plies played (opening + in-game) is even iff it was
        // white's turn.
        let total_plies = opening.moves.len() + data.moves.len();
        let white_failed = total_plies % 2 == 0;
        let failed_name = if white_failed { &white_config.display_name } else { &black_config.display_name };
        if config.recover {
            let failed_config = if white_failed { white_config } else { black_config };
            let _ = cache.restart(failed_config);
        }
        return Err(format!("{failed_name} stopped responding"));
    }
    Ok(data)
}

fn adjudicator_for(config: &TournamentConfig) -> Adjudicator {
    let resign_rule = config.resign.as_ref().map(|r| r.rule);
    let resign_two_sided = config.resign.as_ref().map(|r| r.two_sided).unwrap_or(false);
    Adjudicator::new(resign_rule, resign_two_sided, config.draw, config.max_moves)
}
