//! Binary entry point: parses argv, assembles every collaborator the
//! library's `scheduler::run` needs, runs the tournament, and prints a
//! final summary. Grounded on the teacher's `monitors::main` /
//! `app_starter.rs` shape (parse CLI, build dependencies, run, report)
//! but without any UI loop since this is a headless tournament runner.

use anyhow::{Context, Result};
use arbiter::config::{ArchiveWriter, NullArchiveWriter, OpeningBook, PgnFileWriter, StartposBook};
use arbiter::log::MultiLogger;
use arbiter::pairing::PairingGenerator;
use arbiter::scheduler::{self, RunSummary};
use arbiter::sprt::Sprt;
use std::process::ExitCode;
use std::sync::Arc;

fn resolve_opening_book(openings: &arbiter::cli::OpeningsArgs, logger: &MultiLogger) -> Arc<dyn OpeningBook> {
    match &openings.file {
        Some(path) => {
            logger.warning(&format!(
                "-openings file={} was given, but opening-book file parsing is out of scope; \
                 using the standard starting position for every round",
                path.display()
            ));
            Arc::new(StartposBook)
        }
        None => Arc::new(StartposBook),
    }
}

fn resolve_archive(pgn_out: &Option<std::path::PathBuf>) -> Result<Box<dyn ArchiveWriter>> {
    match pgn_out {
        Some(path) => {
            let writer = PgnFileWriter::create(path)
                .with_context(|| format!("failed to open PGN output file '{}'", path.display()))?;
            Ok(Box::new(writer))
        }
        None => Ok(Box::new(NullArchiveWriter)),
    }
}

fn log_dir() -> std::path::PathBuf {
    std::path::PathBuf::from("arbiter_logs")
}

fn print_summary(summary: &RunSummary, logger: &MultiLogger) {
    logger.info(&format!("played {} game(s)", summary.games_played));
    for (pair, stats) in summary.scoreboard.iter() {
        logger.info(&format!(
            "{} vs {}: +{} -{} ={} ({} pair(s))",
            pair.0,
            pair.1,
            stats.wins,
            stats.losses,
            stats.draws,
            stats.total_pairs(),
        ));
    }
    if summary.aborted_early {
        logger.warning("tournament stopped before all scheduled games were played");
    }
}

fn run() -> Result<RunSummary> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let parsed = arbiter::cli::parse(argv)?;
    let config = parsed.config;

    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir).with_context(|| format!("failed to create log directory '{}'", log_dir.display()))?;
    let jsonl_path = log_dir.join("tournament.jsonl");
    let logger = Arc::new(MultiLogger::new().with_jsonl(&jsonl_path).unwrap_or_else(|_| MultiLogger::new()));

    let opening_book = resolve_opening_book(&parsed.openings, &logger);
    let archive = resolve_archive(&config.pgn_out)?;

    let sprt = match &config.sprt {
        Some(params) => Some(Sprt::new(
            params.elo0,
            params.elo1,
            params.alpha,
            params.beta,
            params.model,
            config.report_penta,
        )?),
        None => None,
    };

    let pairing_gen = Arc::new(PairingGenerator::new(
        config.engines.len(),
        config.rounds,
        config.games_per_encounter,
        config.noswap,
        config.reverse,
        opening_book.len(),
    ));

    let autosave_path = config.autosave_interval.is_some().then(|| log_dir.join("autosave.json"));

    logger.info(&format!(
        "starting tournament: {} engine(s), {} round(s), {} total game(s)",
        config.engines.len(),
        config.rounds,
        pairing_gen.total(),
    ));

    let summary = scheduler::run(&config, pairing_gen, opening_book, archive, sprt, log_dir, Arc::clone(&logger), autosave_path);
    print_summary(&summary, &logger);
    Ok(summary)
}

fn main() -> ExitCode {
    match run() {
        Ok(summary) if summary.aborted_early => ExitCode::from(1),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}
