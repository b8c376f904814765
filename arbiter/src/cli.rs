//! Command-line parsing. Generalizes the teacher's `monitors/src/cli.rs`
//! (`parse_cli`, `parse_engine`, `parse_adjudication`,
//! `combine_engine_args`) onto the distilled spec's §6 option table: every
//! `todo!()` relevant to a tournament-runner flag (`-rounds`, `-games`,
//! `-sprt`, `-openings`, `-pgnout`, `-epdout`, `-report`, `-noswap`,
//! `-reverse`, `-srand`, `-autosaveinterval`, `-use-affinity`,
//! `--force-concurrency`, `-variant`) is filled in here; flags that belong
//! to the interactive GUI teacher never had a counterpart in this
//! tournament runner and are dropped rather than carried forward.
//!
//! cutechess-cli's wire format (`-flag`, `-flag value`, repeated
//! `key=value` tokens after `-engine`/`-each`) isn't clap-compatible, so
//! this is a hand-rolled parser over a peekable token stream, exactly as
//! the teacher does it.

use crate::adjudication::ScoreThreshold;
use crate::config::{ResignConfig, SprtParams, TournamentConfig, Variant};
use crate::data::{EngineConfig, Protocol};
use crate::sprt::ScoreModel;
use crate::time_control::TimeControl;
use anyhow::{anyhow, bail, Context, Result};
use std::iter::Peekable;
use std::path::PathBuf;
use std::time::Duration;

pub type ArgIter = Peekable<std::vec::IntoIter<String>>;

pub fn arg_iter(args: Vec<String>) -> ArgIter {
    args.into_iter().peekable()
}

fn get_next_arg(args: &mut ArgIter, name: &str) -> Result<String> {
    args.next().ok_or_else(|| anyhow!("expected a value after '-{name}'"))
}

fn get_next_parsed<T: std::str::FromStr>(args: &mut ArgIter, name: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw = get_next_arg(args, name)?;
    raw.parse::<T>().map_err(|e| anyhow!("invalid value '{raw}' for -{name}: {e}"))
}

/// Splits one `key=value` token from an `-engine`/`-each`/`-resign`/...
/// argument list; a bare `key` with no `=` is also accepted (e.g.
/// `restart` as shorthand for `restart=true`), matching cutechess-cli.
fn split_key_value(token: &str) -> (&str, Option<&str>) {
    match token.split_once('=') {
        Some((k, v)) => (k, Some(v)),
        None => (token, None),
    }
}

/// Per-`-engine`/`-each` field set, collected before being resolved into
/// an [`EngineConfig`]. Mirrors `ClientEngineCliArgs`, trimmed to the
/// fields the distilled spec's `EngineConfig` actually needs.
#[derive(Debug, Clone, Default)]
pub struct EngineArgs {
    pub name: Option<String>,
    pub cmd: Option<String>,
    pub dir: Option<String>,
    pub args: Vec<String>,
    pub proto: Option<Protocol>,
    pub tc: Option<String>,
    pub st: Option<f64>,
    pub nodes: Option<u64>,
    pub plies: Option<u32>,
    pub timemargin: Option<u64>,
    pub restart: Option<bool>,
    pub options: Vec<(String, String)>,
}

/// Applies `each`'s defaults onto `engine` wherever `engine` left a field
/// unset, following `combine_engine_args`'s "logical `|=` on every
/// `Option`" shape. Per-engine `option.<N>=` entries from `each` are
/// merged in (not overwritten) rather than replaced wholesale.
fn combine_engine_args(engine: &mut EngineArgs, each: &EngineArgs) {
    engine.name = engine.name.take().or_else(|| each.name.clone());
    engine.cmd = engine.cmd.take().or_else(|| each.cmd.clone());
    engine.dir = engine.dir.take().or_else(|| each.dir.clone());
    if engine.args.is_empty() {
        engine.args = each.args.clone();
    }
    engine.proto = engine.proto.or(each.proto);
    engine.tc = engine.tc.take().or_else(|| each.tc.clone());
    engine.st = engine.st.or(each.st);
    engine.nodes = engine.nodes.or(each.nodes);
    engine.plies = engine.plies.or(each.plies);
    engine.timemargin = engine.timemargin.or(each.timemargin);
    engine.restart = engine.restart.or(each.restart);
    let mut merged = each.options.clone();
    merged.retain(|(k, _)| !engine.options.iter().any(|(ek, _)| ek == k));
    merged.extend(engine.options.drain(..));
    engine.options = merged;
}

/// Parses the `key=value ...` tokens that follow one `-engine`/`-each`
/// flag, stopping at the next `-flag` token or end of input.
fn parse_engine(args: &mut ArgIter) -> Result<EngineArgs> {
    let mut res = EngineArgs::default();
    while let Some(tok) = args.peek() {
        if tok.starts_with('-') {
            break;
        }
        let tok = args.next().unwrap();
        let (key, value) = split_key_value(&tok);
        let value = || value.ok_or_else(|| anyhow!("-engine key '{key}' requires a value"));
        match key {
            "name" => res.name = Some(value()?.to_string()),
            "cmd" => res.cmd = Some(value()?.to_string()),
            "dir" => res.dir = Some(value()?.to_string()),
            "args" => res.args = value()?.split_whitespace().map(str::to_string).collect(),
            "proto" => {
                res.proto = Some(match value()?.to_ascii_lowercase().as_str() {
                    "uci" => Protocol::Uci,
                    "ugi" => Protocol::Ugi,
                    other => bail!("unsupported engine protocol '{other}': only 'uci' is accepted"),
                });
            }
            "tc" => res.tc = Some(value()?.to_string()),
            "st" => res.st = Some(value()?.parse().context("st= expects seconds as a number")?),
            "nodes" => res.nodes = Some(value()?.parse().context("nodes= expects an integer")?),
            "plies" => res.plies = Some(value()?.parse().context("plies= expects an integer")?),
            "timemargin" => {
                let ms: i64 = value()?.parse().context("timemargin= expects milliseconds")?;
                if ms < 0 {
                    bail!("timemargin must not be negative, got {ms}");
                }
                res.timemargin = Some(ms as u64);
            }
            "restart" => res.restart = Some(value().map(|v| v != "off").unwrap_or(true)),
            other => match other.strip_prefix("option.") {
                Some(opt_name) => res.options.push((opt_name.to_string(), value()?.to_string())),
                None => bail!("unknown -engine key '{other}'"),
            },
        }
    }
    Ok(res)
}

fn resolve_engine(args: EngineArgs, index: usize, variant: Variant) -> Result<EngineConfig> {
    let cmd = args.cmd.ok_or_else(|| anyhow!("engine #{index} is missing a 'cmd='"))?;
    let display_name = args.name.unwrap_or_else(|| format!("{cmd}_{index}"));
    let tc: TimeControl = match &args.tc {
        Some(s) => s.parse()?,
        None => TimeControl::infinite(),
    };
    let time_margin = Duration::from_millis(args.timemargin.unwrap_or(0));
    let fixed_move_time = args.st.map(Duration::from_secs_f64);
    Ok(EngineConfig {
        log_name: format!("{display_name}_stderr.log"),
        display_name,
        cmd,
        dir: args.dir,
        args: args.args,
        proto: args.proto.unwrap_or(Protocol::Uci),
        tc,
        time_margin,
        fixed_move_time,
        nodes: args.nodes,
        depth: args.plies,
        options: args.options,
        restart: args.restart.unwrap_or(false),
    })
    .map(|mut c| {
        if variant == Variant::Chess960 {
            c.options.push(("UCI_Chess960".to_string(), "true".to_string()));
        }
        c
    })
}

/// Parses the tokens following `-draw`/`-resign` into a [`ScoreThreshold`]
/// plus (for `-resign`) its `twosided` flag. Grounded on
/// `parse_adjudication`'s `movecount=`/`movenumber=`/`score=` key set.
fn parse_adjudication(args: &mut ArgIter) -> Result<(ScoreThreshold, bool)> {
    let mut rule = ScoreThreshold::default();
    let mut two_sided = false;
    while let Some(tok) = args.peek() {
        if tok.starts_with('-') {
            break;
        }
        let tok = args.next().unwrap();
        let (key, value) = split_key_value(&tok);
        let value = || value.ok_or_else(|| anyhow!("adjudication key '{key}' requires a value"));
        match key {
            "movecount" => rule.move_number = value()?.parse().context("movecount must be an integer")?,
            "movenumber" => {
                let moves: usize = value()?.parse().context("movenumber must be an integer")?;
                rule.start_after_ply = moves * 2;
            }
            "score" => rule.score_cp = value()?.parse().context("score must be an integer")?,
            "twosided" => two_sided = value()?.parse().context("twosided must be true/false")?,
            other => bail!("unknown adjudication key '{other}'"),
        }
    }
    Ok((rule, two_sided))
}

/// Parameters the distilled spec's `-openings` flag names. Book *loading*
/// (EPD/PGN parsing) stays an external collaborator; this struct is just
/// what `main` hands to whatever `OpeningBook` it constructs.
#[derive(Debug, Clone, Default)]
pub struct OpeningsArgs {
    pub file: Option<PathBuf>,
    pub format: Option<String>,
    pub order: Option<String>,
    pub plies: Option<u32>,
    pub start: Option<usize>,
    pub policy: Option<String>,
}

fn parse_openings(args: &mut ArgIter) -> Result<OpeningsArgs> {
    let mut res = OpeningsArgs::default();
    while let Some(tok) = args.peek() {
        if tok.starts_with('-') {
            break;
        }
        let tok = args.next().unwrap();
        let (key, value) = split_key_value(&tok);
        let value = || value.ok_or_else(|| anyhow!("-openings key '{key}' requires a value"));
        match key {
            "file" => res.file = Some(PathBuf::from(value()?)),
            "format" => res.format = Some(value()?.to_string()),
            "order" => res.order = Some(value()?.to_string()),
            "plies" => res.plies = Some(value()?.parse().context("plies must be an integer")?),
            "start" => res.start = Some(value()?.parse().context("start must be an integer")?),
            "policy" => res.policy = Some(value()?.to_string()),
            other => bail!("unknown -openings key '{other}'"),
        }
    }
    Ok(res)
}

fn parse_sprt(args: &mut ArgIter) -> Result<SprtParams> {
    let mut elo0 = None;
    let mut elo1 = None;
    let mut alpha = None;
    let mut beta = None;
    let mut model = ScoreModel::Logistic;
    while let Some(tok) = args.peek() {
        if tok.starts_with('-') {
            break;
        }
        let tok = args.next().unwrap();
        let (key, value) = split_key_value(&tok);
        let value = || value.ok_or_else(|| anyhow!("-sprt key '{key}' requires a value"));
        match key {
            "elo0" => elo0 = Some(value()?.parse().context("elo0 must be a number")?),
            "elo1" => elo1 = Some(value()?.parse().context("elo1 must be a number")?),
            "alpha" => alpha = Some(value()?.parse().context("alpha must be a number")?),
            "beta" => beta = Some(value()?.parse().context("beta must be a number")?),
            "model" => {
                model = match value()?.to_ascii_lowercase().as_str() {
                    "logistic" => ScoreModel::Logistic,
                    "bayesian" => ScoreModel::Bayesian,
                    "normalized" => ScoreModel::Normalized,
                    other => bail!("unknown SPRT model '{other}'"),
                }
            }
            other => bail!("unknown -sprt key '{other}'"),
        }
    }
    Ok(SprtParams {
        elo0: elo0.ok_or_else(|| anyhow!("-sprt requires elo0="))?,
        elo1: elo1.ok_or_else(|| anyhow!("-sprt requires elo1="))?,
        alpha: alpha.ok_or_else(|| anyhow!("-sprt requires alpha="))?,
        beta: beta.ok_or_else(|| anyhow!("-sprt requires beta="))?,
        model,
    })
}

/// Everything `cli::parse` extracts from argv: the assembled tournament
/// config plus the few collaborator-facing bits (`openings`) that `main`
/// needs to wire up an `OpeningBook`/`ArchiveWriter` but that don't belong
/// in `TournamentConfig` itself.
#[derive(Debug, Clone, Default)]
pub struct ParsedCli {
    pub config: TournamentConfig,
    pub openings: OpeningsArgs,
}

/// Parses a full argv (without the program name) into a [`ParsedCli`].
/// Unrecognized flags are a hard error, matching the teacher's
/// exhaustive match with no fallthrough.
pub fn parse(argv: Vec<String>) -> Result<ParsedCli> {
    let mut args = arg_iter(argv);
    let mut config = TournamentConfig::default();
    let mut openings = OpeningsArgs::default();
    let mut engines: Vec<EngineArgs> = Vec::new();
    let mut each = EngineArgs::default();

    while let Some(mut arg) = args.next() {
        if let Some(stripped) = arg.strip_prefix("--") {
            arg = format!("-{stripped}");
        }
        match arg.as_str() {
            "-engine" => engines.push(parse_engine(&mut args)?),
            "-each" => each = parse_engine(&mut args)?,
            "-concurrency" => config.concurrency = get_next_parsed(&mut args, "concurrency")?,
            "-rounds" => config.rounds = get_next_parsed(&mut args, "rounds")?,
            "-games" => {
                let games: usize = get_next_parsed(&mut args, "games")?;
                if games != 1 && games != 2 {
                    bail!("-games must be 1 or 2, got {games}");
                }
                config.games_per_encounter = games;
            }
            "-repeat" => config.games_per_encounter = 2,
            "-noswap" => config.noswap = true,
            "-reverse" => config.reverse = true,
            "-openings" => openings = parse_openings(&mut args)?,
            "-sprt" => config.sprt = Some(parse_sprt(&mut args)?),
            "-draw" => {
                let (rule, _) = parse_adjudication(&mut args)?;
                config.draw = Some(rule);
            }
            "-resign" => {
                let (rule, two_sided) = parse_adjudication(&mut args)?;
                config.resign = Some(ResignConfig { rule, two_sided });
            }
            "-maxmoves" => config.max_moves = Some(get_next_parsed(&mut args, "maxmoves")?),
            "-pgnout" => config.pgn_out = Some(PathBuf::from(get_next_arg(&mut args, "pgnout")?)),
            "-epdout" => config.epd_out = Some(PathBuf::from(get_next_arg(&mut args, "epdout")?)),
            "-report" => {
                while let Some(tok) = args.peek() {
                    if tok.starts_with('-') {
                        break;
                    }
                    let tok = args.next().unwrap();
                    let (key, value) = split_key_value(&tok);
                    if key == "penta" {
                        config.report_penta =
                            value.ok_or_else(|| anyhow!("-report penta= requires a value"))?.parse()?;
                    } else {
                        bail!("unknown -report key '{key}'");
                    }
                }
            }
            "-variant" => {
                config.variant = match get_next_arg(&mut args, "variant")?.to_ascii_lowercase().as_str() {
                    "standard" => Variant::Standard,
                    "fischerandom" | "chess960" => Variant::Chess960,
                    other => bail!("unknown variant '{other}'"),
                }
            }
            "-recover" => config.recover = true,
            "-event" => config.event = get_next_arg(&mut args, "event")?,
            "-site" => config.site = get_next_arg(&mut args, "site")?,
            "-srand" => config.srand = Some(get_next_parsed(&mut args, "srand")?),
            "-autosaveinterval" => config.autosave_interval = Some(get_next_parsed(&mut args, "autosaveinterval")?),
            "-use-affinity" => config.use_affinity = true,
            "-force-concurrency" => config.force_concurrency = true,
            other => bail!("unrecognized option '{other}'"),
        }
    }

    config.engines = engines
        .into_iter()
        .enumerate()
        .map(|(i, mut e)| {
            combine_engine_args(&mut e, &each);
            resolve_engine(e, i, config.variant)
        })
        .collect::<Result<Vec<_>>>()?;

    if config.engines.len() < 2 {
        bail!("a tournament needs at least two -engine entries, got {}", config.engines.len());
    }
    {
        let mut names: Vec<&str> = config.engines.iter().map(|e| e.display_name.as_str()).collect();
        names.sort_unstable();
        if names.windows(2).any(|w| w[0] == w[1]) {
            bail!("engine display names must be unique per tournament");
        }
    }
    if config.sprt.is_some() && config.sprt.as_ref().unwrap().model == ScoreModel::Bayesian && config.report_penta {
        config.report_penta = false;
    }

    Ok(ParsedCli { config, openings })
}
