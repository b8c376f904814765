//! The UGI/UCI-like line protocol driven synchronously against one
//! [`EngineProcess`]. Grounded on `ugi_input.rs`'s per-command parsing
//! (`handle_option`, `handle_info`, `handle_bestmove`) and
//! `player.rs::limit_to_ugi`'s `go` command construction, but pulled
//! instead of pushed: every method here blocks the calling thread until
//! its deadline, rather than handing control to a background reader
//! thread that mutates shared state.

use crate::data::{EngineConfig, Protocol};
use crate::error::ProtocolError;
use crate::transport::EngineProcess;
use gears::ugi::{EngineOption, EngineOptionName, EngineOptionType, UgiCheck, UgiSpin, UgiString};
use std::time::{Duration, Instant};

/// One engine's `info` line, decomposed. PV is kept as raw tokens;
/// validating them against the current position is the match executor's
/// job, not the protocol driver's (`handle_info`'s "stop at the first
/// unparseable token, never raise an error" behavior — see DESIGN.md's
/// resolved Open Question on PV verification).
#[derive(Debug, Clone, Default)]
pub struct EngineInfo {
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    pub time: Option<Duration>,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
    pub hashfull: Option<u32>,
    pub tbhits: Option<u64>,
    pub score_cp: Option<i64>,
    pub score_mate: Option<i32>,
    pub pv: Vec<String>,
    pub string: Option<String>,
}

/// The result of waiting for a `bestmove`: either the move (with any
/// trailing `ponder` move) or one of the failure modes that should end
/// the game rather than be retried.
#[derive(Debug, Clone)]
pub enum BestMoveOutcome {
    Move { mov: String, ponder: Option<String>, last_info: EngineInfo },
    Timeout,
    Disconnected,
}

pub struct Driver {
    process: EngineProcess,
    pub proto: Protocol,
    pub id_name: Option<String>,
    pub id_author: Option<String>,
    pub options: Vec<EngineOption>,
}

/// Initialization-timeout constant for the `uci`/`uciok` and
/// `ucinewgame`/`isready`/`readyok` handshakes (distilled spec §4.2/§5).
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(60);

impl Driver {
    pub fn new(process: EngineProcess, proto: Protocol) -> Self {
        Self { process, proto, id_name: None, id_author: None, options: Vec::new() }
    }

    fn hello(&self) -> &'static str {
        match self.proto {
            Protocol::Uci => "uci",
            Protocol::Ugi => "ugi",
        }
    }

    fn ok_prefix(&self) -> &'static str {
        match self.proto {
            Protocol::Uci => "uciok",
            Protocol::Ugi => "ugiok",
        }
    }

    /// `uci`/`ugi` handshake: send the hello word, collect `id`/`option`
    /// lines until the matching `*ok` arrives.
    pub fn handshake(&mut self) -> Result<(), ProtocolError> {
        self.process.send_line(self.hello())?;
        let deadline = Instant::now() + HANDSHAKE_TIMEOUT;
        let (lines, terminator) = self.process.read_until(self.ok_prefix(), deadline)?;
        if terminator.is_none() {
            return Err(ProtocolError::Transport(
                crate::error::TransportError::Timeout(HANDSHAKE_TIMEOUT),
            ));
        }
        for line in lines {
            self.handle_handshake_line(&line);
        }
        Ok(())
    }

    fn handle_handshake_line(&mut self, line: &str) {
        let mut words = line.split_whitespace();
        match words.next() {
            Some("id") => match words.next() {
                Some("name") => self.id_name = Some(words.collect::<Vec<_>>().join(" ")),
                Some("author") => self.id_author = Some(words.collect::<Vec<_>>().join(" ")),
                _ => {}
            },
            Some("option") => {
                if let Some(opt) = parse_option_line(words) {
                    self.options.push(opt);
                }
            }
            _ => {}
        }
    }

    pub fn is_ready(&mut self, timeout: Duration) -> Result<bool, ProtocolError> {
        self.process.send_line("isready")?;
        let deadline = Instant::now() + timeout;
        let (_, terminator) = self.process.read_until("readyok", deadline)?;
        Ok(terminator.is_some())
    }

    pub fn new_game(&mut self) -> Result<(), ProtocolError> {
        let cmd = match self.proto {
            Protocol::Uci => "ucinewgame",
            Protocol::Ugi => "uginewgame",
        };
        self.process.send_line(cmd)?;
        Ok(())
    }

    pub fn set_option(&mut self, name: &str, value: &str) -> Result<(), ProtocolError> {
        self.process.send_line(&format!("setoption name {name} value {value}"))
    }

    pub fn set_position(&mut self, fen: &str, moves: &[String]) -> Result<(), ProtocolError> {
        let mut cmd = format!("position fen {fen}");
        if !moves.is_empty() {
            cmd.push_str(" moves ");
            cmd.push_str(&moves.join(" "));
        }
        self.process.send_line(&cmd)
    }

    /// Builds the `go ...` command. Direct port of
    /// `player.rs::limit_to_ugi`: `wtime/winc/btime/binc` always sent
    /// together when a clock is active, `depth`/`nodes`/`movetime` as
    /// fixed overrides, falling back to `go infinite` if nothing is set.
    pub fn build_go(
        &self,
        wtime: Option<Duration>,
        btime: Option<Duration>,
        winc: Duration,
        binc: Duration,
        movestogo: Option<usize>,
        movetime: Option<Duration>,
        depth: Option<u32>,
        nodes: Option<u64>,
    ) -> String {
        let mut parts = vec!["go".to_string()];
        let mut any = false;
        if let Some(wtime) = wtime {
            parts.push(format!("wtime {}", wtime.as_millis()));
            parts.push(format!("winc {}", winc.as_millis()));
            any = true;
        }
        if let Some(btime) = btime {
            parts.push(format!("btime {}", btime.as_millis()));
            parts.push(format!("binc {}", binc.as_millis()));
            any = true;
        }
        if let Some(movestogo) = movestogo {
            parts.push(format!("movestogo {movestogo}"));
            any = true;
        }
        if let Some(depth) = depth {
            parts.push(format!("depth {depth}"));
            any = true;
        }
        if let Some(nodes) = nodes {
            parts.push(format!("nodes {nodes}"));
            any = true;
        }
        if let Some(movetime) = movetime {
            parts.push(format!("movetime {}", movetime.as_millis()));
            any = true;
        }
        if !any {
            return "go infinite".to_string();
        }
        parts.join(" ")
    }

    pub fn go(&mut self, go_cmd: &str) -> Result<(), ProtocolError> {
        self.process.send_line(go_cmd)
    }

    pub fn send_stop(&mut self) -> Result<(), ProtocolError> {
        self.process.send_line("stop")
    }

    /// Waits for `bestmove`, recording the last `info` line seen along
    /// the way (matching `handle_bestmove`'s "stop the clock before
    /// parsing the move" ordering is the caller's job: the caller records
    /// the wall-clock elapsed time around this call, not inside it).
    pub fn wait_for_best_move(&mut self, deadline: Instant) -> Result<BestMoveOutcome, ProtocolError> {
        let mut last_info = EngineInfo::default();
        loop {
            match self.process.read_line(deadline) {
                Ok(None) => return Ok(BestMoveOutcome::Timeout),
                Err(crate::error::TransportError::Disconnected) => {
                    return Ok(BestMoveOutcome::Disconnected)
                }
                Err(e) => return Err(e.into()),
                Ok(Some(line)) => {
                    let mut words = line.split_whitespace();
                    match words.next() {
                        Some("info") => last_info = parse_info_line(words),
                        Some("bestmove") => {
                            let mov = words.next().map(str::to_string);
                            let ponder =
                                if words.next() == Some("ponder") { words.next().map(str::to_string) } else { None };
                            return match mov {
                                Some(mov) => Ok(BestMoveOutcome::Move { mov, ponder, last_info }),
                                None => Err(ProtocolError::Unexpected {
                                    while_doing: "waiting for bestmove".to_string(),
                                    line,
                                }),
                            };
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    pub fn quit(&mut self) {
        self.process.terminate();
    }
}

fn parse_info_line(mut words: std::str::SplitWhitespace) -> EngineInfo {
    let mut info = EngineInfo::default();
    while let Some(tok) = words.next() {
        match tok {
            "depth" => info.depth = words.next().and_then(|s| s.parse().ok()),
            "seldepth" => info.seldepth = words.next().and_then(|s| s.parse().ok()),
            "nodes" => info.nodes = words.next().and_then(|s| s.parse().ok()),
            "nps" => info.nps = words.next().and_then(|s| s.parse().ok()),
            "hashfull" => info.hashfull = words.next().and_then(|s| s.parse().ok()),
            "tbhits" => info.tbhits = words.next().and_then(|s| s.parse().ok()),
            "time" => {
                info.time = words.next().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
            }
            "score" => match words.next() {
                Some("cp") => info.score_cp = words.next().and_then(|s| s.parse().ok()),
                Some("mate") => info.score_mate = words.next().and_then(|s| s.parse().ok()),
                Some("lowerbound") | Some("upperbound") => {}
                _ => {}
            },
            "pv" => {
                info.pv = words.by_ref().map(str::to_string).collect();
                break;
            }
            "string" => {
                info.string = Some(words.by_ref().collect::<Vec<_>>().join(" "));
                break;
            }
            _ => {}
        }
    }
    info
}

fn parse_option_line(mut words: std::str::SplitWhitespace) -> Option<EngineOption> {
    if words.next() != Some("name") {
        return None;
    }
    let mut name_parts = Vec::new();
    let mut typ = None;
    for w in words.by_ref() {
        if w == "type" {
            typ = words.next();
            break;
        }
        name_parts.push(w);
    }
    let name: EngineOptionName = name_parts.join(" ").parse().ok()?;
    let mut default = None;
    let mut min = None;
    let mut max = None;
    let mut vars = Vec::new();
    let mut rest = Vec::new();
    let mut cur: Option<&str> = None;
    for w in words {
        match w {
            "default" | "min" | "max" | "var" => cur = Some(w),
            _ => match cur {
                Some("default") => default = Some(w.to_string()),
                Some("min") => min = w.parse().ok(),
                Some("max") => max = w.parse().ok(),
                Some("var") => vars.push(w.to_string()),
                _ => rest.push(w),
            },
        }
    }
    let value = match typ? {
        "check" => EngineOptionType::Check(UgiCheck {
            val: default.as_deref() == Some("true"),
            default: default.as_deref().map(|d| d == "true"),
        }),
        "spin" => EngineOptionType::Spin(UgiSpin {
            val: default.as_deref().and_then(|d| d.parse().ok()).unwrap_or(0),
            default: default.as_deref().and_then(|d| d.parse().ok()),
            min,
            max,
        }),
        "combo" => EngineOptionType::Combo(gears::ugi::UgiCombo {
            val: default.clone().unwrap_or_default(),
            default,
            options: vars,
        }),
        "button" => EngineOptionType::Button,
        "string" => EngineOptionType::UString(UgiString {
            val: default.clone().unwrap_or_default(),
            default,
        }),
        _ => return None,
    };
    Some(EngineOption { name, value })
}

/// Derives the handshake/go-command wiring for an [`EngineConfig`].
pub fn protocol_for(config: &EngineConfig) -> Protocol {
    config.proto
}
