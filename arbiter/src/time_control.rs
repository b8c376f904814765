//! Time control parsing and per-game clock bookkeeping.
//!
//! `gears::search::TimeControl` already covers the `"infinite"` and
//! `"start+inc"` forms, but has no notion of `moves_to_go`, which the
//! cutechess-style `tc=` flag needs (`"40/60"`, `"40/1:9.65+0.1"`). This
//! module is a tournament-local superset, not a patch to `gears`.

use anyhow::{bail, Context};
use gears::general::common::Res;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

/// A parsed `tc=` specification: an optional number of moves per period,
/// a base time budget, and a per-move increment.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TimeControl {
    pub moves_to_go: Option<usize>,
    pub time: Duration,
    pub increment: Duration,
}

impl TimeControl {
    pub fn infinite() -> Self {
        Self { moves_to_go: None, time: Duration::MAX, increment: Duration::ZERO }
    }

    pub fn is_infinite(&self) -> bool {
        self.time >= Duration::MAX / 2
    }

    fn parse_clock(s: &str) -> Res<Duration> {
        if let Some((minutes, seconds)) = s.split_once(':') {
            let minutes: f64 = minutes
                .parse()
                .with_context(|| format!("invalid minutes component in time control '{s}'"))?;
            let seconds: f64 = seconds
                .parse()
                .with_context(|| format!("invalid seconds component in time control '{s}'"))?;
            Ok(Duration::from_secs_f64((minutes * 60.0 + seconds).max(0.0)))
        } else {
            let secs: f64 = s
                .parse()
                .with_context(|| format!("invalid time value in time control '{s}'"))?;
            Ok(Duration::from_secs_f64(secs.max(0.0)))
        }
    }
}

impl Default for TimeControl {
    fn default() -> Self {
        Self::infinite()
    }
}

impl Display for TimeControl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_infinite() {
            return write!(f, "infinite");
        }
        if let Some(moves) = self.moves_to_go {
            write!(f, "{moves}/")?;
        }
        write!(f, "{}", self.time.as_secs_f64())?;
        if !self.increment.is_zero() {
            write!(f, "+{}", self.increment.as_secs_f64())?;
        }
        Ok(())
    }
}

impl FromStr for TimeControl {
    type Err = anyhow::Error;

    /// Accepts `"infinite"`, `"start[+inc]"`, and `"moves/start[+inc]"`,
    /// where `start` may be given as seconds (`60`, `9.65`) or `mm:ss`
    /// (`1:9.65`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("infinite") || s.eq_ignore_ascii_case("inf") || s == "∞" {
            return Ok(Self::infinite());
        }
        let (moves_to_go, rest) = match s.split_once('/') {
            Some((moves, rest)) => {
                let moves: usize = moves
                    .parse()
                    .with_context(|| format!("invalid moves-to-go count in time control '{s}'"))?;
                if moves == 0 {
                    bail!("moves-to-go count must be positive in time control '{s}'");
                }
                (Some(moves), rest)
            }
            None => (None, s),
        };
        let (time, increment) = match rest.split_once('+') {
            Some((time, inc)) => (Self::parse_clock(time)?, Self::parse_clock(inc)?),
            None => (Self::parse_clock(rest)?, Duration::ZERO),
        };
        Ok(Self { moves_to_go, time, increment })
    }
}

/// Per-game, per-player running clock. `margin` is the arbiter-side grace
/// period added before a clock overrun is declared a time loss; it is
/// never forwarded to the engine's `go` command (see DESIGN.md's
/// resolution of the `timemargin` open question).
#[derive(Debug, Clone)]
pub struct Clock {
    pub tc: TimeControl,
    pub remaining: Duration,
    pub moves_until_reset: Option<usize>,
    pub margin: Duration,
}

impl Clock {
    pub fn new(tc: TimeControl, margin: Duration) -> Self {
        Self { tc, remaining: tc.time, moves_until_reset: tc.moves_to_go, margin }
    }

    /// Called after the engine's move has been received along with the
    /// measured wall-clock `elapsed` time it took to think. Returns `true`
    /// if this overran the clock (including margin) and should be scored
    /// as a time loss.
    pub fn consume(&mut self, elapsed: Duration) -> bool {
        if self.tc.is_infinite() {
            return false;
        }
        let overrun = elapsed > self.remaining + self.margin;
        self.remaining = self.remaining.saturating_sub(elapsed) + self.tc.increment;
        if let Some(moves) = &mut self.moves_until_reset {
            *moves -= 1;
            if *moves == 0 {
                self.remaining += self.tc.time;
                *moves = self.tc.moves_to_go.unwrap();
            }
        }
        overrun
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_infinite() {
        assert_eq!(TimeControl::from_str("infinite").unwrap(), TimeControl::infinite());
        assert_eq!(TimeControl::from_str("inf").unwrap(), TimeControl::infinite());
    }

    #[test]
    fn parses_moves_and_fractional_seconds() {
        let tc = TimeControl::from_str("10/9.64").unwrap();
        assert_eq!(tc.moves_to_go, Some(10));
        assert!((tc.time.as_secs_f64() - 9.64).abs() < 1e-9);
        assert_eq!(tc.increment, Duration::ZERO);
    }

    #[test]
    fn parses_start_plus_inc() {
        let tc = TimeControl::from_str("40/1:9.65+0.1").unwrap();
        assert_eq!(tc.moves_to_go, Some(40));
        assert!((tc.time.as_secs_f64() - 69.65).abs() < 1e-9);
        assert!((tc.increment.as_secs_f64() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn parses_moves_only() {
        let tc = TimeControl::from_str("40/60").unwrap();
        assert_eq!(tc.moves_to_go, Some(40));
        assert_eq!(tc.time, Duration::from_secs(60));
        assert_eq!(tc.increment, Duration::ZERO);
    }

    #[test]
    fn parses_plain_inc() {
        let tc = TimeControl::from_str("10+0.1").unwrap();
        assert_eq!(tc.moves_to_go, None);
        assert_eq!(tc.time, Duration::from_secs(10));
        assert!((tc.increment.as_secs_f64() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn clock_overrun_detected() {
        let tc = TimeControl::from_str("1+0").unwrap();
        let mut clock = Clock::new(tc, Duration::from_millis(10));
        assert!(!clock.consume(Duration::from_millis(500)));
        assert!(clock.consume(Duration::from_millis(600)));
    }
}
