//! Process transport: spawns an engine subprocess and exposes a blocking,
//! deadline-bound line protocol over its stdin/stdout pipes.
//!
//! Grounded on `player.rs::EnginePlayer` (spawn + `Drop`-based graceful
//! kill) from the teacher's interactive client, restructured from a
//! background-reader-thread-plus-shared-state design into a synchronous
//! handle a worker thread owns outright, per the distilled spec's
//! concurrency model: one match executor thread drives both of its
//! engines directly, with no cross-thread engine state to guard.

use crate::error::TransportError;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::time::{Duration, Instant};

#[cfg(unix)]
use std::os::unix::process::CommandExt;

/// How long `terminate` waits for a cooperative exit after sending `quit`
/// before escalating to `kill`. Matches `player.rs`'s 5 second grace
/// period.
const TERMINATE_GRACE: Duration = Duration::from_millis(5000);
const TERMINATE_POLL: Duration = Duration::from_millis(50);

pub struct EngineProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<std::process::ChildStdout>,
    name: String,
    terminated: bool,
}

impl EngineProcess {
    pub fn spawn(
        display_name: &str,
        cmd: &str,
        args: &[String],
        dir: Option<&str>,
        stderr_log: &std::path::Path,
    ) -> Result<Self, TransportError> {
        let mut command = Command::new(cmd);
        command.args(args);
        if let Some(dir) = dir {
            command.current_dir(dir);
        }
        command.stdin(Stdio::piped());
        command.stdout(Stdio::piped());
        let stderr_file =
            std::fs::File::create(stderr_log).map_err(TransportError::Spawn)?;
        command.stderr(Stdio::from(stderr_file));
        #[cfg(unix)]
        {
            // own process group so a forceful kill of the arbiter doesn't
            // orphan children, and so `terminate` can signal the whole
            // group if the engine itself forked helpers.
            command.process_group(0);
        }
        let mut child = command.spawn().map_err(TransportError::Spawn)?;
        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = BufReader::new(child.stdout.take().expect("piped stdout"));
        Ok(Self { child, stdin, stdout, name: display_name.to_string(), terminated: false })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        writeln!(self.stdin, "{line}").map_err(TransportError::Write)?;
        self.stdin.flush().map_err(TransportError::Write)
    }

    /// Blocks until a full line arrives, the deadline passes, or the pipe
    /// closes. Returns `Ok(None)` on timeout so callers can distinguish a
    /// stalled engine (possibly recoverable) from a dead one.
    ///
    /// This is necessarily coarse: `std::io::Read` on a pipe has no
    /// portable way to poll with a timeout, so the read happens on the
    /// calling thread and only the *absence* of a line by the deadline is
    /// checked between reads of whatever is already buffered. Line-at-a-
    /// time engine output makes this acceptable in practice: `BufReader`
    /// only blocks waiting for the next `\n`, and well-behaved engines
    /// emit one promptly.
    pub fn read_line(&mut self, deadline: Instant) -> Result<Option<String>, TransportError> {
        let mut line = String::new();
        loop {
            if Instant::now() >= deadline {
                return Ok(None);
            }
            let n = self.stdout.read_line(&mut line).map_err(TransportError::Read)?;
            if n == 0 {
                return Err(TransportError::Disconnected);
            }
            let trimmed = line.trim_end_matches(['\r', '\n']);
            if trimmed.is_empty() {
                line.clear();
                continue;
            }
            return Ok(Some(trimmed.to_string()));
        }
    }

    /// Reads lines until one starting with `prefix` is found or the
    /// deadline passes, returning every line seen along the way (the
    /// distilled spec's `read_until(prefix, deadline)` operation).
    pub fn read_until(
        &mut self,
        prefix: &str,
        deadline: Instant,
    ) -> Result<(Vec<String>, Option<String>), TransportError> {
        let mut seen = Vec::new();
        loop {
            match self.read_line(deadline)? {
                None => return Ok((seen, None)),
                Some(line) => {
                    let matched = line.starts_with(prefix);
                    seen.push(line.clone());
                    if matched {
                        return Ok((seen, Some(line)));
                    }
                }
            }
        }
    }

    /// Graceful-then-forced shutdown: send `quit`, poll `try_wait` for up
    /// to [`TERMINATE_GRACE`], then `kill` and reap. Mirrors
    /// `player.rs::EnginePlayer`'s `Drop` impl almost verbatim.
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        let _ = self.send_line("quit");
        let start = Instant::now();
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) => {
                    if start.elapsed() >= TERMINATE_GRACE {
                        break;
                    }
                    std::thread::sleep(TERMINATE_POLL);
                }
                Err(_) => break,
            }
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}
