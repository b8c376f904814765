//! Tournament-wide structured logging. Generalizes `logger.rs`'s
//! `Logger<B>` (board-state-keyed, one stream per GUI session) into a
//! board-agnostic sink the scheduler and output funnel can log through
//! from any worker thread: same `gears::output::Message` severities and
//! `[Starting logging at ...]` banner convention, but driven by plain
//! strings instead of a `GameState` reference, since nothing here ever
//! needs to render a board.

use chrono::Utc;
use colored::Colorize;
use gears::output::Message;
use std::fs::File;
use std::io::Write;
use std::sync::Mutex;

pub trait Logger: Send + Sync {
    fn log(&self, severity: Message, message: &str);
}

fn timestamp() -> String {
    Utc::now().to_rfc3339()
}

/// Colored, human-readable console output, matching `logger.rs`'s prefix
/// convention (`Warning:`/`Error:`/`Debug:`, `Info` unprefixed) plus a
/// color per severity since `monitors` is a terminal application and
/// `colored` is already in the dependency stack for match summaries.
pub struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, severity: Message, message: &str) {
        let line = format!("[{}] {message}", timestamp());
        match severity {
            Message::Info => println!("{line}"),
            Message::Warning => println!("{}", format!("Warning: {line}").yellow()),
            Message::Error => eprintln!("{}", format!("Error: {line}").red()),
            Message::Debug => eprintln!("{}", format!("Debug: {line}").dimmed()),
        }
    }
}

/// One JSON object per line, for offline analysis of a finished run; the
/// distilled spec's ambient logging section asks for a machine-readable
/// sink alongside the console, which `gears`'s own logger doesn't provide.
pub struct JsonlLogger {
    file: Mutex<File>,
}

impl JsonlLogger {
    pub fn create(path: &std::path::Path) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file: Mutex::new(file) })
    }
}

impl Logger for JsonlLogger {
    fn log(&self, severity: Message, message: &str) {
        let entry = serde_json::json!({
            "time": timestamp(),
            "level": severity.to_string(),
            "message": message,
        });
        let mut file = self.file.lock().unwrap();
        let _ = writeln!(file, "{entry}");
    }
}

/// Fans a message out to every configured sink. The scheduler and match
/// executor each hold one of these rather than a `Vec<Box<dyn Logger>>`
/// directly, so adding a sink never touches call sites.
#[derive(Default)]
pub struct MultiLogger {
    sinks: Vec<Box<dyn Logger>>,
}

impl MultiLogger {
    pub fn new() -> Self {
        Self { sinks: vec![Box::new(ConsoleLogger)] }
    }

    pub fn with_jsonl(mut self, path: &std::path::Path) -> std::io::Result<Self> {
        self.sinks.push(Box::new(JsonlLogger::create(path)?));
        Ok(self)
    }

    pub fn info(&self, message: &str) {
        self.log(Message::Info, message);
    }

    pub fn warning(&self, message: &str) {
        self.log(Message::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.log(Message::Error, message);
    }
}

impl Logger for MultiLogger {
    fn log(&self, severity: Message, message: &str) {
        for sink in &self.sinks {
            sink.log(severity, message);
        }
    }
}
