//! Engine cache and restart policy: each worker thread keeps its own
//! spawned engines alive across games rather than respawning per-move,
//! restarting only on crash/disconnect. Grounded on
//! `ugi_client.rs::hard_reset_player` (rebuild-and-reassign on crash) and
//! `player.rs::NameSet`'s unique-display-name bookkeeping, but re-homed
//! to a worker-local cache instead of a thread-id-keyed global map (see
//! SPEC_FULL.md §9's redesign note on thread-local keying).

use crate::data::EngineConfig;
use crate::error::TransportError;
use crate::protocol::Driver;
use crate::transport::EngineProcess;
use std::collections::HashMap;
use std::path::PathBuf;

/// Bound on automatic restarts per engine per match before the match is
/// abandoned as a disconnect rather than retried forever.
const MAX_RESTARTS: u32 = 2;

pub struct EngineCache {
    log_dir: PathBuf,
    entries: HashMap<String, Driver>,
    restarts: HashMap<String, u32>,
}

impl EngineCache {
    pub fn new(log_dir: PathBuf) -> Self {
        Self { log_dir, entries: HashMap::new(), restarts: HashMap::new() }
    }

    fn spawn_and_handshake(&self, config: &EngineConfig) -> Result<Driver, TransportError> {
        let log_path = self.log_dir.join(&config.log_name);
        let process =
            EngineProcess::spawn(&config.display_name, &config.cmd, &config.args, config.dir.as_deref(), &log_path)?;
        let mut driver = Driver::new(process, config.proto);
        driver.handshake().map_err(|_| TransportError::Disconnected)?;
        Ok(driver)
    }

    /// Returns a handle to `config`'s engine, spawning it on first use.
    pub fn get_or_spawn(&mut self, config: &EngineConfig) -> Result<&mut Driver, TransportError> {
        if !self.entries.contains_key(&config.display_name) {
            let driver = self.spawn_and_handshake(config)?;
            self.entries.insert(config.display_name.clone(), driver);
        }
        Ok(self.entries.get_mut(&config.display_name).unwrap())
    }

    /// Tears down and respawns `config`'s engine after it crashed or
    /// disconnected. Returns `Err` once [`MAX_RESTARTS`] is exceeded, at
    /// which point the caller should abandon the match as a disconnect
    /// rather than keep retrying.
    pub fn restart(&mut self, config: &EngineConfig) -> Result<&mut Driver, TransportError> {
        let count = self.restarts.entry(config.display_name.clone()).or_insert(0);
        if *count >= MAX_RESTARTS {
            return Err(TransportError::Disconnected);
        }
        *count += 1;
        if let Some(mut old) = self.entries.remove(&config.display_name) {
            old.quit();
        }
        let driver = self.spawn_and_handshake(config)?;
        self.entries.insert(config.display_name.clone(), driver);
        Ok(self.entries.get_mut(&config.display_name).unwrap())
    }

    /// Fetches both engines' drivers mutably at once, needed because one
    /// game drives both sides concurrently-in-spirit (alternating turns
    /// within a single call). Safe because `a != b` means the two keys
    /// occupy disjoint storage in the map; `HashMap` has no safe API for
    /// borrowing two entries at once, so this borrows the map through a
    /// raw pointer to get around that.
    pub fn get_pair_mut(&mut self, a: &str, b: &str) -> Option<(&mut Driver, &mut Driver)> {
        assert_ne!(a, b, "an engine cannot play both sides of the same game");
        let map = std::ptr::addr_of_mut!(self.entries);
        unsafe { Some(((*map).get_mut(a)?, (*map).get_mut(b)?)) }
    }

    pub fn shutdown_all(&mut self) {
        for (_, mut driver) in self.entries.drain() {
            driver.quit();
        }
    }
}

impl Drop for EngineCache {
    fn drop(&mut self) {
        self.shutdown_all();
    }
}
