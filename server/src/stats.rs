//! Durable game stats
//!
//! Round counter, lifetime distributed total and the bounded winner history
//! survive process restarts. Loaded once at startup, overwritten after each
//! round start and completion. A missing or corrupt file falls back to a
//! fresh ledger rather than failing startup.

use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use shared::WinnerEntry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistentStats {
    /// Round number the engine should run next (or is currently running).
    pub current_round: u64,
    /// Lifetime reward distributed across all rounds.
    pub total_distributed: f64,
    /// Bounded winner history, newest first.
    pub winners: Vec<WinnerEntry>,
}

impl PersistentStats {
    /// A fresh ledger for a first-ever boot.
    pub fn fresh(initial_round: u64) -> Self {
        Self {
            current_round: initial_round,
            total_distributed: 0.0,
            winners: Vec::new(),
        }
    }

    /// Loads stats from `path`, falling back to a fresh ledger when the
    /// file is absent or unreadable.
    pub fn load(path: &Path, initial_round: u64) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<PersistentStats>(&contents) {
                Ok(stats) => {
                    info!(
                        "Loaded stats: round #{}, {} distributed, {} winners",
                        stats.current_round,
                        stats.total_distributed,
                        stats.winners.len()
                    );
                    stats
                }
                Err(e) => {
                    warn!("Stats file {} is corrupt ({}), starting fresh", path.display(), e);
                    Self::fresh(initial_round)
                }
            },
            Err(_) => {
                info!("No stats file at {}, starting fresh", path.display());
                Self::fresh(initial_round)
            }
        }
    }

    /// Overwrites the stats file. Failures are logged and absorbed; losing
    /// a save must never take the game loop down.
    pub fn save(&self, path: &Path) {
        let json = match serde_json::to_string_pretty(self) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize stats: {}", e);
                return;
            }
        };
        if let Err(e) = fs::write(path, json) {
            warn!("Failed to write stats to {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(round: u64) -> WinnerEntry {
        WinnerEntry {
            wallet: "7xKp4mNw".to_string(),
            round,
            prize: 0.8,
            height: 1640,
            timestamp: 1735689600000,
        }
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");

        let stats = PersistentStats {
            current_round: 201,
            total_distributed: 127.5,
            winners: vec![entry(200), entry(199)],
        };
        stats.save(&path);

        let loaded = PersistentStats::load(&path, 1);
        assert_eq!(loaded.current_round, 201);
        assert_eq!(loaded.total_distributed, 127.5);
        assert_eq!(loaded.winners.len(), 2);
        assert_eq!(loaded.winners[0].round, 200);
    }

    #[test]
    fn missing_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let stats = PersistentStats::load(&dir.path().join("nope.json"), 127);
        assert_eq!(stats.current_round, 127);
        assert_eq!(stats.total_distributed, 0.0);
        assert!(stats.winners.is_empty());
    }

    #[test]
    fn corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        fs::write(&path, "{not json").unwrap();

        let stats = PersistentStats::load(&path, 127);
        assert_eq!(stats.current_round, 127);
    }
}
