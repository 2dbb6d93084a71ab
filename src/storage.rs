use crate::config::write_json_atomic;
use crate::stats::Stats;
use anyhow::Result;
use std::{fs, path::Path};
use tracing::warn;

/// Saved stats, if the file exists and parses. Anything else starts fresh.
pub(crate) fn load_stats(path: &Path) -> Option<Stats> {
    let s = fs::read_to_string(path).ok()?;
    match serde_json::from_str::<Stats>(&s) {
        Ok(stats) => Some(stats.sanitized()),
        Err(e) => {
            warn!("ignoring unreadable save {}: {e}", path.display());
            None
        }
    }
}

pub(crate) fn save_stats(path: &Path, stats: &Stats) -> Result<()> {
    write_json_atomic(path, stats)
}
