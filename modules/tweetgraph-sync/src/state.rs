//! Persistence for the sync watermark.
//!
//! Missing or corrupt state means a fresh start, never an error. Writes go
//! through a temp file in the same directory plus an atomic rename, so a
//! crash mid-write cannot clobber the previous valid state.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use tweetgraph_common::SyncWatermark;

/// On-disk shape of the state file.
#[derive(Debug, Serialize, Deserialize)]
struct SyncStateFile {
    last_run_at: Option<DateTime<Utc>>,
    last_item_id: Option<String>,
    #[serde(default)]
    seen_tweet_ids: Vec<String>,
    #[serde(default)]
    total_bookmarks: u64,
    #[serde(default)]
    mode: Option<String>,
}

pub struct SyncStateStore {
    path: PathBuf,
}

impl SyncStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the watermark. Absent or unreadable state yields the default
    /// empty watermark.
    pub fn load(&self) -> SyncWatermark {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return SyncWatermark::default(),
        };

        match serde_json::from_str::<SyncStateFile>(&raw) {
            Ok(file) => SyncWatermark::from_parts(
                file.seen_tweet_ids,
                file.last_item_id,
                file.last_run_at,
                file.total_bookmarks,
                file.mode,
            ),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt sync state, starting fresh");
                SyncWatermark::default()
            }
        }
    }

    /// Atomically replace the state file with the current watermark.
    pub fn save(&self, watermark: &SyncWatermark) -> Result<()> {
        let file = SyncStateFile {
            last_run_at: watermark.last_run_at,
            last_item_id: watermark.last_item_id.clone(),
            seen_tweet_ids: watermark.seen_ids().map(String::from).collect(),
            total_bookmarks: watermark.total_bookmarks,
            mode: watermark.mode.clone(),
        };
        let json = serde_json::to_string_pretty(&file).context("Failed to serialize sync state")?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp =
            tempfile::NamedTempFile::new_in(dir).context("Failed to create temp state file")?;
        tmp.write_all(json.as_bytes())
            .context("Failed to write sync state")?;
        tmp.persist(&self.path)
            .context("Failed to replace state file")?;
        Ok(())
    }
}
