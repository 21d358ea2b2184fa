//! Local history of completed analyses.
//!
//! The history lives in a single JSON document holding a schema version,
//! the next id to hand out and every saved entry. Entries are created and
//! deleted but never edited.

use crate::models::{ApiResponse, HistoryEntry};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Schema version written to and accepted from disk.
pub const HISTORY_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HistoryFile {
    version: u32,
    next_id: u64,
    entries: Vec<HistoryEntry>,
}

impl Default for HistoryFile {
    fn default() -> Self {
        Self {
            version: HISTORY_VERSION,
            next_id: 1,
            entries: Vec::new(),
        }
    }
}

/// File-backed store of [`HistoryEntry`] records.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    file: HistoryFile,
}

impl HistoryStore {
    /// Open the store at `path`. A missing file is an empty history.
    pub fn open(path: &Path) -> Result<Self> {
        let file = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read history file: {}", path.display()))?;
            let file: HistoryFile = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse history file: {}", path.display()))?;

            if file.version != HISTORY_VERSION {
                bail!(
                    "Unsupported history version {} in {} (expected {})",
                    file.version,
                    path.display(),
                    HISTORY_VERSION
                );
            }
            file
        } else {
            HistoryFile::default()
        };

        debug!(
            "Opened history at {} with {} entries",
            path.display(),
            file.entries.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save a completed analysis and return the stored entry.
    pub fn add(&mut self, file_name: &str, response: &ApiResponse) -> Result<HistoryEntry> {
        self.add_at(file_name, response, Utc::now())
    }

    fn add_at(
        &mut self,
        file_name: &str,
        response: &ApiResponse,
        timestamp: DateTime<Utc>,
    ) -> Result<HistoryEntry> {
        let entry = HistoryEntry {
            id: self.file.next_id,
            timestamp,
            file_name: file_name.to_string(),
            total_rows: response.total_rows,
            processed_rows: response.processed_rows,
            results: response.clone(),
        };

        let mut next = self.file.clone();
        next.next_id += 1;
        next.entries.push(entry.clone());
        self.commit(next)?;

        info!("Saved analysis of {} to history as #{}", file_name, entry.id);
        Ok(entry)
    }

    /// All entries, most recent first.
    pub fn list(&self) -> Vec<&HistoryEntry> {
        let mut entries: Vec<&HistoryEntry> = self.file.entries.iter().collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        entries
    }

    pub fn get(&self, id: u64) -> Option<&HistoryEntry> {
        self.file.entries.iter().find(|e| e.id == id)
    }

    /// Remove one entry. Returns whether it existed.
    pub fn delete(&mut self, id: u64) -> Result<bool> {
        if self.get(id).is_none() {
            return Ok(false);
        }

        let mut next = self.file.clone();
        next.entries.retain(|e| e.id != id);
        self.commit(next)?;
        info!("Deleted history entry #{}", id);
        Ok(true)
    }

    /// Remove every entry. Returns how many were removed.
    pub fn clear(&mut self) -> Result<usize> {
        let removed = self.file.entries.len();
        let next = HistoryFile {
            entries: Vec::new(),
            ..self.file.clone()
        };
        self.commit(next)?;
        info!("Cleared {} history entries", removed);
        Ok(removed)
    }

    /// Persist `next` and only then make it the in-memory state.
    fn commit(&mut self, next: HistoryFile) -> Result<()> {
        self.save(&next)?;
        self.file = next;
        Ok(())
    }

    fn save(&self, file: &HistoryFile) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(file)
            .context("Failed to serialize history")?;

        // Write then rename so an interrupted save keeps the old file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write history file: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace history file: {}", self.path.display()))?;

        Ok(())
    }
}
