//! Journal writer
//!
//! Append-only JSONL file with one hash-chained entry per committed ledger
//! mutation. Sits outside the ledger transaction: the ledger commits first,
//! the journal follows on a best-effort basis.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::entry::{create_genesis_entry, JournalEntry};
use super::verify::{load_journal_from_file, verify_journal};
use crate::ledger::models::AssetId;

struct JournalState {
    file: File,
    head_hash: String,
    next_sequence: u64,
}

#[derive(Clone)]
pub struct Journal {
    path: PathBuf,
    state: Arc<Mutex<JournalState>>,
}

impl Journal {
    /// Open a journal, verifying any existing chain, or start a new one with
    /// a genesis entry
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| anyhow!("Failed to create journal directory: {}", e))?;
        }

        let existing = if path.exists() {
            load_journal_from_file(&path)?
        } else {
            Vec::new()
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| anyhow!("Failed to open journal file: {}", e))?;

        let (head_hash, next_sequence) = if existing.is_empty() {
            let genesis = create_genesis_entry();
            write_entry(&mut file, &genesis)?;
            (genesis.this_hash, 1)
        } else {
            verify_journal(&existing)?;
            let last = &existing[existing.len() - 1];
            info!("Loaded {} existing journal entries", existing.len());
            (last.this_hash.clone(), last.sequence + 1)
        };

        Ok(Self {
            path,
            state: Arc::new(Mutex::new(JournalState {
                file,
                head_hash,
                next_sequence,
            })),
        })
    }

    /// Record a committed operation. Only the hash of `payload` is stored.
    pub async fn append<T: Serialize>(
        &self,
        operation: &str,
        asset_id: Option<AssetId>,
        actor: &str,
        payload: &T,
    ) -> Result<JournalEntry> {
        let payload = serde_json::to_vec(payload)
            .map_err(|e| anyhow!("Failed to serialize journal payload: {}", e))?;

        let mut state = self.state.lock().await;
        let entry = JournalEntry::new(
            state.next_sequence,
            operation,
            asset_id,
            actor,
            &payload,
            state.head_hash.clone(),
        );

        write_entry(&mut state.file, &entry)?;
        state.head_hash = entry.this_hash.clone();
        state.next_sequence += 1;

        debug!("Journaled {}", entry.summary());
        Ok(entry)
    }

    /// Hash of the most recent entry
    pub async fn head_hash(&self) -> String {
        self.state.lock().await.head_hash.clone()
    }

    /// Entries written so far, genesis included
    pub async fn entry_count(&self) -> u64 {
        self.state.lock().await.next_sequence
    }

    /// Read back every entry from disk
    pub async fn entries(&self) -> Result<Vec<JournalEntry>> {
        let _state = self.state.lock().await;
        load_journal_from_file(&self.path)
    }

    /// Location of the journal file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_entry(file: &mut File, entry: &JournalEntry) -> Result<()> {
    let json = serde_json::to_string(entry)
        .map_err(|e| anyhow!("Failed to serialize journal entry: {}", e))?;
    writeln!(file, "{}", json).map_err(|e| anyhow!("Failed to write journal: {}", e))?;
    file.flush()
        .map_err(|e| anyhow!("Failed to flush journal: {}", e))?;
    Ok(())
}
