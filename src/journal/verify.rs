//! Journal Verification

use anyhow::{anyhow, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

use super::entry::{JournalEntry, ZERO_HASH};

/// Verify the hash chain of a complete journal. Returns the entry count.
pub fn verify_journal(entries: &[JournalEntry]) -> Result<usize> {
    let first = entries.first().ok_or_else(|| anyhow!("Empty journal"))?;
    if first.operation != "genesis" || first.previous_hash != ZERO_HASH {
        return Err(anyhow!("First entry must be genesis"));
    }

    for (i, entry) in entries.iter().enumerate() {
        if !entry.verify_hash() {
            return Err(anyhow!("Invalid hash in entry {}", i));
        }
        if entry.sequence != i as u64 {
            return Err(anyhow!(
                "Sequence gap at entry {}: found sequence {}",
                i,
                entry.sequence
            ));
        }
    }

    for i in 1..entries.len() {
        let prev = &entries[i - 1];
        let curr = &entries[i];

        if curr.previous_hash != prev.this_hash {
            return Err(anyhow!(
                "Hash chain broken at entry {}: expected {}, got {}",
                i,
                prev.this_hash,
                curr.previous_hash
            ));
        }

        if curr.timestamp < prev.timestamp {
            return Err(anyhow!(
                "Non-monotonic timestamp at entry {}: {} < {}",
                i,
                curr.timestamp,
                prev.timestamp
            ));
        }
    }

    info!("Journal verification successful: {} entries", entries.len());
    Ok(entries.len())
}

/// Parse a JSONL journal. Blank lines are skipped.
pub fn load_journal_from_file(path: &Path) -> Result<Vec<JournalEntry>> {
    let file = File::open(path).map_err(|e| anyhow!("Failed to open journal file: {}", e))?;

    let reader = BufReader::new(file);
    let mut entries = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| anyhow!("Failed to read line {}: {}", line_num + 1, e))?;
        if line.trim().is_empty() {
            continue;
        }

        let entry: JournalEntry = serde_json::from_str(&line)
            .map_err(|e| anyhow!("Failed to parse entry at line {}: {}", line_num + 1, e))?;
        entries.push(entry);
    }

    debug!("Loaded {} entries from {:?}", entries.len(), path);
    Ok(entries)
}

/// Load and verify a journal file. Returns the entry count.
pub fn verify_journal_file(path: &Path) -> Result<usize> {
    if !path.exists() {
        return Err(anyhow!("Journal file does not exist: {:?}", path));
    }
    let entries = load_journal_from_file(path)?;
    verify_journal(&entries)
}

/// Indexes of entries whose own hash no longer matches their content
pub fn find_tampered_entries(entries: &[JournalEntry]) -> Vec<usize> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| !entry.verify_hash())
        .map(|(i, _)| i)
        .collect()
}
