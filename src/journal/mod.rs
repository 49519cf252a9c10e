//! Operation Journal
//!
//! Tamper-evident, off-ledger record of every committed ledger mutation,
//! chained by SHA-256 so removed or rewritten lines are detectable.

pub mod entry;
pub mod logger;
pub mod verify;

pub use entry::JournalEntry;
pub use logger::Journal;
pub use verify::{find_tampered_entries, load_journal_from_file, verify_journal, verify_journal_file};
