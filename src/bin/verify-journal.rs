use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, Command};
use std::collections::HashMap;
use std::path::Path;
use tracing::{error, info};

use custody_ledger::journal::{find_tampered_entries, load_journal_from_file, verify_journal, JournalEntry};

fn main() -> Result<()> {
    let matches = Command::new("verify-journal")
        .version("0.1.0")
        .about("Verify custody ledger operation journal integrity")
        .arg(
            Arg::new("journal-path")
                .short('j')
                .long("journal-path")
                .value_name("PATH")
                .help("Path to journal file")
                .required(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable verbose output"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Suppress output except errors"),
        )
        .get_matches();

    let journal_path = matches
        .get_one::<String>("journal-path")
        .ok_or_else(|| anyhow!("--journal-path is required"))?;
    let verbose = matches.get_flag("verbose");
    let quiet = matches.get_flag("quiet");

    let level = if quiet {
        tracing::Level::ERROR
    } else if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    if let Err(e) = verify_journal_path(Path::new(journal_path), verbose) {
        error!("Journal verification failed: {}", e);
        std::process::exit(1);
    }

    if !quiet {
        println!("✓ Journal verification completed successfully");
    }

    Ok(())
}

fn verify_journal_path(path: &Path, verbose: bool) -> Result<()> {
    info!("Verifying journal: {:?}", path);

    if !path.exists() {
        return Err(anyhow!("Journal file not found: {:?}", path));
    }

    let entries = load_journal_from_file(path)?;
    if entries.is_empty() {
        return Err(anyhow!("Journal is empty"));
    }

    if verbose {
        println!("Loaded {} journal entries", entries.len());
    }

    let tampered = find_tampered_entries(&entries);
    if !tampered.is_empty() {
        for i in &tampered {
            println!("✗ Entry {} does not match its hash: {}", i, entries[*i].summary());
        }
    }

    verify_journal(&entries)?;

    if verbose {
        println!("✓ Hash chain integrity verified");
        print_summary(&entries);
    }

    Ok(())
}

fn print_summary(entries: &[JournalEntry]) {
    let last = &entries[entries.len() - 1];
    println!("\nJournal Summary:");
    println!("  Total entries: {}", entries.len());
    println!("  First entry: {}", entries[0].timestamp);
    println!("  Last entry: {}", last.timestamp);
    println!("  Head hash: {}", last.this_hash);

    let mut operations: HashMap<&str, usize> = HashMap::new();
    for entry in entries {
        *operations.entry(entry.operation.as_str()).or_insert(0) += 1;
    }

    println!("\nOperation distribution:");
    for (operation, count) in operations {
        println!("  {}: {}", operation, count);
    }
}
