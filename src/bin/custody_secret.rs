//! Handover secret tool
//!
//! Generates secrets and commitments for custodians, and packs handover
//! payloads for QR or copy/paste transfer.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use custody_ledger::crypto::{commit, generate_secret, generate_short_secret};
use custody_ledger::ledger::models::Principal;
use custody_ledger::transport::{HandoverPayload, HandoverTransport, JsonTransport, TextTransport};

#[derive(Parser)]
#[command(name = "custody-secret")]
#[command(about = "Generate handover secrets and commitments")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a fresh secret and print its commitment
    Generate {
        /// Mixed into the secret, e.g. the asset id
        #[arg(short, long, default_value = "")]
        label: String,

        /// Short XXXX-XXXX-XXXX-XXXX form for consumer certificates
        #[arg(short, long)]
        short: bool,
    },

    /// Print the commitment of an existing secret
    Hash {
        secret: String,
    },

    /// Pack a handover payload for the next custodian
    Encode {
        #[arg(short, long)]
        asset_id: i64,

        #[arg(long)]
        secret: String,

        /// Principal handing the asset over
        #[arg(long)]
        sender: String,

        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Unpack a scanned or pasted handover payload
    Decode {
        raw: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Text,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { label, short } => {
            let pair = if short {
                generate_short_secret(&label)
            } else {
                generate_secret(&label)
            };
            println!("secret:     {}", pair.secret);
            println!("commitment: {}", pair.commitment);
        }
        Commands::Hash { secret } => {
            println!("{}", commit(&secret));
        }
        Commands::Encode {
            asset_id,
            secret,
            sender,
            format,
        } => {
            let sender = Principal::new(&sender).map_err(|e| anyhow!("{}", e))?;
            let payload = HandoverPayload::new(asset_id, secret, sender);
            let encoded = match format {
                Format::Json => JsonTransport.encode(&payload),
                Format::Text => TextTransport.encode(&payload),
            }
            .map_err(|e| anyhow!("Failed to encode payload: {}", e))?;
            println!("{}", encoded);
        }
        Commands::Decode { raw } => {
            let payload = TextTransport
                .decode(&raw)
                .map_err(|e| anyhow!("Failed to decode payload: {}", e))?;
            println!("asset:  {}", payload.asset_id);
            println!("secret: {}", payload.secret);
            if let Some(sender) = payload.sender {
                println!("sender: {}", sender);
            }
        }
    }

    Ok(())
}
