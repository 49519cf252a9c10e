use std::net::SocketAddr;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use custody_ledger::api;
use custody_ledger::config::AppConfig;
use custody_ledger::directory::IdentityDirectory;
use custody_ledger::journal::Journal;
use custody_ledger::ledger::models::Principal;
use custody_ledger::ledger::Ledger;
use custody_ledger::roles::RoleRegistry;
use custody_ledger::CustodyService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "custody_ledger=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting custody ledger");

    // Load configuration
    let config = AppConfig::load()?;
    info!("Configuration loaded");

    // Initialize ledger
    let ledger = Ledger::new(&config.database_url).await?;
    info!("Ledger connected");

    ledger.run_migrations().await?;
    info!("Ledger schema ready");

    // Bootstrap administrator
    match &config.admin_principal {
        Some(admin) => {
            let admin = Principal::new(admin)?;
            if RoleRegistry::new(ledger.clone()).bootstrap_admin(&admin).await? {
                info!("Bootstrapped administrator {}", admin);
            }
        }
        None => warn!("No admin_principal configured; roles can only be managed by an existing admin"),
    }

    let mut service = CustodyService::new(ledger);

    // Initialize operation journal
    if config.journal.enabled {
        let journal = Journal::open(&config.journal.path).await?;
        info!("Operation journal at {}", config.journal.path);
        service = service.with_journal(journal);
    }

    // Initialize identity directory
    if let Some(base_url) = &config.directory.base_url {
        let directory =
            IdentityDirectory::http(base_url, Duration::from_secs(config.directory.timeout_secs))?;
        info!("Identity directory at {}", base_url);
        service = service.with_directory(directory);
    }

    // Build application
    let app = api::router(service);

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    info!("Server listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
