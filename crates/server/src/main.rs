use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deskrelay_core::{
    desk::{OAuthTokenProvider, TokenProvider},
    load_config, validate_config, BulkJobRunner, DeskClient, EventEmitter, HelpdeskApi,
    HttpHelpdesk, JobRegistry, ProfileSource, SqliteTicketLog, StaticProfiles, TicketLog,
    TokenCache, VerificationPool,
};
use deskrelay_server::{api::create_router, state::AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("DESKRELAY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        config_hash = &config_hash[..16],
        profiles = config.profiles.len(),
        "Configuration loaded successfully"
    );
    info!("Ticket log path: {:?}", config.history.path);

    let call_timeout = config.desk.call_timeout_secs.map(Duration::from_secs);

    // Token cache
    let token_provider: Arc<dyn TokenProvider> = Arc::new(
        OAuthTokenProvider::new(config.desk.accounts_url.clone(), call_timeout)
            .context("Failed to create token provider")?,
    );
    let tokens = Arc::new(TokenCache::new(
        token_provider,
        Duration::from_secs(config.token.safety_margin_secs),
    ));

    // Helpdesk client
    let client = DeskClient::new(config.desk.clone(), tokens)
        .context("Failed to create helpdesk client")?;
    let desk: Arc<dyn HelpdeskApi> = Arc::new(HttpHelpdesk::new(client));
    info!("Helpdesk client targeting {}", config.desk.api_base);

    // Ticket log
    let ticket_log: Arc<dyn TicketLog> = Arc::new(
        SqliteTicketLog::new(&config.history.path).context("Failed to open ticket log")?,
    );
    info!("Ticket log initialized");

    let profiles: Arc<dyn ProfileSource> =
        Arc::new(StaticProfiles::new(config.profiles.iter().cloned()));

    // Job engine
    let events = EventEmitter::new(config.jobs.event_buffer);
    let verifier = VerificationPool::new(
        Arc::clone(&desk),
        events.clone(),
        config.jobs.max_concurrent_verifications,
        config.jobs.settle_delay(),
    );
    let runner = BulkJobRunner::new(
        Arc::clone(&profiles),
        Arc::clone(&desk),
        Arc::new(JobRegistry::new()),
        events,
        Arc::clone(&ticket_log),
        verifier,
    );
    info!(
        max_concurrent_verifications = config.jobs.max_concurrent_verifications,
        settle_delay_secs = config.jobs.settle_delay_secs,
        "Job engine ready"
    );

    let addr = SocketAddr::new(config.server.host, config.server.port);

    // Create app state
    let state = Arc::new(AppState::new(config, profiles, desk, ticket_log, runner));

    // Create router
    let app = create_router(state);

    // Start server
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
