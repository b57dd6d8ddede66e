use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use hivewatch::alerting::{
    ChannelAlerter, DiscordAlerter, EmailAlerter, NotificationDispatcher, SlackAlerter,
};
use hivewatch::api::{build_router, AppState};
use hivewatch::cache::TtlCache;
use hivewatch::config::Config;
use hivewatch::enrichment::{
    EnrichmentService, GeoIpService, GeoProvider, ReputationClient, ReputationProvider,
};
use hivewatch::persistence::{AlertStore, SqliteAlertStore};
use hivewatch::pipeline::{EventIngestionPipeline, Notifier};
use hivewatch::ratelimit::SlidingWindowLimiter;

/// Main daemon entry point for the honeypot alerting service
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Starting HiveWatch daemon...");

    // Load configuration
    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = if config_path.exists() {
        Config::from_file(&config_path)?
    } else {
        log::warn!("Config file not found, using defaults");
        Config::default()
    };

    // Enrichment providers; a missing database or API key disables the
    // corresponding lookup rather than aborting startup
    let geo: Option<Arc<dyn GeoProvider>> = match &config.enrichment.geoip_db_path {
        Some(path) => match GeoIpService::new(path) {
            Ok(service) => {
                log::info!("GeoIP database loaded from {:?}", path);
                Some(Arc::new(service) as Arc<dyn GeoProvider>)
            }
            Err(e) => {
                log::warn!("GeoIP database unavailable: {}", e);
                None
            }
        },
        None => None,
    };
    let reputation: Option<Arc<dyn ReputationProvider>> = match (
        &config.enrichment.reputation_api_url,
        &config.enrichment.reputation_api_key,
    ) {
        (Some(url), Some(key)) => Some(Arc::new(ReputationClient::new(url.clone(), key.clone()))
            as Arc<dyn ReputationProvider>),
        _ => None,
    };
    let enrichment = Arc::new(EnrichmentService::new(
        geo,
        reputation,
        config.enrichment.cache_size,
        Duration::from_secs(config.enrichment.cache_ttl_seconds),
    ));

    // Notification channels
    let mut channels: Vec<Arc<dyn ChannelAlerter>> = Vec::new();
    if config.alerting.enabled {
        if let Some(slack) = &config.alerting.slack {
            channels.push(Arc::new(SlackAlerter::new(
                slack.webhook_url.clone(),
                slack.channel.clone(),
                slack.username.clone(),
            )));
        }
        if let Some(discord) = &config.alerting.discord {
            channels.push(Arc::new(DiscordAlerter::new(
                discord.webhook_url.clone(),
                discord.username.clone(),
            )));
        }
        if let Some(email) = &config.alerting.email {
            match EmailAlerter::new(
                &email.smtp_host,
                email.smtp_port,
                email.username.as_deref(),
                email.password.as_deref(),
                email.use_tls,
                &email.from_name,
                &email.from_email,
                &email.recipients,
            ) {
                Ok(alerter) => channels.push(Arc::new(alerter)),
                Err(e) => log::error!("Email channel misconfigured, skipping: {}", e),
            }
        }
    } else {
        log::warn!("Alerting disabled by configuration");
    }

    let dispatch_limiter = Arc::new(SlidingWindowLimiter::new(
        config.alerting.max_dispatches,
        Duration::from_secs(config.alerting.dispatch_window_seconds),
    ));
    let dispatcher = NotificationDispatcher::new(channels, config.alerting.retry.to_policy())
        .with_limiter(dispatch_limiter);

    // Persistence
    let store: Arc<dyn AlertStore> = Arc::new(SqliteAlertStore::new(&config.persistence.db_path)?);
    log::info!("Alert store opened at {:?}", config.persistence.db_path);

    // Ingestion pipeline
    let pipeline = Arc::new(EventIngestionPipeline::new(
        Arc::clone(&enrichment),
        Arc::clone(&store),
        Arc::new(dispatcher) as Arc<dyn Notifier>,
        config.pipeline.workers,
        config.pipeline.queue_capacity,
    ));

    // HTTP surface
    let state = Arc::new(AppState {
        limiter: Arc::new(SlidingWindowLimiter::new(
            config.rate_limit.max_requests,
            Duration::from_secs(config.rate_limit.window_seconds),
        )),
        response_cache: Arc::new(TtlCache::new(
            config.cache.max_size,
            Duration::from_secs(config.cache.default_ttl_seconds),
        )),
        pipeline: Arc::clone(&pipeline),
        store,
        enrichment,
    });
    let router = build_router(state);

    let addr: SocketAddr =
        format!("{}:{}", config.server.bind_address, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Listening on http://{}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    log::info!("Server stopped, draining ingestion pipeline...");
    pipeline.shutdown().await;
    log::info!("HiveWatch daemon stopped");

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("Received shutdown signal, gracefully stopping..."),
        Err(e) => log::error!("Failed to listen for shutdown signal: {}", e),
    }
}
