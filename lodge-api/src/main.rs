use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use lodge_api::{app, worker, AppState, HoldSettings};
use lodge_availability::{AvailabilityConfig, AvailabilityManager};
use lodge_booking::{BookingErrorHandler, BookingSessionManager, SessionConfig};
use lodge_catalog::{RateCalculator, RateConfig};
use lodge_core::{InventoryStore, SessionStorage};
use lodge_shared::{Clock, SystemClock};
use lodge_store::{
    Config, DbClient, MemoryInventoryStore, MemorySessionStorage, PgInventoryStore, RedisSessionStorage,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lodge_api=debug,lodge_availability=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Lodge API on port {}", config.server.port);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let store: Arc<dyn InventoryStore> = match &config.database.url {
        Some(url) => {
            let db = DbClient::new(url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Arc::new(PgInventoryStore::new(db.pool))
        }
        None => {
            tracing::warn!("No database configured, inventory lives in memory");
            Arc::new(MemoryInventoryStore::new())
        }
    };

    let session_storage: Arc<dyn SessionStorage> = match &config.redis.url {
        Some(url) => Arc::new(
            RedisSessionStorage::new(url)
                .await
                .context("Failed to connect to Redis")?,
        ),
        None => {
            tracing::warn!("No redis configured, sessions live in memory");
            Arc::new(MemorySessionStorage::new())
        }
    };

    let mut rate_config = RateConfig {
        hotel_locations: config.pricing.hotel_locations.clone(),
        ..RateConfig::default()
    };
    if let Some(rate) = config.pricing.default_tax_rate {
        rate_config.default_tax_rate = rate;
    }
    let rates = Arc::new(RateCalculator::new(rate_config, clock.clone()));

    let availability = Arc::new(AvailabilityManager::new(
        store,
        clock.clone(),
        AvailabilityConfig {
            max_guard_retries: config.holds.max_guard_retries,
            ..AvailabilityConfig::default()
        },
    ));

    let sessions = Arc::new(BookingSessionManager::new(
        session_storage,
        availability.clone(),
        clock.clone(),
        SessionConfig {
            timeout_minutes: config.sessions.timeout_minutes,
            warning_minutes: config.sessions.warning_minutes,
            ..SessionConfig::default()
        },
    ));

    let errors = Arc::new(BookingErrorHandler::default());

    worker::start_hold_sweeper(
        availability.clone(),
        Duration::from_secs(config.holds.cleanup_interval_seconds.max(1)),
    );

    let app_state = AppState {
        rates,
        availability,
        sessions,
        errors,
        holds: HoldSettings {
            default_ttl_minutes: config.holds.default_ttl_minutes,
        },
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(app_state)).await?;
    Ok(())
}
