use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use railbook_api::{app, AppState};
use railbook_booking::{BookingService, RedirectGateway, Sweeper};
use railbook_core::ReservationStore;
use railbook_store::{app_config::Config, MemoryStore, PgStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "railbook=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!("Starting railbook API on port {}", config.server.port);

    let store: Arc<dyn ReservationStore> = match &config.database.url {
        Some(url) => {
            let pg = PgStore::connect(url).await?;
            pg.migrate().await?;
            Arc::new(pg)
        }
        None => {
            tracing::warn!("no database configured, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let gateway = Arc::new(RedirectGateway::new(config.gateway.redirect_base.clone()));
    let service = Arc::new(BookingService::new(
        store,
        gateway,
        config.booking.hold_seconds,
    ));

    let sweeper = Sweeper::new(
        service.clone(),
        Duration::from_secs(config.booking.sweep_interval_seconds),
    );
    tokio::spawn(sweeper.run());

    let state = AppState {
        service,
        server_key: config.gateway.server_key.clone(),
    };
    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
