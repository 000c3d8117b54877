//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use checkout::{
    HttpNotifier, InMemoryPaymentProcessor, LogNotifier, Notifier, PaymentProcessor, StripeClient,
};
use order_store::{
    CatalogStore, InMemoryCatalogStore, InMemoryOrderStore, OrderStore, PostgresCatalogStore,
    PostgresOrderStore, spawn_ttl_reaper,
};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn open_stores(config: &Config) -> (Arc<dyn OrderStore>, Arc<dyn CatalogStore>) {
    match &config.database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .expect("failed to connect to PostgreSQL");
            let orders = PostgresOrderStore::new(pool.clone());
            orders.run_migrations().await.expect("migrations failed");
            tracing::info!("using PostgreSQL stores");
            (Arc::new(orders), Arc::new(PostgresCatalogStore::new(pool)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, orders are kept in memory");
            (
                Arc::new(InMemoryOrderStore::new()),
                Arc::new(InMemoryCatalogStore::new()),
            )
        }
    }
}

fn payment_processor(config: &Config) -> Arc<dyn PaymentProcessor> {
    match &config.stripe_secret {
        Some(key) => Arc::new(
            StripeClient::new(key.clone(), config.webhook_secret.clone())
                .with_api_base(config.stripe_api_base.clone()),
        ),
        None => {
            tracing::warn!("STRIPE_SERVER_SECRET not set, using the in-memory processor");
            Arc::new(InMemoryPaymentProcessor::new(config.webhook_secret.clone()))
        }
    }
}

fn notifier(config: &Config) -> Arc<dyn Notifier> {
    match &config.notify_url {
        Some(url) => Arc::new(HttpNotifier::new(url.clone())),
        None => Arc::new(LogNotifier),
    }
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env().expect("invalid configuration");
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Open stores and seed the catalog
    let (orders, catalog) = open_stores(&config).await;
    if let Some(path) = &config.catalog_seed_path {
        api::seed_catalog(catalog.as_ref(), path)
            .await
            .expect("failed to seed catalog");
    }

    // 4. Expire abandoned placeholders in the background
    let reaper = spawn_ttl_reaper(orders.clone(), config.ttl_reap_interval);

    // 5. Build the application
    let state = Arc::new(api::AppState::new(
        orders,
        catalog,
        payment_processor(&config),
        notifier(&config),
        config.checkout_settings(),
        config.notify_timeout,
    ));
    let app = api::create_app(state, metrics_handle);

    // 6. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    reaper.abort();
    tracing::info!("server shut down gracefully");
}
