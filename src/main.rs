//! Storefront Orders - cart and order lifecycle service

use std::sync::Arc;

use anyhow::{Context, Result};
use storefront_orders::{
    api::{self, AppState},
    config::Config,
    messaging::{EventPublisher, NatsPublisher, NoopPublisher},
    store::{CartStore, MemoryStore, OrderStore, PgStore, ProductCatalog},
    CartService, OrderService, Product,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

struct Stores {
    catalog: Arc<dyn ProductCatalog>,
    carts: Arc<dyn CartStore>,
    orders: Arc<dyn OrderStore>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let stores = open_stores(&config).await?;

    let publisher: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => {
            let client = async_nats::connect(url).await.with_context(|| format!("connecting to NATS at {url}"))?;
            tracing::info!(url = %url, prefix = %config.nats_subject_prefix, "publishing domain events to NATS");
            Arc::new(NatsPublisher::new(client, config.nats_subject_prefix.clone()))
        }
        None => Arc::new(NoopPublisher),
    };

    let state = AppState {
        carts: CartService::new(stores.carts.clone(), stores.catalog.clone(), publisher.clone(), config.currency.clone()),
        orders: OrderService::new(stores.orders, stores.carts, stores.catalog, publisher, config.currency.clone())
            .with_policy(config.transition_policy),
    };

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("🚀 Storefront orders listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, api::router(state)).await?;
    Ok(())
}

async fn open_stores(config: &Config) -> Result<Stores> {
    if let Some(url) = &config.database_url {
        let store = Arc::new(PgStore::connect(url, config.database_max_connections).await?);
        store.migrate().await?;
        tracing::info!("using PostgreSQL storage");
        return Ok(Stores { catalog: store.clone(), carts: store.clone(), orders: store });
    }

    let store = Arc::new(MemoryStore::new());
    if let Some(path) = &config.catalog_file {
        let raw = tokio::fs::read_to_string(path).await.with_context(|| format!("reading {}", path.display()))?;
        let products: Vec<Product> = serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        let count = store.upsert_products(products).await;
        tracing::info!(count, path = %path.display(), "catalog preloaded");
    }
    tracing::warn!("DATABASE_URL not set, using in-memory storage");
    Ok(Stores { catalog: store.clone(), carts: store.clone(), orders: store })
}
