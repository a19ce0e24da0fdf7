use anyhow::Result;
use consumption_client::db::ensure_consumption_schema;
use consumption_service::{
    address::{AddressResolver, HttpAddressLookup},
    cache::RecencyCache,
    config::AppConfig,
    http, metrics_server, observability,
    storage::PgConsumptionStore,
    ConsumptionService,
};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing("info");

    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;
    ensure_consumption_schema(&pool).await?;

    let lookup_cfg = &cfg.address_lookup;
    let lookup = HttpAddressLookup::new(&lookup_cfg.base_url, lookup_cfg.request_timeout())?;
    let resolver = AddressResolver::new(
        Arc::new(lookup),
        Arc::new(RecencyCache::new(lookup_cfg.cache_capacity)),
        lookup_cfg.retry_policy(),
        lookup_cfg.cache_ttl(),
    );

    let service = ConsumptionService::new(Arc::new(PgConsumptionStore::new(pool)), Arc::new(resolver));

    let addr: SocketAddr = cfg
        .http
        .bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid http.bind_addr: {e}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "consumption service listening");

    axum::serve(listener, http::router(service).into_make_service()).await?;

    Ok(())
}
