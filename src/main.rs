//! PABX Backend Server
//!
//! Keeps a pool of authenticated AMI sessions against the switch, folds the
//! call events they stream into per-account active-call snapshots and serves
//! those snapshots over HTTP.

use actix_web::{middleware, web, App, HttpResponse, HttpServer};
use anyhow::Context;
use pabx_ami::AmiPool;
use pabx_api::configure_routes;
use pabx_cache::CacheBackend;
use pabx_core::config::AppConfig;
use pabx_services::CallConsolidator;
use std::env;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "pabx_server={0},pabx_ami={0},pabx_services={0},pabx_api={0},pabx_cache={0},actix_web=info",
            log_level
        ))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting PABX Backend v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load().context("Failed to load configuration")?;

    let cache = Arc::new(
        CacheBackend::from_url(config.redis.url.as_deref())
            .await
            .context("Failed to connect to Redis")?,
    );
    info!(backend = cache.name(), "Cache backend ready");

    info!(
        "Connecting to AMI at {}:{} with {} connections",
        config.ami.host, config.ami.port, config.ami.pool_size
    );
    let pool = AmiPool::new(config.ami.clone());
    if let Err(e) = pool.initialize().await {
        // send_action retries initialization lazily
        warn!(error = %e, "AMI pool not available at startup");
    }

    let consolidator = Arc::new(CallConsolidator::new(
        cache.clone(),
        config.consolidator.clone(),
    ));
    let consolidator_task = consolidator.spawn(pool.subscribe());

    let bind_addr = config.server_addr();
    let workers = config.server.workers.max(1);
    info!(
        "Starting HTTP server on {} with {} workers",
        bind_addr, workers
    );

    let pool_data = web::Data::new(pool.clone());
    let consolidator_data = web::Data::from(consolidator.clone());

    let server = HttpServer::new(move || {
        App::new()
            .app_data(pool_data.clone())
            .app_data(consolidator_data.clone())
            // Middleware
            .wrap(TracingLogger::default())
            .wrap(middleware::Compress::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(configure_routes::<CacheBackend>)
            // Root redirect to health
            .route(
                "/",
                web::get().to(|| async {
                    HttpResponse::Found()
                        .append_header(("Location", "/api/v1/health"))
                        .finish()
                }),
            )
    })
    .workers(workers)
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {}", bind_addr))?
    .run();

    let result = server.await;

    info!("HTTP server stopped, closing AMI sessions");
    pool.disconnect().await;
    consolidator_task.abort();

    result.context("HTTP server failed")
}
