//! Repricer service binary: wires the store, queue consumer, reset scheduler
//! and webhook server, then serves until shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenv::dotenv;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repricer_backend::api::{self, ApiState};
use repricer_backend::config::Config;
use repricer_backend::engine::{Persister, RepricingEngine};
use repricer_backend::ingest::{ConsumerConfig, MemoryQueue, QueueClient, QueueConsumer};
use repricer_backend::middleware::logging::request_logging;
use repricer_backend::reset::ResetScheduler;
use repricer_backend::stats::ProcessingStats;
use repricer_backend::store::{MemoryStore, Store, TimedStore};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    init_tracing();

    let config = Config::from_env();
    info!(
        workers = config.worker_count,
        bind = %config.bind_addr,
        "repricer starting"
    );

    // Store behind the per-operation timeout wrapper. The in-memory store is
    // the reference backend; deployments swap in their key-value client
    // behind the same trait.
    let backing: Arc<dyn Store> = Arc::new(MemoryStore::new(config.calculated_price_ttl));
    let store: Arc<dyn Store> = Arc::new(TimedStore::new(backing, config.store_timeout));

    let stats = Arc::new(ProcessingStats::new());
    let engine = Arc::new(RepricingEngine::new(store.clone(), stats.clone()));
    let persister = Arc::new(Persister::new(store.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Offer-change queue. External producers feed the real queue; without a
    // configured URL the in-process queue serves local runs and tests.
    let queue: Arc<dyn QueueClient> = MemoryQueue::new(config.visibility_timeout);
    if let Some(url) = &config.queue_url {
        warn!(queue_url = %url, "external queue configured; attach a queue adapter behind QueueClient");
    }
    let dlq: Option<Arc<dyn QueueClient>> = Some(MemoryQueue::new(config.visibility_timeout));

    let consumer = QueueConsumer::new(
        queue.clone(),
        dlq.clone(),
        engine.clone(),
        ConsumerConfig {
            worker_count: config.worker_count,
            max_messages: config.max_messages,
            poll_wait: config.poll_wait,
            visibility_timeout: config.visibility_timeout,
            max_retries: config.max_retries,
            event_timeout: config.event_timeout,
        },
    );
    let consumer_handle = tokio::spawn(consumer.run(shutdown_rx.clone()));

    // Reset sweep runs in its own single task; concurrent sweeps for one
    // seller are impossible by construction.
    let scheduler = ResetScheduler::new(store.clone(), persister.clone());
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx.clone()));

    let state = ApiState {
        engine,
        store,
        persister,
        stats,
        service_name: config.service_name.clone(),
        event_timeout: config.event_timeout,
    };
    let app = api::router(state)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(axum::middleware::from_fn(request_logging));

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "webhook server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // Stop taking new work, then drain within the documented bound.
    info!("shutdown signal received, draining");
    let _ = shutdown_tx.send(true);
    let drain = config.visibility_timeout * 2 + Duration::from_secs(1);
    let _ = tokio::time::timeout(drain, consumer_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(1), scheduler_handle).await;
    info!("repricer stopped");

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "repricer_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
