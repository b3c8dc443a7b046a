//! sql-metric-exporter - SQL query results as scrape-able gauges
//!
//! This is the composition root that wires together all the components.

use clap::Parser;
use sql_metric_exporter::adapters::inbound::HttpServer;
use sql_metric_exporter::adapters::outbound::{ConnectionRegistry, DashMapMeasurementStore};
use sql_metric_exporter::application::{ExporterService, QueryExecutor};
use sql_metric_exporter::config::{load_config, Cli};
use sql_metric_exporter::domain::ports::SystemClock;
use sql_metric_exporter::infrastructure::{shutdown_signal, ShutdownController};
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let cfg = load_config(&cli)?;
    let definitions = cfg.metric_definitions()?;

    tracing::info!(
        "starting sql-metric-exporter listen={} databases={} metrics={}",
        cfg.listen,
        cfg.databases.len(),
        definitions.len()
    );

    // ===== COMPOSITION ROOT =====

    // 1. Outbound adapters
    let registry = ConnectionRegistry::connect(&cfg.databases).await?;
    tracing::info!("databases ready: [{}]", registry.names().join(", "));
    let store = Arc::new(DashMapMeasurementStore::new());

    // 2. Application service
    let service = Arc::new(ExporterService::new(
        definitions,
        &registry,
        store,
        Arc::new(SystemClock),
        QueryExecutor::new(cfg.query_timeout()),
    )?);
    tracing::info!("metrics: [{}]", service.metric_names().join(", "));

    // 3. Inbound adapter
    let shutdown = ShutdownController::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let server = HttpServer::new(service, cfg.listen_addr());
    server.run(shutdown).await
}
