use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use geossh::config::Config;
use geossh::geo;
use geossh::ingest::{Listener, Pipeline};
use geossh::metrics::{InfluxStore, MetricSink, MetricStore, RetryPolicy};

fn init_tracing(level: &str) {
    // RUST_LOG wins over the configured DEBUG_LEVEL
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Configuration warnings are printed before the real filter is known
    let config = tracing::subscriber::with_default(
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("warn"))
            .finish(),
        Config::from_env,
    );
    init_tracing(config.as_ref().map_or("info", |c| c.log_level.as_str()));

    let config = config?;
    info!("Loaded configuration (log level: {})", config.log_level);

    // Initialize metric store; the database is created in the background
    info!(
        "Using InfluxDB at {} (database: {})",
        config.influx.base_url(),
        config.influx.database
    );
    let store: Arc<dyn MetricStore> = Arc::new(InfluxStore::new(&config.influx)?);
    let sink = MetricSink::new(store);
    sink.spawn_ensure_database(RetryPolicy::default());

    let locator = geo::locator_from_config(&config.geoip)?;

    let pipeline = Arc::new(Pipeline::new(
        config.grammar.clone(),
        locator,
        sink,
        config.geohash_precision,
    ));

    let listener = Listener::bind(&config.listener.host, config.listener.port).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                error!("Unable to listen for shutdown signal: {}", e);
                // Holding the sender keeps the listener serving
                std::future::pending::<()>().await;
            }
        }
    });

    listener.run(pipeline, shutdown_rx).await?;
    info!("Shut down cleanly");

    Ok(())
}
