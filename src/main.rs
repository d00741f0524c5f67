use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use pool_reaper::config::AppConfig;
use pool_reaper::{IdleReaper, MemoryPool};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    let config = AppConfig::load("config.toml")?;

    let pool = Arc::new(MemoryPool::new());
    let reaper = IdleReaper::new(pool.clone(), config.reaper.clone());
    let mut events = reaper.subscribe();
    reaper.start()?;

    // Burst of load: open a batch of connections and use all of them
    for _ in 0..config.demo.burst_connections {
        pool.connect()?;
    }
    let mut in_use = Vec::with_capacity(config.demo.burst_connections);
    while let Some(conn) = pool.acquire()? {
        in_use.push(conn);
    }
    for conn in in_use.into_iter().rev() {
        pool.release(conn)?;
    }
    info!(open = pool.open_count(), "Burst finished, entering quiet period");

    // Quiet period: only a few connections stay in use
    let warm_pool = pool.clone();
    let keep_warm = config.demo.keep_warm;
    let warm_interval = Duration::from_millis(config.demo.warm_interval_ms);
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(warm_interval).await;
            let mut held = Vec::with_capacity(keep_warm);
            for _ in 0..keep_warm {
                match warm_pool.acquire() {
                    Ok(Some(conn)) => held.push(conn),
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "Warm-up stopped");
                        return;
                    }
                }
            }
            for conn in held.into_iter().rev() {
                let _ = warm_pool.release(conn);
            }
        }
    });

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!(
                    conn_id = %event.connection,
                    idle_ms = event.idle_for.as_millis() as u64,
                    "Connection reaped"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped = skipped, "Reap event log lagging");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    info!("Reaper demo running, press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("Received Ctrl+C, shutting down...");
    reaper.stop();
    pool.shutdown();
    info!(open = pool.open_count(), "Shutdown complete.");

    Ok(())
}
