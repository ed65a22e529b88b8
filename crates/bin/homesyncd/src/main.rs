//! # homesyncd: homesync daemon
//!
//! Composition root that wires the reconciliation services to the
//! simulated home and keeps them running.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Initialize structured logging
//! - Construct the store, the change bus and the transport
//! - Construct application services, injecting them via port traits
//! - Run the remote feed, the derived state watcher and the transition
//!   timeout sweep until interrupted
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer: no domain logic belongs here.

mod config;
mod demo;
mod wiring;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::wiring::Services;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    let (services, feed) = Services::build(&config);
    let installed = if config.simulation.demo {
        Some(demo::install(&services)?)
    } else {
        None
    };

    let reconciler = Arc::clone(&services.reconciler);
    let reconciler_task = tokio::spawn(async move { reconciler.run(feed).await });

    // Groups and scenes must be registered before the watch set is taken.
    let watcher = Arc::clone(&services.watcher);
    let changes = services.bus.watch(watcher.watched_ids());
    let watcher_task = tokio::spawn(async move { watcher.run(changes).await });

    let actuators = Arc::clone(&services.actuators);
    let poll_interval = config.poll_interval();
    let timeout_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            ticker.tick().await;
            for (device, err) in actuators.poll_timeouts() {
                tracing::warn!(%device, error = %err, "transition reverted");
            }
        }
    });

    let demo_task = installed.map(|handles| tokio::spawn(demo::run(services.clone(), handles)));

    tracing::info!(
        transition_timeout = ?config.transition_timeout(),
        bus_capacity = config.bus.capacity,
        "homesyncd running, press ctrl-c to stop"
    );
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    if let Some(task) = demo_task {
        task.abort();
    }
    timeout_task.abort();
    watcher_task.abort();
    reconciler_task.abort();
    Ok(())
}
