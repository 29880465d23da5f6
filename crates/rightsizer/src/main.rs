//! Rightsizer - Kubernetes workload resource rightsizer
//!
//! Runs one jittered schedule per managed target and applies tiered
//! recommendations under the policy found in each target's annotations.

use anyhow::Result;
use rightsizer_lib::{
    observability::StructuredLogger, ChangeReporter, ProcessDefaults, Rightsizer,
    ScheduleRegistry,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod inventory;

use inventory::{Inventory, LogNotifier};

const RIGHTSIZER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = config::RightsizerConfig::load()?;
    info!(
        controller = %config.controller_name,
        inventory = %config.inventory_path.display(),
        "Rightsizer configured"
    );

    let mut defaults = ProcessDefaults::from_env()?;
    if config.default_dry_run {
        defaults.set_if_absent("dry-run", "true");
    }
    info!(count = defaults.len(), "Loaded process defaults");

    let inventory = Arc::new(Inventory::load(&config.inventory_path).await?);
    let targets = inventory.targets().await;

    let logger = StructuredLogger::new(&config.controller_name);
    let reporter = ChangeReporter::new(logger.clone()).with_notifier(Arc::new(LogNotifier));
    let rightsizer = Arc::new(Rightsizer::new(
        inventory.clone(),
        inventory.clone(),
        defaults,
        reporter,
    ));

    let registry = ScheduleRegistry::new();
    for target in &targets {
        if let Err(e) = rightsizer.schedule(&registry, target).await {
            error!(target_key = %target.key(), error = %e, "Failed to schedule target");
        }
    }
    logger.log_startup(RIGHTSIZER_VERSION, registry.len().await);

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    registry.shutdown().await;

    Ok(())
}
