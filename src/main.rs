use std::sync::Arc;
use std::time::Duration;

use fleetops_alerts::config::AppConfig;
use fleetops_alerts::db;
use fleetops_alerts::db::repository::PgAlertRepository;
use fleetops_alerts::engine::scheduler::EscalationScheduler;
use fleetops_alerts::engine::sync::SyncEngine;
use fleetops_alerts::engine::AlertEngine;
use fleetops_alerts::push;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting FleetOps Alert Engine...");

    // Init DB
    let pool = db::init_pool(&config.database_url).await?;
    info!("Connected to database");

    let repo = Arc::new(PgAlertRepository::new(pool));
    let engine = Arc::new(AlertEngine::new(
        repo,
        Duration::from_secs(config.command_timeout_secs),
        config.unattended_threshold_hours,
    ));

    let sync = SyncEngine::new(
        engine.clone(),
        Duration::from_secs(config.sync_interval_secs),
        Duration::from_secs(config.command_timeout_secs),
    );

    // Initial load; failures here are retried by the periodic refresh.
    if let Err(e) = sync.refresh_once().await {
        warn!("initial alert load failed: {}", e);
    }
    let rules = match engine.repository().list_escalation_rules().await {
        Ok(rules) => {
            info!("Loaded {} escalation rules", rules.len());
            rules
        }
        Err(e) => {
            warn!("failed to load escalation rules: {}", e);
            Vec::new()
        }
    };

    let scheduler = EscalationScheduler::new(
        engine.clone(),
        rules,
        Duration::from_secs(config.escalation_check_interval_secs),
    );

    tokio::spawn(async move { sync.run().await });
    tokio::spawn(async move { scheduler.run().await });

    // Consume push events in the foreground
    push::start_push_consumer(&config, engine).await?;

    Ok(())
}
