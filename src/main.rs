//! Referral Tree - binary referral engine with an HTTP gateway
//!
//! ```text
//! ┌──────────┐    ┌──────────────┐    ┌────────────────┐
//! │  Config  │───▶│ReferralEngine│◀───│  HTTP Gateway  │
//! │  (YAML)  │    │ (tree+ledger)│    │ (axum + docs)  │
//! └──────────┘    └──────▲───────┘    └────────────────┘
//!                        │
//!                 ┌──────┴───────┐
//!                 │Consolidation │ (optional interval)
//!                 └──────────────┘
//! ```
//!
//! Usage:
//!   referral_tree [--env dev|prod] [--port 8080]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use referral_tree::config::AppConfig;
use referral_tree::engine::ReferralEngine;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

/// Run consolidation every `every`, on the blocking pool
fn spawn_consolidation_timer(engine: Arc<ReferralEngine>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // First tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let engine = Arc::clone(&engine);
            match tokio::task::spawn_blocking(move || engine.run_consolidation()).await {
                Ok(Ok(report)) => tracing::info!(run_id = report.run_id, "{}", report.message),
                Ok(Err(e)) => tracing::error!(error = %e, "Scheduled consolidation failed"),
                Err(e) => tracing::error!(error = %e, "Consolidation task panicked"),
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env)?;
    let _log_guard = referral_tree::logging::init_logging(&app_config);

    tracing::info!("Starting Referral Tree in {} mode", env);

    let engine = ReferralEngine::with_founder(
        app_config.engine_settings(),
        app_config.founder_participant(),
    )
    .context("create founder")?;
    let engine = Arc::new(engine);
    tracing::info!(founder = ?engine.founder_id(), "Engine ready");

    if let Some(secs) = app_config.consolidation.interval_secs {
        tracing::info!(interval_secs = secs, "Scheduled consolidation enabled");
        spawn_consolidation_timer(Arc::clone(&engine), Duration::from_secs(secs));
    }

    let port = get_port_override().unwrap_or(app_config.gateway.port);
    referral_tree::gateway::run_server(&app_config.gateway.host, port, engine).await
}
