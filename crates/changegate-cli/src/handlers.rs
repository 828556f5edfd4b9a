//! Command handlers.

use crate::config::CliConfig;
use crate::queue::DetachedQueue;
use anyhow::{Context, Result};
use changegate_api::{AppState, create_router};
use changegate_client::HttpAuthority;
use changegate_core::job::JobKind;
use changegate_core::ports::ChangeControlAuthority;
use changegate_core::wire::{JobTarget, StageScope, TrackingQuery};
use changegate_engine::ChangeGate;
use console::style;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

fn authority(config: &CliConfig) -> Result<HttpAuthority> {
    HttpAuthority::new(config.client_config()).context("building authority client")
}

/// Run the callback server until interrupted.
pub async fn serve(config: &CliConfig, bind: Option<String>) -> Result<()> {
    if config.gate.is_misconfigured() {
        warn!("Change control is enabled but the configuration is invalid");
    }

    let addr: SocketAddr = match bind {
        Some(bind) => bind.parse().with_context(|| format!("invalid bind address {bind}"))?,
        None => config.server.bind,
    };

    let queue = Arc::new(DetachedQueue::new());
    let gate = Arc::new(ChangeGate::new(
        config.gate.clone(),
        Arc::new(authority(config)?),
        queue.clone(),
    ));
    let app = create_router(Arc::new(AppState::new(gate)));

    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, enabled = config.gate.enabled, "Callback server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let canceled = queue.drain_canceled();
    info!(canceled = canceled.len(), "Callback server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
}

/// One-off tracking query.
pub async fn track(
    config: &CliConfig,
    url: String,
    name: String,
    kind: String,
    branch: Option<String>,
) -> Result<()> {
    let query = TrackingQuery {
        url,
        name,
        pronoun: JobKind::from(kind),
        is_multi_branch: branch.is_some(),
        branch_name: branch,
    };

    match authority(config)?.tracking_query(&query).await {
        Ok(response) if response.tracked => {
            println!("{} {} is tracked", style("✓").green(), style(&query.name).bold());
            if let Some(info) = response.test_info {
                println!("  testInfo: {}", info);
            }
        }
        Ok(_) => println!("{} {} is not tracked", style("-").dim(), query.name),
        Err(failure) => {
            println!("{} {} ({:?})", style("✗").red(), failure.message, failure.kind);
        }
    }
    Ok(())
}

/// One-off change-control query, optionally stage-scoped.
pub async fn check(
    config: &CliConfig,
    url: String,
    name: String,
    stage: Option<String>,
    branch: Option<String>,
) -> Result<()> {
    let target = JobTarget {
        job_url: url,
        job_name: name,
        stage: stage.map(|stage_name| StageScope {
            stage_name,
            root: None,
        }),
        multi_branch: branch.is_some(),
        branch_name: branch,
    };

    match authority(config)?.is_under_change_control(&target).await {
        Ok(verdict) => println!("{} changeControl: {}", style("▶").cyan(), verdict),
        Err(failure) => {
            println!("{} {} ({:?})", style("✗").red(), failure.message, failure.kind);
        }
    }
    Ok(())
}

/// Print the effective configuration with the password masked.
pub fn show_config(config: &CliConfig) -> Result<()> {
    let mut shown = config.clone();
    if shown.authority.password.is_some() {
        shown.authority.password = Some("********".to_string());
    }
    print!("{}", serde_yaml::to_string(&shown)?);
    Ok(())
}

pub fn show_config_path() -> Result<()> {
    println!("{}", CliConfig::config_path()?.display());
    Ok(())
}
