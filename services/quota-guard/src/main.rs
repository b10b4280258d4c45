//! CLIProxyAPI Quota Guard
//!
//! Single-binary service that:
//! 1. Polls the CLIProxyAPI management API for auth file health
//! 2. Takes credentials with exhausted quota offline (delete + backup, or toggle)
//! 3. Brings them back once quota recovers, never touching operator-disabled ones
//! 4. Reports every transition to a webhook and exposes /health and /metrics

mod config;
mod management_impl;
mod metrics;
mod notifier;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use auth_guard::{
    BackupStore, CycleReport, DisabledLedger, FileBackupStore, Lifecycle, Settings, Strategy,
    StrategyKind, spawn_poll_task,
};
use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::management_impl::ManagementBackend;
use crate::notifier::WebhookNotifier;

/// Shared state for the status listener
#[derive(Clone)]
struct AppState {
    reports: watch::Receiver<Option<CycleReport>>,
    started_at: Instant,
    strategy: &'static str,
    detection: &'static str,
    dry_run: bool,
    prometheus: PrometheusHandle,
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting cpa-quota-guard");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle =
        metrics::install_recorder().context("failed to install Prometheus recorder")?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let strategy_kind = StrategyKind::from(config.guard.strategy);
    let detection = config.detection();
    info!(
        base_url = %config.management.base_url,
        poll_interval_secs = config.guard.poll_interval_secs,
        strategy = strategy_kind.label(),
        detection = detection.label(),
        threshold = config.guard.quota_threshold,
        provider_filter = ?config.guard.provider_filter,
        dry_run = config.guard.dry_run,
        webhook = config.notify.webhook_url.is_some(),
        "configuration loaded"
    );
    if config.guard.dry_run {
        warn!("dry run enabled, no credential will be modified");
    }

    let key = config
        .management
        .key
        .clone()
        .context("management key missing after configuration load")?;
    let client = cpa_management::Client::new(
        &config.management.base_url,
        key,
        Duration::from_secs(config.management.timeout_secs),
    )
    .context("failed to build management client")?;

    let backend = Arc::new(ManagementBackend::new(client));
    backend.check_reachable().await;

    let notifier = WebhookNotifier::new(
        config.notify.webhook_url.clone(),
        Duration::from_secs(config.notify.timeout_secs),
    )
    .context("failed to build webhook client")?;
    if !notifier.is_configured() {
        info!("no webhook configured, notifications are only logged");
    }

    // Delete strategy recovers ownership from surviving backups
    let (strategy, ledger) = match strategy_kind {
        StrategyKind::Delete => {
            let backups = FileBackupStore::open(&config.backup.dir).with_context(|| {
                format!(
                    "failed to open backup directory {}",
                    config.backup.dir.display()
                )
            })?;
            let owned = backups
                .names()
                .context("failed to list existing backups")?;
            if !owned.is_empty() {
                info!(count = owned.len(), accounts = ?owned, "resuming ownership from backups");
            }
            (
                Strategy::Delete {
                    backups: Arc::new(backups),
                },
                DisabledLedger::seeded(owned),
            )
        }
        StrategyKind::Toggle => (Strategy::Toggle, DisabledLedger::new()),
    };

    let lifecycle = Arc::new(Lifecycle::new(
        backend,
        Arc::new(notifier),
        strategy,
        Settings {
            detection,
            filter: config.filter(),
            dry_run: config.guard.dry_run,
        },
    ));

    let (stop_tx, stop_rx) = watch::channel(false);
    let (poll_handle, reports) = spawn_poll_task(
        lifecycle,
        ledger,
        Duration::from_secs(config.guard.poll_interval_secs),
        stop_rx,
    );

    let (server_stop_tx, server_stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server_handle = match config.status.listen_addr {
        Some(addr) => {
            let app = build_router(AppState {
                reports,
                started_at: Instant::now(),
                strategy: strategy_kind.label(),
                detection: detection.label(),
                dry_run: config.guard.dry_run,
                prometheus: prometheus_handle,
            });
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind status listener to {addr}"))?;
            info!(addr = %addr, "status listener ready");
            Some(tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = server_stop_rx.await;
                    })
                    .await
            }))
        }
        None => None,
    };

    shutdown_signal().await;

    // The poll task finishes its in-flight cycle before observing the stop
    let _ = stop_tx.send(true);
    match poll_handle.await {
        Ok(ledger) => {
            if !ledger.is_empty() {
                info!(
                    count = ledger.len(),
                    accounts = ?ledger.names().collect::<Vec<_>>(),
                    "credentials still disabled by this guard"
                );
            }
        }
        Err(e) => error!(error = %e, "poll task panicked"),
    }

    let _ = server_stop_tx.send(());
    if let Some(handle) = server_handle {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "status listener error during shutdown"),
            Err(e) => error!(error = %e, "status listener task panicked"),
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Health endpoint: JSON with status, uptime, mode and the last cycle report.
/// Returns 503 before the first cycle completes or when the last snapshot
/// fetch failed.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let last_cycle = state.reports.borrow().clone();
    let (status_code, status) = match &last_cycle {
        None => (axum::http::StatusCode::SERVICE_UNAVAILABLE, "starting"),
        Some(report) if report.fetch_failed => {
            (axum::http::StatusCode::SERVICE_UNAVAILABLE, "degraded")
        }
        Some(_) => (axum::http::StatusCode::OK, "healthy"),
    };

    let body = serde_json::json!({
        "status": status,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "strategy": state.strategy,
        "detection": state.detection,
        "dry_run": state.dry_run,
        "last_cycle": last_cycle,
    });

    (
        status_code,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
