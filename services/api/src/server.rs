use crate::cli::ServeArgs;
use crate::infra::{build_casework, load_stores, AppState, Casework};
use crate::routes::with_casework_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use wohngeld_casework::config::AppConfig;
use wohngeld_casework::error::AppError;
use wohngeld_casework::telemetry;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (clients, deadlines) = load_stores(config.seed_path.as_deref())?;
    let service = Arc::new(build_casework(&config, clients, deadlines));

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        output_dir: Arc::new(config.drafting.output_dir.clone()),
    };

    let app = with_casework_routes(Arc::clone(&service))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let sweeper = tokio::spawn(sweep_loop(
        Arc::clone(&service),
        Duration::from_secs(config.lifecycle.sweep_interval_secs),
        shutdown_flag.clone(),
    ));
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        sweep_interval_secs = config.lifecycle.sweep_interval_secs,
        "wohngeld casework service ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(readiness_flag, shutdown_flag.clone()))
        .await?;

    shutdown_flag.store(true, Ordering::Release);
    sweeper.abort();
    if let Err(err) = sweeper.await {
        if !err.is_cancelled() {
            warn!(error = %err, "deadline sweeper ended abnormally");
        }
    }

    info!("wohngeld casework service stopped");
    Ok(())
}

/// Periodically re-evaluate all pending deadlines. The first tick fires immediately so
/// statuses are current right after start.
async fn sweep_loop(service: Arc<Casework>, every: Duration, cancel: Arc<AtomicBool>) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        if cancel.load(Ordering::Acquire) {
            break;
        }

        let worker = Arc::clone(&service);
        let flag = Arc::clone(&cancel);
        let outcome = tokio::task::spawn_blocking(move || {
            let now = worker.now();
            worker.lifecycle().sweep(now, &flag)
        })
        .await;

        match outcome {
            Ok(Ok(report)) if report.interrupted => break,
            Ok(Ok(_)) => {}
            Ok(Err(err)) => warn!(error = %err, "deadline sweep failed"),
            Err(err) => warn!(error = %err, "deadline sweep worker panicked"),
        }
    }
}

async fn shutdown_signal(readiness: Arc<AtomicBool>, cancel: Arc<AtomicBool>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }

    info!("shutdown requested, draining connections");
    readiness.store(false, Ordering::Release);
    cancel.store(true, Ordering::Release);
}
