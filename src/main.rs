use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use cloudrift_api::app_state::AppState;
use cloudrift_api::config::AppConfig;
use cloudrift_api::routes;
use cloudrift_api::services::registry::spawn_sweeper;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing cloudrift-api server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!(
        "terraform_jobs_started_total",
        "Terraform plan jobs accepted"
    );
    metrics::describe_counter!(
        "terraform_jobs_completed_total",
        "Terraform plan jobs that produced a plan"
    );
    metrics::describe_counter!(
        "terraform_jobs_failed_total",
        "Terraform plan jobs that ended in error"
    );
    metrics::describe_counter!(
        "terraform_trigger_conflicts_total",
        "Plan triggers rejected because another run was active"
    );
    metrics::describe_counter!(
        "terraform_jobs_swept_total",
        "Finished jobs evicted from memory"
    );
    metrics::describe_histogram!(
        "terraform_stage_seconds",
        "Duration of each terraform stage"
    );
    metrics::describe_gauge!("terraform_jobs_tracked", "Jobs currently held in memory");
    metrics::describe_counter!("scan_requests_total", "Scan requests by service");

    let bind_addr = config.bind_addr();
    let sweep_interval = config.sweep_interval();
    let retention = config.retention();

    let state = AppState::new(config).expect("Failed to resolve working directory");
    tracing::info!(
        work_dir = %state.sandbox.root().display(),
        terraform = %state.config.terraform_path,
        cli = %state.config.cloudrift_cli_path,
        "Working directory resolved"
    );

    // Evict finished jobs for the life of the process
    spawn_sweeper(Arc::clone(state.registry()), sweep_interval, retention);

    let app = routes::api_router(state).route(
        "/metrics",
        get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
    );

    tracing::info!("Starting cloudrift-api on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
