use crate::cli::ServeArgs;
use crate::infra::{load_repository, AppState, LoggingNotifier};
use crate::routes::with_allocation_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use hostel_alloc::allocation::HostelAllocationService;
use hostel_alloc::config::AppConfig;
use hostel_alloc::error::AppError;
use hostel_alloc::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = load_repository(args.students.take(), args.rooms.take())?;
    let allocation_service = Arc::new(HostelAllocationService::new(
        repository,
        Arc::new(LoggingNotifier),
        config.allocation.clone(),
    ));

    let app = with_allocation_routes(allocation_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        lock_timeout_ms = config.allocation.lock_timeout.as_millis() as u64,
        receipt_prefix = %config.allocation.receipt_prefix,
        "hostel allocation service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
