use crate::cli::ServeArgs;
use crate::infra::{seeded_reference_data, AppState, InMemoryDocumentStore, InMemorySessionRepository};
use crate::routes::with_intake_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use legal_intake::config::AppConfig;
use legal_intake::error::AppError;
use legal_intake::telemetry;
use legal_intake::workflows::requests::{IntakeService, IntakeSettings, ReferenceData, SystemClock};
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
    let reference: Arc<dyn ReferenceData> = Arc::new(seeded_reference_data());
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        reference: reference.clone(),
    };

    let settings = IntakeSettings::from(&config.intake);
    let intake_service = Arc::new(IntakeService::new(
        Arc::new(InMemorySessionRepository::default()),
        Arc::new(InMemoryDocumentStore::default()),
        reference,
        Arc::new(SystemClock),
        settings,
    ));

    let app = with_intake_routes(intake_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        save_delay_ms = settings.save_delay.as_millis() as u64,
        "legal request intake ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
