use crate::cli::ServeArgs;
use crate::infra::{
    AppState, DispatchLabelFinalizer, InMemoryDonorDirectory, InMemoryInventoryStore,
    InMemoryRequestStore, ScreeningRules, SystemClock,
};
use crate::routes::with_bank_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use bloodbank::config::AppConfig;
use bloodbank::error::AppError;
use bloodbank::telemetry;
use bloodbank::workflows::bank::BloodBankService;
use bloodbank::workflows::roster::RosterImporter;
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

    let inventory = Arc::new(InMemoryInventoryStore::default());
    let requests = Arc::new(InMemoryRequestStore::default());
    let directory = Arc::new(InMemoryDonorDirectory::default());
    let importer = Arc::new(RosterImporter::new(directory.clone(), inventory.clone()));

    if let Some(path) = config.bank.roster_csv.as_ref() {
        let report = importer.from_path(path)?;
        info!(
            path = %path.display(),
            inserted = report.inserted,
            skipped = report.skipped,
            "seeded inventory from roster export"
        );
    }

    let bank_service = Arc::new(BloodBankService::new(
        inventory,
        requests,
        directory,
        Arc::new(ScreeningRules),
        Arc::new(SystemClock),
        Arc::new(DispatchLabelFinalizer),
    ));

    let app = with_bank_routes(bank_service, importer)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "blood bank service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
