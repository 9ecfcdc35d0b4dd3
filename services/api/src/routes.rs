use crate::infra::{
    AppState, DispatchLabelFinalizer, InMemoryDonorDirectory, InMemoryInventoryStore,
    InMemoryRequestStore, ScreeningRules, SystemClock,
};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use bloodbank::error::AppError;
use bloodbank::workflows::bank::{bank_router, BloodBankService};
use bloodbank::workflows::roster::RosterImporter;
use serde::Deserialize;
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;

pub(crate) type ApiBankService = BloodBankService<
    InMemoryInventoryStore,
    InMemoryRequestStore,
    InMemoryDonorDirectory,
    ScreeningRules,
    SystemClock,
    DispatchLabelFinalizer,
>;

pub(crate) type ApiRosterImporter =
    RosterImporter<InMemoryDonorDirectory, InMemoryInventoryStore>;

#[derive(Debug, Deserialize)]
pub(crate) struct RosterImportRequest {
    pub(crate) csv: String,
}

pub(crate) fn with_bank_routes(
    service: Arc<ApiBankService>,
    importer: Arc<ApiRosterImporter>,
) -> axum::Router {
    bank_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/bank/roster/import",
            axum::routing::post(roster_import_endpoint),
        )
        .layer(Extension(importer))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn roster_import_endpoint(
    Extension(importer): Extension<Arc<ApiRosterImporter>>,
    Json(payload): Json<RosterImportRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let report = importer.from_reader(Cursor::new(payload.csv.into_bytes()))?;
    Ok(Json(json!({
        "inserted": report.inserted,
        "skipped": report.skipped,
    })))
}
