use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use super::allocation::AllocationError;
use super::domain::{RequestId, RequestSubmission};
use super::donation::{DonationError, DonationSubmission, DonorDirectory, EligibilityClassifier};
use super::service::{BankServiceError, BloodBankService};
use super::store::{Clock, InventoryStore, RequestStore, UnitFinalizer};

/// Router builder exposing HTTP endpoints for requests, donations, and
/// dispensation passes.
pub fn bank_router<I, R, D, E, C, F>(
    service: Arc<BloodBankService<I, R, D, E, C, F>>,
) -> Router
where
    I: InventoryStore + 'static,
    R: RequestStore + 'static,
    D: DonorDirectory + 'static,
    E: EligibilityClassifier + 'static,
    C: Clock + 'static,
    F: UnitFinalizer + 'static,
{
    Router::new()
        .route("/api/v1/bank/requests", post(submit_request_handler::<I, R, D, E, C, F>))
        .route(
            "/api/v1/bank/requests/:request_id",
            get(request_status_handler::<I, R, D, E, C, F>),
        )
        .route(
            "/api/v1/bank/requests/:request_id/cancel",
            post(cancel_request_handler::<I, R, D, E, C, F>),
        )
        .route("/api/v1/bank/donations", post(donation_handler::<I, R, D, E, C, F>))
        .route(
            "/api/v1/bank/dispensation",
            post(dispensation_handler::<I, R, D, E, C, F>),
        )
        .with_state(service)
}

pub(super) fn error_response(error: BankServiceError) -> Response {
    let status = match &error {
        BankServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        BankServiceError::Donation(DonationError::NotEligible)
        | BankServiceError::Donation(DonationError::InvalidVolume)
        | BankServiceError::Donation(DonationError::Validation(_)) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        BankServiceError::RequestNotFound => StatusCode::NOT_FOUND,
        // A request that moved out of its expected status mid-call lost a
        // race, which is the caller's conflict rather than a server fault.
        BankServiceError::Allocation(AllocationError::InvalidRequestState { .. }) => {
            StatusCode::CONFLICT
        }
        BankServiceError::Allocation(_) | BankServiceError::Donation(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}

pub(crate) async fn submit_request_handler<I, R, D, E, C, F>(
    State(service): State<Arc<BloodBankService<I, R, D, E, C, F>>>,
    axum::Json(submission): axum::Json<RequestSubmission>,
) -> Response
where
    I: InventoryStore + 'static,
    R: RequestStore + 'static,
    D: DonorDirectory + 'static,
    E: EligibilityClassifier + 'static,
    C: Clock + 'static,
    F: UnitFinalizer + 'static,
{
    match service.submit_request(submission) {
        Ok(view) => (StatusCode::ACCEPTED, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn request_status_handler<I, R, D, E, C, F>(
    State(service): State<Arc<BloodBankService<I, R, D, E, C, F>>>,
    Path(request_id): Path<String>,
) -> Response
where
    I: InventoryStore + 'static,
    R: RequestStore + 'static,
    D: DonorDirectory + 'static,
    E: EligibilityClassifier + 'static,
    C: Clock + 'static,
    F: UnitFinalizer + 'static,
{
    match service.request_status(&RequestId(request_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn cancel_request_handler<I, R, D, E, C, F>(
    State(service): State<Arc<BloodBankService<I, R, D, E, C, F>>>,
    Path(request_id): Path<String>,
) -> Response
where
    I: InventoryStore + 'static,
    R: RequestStore + 'static,
    D: DonorDirectory + 'static,
    E: EligibilityClassifier + 'static,
    C: Clock + 'static,
    F: UnitFinalizer + 'static,
{
    match service.cancel_request(&RequestId(request_id)) {
        Ok(released) => {
            let payload = json!({ "released_units": released });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(BankServiceError::Allocation(error)) => {
            // Cancelling a pending or completed request is a caller mistake,
            // not a server fault.
            let payload = json!({ "error": error.to_string() });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn donation_handler<I, R, D, E, C, F>(
    State(service): State<Arc<BloodBankService<I, R, D, E, C, F>>>,
    axum::Json(submission): axum::Json<DonationSubmission>,
) -> Response
where
    I: InventoryStore + 'static,
    R: RequestStore + 'static,
    D: DonorDirectory + 'static,
    E: EligibilityClassifier + 'static,
    C: Clock + 'static,
    F: UnitFinalizer + 'static,
{
    match service.record_donation(submission) {
        Ok(unit) => (StatusCode::CREATED, axum::Json(unit)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn dispensation_handler<I, R, D, E, C, F>(
    State(service): State<Arc<BloodBankService<I, R, D, E, C, F>>>,
) -> Response
where
    I: InventoryStore + 'static,
    R: RequestStore + 'static,
    D: DonorDirectory + 'static,
    E: EligibilityClassifier + 'static,
    C: Clock + 'static,
    F: UnitFinalizer + 'static,
{
    match service.run_dispensation() {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}
