use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use super::allocation::{AllocationEngine, AllocationError, FulfillmentOutcome};
use super::dispensation::{DispensationProcessor, DispensationReport};
use super::domain::{
    BloodRequest, BloodUnit, RequestId, RequestSubmission, UnitId, ValidationError,
};
use super::donation::{
    DonationError, DonationIntake, DonationSubmission, DonorDirectory, EligibilityClassifier,
};
use super::store::{Clock, InventoryStore, RequestStore, StoreError, UnitFinalizer};

static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static UNIT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> RequestId {
    let id = REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RequestId(format!("req-{id:06}"))
}

pub(crate) fn next_unit_id() -> UnitId {
    let id = UNIT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    UnitId(format!("unit-{id:06}"))
}

/// Error raised by the blood bank service.
#[derive(Debug, thiserror::Error)]
pub enum BankServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Donation(#[from] DonationError),
    #[error("request not found")]
    RequestNotFound,
}

impl From<StoreError> for BankServiceError {
    fn from(value: StoreError) -> Self {
        Self::Allocation(AllocationError::Store(value))
    }
}

/// Sanitized representation of a request's exposed state.
#[derive(Debug, Clone, Serialize)]
pub struct RequestStatusView {
    pub request_id: RequestId,
    pub blood_type: String,
    pub units_requested: u32,
    pub status: &'static str,
}

impl RequestStatusView {
    fn from_request(request: &BloodRequest) -> Self {
        Self {
            request_id: request.id.clone(),
            blood_type: request.blood_type.label().to_string(),
            units_requested: request.units_requested,
            status: request.status.label(),
        }
    }
}

/// View returned by a submission: the stored request plus the fulfillment
/// outcome of the immediate allocation attempt.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionView {
    pub request: RequestStatusView,
    pub fulfillment: FulfillmentOutcome,
}

/// Service composing the allocation engine, dispensation processor, and
/// donation intake over a shared pair of stores.
pub struct BloodBankService<I, R, D, E, C, F> {
    requests: Arc<R>,
    engine: AllocationEngine<I, R, C>,
    processor: DispensationProcessor<I, R, F>,
    intake: DonationIntake<E, D, I, C>,
}

impl<I, R, D, E, C, F> BloodBankService<I, R, D, E, C, F>
where
    I: InventoryStore + 'static,
    R: RequestStore + 'static,
    D: DonorDirectory + 'static,
    E: EligibilityClassifier + 'static,
    C: Clock + 'static,
    F: UnitFinalizer + 'static,
{
    pub fn new(
        inventory: Arc<I>,
        requests: Arc<R>,
        directory: Arc<D>,
        classifier: Arc<E>,
        clock: Arc<C>,
        finalizer: Arc<F>,
    ) -> Self {
        let engine = AllocationEngine::new(inventory.clone(), requests.clone(), clock.clone());
        let processor =
            DispensationProcessor::new(inventory.clone(), requests.clone(), finalizer);
        let intake = DonationIntake::new(classifier, directory, inventory, clock);
        Self {
            requests,
            engine,
            processor,
            intake,
        }
    }

    /// Validate and persist a submission, then immediately attempt to fulfill
    /// it. Insufficient stock leaves the request pending and is reported in
    /// the view, not raised as an error.
    pub fn submit_request(
        &self,
        submission: RequestSubmission,
    ) -> Result<SubmissionView, BankServiceError> {
        let validated = submission.validate()?;
        let request = validated.into_request(next_request_id());
        let stored = self.requests.insert_request(request)?;

        let fulfillment = self.engine.fulfill(&stored)?;
        let request = self
            .requests
            .fetch_request(&stored.id)?
            .ok_or(BankServiceError::RequestNotFound)?;

        Ok(SubmissionView {
            request: RequestStatusView::from_request(&request),
            fulfillment,
        })
    }

    /// Re-attempt fulfillment of a request that previously stayed pending.
    pub fn retry_request(&self, id: &RequestId) -> Result<SubmissionView, BankServiceError> {
        let request = self
            .requests
            .fetch_request(id)?
            .ok_or(BankServiceError::RequestNotFound)?;
        let fulfillment = self.engine.fulfill(&request)?;
        let request = self
            .requests
            .fetch_request(id)?
            .ok_or(BankServiceError::RequestNotFound)?;
        Ok(SubmissionView {
            request: RequestStatusView::from_request(&request),
            fulfillment,
        })
    }

    pub fn request_status(&self, id: &RequestId) -> Result<RequestStatusView, BankServiceError> {
        let request = self
            .requests
            .fetch_request(id)?
            .ok_or(BankServiceError::RequestNotFound)?;
        Ok(RequestStatusView::from_request(&request))
    }

    /// Cancel an approved request, returning the ids of the released units.
    pub fn cancel_request(&self, id: &RequestId) -> Result<Vec<UnitId>, BankServiceError> {
        let request = self
            .requests
            .fetch_request(id)?
            .ok_or(BankServiceError::RequestNotFound)?;
        Ok(self.engine.cancel(&request)?)
    }

    /// Accept a donation and place the resulting unit into inventory.
    pub fn record_donation(
        &self,
        submission: DonationSubmission,
    ) -> Result<BloodUnit, BankServiceError> {
        Ok(self.intake.record(submission, next_unit_id())?)
    }

    /// Run one dispensation pass over the approved backlog.
    pub fn run_dispensation(&self) -> Result<DispensationReport, BankServiceError> {
        Ok(self.processor.process_approved()?)
    }
}
