//! Blood bank core: unit inventory, hospital requests, and the allocation
//! engine that ties them together under compatibility and expiry rules.

pub mod allocation;
pub mod compatibility;
pub mod dispensation;
pub mod domain;
pub mod donation;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use allocation::{AllocationEngine, AllocationError, FulfillmentOutcome};
pub use compatibility::compatible_donors;
pub use dispensation::{DispensationProcessor, DispensationReport};
pub use domain::{
    BloodRequest, BloodType, BloodUnit, DonorId, RequestId, RequestStatus, RequestSubmission,
    UnitId, UnitStatus, ValidatedRequest, ValidationError, SHELF_LIFE_DAYS,
};
pub use donation::{
    DonationError, DonationIntake, DonationSubmission, DonorDirectory, DonorHealthProfile,
    DonorProfile, EligibilityClassifier, MAX_DONATION_ML, MIN_DONATION_ML,
};
pub use router::bank_router;
pub use service::{BankServiceError, BloodBankService, RequestStatusView, SubmissionView};
pub use store::{
    Clock, FinalizeError, InventoryStore, RequestStore, StoreError, UnitFinalizer,
};
