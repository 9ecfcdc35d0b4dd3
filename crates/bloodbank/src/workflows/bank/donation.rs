use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{BloodType, BloodUnit, DonorId, UnitId, ValidationError};
use super::store::{Clock, InventoryStore, StoreError};

/// Donation volume bounds enforced at intake, in milliliters.
pub const MIN_DONATION_ML: u32 = 1;
pub const MAX_DONATION_ML: u32 = 500;

/// Health screening answers collected uniformly from every prospective donor.
/// Consumed only by the eligibility classifier; never stored on the unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonorHealthProfile {
    pub age: u8,
    pub hemoglobin_g_dl: f32,
    pub days_since_last_donation: u32,
    pub weight_kg: f32,
    pub pulse_normal: bool,
    pub blood_pressure_normal: bool,
    pub chronic_disorders: bool,
}

/// Personal details registered alongside an accepted donation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonorProfile {
    pub name: String,
    pub blood_type: BloodType,
    pub contact: String,
    pub location: String,
    pub last_donation: Option<NaiveDate>,
}

/// Opaque eligibility predicate. The production classifier is an external
/// collaborator; the intake only needs its verdict.
pub trait EligibilityClassifier: Send + Sync {
    fn is_eligible(&self, profile: &DonorHealthProfile) -> bool;
}

/// Directory of registered donors.
pub trait DonorDirectory: Send + Sync {
    fn register(&self, profile: DonorProfile) -> Result<DonorId, StoreError>;
}

/// Error raised when a donation cannot be accepted.
#[derive(Debug, thiserror::Error)]
pub enum DonationError {
    #[error("donor did not pass the eligibility screen")]
    NotEligible,
    #[error("donation volume must be between {MIN_DONATION_ML} and {MAX_DONATION_ML} ml")]
    InvalidVolume,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Full intake payload: screening answers plus registration details and the
/// collected volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationSubmission {
    pub health: DonorHealthProfile,
    pub donor: DonorProfile,
    pub volume_ml: u32,
}

/// Intake pipeline: eligibility gate, donor registration, unit recording.
/// Mirrors the collection-desk flow; a rejected donor leaves no rows behind.
pub struct DonationIntake<E, D, I, C> {
    classifier: Arc<E>,
    directory: Arc<D>,
    inventory: Arc<I>,
    clock: Arc<C>,
}

impl<E, D, I, C> DonationIntake<E, D, I, C>
where
    E: EligibilityClassifier,
    D: DonorDirectory,
    I: InventoryStore,
    C: Clock,
{
    pub fn new(classifier: Arc<E>, directory: Arc<D>, inventory: Arc<I>, clock: Arc<C>) -> Self {
        Self {
            classifier,
            directory,
            inventory,
            clock,
        }
    }

    /// Accept a donation: screen the donor, register them, and place a fresh
    /// active unit into inventory with the standard shelf life.
    pub fn record(
        &self,
        submission: DonationSubmission,
        unit_id: UnitId,
    ) -> Result<BloodUnit, DonationError> {
        if !(MIN_DONATION_ML..=MAX_DONATION_ML).contains(&submission.volume_ml) {
            return Err(DonationError::InvalidVolume);
        }
        if !self.classifier.is_eligible(&submission.health) {
            return Err(DonationError::NotEligible);
        }

        let blood_type = submission.donor.blood_type;
        let donor_id = self.directory.register(submission.donor)?;
        let unit = BloodUnit::from_donation(
            unit_id,
            donor_id.clone(),
            blood_type,
            submission.volume_ml,
            self.clock.today(),
        );
        let stored = self.inventory.insert_unit(unit)?;

        info!(
            unit = %stored.id.0,
            donor = %donor_id.0,
            blood_type = %stored.blood_type,
            volume_ml = stored.volume_ml,
            "donation recorded"
        );
        Ok(stored)
    }
}
