use chrono::NaiveDate;

use super::domain::{
    BloodRequest, BloodType, BloodUnit, RequestId, RequestStatus, UnitId, UnitStatus,
};

/// Error enumeration for store failures. `Conflict` signals a guarded update
/// that lost a race; callers are expected to re-read and retry.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("row changed underneath a guarded update")]
    Conflict,
    #[error("row not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction over the unit pool. Implementations must honor the
/// guarded-update contract: status mutations succeed only when the row is
/// still in the expected prior status.
pub trait InventoryStore: Send + Sync {
    fn insert_unit(&self, unit: BloodUnit) -> Result<BloodUnit, StoreError>;

    /// All units whose type is in `types`, status is `Active`, and whose
    /// expiry is strictly after `today`.
    fn active_compatible_units(
        &self,
        types: &[BloodType],
        today: NaiveDate,
    ) -> Result<Vec<BloodUnit>, StoreError>;

    /// Units currently reserved for `request_id`, soonest-expiring first.
    fn reserved_units_for(&self, request_id: &RequestId) -> Result<Vec<BloodUnit>, StoreError>;

    /// Atomically move every listed unit from `Active` to `Reserved`, tagging
    /// it with the owning request. All-or-nothing: if any unit is no longer
    /// `Active` the call fails with `Conflict` and no unit changes.
    fn reserve_units(&self, unit_ids: &[UnitId], request_id: &RequestId)
        -> Result<(), StoreError>;

    /// Guarded `Reserved` -> `Delivered` for a single unit.
    fn mark_delivered(&self, unit_id: &UnitId) -> Result<(), StoreError>;

    /// Guarded `Reserved` -> `Active` for each listed unit, clearing the
    /// reservation tag. Cancellation path only.
    fn release_units(&self, unit_ids: &[UnitId]) -> Result<(), StoreError>;
}

/// Storage abstraction over hospital requests.
pub trait RequestStore: Send + Sync {
    fn insert_request(&self, request: BloodRequest) -> Result<BloodRequest, StoreError>;

    fn fetch_request(&self, id: &RequestId) -> Result<Option<BloodRequest>, StoreError>;

    /// Every request currently in `Approved` status, awaiting dispensation.
    fn approved_requests(&self) -> Result<Vec<BloodRequest>, StoreError>;

    /// Guarded status transition; fails with `Conflict` when the stored status
    /// no longer equals `expected`.
    fn update_request_status(
        &self,
        id: &RequestId,
        expected: RequestStatus,
        next: RequestStatus,
    ) -> Result<(), StoreError>;
}

/// Clock seam so allocation decisions are testable against fixed dates.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Error raised by the external dispensation callback.
#[derive(Debug, thiserror::Error)]
pub enum FinalizeError {
    #[error("finalize failed for unit: {0}")]
    Failed(String),
}

/// Per-unit side effect invoked during dispensation (label/QR generation,
/// courier notification). Must be safely re-invokable: a failed unit stays
/// reserved and is retried on the next pass.
pub trait UnitFinalizer: Send + Sync {
    fn finalize(&self, unit: &BloodUnit, request: &BloodRequest) -> Result<(), FinalizeError>;
}
