use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::compatibility::{compatible_donors, preference_rank};
use super::domain::{BloodRequest, BloodUnit, RequestStatus, UnitId};
use super::store::{Clock, InventoryStore, RequestStore, StoreError};

/// Bounded retries for a fulfillment attempt that loses a guarded-update race.
/// Exhaustion is reported as insufficient stock: the stock picture was stale
/// and the refreshed reads kept coming up short.
const MAX_FULFILL_ATTEMPTS: usize = 3;

/// Outcome of a fulfillment attempt. Insufficient stock is an expected,
/// recoverable condition, not an error: the request stays pending and the
/// caller may retry later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FulfillmentOutcome {
    Approved { reserved_units: Vec<UnitId> },
    InsufficientStock { available: usize, requested: u32 },
}

impl FulfillmentOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved { .. })
    }
}

/// Failure that aborts the current call. No partial mutation is left behind:
/// reservations taken during a failed attempt are rolled back before the
/// error surfaces.
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error("request is {actual} but the operation requires it to be {expected}")]
    InvalidRequestState {
        expected: &'static str,
        actual: &'static str,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Selects inventory units for a request under compatibility, expiry, and
/// ordering rules, and transitions request and units together. Holds no state
/// of its own; all rows live in the injected stores.
pub struct AllocationEngine<I, R, C> {
    inventory: Arc<I>,
    requests: Arc<R>,
    clock: Arc<C>,
}

impl<I, R, C> AllocationEngine<I, R, C>
where
    I: InventoryStore,
    R: RequestStore,
    C: Clock,
{
    pub fn new(inventory: Arc<I>, requests: Arc<R>, clock: Arc<C>) -> Self {
        Self {
            inventory,
            requests,
            clock,
        }
    }

    /// Attempt to fulfill a pending request. All-or-nothing: either every
    /// requested unit is reserved and the request flips to approved, or
    /// nothing changes.
    pub fn fulfill(
        &self,
        request: &BloodRequest,
    ) -> Result<FulfillmentOutcome, AllocationError> {
        if request.status != RequestStatus::Pending {
            return Err(AllocationError::InvalidRequestState {
                expected: RequestStatus::Pending.label(),
                actual: request.status.label(),
            });
        }

        let today = self.clock.today();
        let candidates = compatible_donors(request.blood_type);

        let mut last_available = 0;
        for attempt in 1..=MAX_FULFILL_ATTEMPTS {
            let mut pool = self.inventory.active_compatible_units(candidates, today)?;
            if (pool.len() as u64) < u64::from(request.units_requested) {
                return Ok(FulfillmentOutcome::InsufficientStock {
                    available: pool.len(),
                    requested: request.units_requested,
                });
            }
            last_available = pool.len();

            sort_by_allocation_policy(request, &mut pool);
            let selected: Vec<UnitId> = pool
                .iter()
                .take(request.units_requested as usize)
                .map(|unit| unit.id.clone())
                .collect();

            match self.inventory.reserve_units(&selected, &request.id) {
                Ok(()) => {}
                Err(StoreError::Conflict) => {
                    warn!(
                        request = %request.id.0,
                        attempt,
                        "unit reservation lost a race, refreshing candidates"
                    );
                    continue;
                }
                Err(err) => return Err(err.into()),
            }

            match self.requests.update_request_status(
                &request.id,
                RequestStatus::Pending,
                RequestStatus::Approved,
            ) {
                Ok(()) => {
                    info!(
                        request = %request.id.0,
                        blood_type = %request.blood_type,
                        units = selected.len(),
                        "request approved"
                    );
                    return Ok(FulfillmentOutcome::Approved {
                        reserved_units: selected,
                    });
                }
                Err(err) => {
                    // Another caller moved the request; give the units back
                    // before surfacing anything.
                    self.inventory.release_units(&selected)?;
                    match err {
                        StoreError::Conflict => {
                            warn!(
                                request = %request.id.0,
                                "request status changed mid-fulfillment, abandoning attempt"
                            );
                            return Err(AllocationError::InvalidRequestState {
                                expected: RequestStatus::Pending.label(),
                                actual: "changed concurrently",
                            });
                        }
                        other => return Err(other.into()),
                    }
                }
            }
        }

        warn!(
            request = %request.id.0,
            attempts = MAX_FULFILL_ATTEMPTS,
            "fulfillment retries exhausted, treating stock picture as stale"
        );
        Ok(FulfillmentOutcome::InsufficientStock {
            available: last_available,
            requested: request.units_requested,
        })
    }

    /// Cancellation extension: return an approved request to pending and its
    /// reserved units to active stock. Delivered units are untouched; a
    /// request that already started dispensation cannot be cancelled.
    pub fn cancel(&self, request: &BloodRequest) -> Result<Vec<UnitId>, AllocationError> {
        if request.status != RequestStatus::Approved {
            return Err(AllocationError::InvalidRequestState {
                expected: RequestStatus::Approved.label(),
                actual: request.status.label(),
            });
        }

        let reserved = self.inventory.reserved_units_for(&request.id)?;
        // Fulfillment is all-or-nothing, so an approved request holds exactly
        // its quantity in reserve. Fewer means a dispensation pass already
        // delivered some of them, and the delivered units cannot come back.
        if reserved.len() < request.units_requested as usize {
            return Err(AllocationError::InvalidRequestState {
                expected: RequestStatus::Approved.label(),
                actual: "partially dispensed",
            });
        }
        let reserved_ids: Vec<UnitId> = reserved.iter().map(|unit| unit.id.clone()).collect();

        self.requests.update_request_status(
            &request.id,
            RequestStatus::Approved,
            RequestStatus::Pending,
        )?;
        self.inventory.release_units(&reserved_ids)?;

        info!(
            request = %request.id.0,
            released = reserved_ids.len(),
            "reservation cancelled, units returned to stock"
        );
        Ok(reserved_ids)
    }
}

/// Two-key allocation ordering: exact-type stock ahead of cross-compatible
/// stock, then first-expire-first-out within each rank. Unit id breaks the
/// final tie so the ordering is deterministic.
fn sort_by_allocation_policy(request: &BloodRequest, pool: &mut [BloodUnit]) {
    pool.sort_by(|a, b| {
        preference_rank(request.blood_type, a.blood_type)
            .cmp(&preference_rank(request.blood_type, b.blood_type))
            .then(a.expires_on.cmp(&b.expires_on))
            .then(a.id.cmp(&b.id))
    });
}
