use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::allocation::AllocationError;
use super::domain::{RequestId, RequestStatus};
use super::store::{InventoryStore, RequestStore, StoreError, UnitFinalizer};

/// Result of one dispensation pass over the approved backlog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct DispensationReport {
    /// Requests whose units were all delivered this pass.
    pub completed: Vec<RequestId>,
    /// Units that stayed reserved because their finalize callback failed;
    /// they are retried on the next pass.
    pub still_reserved_units: usize,
    /// Approved requests with no reserved units on file, left untouched.
    pub skipped_requests: usize,
}

/// Walks approved requests and finalizes their reserved units to delivered.
/// Each unit's finalize-then-transition is an independent step; one failure
/// never aborts the pass. Re-running with no new approvals is a no-op.
pub struct DispensationProcessor<I, R, F> {
    inventory: Arc<I>,
    requests: Arc<R>,
    finalizer: Arc<F>,
}

impl<I, R, F> DispensationProcessor<I, R, F>
where
    I: InventoryStore,
    R: RequestStore,
    F: UnitFinalizer,
{
    pub fn new(inventory: Arc<I>, requests: Arc<R>, finalizer: Arc<F>) -> Self {
        Self {
            inventory,
            requests,
            finalizer,
        }
    }

    pub fn process_approved(&self) -> Result<DispensationReport, AllocationError> {
        let mut report = DispensationReport::default();

        for request in self.requests.approved_requests()? {
            let reserved = self.inventory.reserved_units_for(&request.id)?;
            if reserved.is_empty() {
                // Should not happen given fulfillment atomicity; leave the
                // request approved for a later pass rather than failing.
                warn!(
                    request = %request.id.0,
                    "approved request has no reserved units on file, skipping"
                );
                report.skipped_requests += 1;
                continue;
            }

            let mut remaining = 0usize;
            for unit in reserved
                .iter()
                .take(request.units_requested as usize)
            {
                match self.finalizer.finalize(unit, &request) {
                    Ok(()) => match self.inventory.mark_delivered(&unit.id) {
                        Ok(()) => {}
                        Err(StoreError::Conflict) => {
                            // Already delivered by an earlier pass or a
                            // concurrent processor; nothing left to do.
                            warn!(unit = %unit.id.0, "unit no longer reserved, skipping delivery");
                        }
                        Err(err) => return Err(err.into()),
                    },
                    Err(err) => {
                        warn!(
                            unit = %unit.id.0,
                            request = %request.id.0,
                            error = %err,
                            "finalize failed, unit stays reserved for retry"
                        );
                        remaining += 1;
                    }
                }
            }

            if remaining == 0 {
                match self.requests.update_request_status(
                    &request.id,
                    RequestStatus::Approved,
                    RequestStatus::Completed,
                ) {
                    Ok(()) => {
                        info!(request = %request.id.0, "request completed");
                        report.completed.push(request.id.clone());
                    }
                    Err(StoreError::Conflict) => {
                        warn!(request = %request.id.0, "request moved concurrently, not completing");
                    }
                    Err(err) => return Err(err.into()),
                }
            } else {
                report.still_reserved_units += remaining;
            }
        }

        Ok(report)
    }
}
