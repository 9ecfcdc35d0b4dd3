use bloodbank::workflows::bank::{
    BloodRequest, BloodType, BloodUnit, Clock, DonorDirectory, DonorHealthProfile, DonorId,
    DonorProfile, EligibilityClassifier, FinalizeError, InventoryStore, RequestId, RequestStatus,
    RequestStore, StoreError, UnitFinalizer, UnitId, UnitStatus,
};
use chrono::{Local, NaiveDate};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Wall-clock date source used outside tests.
pub(crate) struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Unit pool backed by a process-local map. Guarded updates run under one
/// lock, which gives the reserve call its all-or-nothing semantics.
#[derive(Default)]
pub(crate) struct InMemoryInventoryStore {
    units: Mutex<BTreeMap<UnitId, BloodUnit>>,
}

impl InventoryStore for InMemoryInventoryStore {
    fn insert_unit(&self, unit: BloodUnit) -> Result<BloodUnit, StoreError> {
        let mut units = self
            .units
            .lock()
            .map_err(|_| StoreError::Unavailable("inventory lock poisoned".to_string()))?;
        if units.contains_key(&unit.id) {
            return Err(StoreError::Conflict);
        }
        units.insert(unit.id.clone(), unit.clone());
        Ok(unit)
    }

    fn active_compatible_units(
        &self,
        types: &[BloodType],
        today: NaiveDate,
    ) -> Result<Vec<BloodUnit>, StoreError> {
        let units = self
            .units
            .lock()
            .map_err(|_| StoreError::Unavailable("inventory lock poisoned".to_string()))?;
        Ok(units
            .values()
            .filter(|unit| types.contains(&unit.blood_type) && unit.is_dispensable(today))
            .cloned()
            .collect())
    }

    fn reserved_units_for(&self, request_id: &RequestId) -> Result<Vec<BloodUnit>, StoreError> {
        let units = self
            .units
            .lock()
            .map_err(|_| StoreError::Unavailable("inventory lock poisoned".to_string()))?;
        let mut reserved: Vec<BloodUnit> = units
            .values()
            .filter(|unit| {
                unit.status == UnitStatus::Reserved
                    && unit.reserved_for.as_ref() == Some(request_id)
            })
            .cloned()
            .collect();
        reserved.sort_by(|a, b| a.expires_on.cmp(&b.expires_on).then(a.id.cmp(&b.id)));
        Ok(reserved)
    }

    fn reserve_units(
        &self,
        unit_ids: &[UnitId],
        request_id: &RequestId,
    ) -> Result<(), StoreError> {
        let mut units = self
            .units
            .lock()
            .map_err(|_| StoreError::Unavailable("inventory lock poisoned".to_string()))?;
        for id in unit_ids {
            match units.get(id) {
                Some(unit) if unit.status == UnitStatus::Active => {}
                Some(_) => return Err(StoreError::Conflict),
                None => return Err(StoreError::NotFound),
            }
        }
        for id in unit_ids {
            if let Some(unit) = units.get_mut(id) {
                unit.status = UnitStatus::Reserved;
                unit.reserved_for = Some(request_id.clone());
            }
        }
        Ok(())
    }

    fn mark_delivered(&self, unit_id: &UnitId) -> Result<(), StoreError> {
        let mut units = self
            .units
            .lock()
            .map_err(|_| StoreError::Unavailable("inventory lock poisoned".to_string()))?;
        match units.get_mut(unit_id) {
            Some(unit) if unit.status == UnitStatus::Reserved => {
                unit.status = UnitStatus::Delivered;
                Ok(())
            }
            Some(_) => Err(StoreError::Conflict),
            None => Err(StoreError::NotFound),
        }
    }

    fn release_units(&self, unit_ids: &[UnitId]) -> Result<(), StoreError> {
        let mut units = self
            .units
            .lock()
            .map_err(|_| StoreError::Unavailable("inventory lock poisoned".to_string()))?;
        for id in unit_ids {
            match units.get_mut(id) {
                Some(unit) if unit.status == UnitStatus::Reserved => {
                    unit.status = UnitStatus::Active;
                    unit.reserved_for = None;
                }
                Some(_) => return Err(StoreError::Conflict),
                None => return Err(StoreError::NotFound),
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryRequestStore {
    requests: Mutex<BTreeMap<String, BloodRequest>>,
}

impl RequestStore for InMemoryRequestStore {
    fn insert_request(&self, request: BloodRequest) -> Result<BloodRequest, StoreError> {
        let mut requests = self
            .requests
            .lock()
            .map_err(|_| StoreError::Unavailable("request lock poisoned".to_string()))?;
        if requests.contains_key(&request.id.0) {
            return Err(StoreError::Conflict);
        }
        requests.insert(request.id.0.clone(), request.clone());
        Ok(request)
    }

    fn fetch_request(&self, id: &RequestId) -> Result<Option<BloodRequest>, StoreError> {
        let requests = self
            .requests
            .lock()
            .map_err(|_| StoreError::Unavailable("request lock poisoned".to_string()))?;
        Ok(requests.get(&id.0).cloned())
    }

    fn approved_requests(&self) -> Result<Vec<BloodRequest>, StoreError> {
        let requests = self
            .requests
            .lock()
            .map_err(|_| StoreError::Unavailable("request lock poisoned".to_string()))?;
        Ok(requests
            .values()
            .filter(|request| request.status == RequestStatus::Approved)
            .cloned()
            .collect())
    }

    fn update_request_status(
        &self,
        id: &RequestId,
        expected: RequestStatus,
        next: RequestStatus,
    ) -> Result<(), StoreError> {
        let mut requests = self
            .requests
            .lock()
            .map_err(|_| StoreError::Unavailable("request lock poisoned".to_string()))?;
        match requests.get_mut(&id.0) {
            Some(request) if request.status == expected => {
                request.status = next;
                Ok(())
            }
            Some(_) => Err(StoreError::Conflict),
            None => Err(StoreError::NotFound),
        }
    }
}

#[derive(Default)]
pub(crate) struct InMemoryDonorDirectory {
    sequence: AtomicU64,
    donors: Mutex<Vec<(DonorId, DonorProfile)>>,
}

impl DonorDirectory for InMemoryDonorDirectory {
    fn register(&self, profile: DonorProfile) -> Result<DonorId, StoreError> {
        let id = DonorId(format!(
            "donor-{:06}",
            self.sequence.fetch_add(1, Ordering::Relaxed) + 1
        ));
        self.donors
            .lock()
            .map_err(|_| StoreError::Unavailable("donor lock poisoned".to_string()))?
            .push((id.clone(), profile));
        Ok(id)
    }
}

/// Deterministic screening rules standing in for the external eligibility
/// classifier. Thresholds follow the collection desk's health form.
pub(crate) struct ScreeningRules;

impl EligibilityClassifier for ScreeningRules {
    fn is_eligible(&self, profile: &DonorHealthProfile) -> bool {
        (18..=60).contains(&profile.age)
            && profile.hemoglobin_g_dl >= 12.5
            && profile.weight_kg >= 50.0
            && profile.days_since_last_donation >= 90
            && profile.pulse_normal
            && profile.blood_pressure_normal
            && !profile.chronic_disorders
    }
}

/// Dispensation callback that emits the dispatch label content the label
/// printer integration consumes. Logging is idempotent, so retries after a
/// partial pass are safe.
pub(crate) struct DispatchLabelFinalizer;

impl UnitFinalizer for DispatchLabelFinalizer {
    fn finalize(&self, unit: &BloodUnit, request: &BloodRequest) -> Result<(), FinalizeError> {
        info!(
            unit = %unit.id.0,
            blood_type = %unit.blood_type,
            expires_on = %unit.expires_on,
            hospital = %request.hospital,
            location = %request.location,
            "dispatch label issued"
        );
        Ok(())
    }
}
