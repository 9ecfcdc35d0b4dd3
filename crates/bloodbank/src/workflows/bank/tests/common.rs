use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Duration, NaiveDate};

use crate::workflows::bank::domain::{
    BloodRequest, BloodType, BloodUnit, DonorId, RequestId, RequestStatus, RequestSubmission,
    UnitId, UnitStatus,
};
use crate::workflows::bank::donation::{
    DonationSubmission, DonorDirectory, DonorHealthProfile, DonorProfile, EligibilityClassifier,
};
use crate::workflows::bank::service::BloodBankService;
use crate::workflows::bank::store::{
    Clock, FinalizeError, InventoryStore, RequestStore, StoreError, UnitFinalizer,
};

/// Fixed reference date so expiry arithmetic in tests is deterministic.
pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 8, 20).expect("valid reference date")
}

pub(super) struct FixedClock(pub(super) NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// In-memory inventory honoring the guarded-update contract. A conflict fuse
/// can be armed to make the next N reservation attempts lose their race.
#[derive(Default)]
pub(super) struct MemoryInventory {
    pub(super) units: Mutex<BTreeMap<UnitId, BloodUnit>>,
    conflict_fuse: AtomicUsize,
}

impl MemoryInventory {
    pub(super) fn arm_conflicts(&self, count: usize) {
        self.conflict_fuse.store(count, Ordering::SeqCst);
    }

    pub(super) fn unit(&self, id: &UnitId) -> BloodUnit {
        self.units
            .lock()
            .expect("inventory mutex poisoned")
            .get(id)
            .cloned()
            .expect("unit present")
    }

    pub(super) fn status_counts(&self) -> (usize, usize, usize) {
        let units = self.units.lock().expect("inventory mutex poisoned");
        let mut counts = (0, 0, 0);
        for unit in units.values() {
            match unit.status {
                UnitStatus::Active => counts.0 += 1,
                UnitStatus::Reserved => counts.1 += 1,
                UnitStatus::Delivered => counts.2 += 1,
            }
        }
        counts
    }
}

impl InventoryStore for MemoryInventory {
    fn insert_unit(&self, unit: BloodUnit) -> Result<BloodUnit, StoreError> {
        let mut units = self.units.lock().expect("inventory mutex poisoned");
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
        let units = self.units.lock().expect("inventory mutex poisoned");
        Ok(units
            .values()
            .filter(|unit| types.contains(&unit.blood_type) && unit.is_dispensable(today))
            .cloned()
            .collect())
    }

    fn reserved_units_for(&self, request_id: &RequestId) -> Result<Vec<BloodUnit>, StoreError> {
        let units = self.units.lock().expect("inventory mutex poisoned");
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
        if self
            .conflict_fuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |fuse| {
                fuse.checked_sub(1)
            })
            .is_ok()
        {
            return Err(StoreError::Conflict);
        }

        let mut units = self.units.lock().expect("inventory mutex poisoned");
        for id in unit_ids {
            match units.get(id) {
                Some(unit) if unit.status == UnitStatus::Active => {}
                Some(_) => return Err(StoreError::Conflict),
                None => return Err(StoreError::NotFound),
            }
        }
        for id in unit_ids {
            let unit = units.get_mut(id).expect("checked above");
            unit.status = UnitStatus::Reserved;
            unit.reserved_for = Some(request_id.clone());
        }
        Ok(())
    }

    fn mark_delivered(&self, unit_id: &UnitId) -> Result<(), StoreError> {
        let mut units = self.units.lock().expect("inventory mutex poisoned");
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
        let mut units = self.units.lock().expect("inventory mutex poisoned");
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
pub(super) struct MemoryRequests {
    pub(super) requests: Mutex<BTreeMap<String, BloodRequest>>,
}

impl MemoryRequests {
    pub(super) fn request(&self, id: &RequestId) -> BloodRequest {
        self.requests
            .lock()
            .expect("request mutex poisoned")
            .get(&id.0)
            .cloned()
            .expect("request present")
    }
}

impl RequestStore for MemoryRequests {
    fn insert_request(&self, request: BloodRequest) -> Result<BloodRequest, StoreError> {
        let mut requests = self.requests.lock().expect("request mutex poisoned");
        if requests.contains_key(&request.id.0) {
            return Err(StoreError::Conflict);
        }
        requests.insert(request.id.0.clone(), request.clone());
        Ok(request)
    }

    fn fetch_request(&self, id: &RequestId) -> Result<Option<BloodRequest>, StoreError> {
        let requests = self.requests.lock().expect("request mutex poisoned");
        Ok(requests.get(&id.0).cloned())
    }

    fn approved_requests(&self) -> Result<Vec<BloodRequest>, StoreError> {
        let requests = self.requests.lock().expect("request mutex poisoned");
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
        let mut requests = self.requests.lock().expect("request mutex poisoned");
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
pub(super) struct MemoryDirectory {
    sequence: AtomicU64,
    pub(super) profiles: Mutex<Vec<DonorProfile>>,
}

impl DonorDirectory for MemoryDirectory {
    fn register(&self, profile: DonorProfile) -> Result<DonorId, StoreError> {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.profiles
            .lock()
            .expect("directory mutex poisoned")
            .push(profile);
        Ok(DonorId(format!("donor-{id:06}")))
    }
}

/// Classifier double that mirrors the production screen closely enough for
/// intake tests: accepts healthy adults, rejects flagged profiles.
pub(super) struct ThresholdClassifier;

impl EligibilityClassifier for ThresholdClassifier {
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

/// Finalizer double recording every finalized unit; specific units can be
/// made to fail to exercise the retry path.
#[derive(Default)]
pub(super) struct RecordingFinalizer {
    pub(super) finalized: Mutex<Vec<UnitId>>,
    failing: Mutex<HashSet<UnitId>>,
}

impl RecordingFinalizer {
    pub(super) fn fail_unit(&self, id: UnitId) {
        self.failing.lock().expect("finalizer mutex poisoned").insert(id);
    }

    pub(super) fn heal_unit(&self, id: &UnitId) {
        self.failing.lock().expect("finalizer mutex poisoned").remove(id);
    }

    pub(super) fn finalized(&self) -> Vec<UnitId> {
        self.finalized.lock().expect("finalizer mutex poisoned").clone()
    }
}

impl UnitFinalizer for RecordingFinalizer {
    fn finalize(&self, unit: &BloodUnit, _request: &BloodRequest) -> Result<(), FinalizeError> {
        if self
            .failing
            .lock()
            .expect("finalizer mutex poisoned")
            .contains(&unit.id)
        {
            return Err(FinalizeError::Failed("label printer offline".to_string()));
        }
        self.finalized
            .lock()
            .expect("finalizer mutex poisoned")
            .push(unit.id.clone());
        Ok(())
    }
}

pub(super) type TestService = BloodBankService<
    MemoryInventory,
    MemoryRequests,
    MemoryDirectory,
    ThresholdClassifier,
    FixedClock,
    RecordingFinalizer,
>;

pub(super) struct TestHarness {
    pub(super) service: TestService,
    pub(super) inventory: Arc<MemoryInventory>,
    pub(super) requests: Arc<MemoryRequests>,
    pub(super) directory: Arc<MemoryDirectory>,
    pub(super) finalizer: Arc<RecordingFinalizer>,
}

pub(super) fn build_harness() -> TestHarness {
    let inventory = Arc::new(MemoryInventory::default());
    let requests = Arc::new(MemoryRequests::default());
    let directory = Arc::new(MemoryDirectory::default());
    let finalizer = Arc::new(RecordingFinalizer::default());
    let service = BloodBankService::new(
        inventory.clone(),
        requests.clone(),
        directory.clone(),
        Arc::new(ThresholdClassifier),
        Arc::new(FixedClock(today())),
        finalizer.clone(),
    );
    TestHarness {
        service,
        inventory,
        requests,
        directory,
        finalizer,
    }
}

static SEEDED_UNITS: AtomicU64 = AtomicU64::new(1);

/// Insert an active unit expiring `expires_in_days` after the reference date.
pub(super) fn seed_unit(
    inventory: &MemoryInventory,
    blood_type: BloodType,
    expires_in_days: i64,
) -> UnitId {
    let serial = SEEDED_UNITS.fetch_add(1, Ordering::Relaxed);
    let id = UnitId(format!("seed-{serial:06}"));
    let donated_on = today() - Duration::days(30 - expires_in_days);
    let unit = BloodUnit {
        id: id.clone(),
        blood_type,
        volume_ml: 450,
        donor_id: DonorId(format!("donor-seed-{serial:06}")),
        donated_on,
        expires_on: today() + Duration::days(expires_in_days),
        status: UnitStatus::Active,
        reserved_for: None,
    };
    inventory
        .insert_unit(unit)
        .expect("seed unit inserts cleanly");
    id
}

pub(super) fn submission(blood_type: &str, units: u32) -> RequestSubmission {
    RequestSubmission {
        blood_type: blood_type.to_string(),
        units_requested: units,
        location: "Pune".to_string(),
        hospital: "Ruby Hall Clinic".to_string(),
        contact: "9876543210".to_string(),
        requested_on: today(),
    }
}

pub(super) fn healthy_profile() -> DonorHealthProfile {
    DonorHealthProfile {
        age: 29,
        hemoglobin_g_dl: 13.8,
        days_since_last_donation: 180,
        weight_kg: 72.0,
        pulse_normal: true,
        blood_pressure_normal: true,
        chronic_disorders: false,
    }
}

pub(super) fn donation(blood_type: BloodType, volume_ml: u32) -> DonationSubmission {
    DonationSubmission {
        health: healthy_profile(),
        donor: DonorProfile {
            name: "Asha Rao".to_string(),
            blood_type,
            contact: "9876543210".to_string(),
            location: "Pune".to_string(),
            last_donation: Some(today() - Duration::days(180)),
        },
        volume_ml,
    }
}
