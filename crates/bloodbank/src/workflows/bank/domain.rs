use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Shelf life of a whole-blood unit; expiry is always derived from the donation date.
pub const SHELF_LIFE_DAYS: i64 = 30;

/// ABO/Rh blood group. Serialized with the clinical labels used on labels and forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloodType {
    #[serde(rename = "A+")]
    APos,
    #[serde(rename = "A-")]
    ANeg,
    #[serde(rename = "B+")]
    BPos,
    #[serde(rename = "B-")]
    BNeg,
    #[serde(rename = "AB+")]
    AbPos,
    #[serde(rename = "AB-")]
    AbNeg,
    #[serde(rename = "O+")]
    OPos,
    #[serde(rename = "O-")]
    ONeg,
}

impl BloodType {
    pub const ALL: [Self; 8] = [
        Self::APos,
        Self::ANeg,
        Self::BPos,
        Self::BNeg,
        Self::AbPos,
        Self::AbNeg,
        Self::OPos,
        Self::ONeg,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::APos => "A+",
            Self::ANeg => "A-",
            Self::BPos => "B+",
            Self::BNeg => "B-",
            Self::AbPos => "AB+",
            Self::AbNeg => "AB-",
            Self::OPos => "O+",
            Self::ONeg => "O-",
        }
    }
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BloodType {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "A+" => Ok(Self::APos),
            "A-" => Ok(Self::ANeg),
            "B+" => Ok(Self::BPos),
            "B-" => Ok(Self::BNeg),
            "AB+" => Ok(Self::AbPos),
            "AB-" => Ok(Self::AbNeg),
            "O+" => Ok(Self::OPos),
            "O-" => Ok(Self::ONeg),
            other => Err(ValidationError::UnknownBloodType(other.to_string())),
        }
    }
}

/// Identifier wrapper for physical blood units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub String);

/// Identifier wrapper for hospital blood requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

/// Identifier wrapper for registered donors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DonorId(pub String);

/// Lifecycle of a physical unit. Transitions are forward-only except for the
/// explicit cancellation path that releases a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Active,
    Reserved,
    Delivered,
}

impl UnitStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Reserved => "reserved",
            Self::Delivered => "delivered",
        }
    }
}

/// Lifecycle of a hospital request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Completed,
}

impl RequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Completed => "completed",
        }
    }
}

/// One physical donation held in inventory. Units are never deleted; delivered
/// units remain for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloodUnit {
    pub id: UnitId,
    pub blood_type: BloodType,
    pub volume_ml: u32,
    pub donor_id: DonorId,
    pub donated_on: NaiveDate,
    pub expires_on: NaiveDate,
    pub status: UnitStatus,
    /// Set while the unit is reserved so dispensation can retrieve exactly the
    /// units earmarked for a request, regardless of cross-type compatibility.
    pub reserved_for: Option<RequestId>,
}

impl BloodUnit {
    /// Build a fresh unit from a recorded donation. Expiry is the donation
    /// date plus the fixed shelf life.
    pub fn from_donation(
        id: UnitId,
        donor_id: DonorId,
        blood_type: BloodType,
        volume_ml: u32,
        donated_on: NaiveDate,
    ) -> Self {
        Self {
            id,
            blood_type,
            volume_ml,
            donor_id,
            donated_on,
            expires_on: donated_on + Duration::days(SHELF_LIFE_DAYS),
            status: UnitStatus::Active,
            reserved_for: None,
        }
    }

    pub fn is_dispensable(&self, today: NaiveDate) -> bool {
        self.status == UnitStatus::Active && self.expires_on > today
    }
}

/// A hospital's ask for one blood type. Quantity counts units (one row per
/// unit), fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloodRequest {
    pub id: RequestId,
    pub blood_type: BloodType,
    pub units_requested: u32,
    pub location: String,
    pub hospital: String,
    pub contact: String,
    pub requested_on: NaiveDate,
    pub status: RequestStatus,
}

/// Raw submission collected from the request form before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSubmission {
    pub blood_type: String,
    pub units_requested: u32,
    pub location: String,
    pub hospital: String,
    pub contact: String,
    pub requested_on: NaiveDate,
}

impl RequestSubmission {
    /// Validate the submission into a typed request body. Rejected input never
    /// reaches the allocation engine.
    pub fn validate(&self) -> Result<ValidatedRequest, ValidationError> {
        let blood_type = self.blood_type.parse::<BloodType>()?;

        if self.units_requested == 0 {
            return Err(ValidationError::NonPositiveQuantity);
        }
        for (field, value) in [
            ("hospital", &self.hospital),
            ("location", &self.location),
            ("contact", &self.contact),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(field));
            }
        }
        if self.contact.len() != 10 || !self.contact.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidContact);
        }

        Ok(ValidatedRequest {
            blood_type,
            units_requested: self.units_requested,
            location: self.location.trim().to_string(),
            hospital: self.hospital.trim().to_string(),
            contact: self.contact.clone(),
            requested_on: self.requested_on,
        })
    }
}

/// Submission that has passed boundary validation but has no identity yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub blood_type: BloodType,
    pub units_requested: u32,
    pub location: String,
    pub hospital: String,
    pub contact: String,
    pub requested_on: NaiveDate,
}

impl ValidatedRequest {
    pub fn into_request(self, id: RequestId) -> BloodRequest {
        BloodRequest {
            id,
            blood_type: self.blood_type,
            units_requested: self.units_requested,
            location: self.location,
            hospital: self.hospital,
            contact: self.contact,
            requested_on: self.requested_on,
            status: RequestStatus::Pending,
        }
    }
}

/// Input rejected at the boundary, before any store is touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("unrecognized blood type '{0}'")]
    UnknownBloodType(String),
    #[error("units requested must be at least 1")]
    NonPositiveQuantity,
    #[error("{0} must not be empty")]
    MissingField(&'static str),
    #[error("contact must be a 10-digit number")]
    InvalidContact,
}
