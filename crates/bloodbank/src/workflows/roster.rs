//! Donation roster import.
//!
//! Seeds the donor directory and unit inventory from a CSV export of
//! historical collections (the format produced by the legacy desk software).
//! Malformed rows are skipped and counted rather than aborting the file.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

use crate::workflows::bank::domain::{BloodType, BloodUnit};
use crate::workflows::bank::donation::{
    DonorDirectory, DonorProfile, MAX_DONATION_ML, MIN_DONATION_ML,
};
use crate::workflows::bank::service::next_unit_id;
use crate::workflows::bank::store::{InventoryStore, StoreError};

#[derive(Debug)]
pub enum RosterImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Store(StoreError),
}

impl std::fmt::Display for RosterImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RosterImportError::Io(err) => write!(f, "failed to read roster export: {}", err),
            RosterImportError::Csv(err) => write!(f, "invalid roster CSV data: {}", err),
            RosterImportError::Store(err) => {
                write!(f, "could not persist imported roster rows: {}", err)
            }
        }
    }
}

impl std::error::Error for RosterImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RosterImportError::Io(err) => Some(err),
            RosterImportError::Csv(err) => Some(err),
            RosterImportError::Store(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for RosterImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for RosterImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<StoreError> for RosterImportError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// Outcome of a roster import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RosterImportReport {
    pub inserted: usize,
    pub skipped: usize,
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    donor_name: String,
    blood_type: String,
    volume_ml: u32,
    donated_on: String,
    location: String,
    contact: String,
}

pub struct RosterImporter<D, I> {
    directory: Arc<D>,
    inventory: Arc<I>,
}

impl<D, I> RosterImporter<D, I>
where
    D: DonorDirectory,
    I: InventoryStore,
{
    pub fn new(directory: Arc<D>, inventory: Arc<I>) -> Self {
        Self {
            directory,
            inventory,
        }
    }

    pub fn from_path<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<RosterImportReport, RosterImportError> {
        let file = std::fs::File::open(path)?;
        self.from_reader(file)
    }

    pub fn from_reader<R: Read>(
        &self,
        reader: R,
    ) -> Result<RosterImportReport, RosterImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut report = RosterImportReport::default();
        for row in csv_reader.deserialize::<RosterRow>() {
            let row = match row {
                Ok(row) => row,
                Err(err) => {
                    warn!(error = %err, "skipping unreadable roster row");
                    report.skipped += 1;
                    continue;
                }
            };

            match self.apply_row(row)? {
                true => report.inserted += 1,
                false => report.skipped += 1,
            }
        }

        Ok(report)
    }

    /// Returns whether the row produced an inventory unit. Store failures
    /// abort the import; per-row data problems do not.
    fn apply_row(&self, row: RosterRow) -> Result<bool, RosterImportError> {
        let blood_type = match row.blood_type.parse::<BloodType>() {
            Ok(blood_type) => blood_type,
            Err(_) => {
                warn!(donor = %row.donor_name, value = %row.blood_type, "unknown blood type, skipping row");
                return Ok(false);
            }
        };
        let donated_on = match NaiveDate::parse_from_str(row.donated_on.trim(), "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => {
                warn!(donor = %row.donor_name, value = %row.donated_on, "unparseable donation date, skipping row");
                return Ok(false);
            }
        };
        // Same volume bounds the collection desk enforces at intake.
        if !(MIN_DONATION_ML..=MAX_DONATION_ML).contains(&row.volume_ml) {
            warn!(donor = %row.donor_name, volume_ml = row.volume_ml, "volume out of range, skipping row");
            return Ok(false);
        }
        if row.donor_name.trim().is_empty() {
            warn!("roster row without a donor name, skipping");
            return Ok(false);
        }

        let donor_id = self.directory.register(DonorProfile {
            name: row.donor_name.trim().to_string(),
            blood_type,
            contact: row.contact,
            location: row.location,
            last_donation: Some(donated_on),
        })?;
        self.inventory.insert_unit(BloodUnit::from_donation(
            next_unit_id(),
            donor_id,
            blood_type,
            row.volume_ml,
            donated_on,
        ))?;
        Ok(true)
    }
}
