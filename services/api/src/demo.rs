use crate::infra::{
    DispatchLabelFinalizer, InMemoryDonorDirectory, InMemoryInventoryStore, InMemoryRequestStore,
    ScreeningRules, SystemClock,
};
use crate::routes::ApiBankService;
use bloodbank::error::AppError;
use bloodbank::workflows::bank::{
    BloodBankService, BloodType, DonationSubmission, DonorHealthProfile, DonorProfile,
    FulfillmentOutcome, RequestSubmission,
};
use bloodbank::workflows::roster::RosterImporter;
use chrono::{Duration, Local};
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Print the dispensation report as JSON instead of a summary line
    #[arg(long)]
    pub(crate) json: bool,
}

fn donation(name: &str, blood_type: BloodType, volume_ml: u32) -> DonationSubmission {
    DonationSubmission {
        health: DonorHealthProfile {
            age: 31,
            hemoglobin_g_dl: 14.1,
            days_since_last_donation: 200,
            weight_kg: 68.0,
            pulse_normal: true,
            blood_pressure_normal: true,
            chronic_disorders: false,
        },
        donor: DonorProfile {
            name: name.to_string(),
            blood_type,
            contact: "9876543210".to_string(),
            location: "Pune".to_string(),
            last_donation: Some(Local::now().date_naive() - Duration::days(200)),
        },
        volume_ml,
    }
}

fn request(blood_type: &str, units: u32) -> RequestSubmission {
    RequestSubmission {
        blood_type: blood_type.to_string(),
        units_requested: units,
        location: "Pune".to_string(),
        hospital: "Ruby Hall Clinic".to_string(),
        contact: "9876543210".to_string(),
        requested_on: Local::now().date_naive(),
    }
}

/// Walk the whole lifecycle in one process: donations in, requests allocated,
/// reserved units dispensed.
pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let inventory = Arc::new(InMemoryInventoryStore::default());
    let requests = Arc::new(InMemoryRequestStore::default());
    let directory = Arc::new(InMemoryDonorDirectory::default());
    let importer = RosterImporter::new(directory.clone(), inventory.clone());

    // Seed a little historical stock the way an operator would, then take
    // fresh walk-in donations.
    let roster = format!(
        "donor_name,blood_type,volume_ml,donated_on,location,contact\n\
Meera Iyer,O-,450,{recent},Chennai,9988776655\n",
        recent = Local::now().date_naive() - Duration::days(5),
    );
    let report = importer.from_reader(roster.as_bytes())?;
    println!(
        "roster import: {} inserted, {} skipped",
        report.inserted, report.skipped
    );

    let service: ApiBankService = BloodBankService::new(
        inventory,
        requests,
        directory,
        Arc::new(ScreeningRules),
        Arc::new(SystemClock),
        Arc::new(DispatchLabelFinalizer),
    );

    for (name, blood_type) in [
        ("Asha Rao", BloodType::ONeg),
        ("Vikram Shah", BloodType::APos),
    ] {
        let unit = service.record_donation(donation(name, blood_type, 450))?;
        println!(
            "donation accepted: {} {} expires {}",
            unit.id.0, unit.blood_type, unit.expires_on
        );
    }

    for (blood_type, units) in [("A+", 2u32), ("O-", 3u32)] {
        let view = service.submit_request(request(blood_type, units))?;
        match view.fulfillment {
            FulfillmentOutcome::Approved { reserved_units } => println!(
                "request {} for {units}x {blood_type}: approved ({} units reserved)",
                view.request.request_id.0,
                reserved_units.len()
            ),
            FulfillmentOutcome::InsufficientStock {
                available,
                requested,
            } => println!(
                "request {} for {units}x {blood_type}: pending, only {available} of {requested} compatible units in stock",
                view.request.request_id.0
            ),
        }
    }

    let report = service.run_dispensation()?;
    if args.json {
        let rendered = serde_json::to_string_pretty(&report).map_err(std::io::Error::from)?;
        println!("{rendered}");
    } else {
        println!(
            "dispensation: {} completed, {} units awaiting retry, {} skipped",
            report.completed.len(),
            report.still_reserved_units,
            report.skipped_requests
        );
    }

    Ok(())
}
