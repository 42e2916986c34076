use std::env;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use dotenv::dotenv;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use booking_cell::{AppointmentType, AvailabilityService, BookingFlow, RestBookingBackend, Slot};
use directory_cell::DirectoryService;
use shared_backend::BackendClient;
use shared_config::AppConfig;
use shared_models::Session;

const USAGE: &str = "usage:
  booking-cli pets
  booking-cli vets <clinic-id>
  booking-cli slots <vet-id> <YYYY-MM-DD> <type>
  booking-cli book <clinic-id> <pet-id> <vet-id> <YYYY-MM-DD> <HH:MM> <type> [notes]";

#[tokio::main]
async fn main() {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    if let Err(e) = run(&args).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: &[String]) -> Result<()> {
    let config = AppConfig::from_env();
    let session = session_from_env(&config);

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["pets"] => list_pets(&config, &session).await,
        ["vets", clinic_id] => list_vets(&config, &session, parse_id(clinic_id)?).await,
        ["slots", vet_id, date, appointment_type] => {
            list_slots(&config, &session, parse_id(vet_id)?, parse_date(date)?, appointment_type.parse()?).await
        }
        ["book", clinic_id, pet_id, vet_id, date, time, appointment_type, notes @ ..] => {
            let request = BookCommand {
                clinic_id: parse_id(clinic_id)?,
                pet_id: parse_id(pet_id)?,
                vet_id: parse_id(vet_id)?,
                date: parse_date(date)?,
                time: time.parse()?,
                appointment_type: appointment_type.parse()?,
                notes: notes.join(" "),
            };
            book(&config, session, request).await
        }
        _ => bail!("{}", USAGE),
    }
}

fn session_from_env(config: &AppConfig) -> Session {
    let user_id = env::var("BOOKING_USER_ID")
        .ok()
        .and_then(|raw| Uuid::parse_str(&raw).ok())
        .unwrap_or_else(Uuid::nil);
    Session::new(user_id, config.session_cookie.clone())
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("'{}' is not a valid id", raw))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").with_context(|| format!("'{}' is not a YYYY-MM-DD date", raw))
}

async fn list_pets(config: &AppConfig, session: &Session) -> Result<()> {
    let directory = DirectoryService::new(config)?;
    for pet in directory.my_pets(session).await? {
        println!("{}  {}", pet.id, pet.label());
    }
    Ok(())
}

async fn list_vets(config: &AppConfig, session: &Session, clinic_id: Uuid) -> Result<()> {
    let directory = DirectoryService::new(config)?;
    let clinic = directory.clinic(session, clinic_id).await;
    println!("{}", clinic.name);

    for vet in directory.vets_by_clinic(session, clinic_id).await? {
        match vet.specialities.as_deref() {
            Some(specialities) => println!("{}  {} ({})", vet.id, vet.full_name, specialities),
            None => println!("{}  {}", vet.id, vet.full_name),
        }
    }
    Ok(())
}

async fn list_slots(
    config: &AppConfig,
    session: &Session,
    vet_id: Uuid,
    date: NaiveDate,
    appointment_type: AppointmentType,
) -> Result<()> {
    let backend = RestBookingBackend::new(BackendClient::new(config)?);
    let availability = AvailabilityService::new(Arc::new(backend), config.clinic_utc_offset);

    let slots = availability.available_slots(session, vet_id, date, appointment_type).await?;
    if slots.is_empty() {
        println!("No free {} slots on {}", appointment_type.display_name(), date);
    }
    for slot in slots {
        println!("{}", slot);
    }
    Ok(())
}

struct BookCommand {
    clinic_id: Uuid,
    pet_id: Uuid,
    vet_id: Uuid,
    date: NaiveDate,
    time: Slot,
    appointment_type: AppointmentType,
    notes: String,
}

async fn book(config: &AppConfig, session: Session, command: BookCommand) -> Result<()> {
    let flow = BookingFlow::from_config(config, session, command.clinic_id)?;

    let outcome = async {
        flow.select_pet(Some(command.pet_id)).await?;
        flow.select_vet(Some(command.vet_id)).await?;
        flow.select_type(Some(command.appointment_type)).await?;
        flow.select_date(Some(command.date)).await?;
        flow.set_notes(command.notes.clone()).await;

        let countdown = flow.select_time(command.time).await?;
        info!("Reserved {} for {} seconds", command.time, countdown.remaining_seconds);

        flow.submit().await
    }
    .await;

    // Releases the lock if anything above failed after reserving.
    flow.close().await;

    let confirmation = outcome?;
    println!("{}", confirmation.message);
    Ok(())
}
