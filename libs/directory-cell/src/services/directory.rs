use anyhow::{Context, Result};
use reqwest::Method;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_backend::BackendClient;
use shared_config::AppConfig;
use shared_models::Session;

use crate::models::{Clinic, Pet, Vet};

/// Read-only lookups that feed the booking form's pickers.
pub struct DirectoryService {
    client: BackendClient,
}

impl DirectoryService {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = BackendClient::new(config).context("failed to build backend client")?;
        debug!("Directory lookups against {}", client.get_base_url());
        Ok(Self { client })
    }

    pub fn with_client(client: BackendClient) -> Self {
        Self { client }
    }

    /// Pets owned by the signed-in user.
    pub async fn my_pets(&self, session: &Session) -> Result<Vec<Pet>> {
        debug!("Fetching pets for user {}", session.user_id);

        let pets: Vec<Pet> = self.client
            .request(Method::GET, "/pets/mine", session, None)
            .await
            .context("failed to load pets")?;

        debug!("Found {} pets", pets.len());
        Ok(pets)
    }

    /// Active vets working at `clinic_id`.
    pub async fn vets_by_clinic(&self, session: &Session, clinic_id: Uuid) -> Result<Vec<Vet>> {
        let path = format!("/vets/by-clinic/{}", clinic_id);

        let vets: Vec<Vet> = self.client
            .request(Method::GET, &path, session, None)
            .await
            .with_context(|| format!("failed to load vets for clinic {}", clinic_id))?;

        let total = vets.len();
        let bookable: Vec<Vet> = vets.into_iter().filter(Vet::is_bookable).collect();
        debug!("Clinic {} has {} bookable vets out of {}", clinic_id, bookable.len(), total);

        Ok(bookable)
    }

    /// The clinic's details, or a placeholder if they can't be loaded.
    pub async fn clinic(&self, session: &Session, clinic_id: Uuid) -> Clinic {
        let path = format!("/clinics/{}", clinic_id);

        match self.client.request::<Clinic>(Method::GET, &path, session, None).await {
            Ok(clinic) => clinic,
            Err(e) => {
                warn!("Failed to load clinic {}, showing placeholder: {}", clinic_id, e);
                Clinic::placeholder(clinic_id)
            }
        }
    }
}
