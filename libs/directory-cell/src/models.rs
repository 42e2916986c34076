use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const PLACEHOLDER_CLINIC_NAME: &str = "Veterinary Clinic";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pet {
    pub id: Uuid,
    pub name: String,
    pub species: Option<String>,
    pub breed: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub weight: Option<f64>,
    pub owner_id: Option<Uuid>,
    pub image_url: Option<String>,
}

impl Pet {
    /// "Rex (Beagle)", or just the name when the breed is unknown.
    pub fn label(&self) -> String {
        match self.breed.as_deref().filter(|breed| !breed.is_empty()) {
            Some(breed) => format!("{} ({})", self.name, breed),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vet {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub clinic_id: Option<Uuid>,
    pub specialities: Option<String>,
    pub is_active: Option<bool>,
}

impl Vet {
    /// Vets without an explicit flag are treated as active.
    pub fn is_bookable(&self) -> bool {
        self.is_active.unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clinic {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub city: Option<String>,
}

impl Clinic {
    /// Stand-in shown when the clinic's details can't be loaded.
    pub fn placeholder(id: Uuid) -> Self {
        Self {
            id,
            name: PLACEHOLDER_CLINIC_NAME.to_string(),
            address: None,
            phone: None,
            email: None,
            city: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.name == PLACEHOLDER_CLINIC_NAME && self.address.is_none()
    }
}
