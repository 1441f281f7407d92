use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::storage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub id: Uuid,
    pub name: String,
    pub photo_url: Option<String>,
    pub adopted: DateTime<Utc>,
    pub family: String,
    pub species: String,
    /// Co-owners. Never empty while the pet exists.
    pub feeders: BTreeSet<Uuid>,
}

/// Pet registration payload
#[derive(Debug, Clone, Deserialize)]
pub struct NewPet {
    #[serde(default)]
    pub name: String,
    pub adopted: Option<DateTime<Utc>>,
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub species: String,
}

impl Pet {
    /// A pet only comes into existence together with its first feeder.
    pub fn create(new_pet: NewPet, creator: Uuid) -> Result<Self> {
        if new_pet.name.is_empty() {
            return Err(Error::invalid_param("pet name is empty"));
        }

        Ok(Self {
            id: Uuid::now_v7(),
            name: new_pet.name,
            photo_url: None,
            adopted: new_pet.adopted.unwrap_or_else(Utc::now),
            family: new_pet.family,
            species: new_pet.species,
            feeders: BTreeSet::from([creator]),
        })
    }

    pub fn is_fed_by(&self, account_id: Uuid) -> bool {
        self.feeders.contains(&account_id)
    }

    pub fn profile_dir(&self) -> String {
        storage::profile_dir(storage::PET_DIR, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_pet_has_creator_as_sole_feeder() {
        let creator = Uuid::now_v7();
        let pet = Pet::create(
            NewPet {
                name: "Nabi".into(),
                adopted: None,
                family: "cat".into(),
                species: "korean shorthair".into(),
            },
            creator,
        )
        .unwrap();

        assert_eq!(pet.feeders.len(), 1);
        assert!(pet.is_fed_by(creator));
        assert_ne!(pet.id, creator);
        assert_eq!(pet.profile_dir(), format!("pets/{}/profiles", pet.id));
    }

    #[test]
    fn pet_name_is_required() {
        let err = Pet::create(
            NewPet {
                name: String::new(),
                adopted: None,
                family: String::new(),
                species: String::new(),
            },
            Uuid::now_v7(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParam(_)));
    }
}
