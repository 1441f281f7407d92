//! Field-level update whitelisting.
//!
//! Every partial update is a list of typed variants, one per mutable field.
//! Identity fields (ids, feeder and pet sets) have no variant, so the only
//! way to reach them is through the ownership operations. Loosely-typed
//! request bodies go through [`FieldUpdateGuard::parse`], which rejects any
//! field outside the entity's allow-list before a store call is made.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::models::feed::{validate_amount, validate_unit};
use crate::models::{Account, Feed, Pet};

/// An entity with a fixed set of mutable fields.
pub trait Updatable {
    type Update;

    const ENTITY: &'static str;
    const MUTABLE_FIELDS: &'static [&'static str];

    /// Parse one whitelisted field. Only called for names in `MUTABLE_FIELDS`.
    fn parse_field(field: &str, value: Value) -> Result<Self::Update>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum AccountUpdate {
    Name(String),
    /// Plaintext; hashed by the account service before it reaches the store.
    Password(String),
    Photo(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PetUpdate {
    Name(String),
    Photo(String),
    Adopted(DateTime<Utc>),
    Family(String),
    Species(String),
}

impl PetUpdate {
    pub fn apply(&self, pet: &mut Pet) {
        match self {
            PetUpdate::Name(name) => pet.name = name.clone(),
            PetUpdate::Photo(url) => pet.photo_url = Some(url.clone()),
            PetUpdate::Adopted(at) => pet.adopted = *at,
            PetUpdate::Family(family) => pet.family = family.clone(),
            PetUpdate::Species(species) => pet.species = species.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedUpdate {
    Timestamp(DateTime<Utc>),
    Amount(f64),
    Unit(String),
}

impl FeedUpdate {
    pub fn apply(&self, feed: &mut Feed) {
        match self {
            FeedUpdate::Timestamp(at) => feed.timestamp = *at,
            FeedUpdate::Amount(amount) => feed.amount = *amount,
            FeedUpdate::Unit(unit) => feed.unit = unit.clone(),
        }
    }
}

impl Updatable for Account {
    type Update = AccountUpdate;

    const ENTITY: &'static str = "account";
    const MUTABLE_FIELDS: &'static [&'static str] = &["name", "password", "photo"];

    fn parse_field(field: &str, value: Value) -> Result<AccountUpdate> {
        match field {
            "name" => Ok(AccountUpdate::Name(non_empty_string(Self::ENTITY, field, value)?)),
            "password" => Ok(AccountUpdate::Password(non_empty_string(
                Self::ENTITY,
                field,
                value,
            )?)),
            "photo" => Ok(AccountUpdate::Photo(string(Self::ENTITY, field, value)?)),
            _ => Err(not_updatable(Self::ENTITY, field)),
        }
    }
}

impl Updatable for Pet {
    type Update = PetUpdate;

    const ENTITY: &'static str = "pet";
    const MUTABLE_FIELDS: &'static [&'static str] =
        &["name", "photo", "adopted", "family", "species"];

    fn parse_field(field: &str, value: Value) -> Result<PetUpdate> {
        match field {
            "name" => Ok(PetUpdate::Name(non_empty_string(Self::ENTITY, field, value)?)),
            "photo" => Ok(PetUpdate::Photo(string(Self::ENTITY, field, value)?)),
            "adopted" => Ok(PetUpdate::Adopted(timestamp(Self::ENTITY, field, value)?)),
            "family" => Ok(PetUpdate::Family(string(Self::ENTITY, field, value)?)),
            "species" => Ok(PetUpdate::Species(string(Self::ENTITY, field, value)?)),
            _ => Err(not_updatable(Self::ENTITY, field)),
        }
    }
}

impl Updatable for Feed {
    type Update = FeedUpdate;

    const ENTITY: &'static str = "feed";
    const MUTABLE_FIELDS: &'static [&'static str] = &["timestamp", "amount", "unit"];

    fn parse_field(field: &str, value: Value) -> Result<FeedUpdate> {
        match field {
            "timestamp" => Ok(FeedUpdate::Timestamp(timestamp(Self::ENTITY, field, value)?)),
            "amount" => {
                let amount = value
                    .as_f64()
                    .ok_or_else(|| wrong_type(Self::ENTITY, field, "number"))?;
                validate_amount(amount)?;
                Ok(FeedUpdate::Amount(amount))
            }
            "unit" => {
                let unit = string(Self::ENTITY, field, value)?;
                validate_unit(&unit)?;
                Ok(FeedUpdate::Unit(unit))
            }
            _ => Err(not_updatable(Self::ENTITY, field)),
        }
    }
}

/// Runtime allow-list check for partial-update requests.
pub struct FieldUpdateGuard;

impl FieldUpdateGuard {
    pub fn is_updatable<E: Updatable>(field: &str) -> bool {
        E::MUTABLE_FIELDS.contains(&field)
    }

    /// Validate every field name first, then parse the values. A request naming
    /// any field outside the allow-list is rejected as a whole.
    pub fn parse<E: Updatable>(patch: Map<String, Value>) -> Result<Vec<E::Update>> {
        if patch.is_empty() {
            return Err(Error::invalid_param(format!("empty {} update", E::ENTITY)));
        }

        if let Some(field) = patch.keys().find(|f| !Self::is_updatable::<E>(f)) {
            return Err(not_updatable(E::ENTITY, field));
        }

        patch
            .into_iter()
            .map(|(field, value)| E::parse_field(&field, value))
            .collect()
    }
}

fn not_updatable(entity: &str, field: &str) -> Error {
    Error::invalid_param(format!("{} field [{}] is not updatable", entity, field))
}

fn wrong_type(entity: &str, field: &str, expected: &str) -> Error {
    Error::invalid_param(format!("{} field [{}] must be a {}", entity, field, expected))
}

fn string(entity: &str, field: &str, value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(wrong_type(entity, field, "string")),
    }
}

fn non_empty_string(entity: &str, field: &str, value: Value) -> Result<String> {
    let s = string(entity, field, value)?;
    if s.is_empty() {
        return Err(Error::invalid_param(format!("{} field [{}] is empty", entity, field)));
    }
    Ok(s)
}

fn timestamp(entity: &str, field: &str, value: Value) -> Result<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .ok_or_else(|| wrong_type(entity, field, "unix timestamp")),
        Value::String(s) => DateTime::parse_from_rfc3339(&s)
            .map(|at| at.with_timezone(&Utc))
            .map_err(|_| wrong_type(entity, field, "RFC 3339 timestamp")),
        _ => Err(wrong_type(entity, field, "timestamp")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patch(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn accepts_exactly_the_whitelisted_fields() {
        for field in ["name", "password", "photo"] {
            assert!(FieldUpdateGuard::is_updatable::<Account>(field));
        }
        for field in ["name", "photo", "adopted", "family", "species"] {
            assert!(FieldUpdateGuard::is_updatable::<Pet>(field));
        }
        for field in ["timestamp", "amount", "unit"] {
            assert!(FieldUpdateGuard::is_updatable::<Feed>(field));
        }
    }

    #[test]
    fn rejects_identity_and_ownership_fields() {
        for field in ["id", "email", "pets", "oauth", "signed_up"] {
            assert!(!FieldUpdateGuard::is_updatable::<Account>(field));
        }
        for field in ["id", "feeders"] {
            assert!(!FieldUpdateGuard::is_updatable::<Pet>(field));
        }
        for field in ["id", "pet_id", "feeder_id"] {
            assert!(!FieldUpdateGuard::is_updatable::<Feed>(field));
        }
    }

    #[test]
    fn one_bad_field_rejects_the_whole_patch() {
        let err = FieldUpdateGuard::parse::<Pet>(patch(json!({
            "name": "Nabi",
            "id": "00000000-0000-0000-0000-000000000000"
        })))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidParam(_)));
    }

    #[test]
    fn parses_pet_patch() {
        let updates = FieldUpdateGuard::parse::<Pet>(patch(json!({
            "name": "Nabi",
            "adopted": 1_700_000_000,
            "species": "persian"
        })))
        .unwrap();
        assert_eq!(updates.len(), 3);
        assert!(updates.contains(&PetUpdate::Name("Nabi".into())));
        assert!(updates.contains(&PetUpdate::Species("persian".into())));
        assert!(updates.contains(&PetUpdate::Adopted(
            DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
        )));
    }

    #[test]
    fn parses_feed_patch_and_validates_values() {
        let updates =
            FieldUpdateGuard::parse::<Feed>(patch(json!({ "amount": 12.5 }))).unwrap();
        assert_eq!(updates, vec![FeedUpdate::Amount(12.5)]);

        let err = FieldUpdateGuard::parse::<Feed>(patch(json!({ "amount": -3 }))).unwrap_err();
        assert!(matches!(err, Error::InvalidParam(_)));

        let err = FieldUpdateGuard::parse::<Feed>(patch(json!({ "unit": "" }))).unwrap_err();
        assert!(matches!(err, Error::InvalidParam(_)));
    }

    #[test]
    fn empty_patch_is_rejected() {
        let err = FieldUpdateGuard::parse::<Account>(Map::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidParam(_)));
    }

    #[test]
    fn wrong_value_type_is_rejected() {
        let err =
            FieldUpdateGuard::parse::<Account>(patch(json!({ "name": 42 }))).unwrap_err();
        assert!(matches!(err, Error::InvalidParam(_)));
    }

    #[test]
    fn applies_typed_updates() {
        let mut pet = Pet::create(
            crate::models::NewPet {
                name: "Nabi".into(),
                adopted: None,
                family: "cat".into(),
                species: String::new(),
            },
            uuid::Uuid::now_v7(),
        )
        .unwrap();
        let feeders = pet.feeders.clone();
        PetUpdate::Name("Choco".into()).apply(&mut pet);
        PetUpdate::Family("dog".into()).apply(&mut pet);
        assert_eq!(pet.name, "Choco");
        assert_eq!(pet.family, "dog");
        assert_eq!(pet.feeders, feeders);
    }
}
