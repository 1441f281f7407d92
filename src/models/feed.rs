use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// A logged feeding. Only `timestamp`, `amount` and `unit` change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub id: Uuid,
    pub pet_id: Uuid,
    pub feeder_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub amount: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFeed {
    pub timestamp: Option<DateTime<Utc>>,
    pub amount: f64,
    #[serde(default)]
    pub unit: String,
}

impl Feed {
    pub fn create(pet_id: Uuid, feeder_id: Uuid, new_feed: NewFeed) -> Result<Self> {
        validate_amount(new_feed.amount)?;
        validate_unit(&new_feed.unit)?;

        Ok(Self {
            id: Uuid::now_v7(),
            pet_id,
            feeder_id,
            timestamp: new_feed.timestamp.unwrap_or_else(Utc::now),
            amount: new_feed.amount,
            unit: new_feed.unit,
        })
    }
}

pub(crate) fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::invalid_param(format!("feed amount [{}]", amount)));
    }
    Ok(())
}

pub(crate) fn validate_unit(unit: &str) -> Result<()> {
    if unit.is_empty() {
        return Err(Error::invalid_param("feed unit is empty"));
    }
    Ok(())
}

/// Feed as returned to clients, with the feeder's display name resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedView {
    #[serde(flatten)]
    pub feed: Feed,
    pub feeder_name: Option<String>,
}
