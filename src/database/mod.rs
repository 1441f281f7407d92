//! Persistence port.
//!
//! The core only talks to these traits. Every call is atomic on a single
//! document; nothing here spans documents, so multi-step cascades live in
//! the services and are written to converge when re-run.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Account, AccountField, Feed, FeedUpdate, Pet, PetUpdate};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors from a persistence backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    InvalidFormat(String),

    #[error("{0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::AlreadyExists(db.message().to_string())
            }
            e @ (sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_)) => {
                StoreError::InvalidFormat(e.to_string())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Account documents.
///
/// `put` is a conditional create: it fails with `AlreadyExists` when the id,
/// the email or any of the OAuth identities is already taken. `add_pet` on a
/// missing account is `NotFound`; `remove_pet` and `delete` are no-ops when
/// the target is already gone.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Account>>;
    async fn get_by_email(&self, email: &str) -> StoreResult<Option<Account>>;
    async fn get_by_oauth(&self, provider: &str, provider_id: &str)
        -> StoreResult<Option<Account>>;
    async fn put(&self, account: &Account) -> StoreResult<()>;
    async fn update_field(&self, id: Uuid, field: AccountField) -> StoreResult<()>;
    async fn delete(&self, id: Uuid) -> StoreResult<()>;
    async fn add_pet(&self, id: Uuid, pet_id: Uuid) -> StoreResult<()>;
    async fn remove_pet(&self, id: Uuid, pet_id: Uuid) -> StoreResult<()>;

    /// Liveness probe for the backend
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Pet documents. Same missing-target rules as [`AccountStore`].
#[async_trait]
pub trait PetStore: Send + Sync {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Pet>>;
    /// Returns the pets that exist; ids with no document are simply absent.
    async fn get_list(&self, ids: &[Uuid]) -> StoreResult<Vec<Pet>>;
    async fn put(&self, pet: &Pet) -> StoreResult<()>;
    async fn update_fields(&self, id: Uuid, updates: &[PetUpdate]) -> StoreResult<()>;
    async fn delete(&self, id: Uuid) -> StoreResult<()>;
    async fn add_feeder(&self, id: Uuid, account_id: Uuid) -> StoreResult<()>;
    async fn remove_feeder(&self, id: Uuid, account_id: Uuid) -> StoreResult<()>;
}

/// Feeds, scoped under their pet.
#[async_trait]
pub trait FeedStore: Send + Sync {
    async fn get(&self, pet_id: Uuid, feed_id: Uuid) -> StoreResult<Option<Feed>>;
    /// Newest first, strictly older than `before` when given.
    async fn list_by_pet(
        &self,
        pet_id: Uuid,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> StoreResult<Vec<Feed>>;
    async fn put(&self, feed: &Feed) -> StoreResult<()>;
    async fn update_fields(
        &self,
        pet_id: Uuid,
        feed_id: Uuid,
        updates: &[FeedUpdate],
    ) -> StoreResult<()>;
    async fn delete(&self, pet_id: Uuid, feed_id: Uuid) -> StoreResult<()>;
    async fn delete_all_for_pet(&self, pet_id: Uuid) -> StoreResult<()>;
}
