use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgPool, Postgres, QueryBuilder};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use super::{AccountStore, FeedStore, PetStore, StoreError, StoreResult};
use crate::config::DatabaseConfig;
use crate::models::{Account, AccountField, Feed, FeedUpdate, OAuthIdentity, Pet, PetUpdate};

/// PostgreSQL adapter. One row per document; set columns are `UUID[]`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct AccountRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: Option<String>,
    oauth: Json<BTreeMap<String, OAuthIdentity>>,
    photo_url: Option<String>,
    signed_up: DateTime<Utc>,
    pets: Vec<Uuid>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            oauth: row.oauth.0,
            photo_url: row.photo_url,
            signed_up: row.signed_up,
            pets: row.pets.into_iter().collect(),
        }
    }
}

#[derive(FromRow)]
struct PetRow {
    id: Uuid,
    name: String,
    photo_url: Option<String>,
    adopted: DateTime<Utc>,
    family: String,
    species: String,
    feeders: Vec<Uuid>,
}

impl From<PetRow> for Pet {
    fn from(row: PetRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            photo_url: row.photo_url,
            adopted: row.adopted,
            family: row.family,
            species: row.species,
            feeders: row.feeders.into_iter().collect::<BTreeSet<_>>(),
        }
    }
}

#[derive(FromRow)]
struct FeedRow {
    id: Uuid,
    pet_id: Uuid,
    feeder_id: Uuid,
    fed_at: DateTime<Utc>,
    amount: f64,
    unit: String,
}

impl From<FeedRow> for Feed {
    fn from(row: FeedRow) -> Self {
        Self {
            id: row.id,
            pet_id: row.pet_id,
            feeder_id: row.feeder_id,
            timestamp: row.fed_at,
            amount: row.amount,
            unit: row.unit,
        }
    }
}

const ACCOUNT_COLUMNS: &str =
    "a.id, a.name, a.email, a.password_hash, a.oauth, a.photo_url, a.signed_up, a.pets";
const PET_COLUMNS: &str = "id, name, photo_url, adopted, family, species, feeders";
const FEED_COLUMNS: &str = "id, pet_id, feeder_id, fed_at, amount, unit";

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and bring the schema up to date.
    pub async fn connect(url: &str, config: &DatabaseConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {}", e)))?;

        info!("Connected to PostgreSQL (max {} connections)", config.max_connections);
        Ok(Self::new(pool))
    }

    async fn fetch_account(&self, filter: &str, bind: &str) -> StoreResult<Option<Account>> {
        let sql = format!("SELECT {} FROM accounts a {}", ACCOUNT_COLUMNS, filter);
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(bind)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Account::from))
    }
}

fn expect_row(rows_affected: u64, what: impl FnOnce() -> String) -> StoreResult<()> {
    if rows_affected == 0 {
        return Err(StoreError::NotFound(what()));
    }
    Ok(())
}

#[async_trait]
impl AccountStore for PgStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Account>> {
        let sql = format!("SELECT {} FROM accounts a WHERE a.id = $1", ACCOUNT_COLUMNS);
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Account::from))
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        self.fetch_account("WHERE a.email = $1", email).await
    }

    async fn get_by_oauth(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> StoreResult<Option<Account>> {
        let sql = format!(
            "SELECT {} FROM accounts a JOIN account_oauth o ON o.account_id = a.id \
             WHERE o.provider = $1 AND o.provider_id = $2",
            ACCOUNT_COLUMNS
        );
        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(provider)
            .bind(provider_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Account::from))
    }

    async fn put(&self, account: &Account) -> StoreResult<()> {
        // The oauth side table carries the uniqueness index, so both rows go in together.
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO accounts (id, name, email, password_hash, oauth, photo_url, signed_up, pets) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(account.id)
        .bind(&account.name)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(Json(&account.oauth))
        .bind(&account.photo_url)
        .bind(account.signed_up)
        .bind(account.pets.iter().copied().collect::<Vec<Uuid>>())
        .execute(&mut *tx)
        .await?;

        for (provider, identity) in &account.oauth {
            sqlx::query(
                "INSERT INTO account_oauth (provider, provider_id, account_id) VALUES ($1, $2, $3)",
            )
            .bind(provider)
            .bind(&identity.id)
            .bind(account.id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_field(&self, id: Uuid, field: AccountField) -> StoreResult<()> {
        let (column, value) = match field {
            AccountField::Name(v) => ("name", v),
            AccountField::PasswordHash(v) => ("password_hash", v),
            AccountField::PhotoUrl(v) => ("photo_url", v),
        };
        let sql = format!("UPDATE accounts SET {} = $2 WHERE id = $1", column);
        let result = sqlx::query(&sql).bind(id).bind(value).execute(&self.pool).await?;
        expect_row(result.rows_affected(), || format!("Account{{id: {}}}", id))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn add_pet(&self, id: Uuid, pet_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE accounts SET pets = CASE WHEN $2 = ANY(pets) THEN pets \
             ELSE array_append(pets, $2) END WHERE id = $1",
        )
        .bind(id)
        .bind(pet_id)
        .execute(&self.pool)
        .await?;
        expect_row(result.rows_affected(), || format!("Account{{id: {}}}", id))
    }

    async fn remove_pet(&self, id: Uuid, pet_id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE accounts SET pets = array_remove(pets, $2) WHERE id = $1")
            .bind(id)
            .bind(pet_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl PetStore for PgStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Pet>> {
        let sql = format!("SELECT {} FROM pets WHERE id = $1", PET_COLUMNS);
        let row = sqlx::query_as::<_, PetRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Pet::from))
    }

    async fn get_list(&self, ids: &[Uuid]) -> StoreResult<Vec<Pet>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let sql = format!("SELECT {} FROM pets WHERE id = ANY($1)", PET_COLUMNS);
        let rows = sqlx::query_as::<_, PetRow>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Pet::from).collect())
    }

    async fn put(&self, pet: &Pet) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO pets (id, name, photo_url, adopted, family, species, feeders) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(pet.id)
        .bind(&pet.name)
        .bind(&pet.photo_url)
        .bind(pet.adopted)
        .bind(&pet.family)
        .bind(&pet.species)
        .bind(pet.feeders.iter().copied().collect::<Vec<Uuid>>())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_fields(&self, id: Uuid, updates: &[PetUpdate]) -> StoreResult<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE pets SET ");
        let mut set = query.separated(", ");
        for update in updates {
            match update {
                PetUpdate::Name(v) => set.push("name = ").push_bind_unseparated(v.clone()),
                PetUpdate::Photo(v) => set.push("photo_url = ").push_bind_unseparated(v.clone()),
                PetUpdate::Adopted(v) => set.push("adopted = ").push_bind_unseparated(*v),
                PetUpdate::Family(v) => set.push("family = ").push_bind_unseparated(v.clone()),
                PetUpdate::Species(v) => set.push("species = ").push_bind_unseparated(v.clone()),
            };
        }
        query.push(" WHERE id = ").push_bind(id);

        let result = query.build().execute(&self.pool).await?;
        expect_row(result.rows_affected(), || format!("Pet{{id: {}}}", id))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM pets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn add_feeder(&self, id: Uuid, account_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE pets SET feeders = CASE WHEN $2 = ANY(feeders) THEN feeders \
             ELSE array_append(feeders, $2) END WHERE id = $1",
        )
        .bind(id)
        .bind(account_id)
        .execute(&self.pool)
        .await?;
        expect_row(result.rows_affected(), || format!("Pet{{id: {}}}", id))
    }

    async fn remove_feeder(&self, id: Uuid, account_id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE pets SET feeders = array_remove(feeders, $2) WHERE id = $1")
            .bind(id)
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl FeedStore for PgStore {
    async fn get(&self, pet_id: Uuid, feed_id: Uuid) -> StoreResult<Option<Feed>> {
        let sql = format!("SELECT {} FROM feeds WHERE pet_id = $1 AND id = $2", FEED_COLUMNS);
        let row = sqlx::query_as::<_, FeedRow>(&sql)
            .bind(pet_id)
            .bind(feed_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Feed::from))
    }

    async fn list_by_pet(
        &self,
        pet_id: Uuid,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> StoreResult<Vec<Feed>> {
        let sql = format!(
            "SELECT {} FROM feeds WHERE pet_id = $1 AND ($2::timestamptz IS NULL OR fed_at < $2) \
             ORDER BY fed_at DESC, id DESC LIMIT $3",
            FEED_COLUMNS
        );
        let rows = sqlx::query_as::<_, FeedRow>(&sql)
            .bind(pet_id)
            .bind(before)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Feed::from).collect())
    }

    async fn put(&self, feed: &Feed) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO feeds (id, pet_id, feeder_id, fed_at, amount, unit) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(feed.id)
        .bind(feed.pet_id)
        .bind(feed.feeder_id)
        .bind(feed.timestamp)
        .bind(feed.amount)
        .bind(&feed.unit)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_fields(
        &self,
        pet_id: Uuid,
        feed_id: Uuid,
        updates: &[FeedUpdate],
    ) -> StoreResult<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE feeds SET ");
        let mut set = query.separated(", ");
        for update in updates {
            match update {
                FeedUpdate::Timestamp(v) => set.push("fed_at = ").push_bind_unseparated(*v),
                FeedUpdate::Amount(v) => set.push("amount = ").push_bind_unseparated(*v),
                FeedUpdate::Unit(v) => set.push("unit = ").push_bind_unseparated(v.clone()),
            };
        }
        query
            .push(" WHERE pet_id = ")
            .push_bind(pet_id)
            .push(" AND id = ")
            .push_bind(feed_id);

        let result = query.build().execute(&self.pool).await?;
        expect_row(result.rows_affected(), || {
            format!("Feed{{pet: {}, id: {}}}", pet_id, feed_id)
        })
    }

    async fn delete(&self, pet_id: Uuid, feed_id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM feeds WHERE pet_id = $1 AND id = $2")
            .bind(pet_id)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_all_for_pet(&self, pet_id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM feeds WHERE pet_id = $1")
            .bind(pet_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
