use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AccountStore, FeedStore, PetStore, StoreError, StoreResult};
use crate::models::{Account, AccountField, Feed, FeedUpdate, Pet, PetUpdate};

#[derive(Default)]
struct Documents {
    accounts: HashMap<Uuid, Account>,
    pets: HashMap<Uuid, Pet>,
    feeds: HashMap<Uuid, BTreeMap<Uuid, Feed>>,
}

/// In-process document store.
///
/// Each trait call takes the lock once, which gives the same single-document
/// atomicity a real document database offers and nothing more.
#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<Documents>,
    faults: Mutex<HashSet<&'static str>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `operation` (e.g. `"pet.delete"`) fail with a
    /// backend error. Used to exercise partially applied cascades.
    pub fn fail_next(&self, operation: &'static str) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert(operation);
        }
    }

    fn check_fault(&self, operation: &'static str) -> StoreResult<()> {
        let tripped = self
            .faults
            .lock()
            .map(|mut faults| faults.remove(operation))
            .unwrap_or(false);
        if tripped {
            return Err(StoreError::Backend(format!("injected failure: {}", operation)));
        }
        Ok(())
    }
}

fn account_not_found(id: Uuid) -> StoreError {
    StoreError::NotFound(format!("Account{{id: {}}}", id))
}

fn pet_not_found(id: Uuid) -> StoreError {
    StoreError::NotFound(format!("Pet{{id: {}}}", id))
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Account>> {
        self.check_fault("account.get")?;
        Ok(self.docs.read().await.accounts.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        self.check_fault("account.get_by_email")?;
        let docs = self.docs.read().await;
        Ok(docs.accounts.values().find(|a| a.email == email).cloned())
    }

    async fn get_by_oauth(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> StoreResult<Option<Account>> {
        self.check_fault("account.get_by_oauth")?;
        let docs = self.docs.read().await;
        Ok(docs
            .accounts
            .values()
            .find(|a| a.oauth.get(provider).is_some_and(|i| i.id == provider_id))
            .cloned())
    }

    async fn put(&self, account: &Account) -> StoreResult<()> {
        self.check_fault("account.put")?;
        let mut docs = self.docs.write().await;

        if docs.accounts.contains_key(&account.id) {
            return Err(StoreError::AlreadyExists(format!("Account{{id: {}}}", account.id)));
        }
        for existing in docs.accounts.values() {
            if existing.email == account.email {
                return Err(StoreError::AlreadyExists(format!(
                    "Account{{email: {}}}",
                    account.email
                )));
            }
            for (provider, identity) in &account.oauth {
                if existing.oauth.get(provider).is_some_and(|i| i.id == identity.id) {
                    return Err(StoreError::AlreadyExists(format!(
                        "Account{{oauth: {}/{}}}",
                        provider, identity.id
                    )));
                }
            }
        }

        docs.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn update_field(&self, id: Uuid, field: AccountField) -> StoreResult<()> {
        self.check_fault("account.update_field")?;
        let mut docs = self.docs.write().await;
        let account = docs.accounts.get_mut(&id).ok_or_else(|| account_not_found(id))?;
        field.apply(account);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.check_fault("account.delete")?;
        self.docs.write().await.accounts.remove(&id);
        Ok(())
    }

    async fn add_pet(&self, id: Uuid, pet_id: Uuid) -> StoreResult<()> {
        self.check_fault("account.add_pet")?;
        let mut docs = self.docs.write().await;
        let account = docs.accounts.get_mut(&id).ok_or_else(|| account_not_found(id))?;
        account.pets.insert(pet_id);
        Ok(())
    }

    async fn remove_pet(&self, id: Uuid, pet_id: Uuid) -> StoreResult<()> {
        self.check_fault("account.remove_pet")?;
        if let Some(account) = self.docs.write().await.accounts.get_mut(&id) {
            account.pets.remove(&pet_id);
        }
        Ok(())
    }
}

#[async_trait]
impl PetStore for MemoryStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Pet>> {
        self.check_fault("pet.get")?;
        Ok(self.docs.read().await.pets.get(&id).cloned())
    }

    async fn get_list(&self, ids: &[Uuid]) -> StoreResult<Vec<Pet>> {
        self.check_fault("pet.get_list")?;
        let docs = self.docs.read().await;
        Ok(ids.iter().filter_map(|id| docs.pets.get(id).cloned()).collect())
    }

    async fn put(&self, pet: &Pet) -> StoreResult<()> {
        self.check_fault("pet.put")?;
        let mut docs = self.docs.write().await;
        if docs.pets.contains_key(&pet.id) {
            return Err(StoreError::AlreadyExists(format!("Pet{{id: {}}}", pet.id)));
        }
        docs.pets.insert(pet.id, pet.clone());
        Ok(())
    }

    async fn update_fields(&self, id: Uuid, updates: &[PetUpdate]) -> StoreResult<()> {
        self.check_fault("pet.update_fields")?;
        let mut docs = self.docs.write().await;
        let pet = docs.pets.get_mut(&id).ok_or_else(|| pet_not_found(id))?;
        for update in updates {
            update.apply(pet);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.check_fault("pet.delete")?;
        self.docs.write().await.pets.remove(&id);
        Ok(())
    }

    async fn add_feeder(&self, id: Uuid, account_id: Uuid) -> StoreResult<()> {
        self.check_fault("pet.add_feeder")?;
        let mut docs = self.docs.write().await;
        let pet = docs.pets.get_mut(&id).ok_or_else(|| pet_not_found(id))?;
        pet.feeders.insert(account_id);
        Ok(())
    }

    async fn remove_feeder(&self, id: Uuid, account_id: Uuid) -> StoreResult<()> {
        self.check_fault("pet.remove_feeder")?;
        if let Some(pet) = self.docs.write().await.pets.get_mut(&id) {
            pet.feeders.remove(&account_id);
        }
        Ok(())
    }
}

#[async_trait]
impl FeedStore for MemoryStore {
    async fn get(&self, pet_id: Uuid, feed_id: Uuid) -> StoreResult<Option<Feed>> {
        self.check_fault("feed.get")?;
        let docs = self.docs.read().await;
        Ok(docs.feeds.get(&pet_id).and_then(|f| f.get(&feed_id)).cloned())
    }

    async fn list_by_pet(
        &self,
        pet_id: Uuid,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> StoreResult<Vec<Feed>> {
        self.check_fault("feed.list_by_pet")?;
        let docs = self.docs.read().await;
        let mut feeds: Vec<Feed> = docs
            .feeds
            .get(&pet_id)
            .map(|f| {
                f.values()
                    .filter(|feed| before.map_or(true, |b| feed.timestamp < b))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        feeds.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        feeds.truncate(limit);
        Ok(feeds)
    }

    async fn put(&self, feed: &Feed) -> StoreResult<()> {
        self.check_fault("feed.put")?;
        let mut docs = self.docs.write().await;
        let feeds = docs.feeds.entry(feed.pet_id).or_default();
        if feeds.contains_key(&feed.id) {
            return Err(StoreError::AlreadyExists(format!("Feed{{id: {}}}", feed.id)));
        }
        feeds.insert(feed.id, feed.clone());
        Ok(())
    }

    async fn update_fields(
        &self,
        pet_id: Uuid,
        feed_id: Uuid,
        updates: &[FeedUpdate],
    ) -> StoreResult<()> {
        self.check_fault("feed.update_fields")?;
        let mut docs = self.docs.write().await;
        let feed = docs
            .feeds
            .get_mut(&pet_id)
            .and_then(|f| f.get_mut(&feed_id))
            .ok_or_else(|| {
                StoreError::NotFound(format!("Feed{{pet: {}, id: {}}}", pet_id, feed_id))
            })?;
        for update in updates {
            update.apply(feed);
        }
        Ok(())
    }

    async fn delete(&self, pet_id: Uuid, feed_id: Uuid) -> StoreResult<()> {
        self.check_fault("feed.delete")?;
        if let Some(feeds) = self.docs.write().await.feeds.get_mut(&pet_id) {
            feeds.remove(&feed_id);
        }
        Ok(())
    }

    async fn delete_all_for_pet(&self, pet_id: Uuid) -> StoreResult<()> {
        self.check_fault("feed.delete_all_for_pet")?;
        self.docs.write().await.feeds.remove(&pet_id);
        Ok(())
    }
}
