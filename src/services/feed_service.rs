use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use uuid::Uuid;

use crate::database::{AccountStore, FeedStore, PetStore};
use crate::error::{Error, Result};
use crate::middleware::CallerIdentity;
use crate::models::{Feed, FeedUpdate, FeedView, NewFeed};
use crate::services::ownership_service::fed_pet;

pub const DEFAULT_FEED_LIMIT: usize = 20;
pub const MAX_FEED_LIMIT: usize = 100;

/// Feeding logs. Every operation requires the caller to feed the pet.
pub struct FeedService {
    accounts: Arc<dyn AccountStore>,
    pets: Arc<dyn PetStore>,
    feeds: Arc<dyn FeedStore>,
}

impl FeedService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        pets: Arc<dyn PetStore>,
        feeds: Arc<dyn FeedStore>,
    ) -> Self {
        Self {
            accounts,
            pets,
            feeds,
        }
    }

    pub async fn add_feed(
        &self,
        caller: &CallerIdentity,
        pet_id: Uuid,
        new_feed: NewFeed,
    ) -> Result<FeedView> {
        fed_pet(self.pets.as_ref(), caller, pet_id).await?;

        let feed = Feed::create(pet_id, caller.account_id, new_feed)?;
        self.feeds.put(&feed).await?;

        tracing::debug!(pet_id = %pet_id, feed_id = %feed.id, "feed logged");
        self.view(feed).await
    }

    /// Newest first. `limit` defaults to 20 and is capped at 100.
    pub async fn list_feeds(
        &self,
        caller: &CallerIdentity,
        pet_id: Uuid,
        before: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Result<Vec<FeedView>> {
        fed_pet(self.pets.as_ref(), caller, pet_id).await?;

        let limit = limit.unwrap_or(DEFAULT_FEED_LIMIT).clamp(1, MAX_FEED_LIMIT);
        let feeds = self.feeds.list_by_pet(pet_id, before, limit).await?;

        let names = self
            .feeder_names(feeds.iter().map(|feed| feed.feeder_id).collect())
            .await?;

        Ok(feeds
            .into_iter()
            .map(|feed| FeedView {
                feeder_name: names.get(&feed.feeder_id).cloned(),
                feed,
            })
            .collect())
    }

    pub async fn update_feed(
        &self,
        caller: &CallerIdentity,
        pet_id: Uuid,
        feed_id: Uuid,
        updates: Vec<FeedUpdate>,
    ) -> Result<FeedView> {
        fed_pet(self.pets.as_ref(), caller, pet_id).await?;
        self.feed(pet_id, feed_id).await?;

        self.feeds.update_fields(pet_id, feed_id, &updates).await?;
        let feed = self.feed(pet_id, feed_id).await?;
        self.view(feed).await
    }

    /// Deleting a feed that is already gone succeeds.
    pub async fn delete_feed(
        &self,
        caller: &CallerIdentity,
        pet_id: Uuid,
        feed_id: Uuid,
    ) -> Result<()> {
        fed_pet(self.pets.as_ref(), caller, pet_id).await?;
        self.feeds.delete(pet_id, feed_id).await?;
        Ok(())
    }

    async fn feed(&self, pet_id: Uuid, feed_id: Uuid) -> Result<Feed> {
        self.feeds
            .get(pet_id, feed_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Feed{{pet: {}, id: {}}}", pet_id, feed_id)))
    }

    async fn view(&self, feed: Feed) -> Result<FeedView> {
        let mut names = self.feeder_names(BTreeSet::from([feed.feeder_id])).await?;
        Ok(FeedView {
            feeder_name: names.remove(&feed.feeder_id),
            feed,
        })
    }

    /// Display names of the given accounts. Deleted accounts are left out.
    async fn feeder_names(&self, ids: BTreeSet<Uuid>) -> Result<HashMap<Uuid, String>> {
        let accounts = try_join_all(ids.into_iter().map(|id| self.accounts.get(id))).await?;
        Ok(accounts
            .into_iter()
            .flatten()
            .map(|account| (account.id, account.name))
            .collect())
    }
}
