//! The account <-> pet relation and its cascades.
//!
//! Nothing here is transactional. Each cascade is a fixed sequence of store
//! calls where every step is a no-op once applied, so a caller that sees an
//! error can run the same operation again from the start and converge:
//!
//! * remove feeder: account drops the pet, then the pet is re-read and either
//!   drops the feeder or, when no feeder remains, is deleted.
//! * delete pet: feeds, then media, then the pet document last, so a pet that
//!   still exists always has its cleanup ahead of it.
//! * delete account: leave every pet, delete the pets left without feeders,
//!   release media, then delete the account document last.

use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::database::{AccountStore, FeedStore, PetStore};
use crate::error::{Error, Result};
use crate::middleware::CallerIdentity;
use crate::models::{Account, NewPet, Pet, PetUpdate};
use crate::storage::{self, MediaObject, MediaStore};

pub struct OwnershipCoordinator {
    accounts: Arc<dyn AccountStore>,
    pets: Arc<dyn PetStore>,
    feeds: Arc<dyn FeedStore>,
    media: Arc<dyn MediaStore>,
}

fn pet_not_found(pet_id: Uuid) -> Error {
    Error::not_found(format!("Pet{{id: {}}}", pet_id))
}

/// Load a pet the caller feeds. Pets fed only by others look absent.
pub(crate) async fn fed_pet(
    pets: &dyn PetStore,
    caller: &CallerIdentity,
    pet_id: Uuid,
) -> Result<Pet> {
    match pets.get(pet_id).await? {
        Some(pet) if pet.is_fed_by(caller.account_id) => Ok(pet),
        _ => Err(pet_not_found(pet_id)),
    }
}

impl OwnershipCoordinator {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        pets: Arc<dyn PetStore>,
        feeds: Arc<dyn FeedStore>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        Self {
            accounts,
            pets,
            feeds,
            media,
        }
    }

    async fn account(&self, caller: &CallerIdentity) -> Result<Account> {
        self.accounts
            .get(caller.account_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Account{{id: {}}}", caller.account_id)))
    }

    /// Create a pet with the caller as its only feeder.
    pub async fn add_pet(&self, caller: &CallerIdentity, new_pet: NewPet) -> Result<Pet> {
        let account = self.account(caller).await?;
        let pet = Pet::create(new_pet, account.id)?;

        self.pets.put(&pet).await?;
        if let Err(err) = self.accounts.add_pet(account.id, pet.id).await {
            tracing::error!(
                pet_id = %pet.id,
                account_id = %account.id,
                "pet stored but not linked to its account: {}",
                err
            );
            return Err(err.into());
        }

        tracing::info!(pet_id = %pet.id, account_id = %account.id, "pet created");
        Ok(pet)
    }

    /// Join an existing pet as a co-feeder.
    pub async fn accept_invite(&self, caller: &CallerIdentity, pet_id: Uuid) -> Result<Pet> {
        let account = self.account(caller).await?;
        if self.pets.get(pet_id).await?.is_none() {
            return Err(pet_not_found(pet_id));
        }

        self.pets.add_feeder(pet_id, account.id).await?;
        if let Err(err) = self.accounts.add_pet(account.id, pet_id).await {
            // Undo the pet side; a feeder the account does not list would
            // never be released by account deletion.
            if let Err(undo) = self.pets.remove_feeder(pet_id, account.id).await {
                tracing::error!(
                    pet_id = %pet_id,
                    account_id = %account.id,
                    "pet lists a feeder whose account does not list it: {}",
                    undo
                );
            }
            return Err(err.into());
        }

        tracing::info!(pet_id = %pet_id, account_id = %account.id, "feeder joined pet");
        fed_pet(self.pets.as_ref(), caller, pet_id).await
    }

    pub async fn get_pet(&self, caller: &CallerIdentity, pet_id: Uuid) -> Result<Pet> {
        fed_pet(self.pets.as_ref(), caller, pet_id).await
    }

    /// Every pet on the caller's account. A listed id with no pet behind it is
    /// reported as an internal error rather than skipped.
    pub async fn list_pets(&self, caller: &CallerIdentity) -> Result<Vec<Pet>> {
        let account = self.account(caller).await?;
        let ids: Vec<Uuid> = account.pets.iter().copied().collect();
        let pets = self.pets.get_list(&ids).await?;

        if pets.len() != ids.len() {
            let found: HashSet<Uuid> = pets.iter().map(|pet| pet.id).collect();
            let missing: Vec<String> = ids
                .iter()
                .filter(|id| !found.contains(*id))
                .map(ToString::to_string)
                .collect();
            tracing::error!(
                account_id = %account.id,
                missing = ?missing,
                "account references pets that do not exist"
            );
            return Err(Error::internal(format!(
                "Account{{id: {}}} references missing pets [{}]",
                account.id,
                missing.join(", ")
            )));
        }

        Ok(pets)
    }

    pub async fn update_pet(
        &self,
        caller: &CallerIdentity,
        pet_id: Uuid,
        updates: Vec<PetUpdate>,
    ) -> Result<Pet> {
        fed_pet(self.pets.as_ref(), caller, pet_id).await?;
        self.pets.update_fields(pet_id, &updates).await?;
        fed_pet(self.pets.as_ref(), caller, pet_id).await
    }

    pub async fn upload_pet_photo(
        &self,
        caller: &CallerIdentity,
        pet_id: Uuid,
        content_type: String,
        bytes: Vec<u8>,
    ) -> Result<Pet> {
        if bytes.is_empty() {
            return Err(Error::invalid_param("pet photo is empty"));
        }
        fed_pet(self.pets.as_ref(), caller, pet_id).await?;

        let object = MediaObject {
            path: storage::new_profile_path(storage::PET_DIR, pet_id),
            content_type,
            bytes,
        };
        let link = self.media.upload(object).await?;

        self.update_pet(caller, pet_id, vec![PetUpdate::Photo(link)]).await
    }

    /// The caller stops feeding the pet. The last feeder out deletes it.
    ///
    /// Also accepts a half-finished earlier attempt: the caller only has to be
    /// linked to the pet from one side.
    pub async fn remove_feeder(&self, caller: &CallerIdentity, pet_id: Uuid) -> Result<()> {
        let account = self.accounts.get(caller.account_id).await?;
        let pet = self.pets.get(pet_id).await?;

        let linked = account.as_ref().is_some_and(|a| a.has_pet(pet_id))
            || pet.as_ref().is_some_and(|p| p.is_fed_by(caller.account_id));
        if !linked {
            return Err(pet_not_found(pet_id));
        }

        self.accounts.remove_pet(caller.account_id, pet_id).await?;

        match self.pets.get(pet_id).await? {
            Some(pet) => self.release_feeder(&pet, caller.account_id).await,
            None => Ok(()),
        }
    }

    async fn release_feeder(&self, pet: &Pet, account_id: Uuid) -> Result<()> {
        let remaining = pet.feeders.iter().filter(|id| **id != account_id).count();
        if remaining == 0 {
            return self.delete_pet(pet).await;
        }

        self.pets.remove_feeder(pet.id, account_id).await?;
        tracing::info!(pet_id = %pet.id, account_id = %account_id, remaining, "feeder left pet");
        Ok(())
    }

    async fn delete_pet(&self, pet: &Pet) -> Result<()> {
        self.feeds.delete_all_for_pet(pet.id).await?;
        self.media.delete_dir(&pet.profile_dir()).await?;
        self.pets.delete(pet.id).await?;

        tracing::info!(pet_id = %pet.id, "pet deleted");
        Ok(())
    }

    /// Unwind every pet relation, then delete the account itself.
    pub async fn delete_account(&self, caller: &CallerIdentity) -> Result<()> {
        let account = self.account(caller).await?;
        let pet_ids: Vec<Uuid> = account.pets.iter().copied().collect();

        for pet_id in &pet_ids {
            self.pets.remove_feeder(*pet_id, account.id).await?;
        }

        for pet in self.pets.get_list(&pet_ids).await? {
            if pet.feeders.is_empty() {
                self.delete_pet(&pet).await?;
            }
        }

        self.media.delete_dir(&account.profile_dir()).await?;
        self.accounts.delete(account.id).await?;

        tracing::info!(account_id = %account.id, pets = pet_ids.len(), "account deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use std::collections::BTreeSet;
    use crate::models::{AccountCredential, Feed, NewFeed};
    use crate::storage::MemoryMediaStore;

    struct Fixture {
        coordinator: OwnershipCoordinator,
        store: Arc<MemoryStore>,
        media: Arc<MemoryMediaStore>,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let media = Arc::new(MemoryMediaStore::new());
            let coordinator = OwnershipCoordinator::new(
                store.clone(),
                store.clone(),
                store.clone(),
                media.clone(),
            );
            Self {
                coordinator,
                store,
                media,
            }
        }

        async fn account(&self, email: &str) -> CallerIdentity {
            let account = Account::new(
                email,
                email,
                AccountCredential::PasswordHash("$argon2id$stub".into()),
                None,
            )
            .unwrap();
            AccountStore::put(self.store.as_ref(), &account).await.unwrap();
            CallerIdentity {
                account_id: account.id,
            }
        }

        async fn pet(&self, id: Uuid) -> Option<Pet> {
            PetStore::get(self.store.as_ref(), id).await.unwrap()
        }

        async fn stored_account(&self, caller: &CallerIdentity) -> Option<Account> {
            AccountStore::get(self.store.as_ref(), caller.account_id).await.unwrap()
        }
    }

    fn new_pet(name: &str) -> NewPet {
        NewPet {
            name: name.into(),
            adopted: None,
            family: "cat".into(),
            species: "korean shorthair".into(),
        }
    }

    #[tokio::test]
    async fn add_pet_links_both_sides() {
        let fx = Fixture::new();
        let a = fx.account("a@x.com").await;

        let pet = fx.coordinator.add_pet(&a, new_pet("nabi")).await.unwrap();

        assert_eq!(pet.feeders, BTreeSet::from([a.account_id]));
        assert!(fx.stored_account(&a).await.unwrap().has_pet(pet.id));
        assert_eq!(fx.coordinator.list_pets(&a).await.unwrap(), vec![pet]);
    }

    #[tokio::test]
    async fn accept_invite_adds_a_co_feeder() {
        let fx = Fixture::new();
        let a = fx.account("a@x.com").await;
        let b = fx.account("b@x.com").await;
        let pet = fx.coordinator.add_pet(&a, new_pet("nabi")).await.unwrap();

        // not visible to b before joining
        assert!(matches!(fx.coordinator.get_pet(&b, pet.id).await, Err(Error::NotFound(_))));

        let joined = fx.coordinator.accept_invite(&b, pet.id).await.unwrap();
        assert_eq!(joined.feeders, BTreeSet::from([a.account_id, b.account_id]));
        assert!(fx.stored_account(&b).await.unwrap().has_pet(pet.id));

        let err = fx.coordinator.accept_invite(&b, Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn removing_a_non_last_feeder_keeps_the_pet() {
        let fx = Fixture::new();
        let a = fx.account("a@x.com").await;
        let b = fx.account("b@x.com").await;
        let pet = fx.coordinator.add_pet(&a, new_pet("nabi")).await.unwrap();
        fx.coordinator.accept_invite(&b, pet.id).await.unwrap();

        fx.coordinator.remove_feeder(&a, pet.id).await.unwrap();

        assert_eq!(fx.pet(pet.id).await.unwrap().feeders, BTreeSet::from([b.account_id]));
        assert!(!fx.stored_account(&a).await.unwrap().has_pet(pet.id));
    }

    #[tokio::test]
    async fn removing_the_last_feeder_deletes_pet_feeds_and_media() {
        let fx = Fixture::new();
        let a = fx.account("a@x.com").await;
        let pet = fx.coordinator.add_pet(&a, new_pet("nabi")).await.unwrap();
        fx.coordinator
            .upload_pet_photo(&a, pet.id, "image/png".into(), vec![1, 2, 3])
            .await
            .unwrap();
        let feed = Feed::create(
            pet.id,
            a.account_id,
            NewFeed {
                timestamp: None,
                amount: 30.0,
                unit: "g".into(),
            },
        )
        .unwrap();
        FeedStore::put(fx.store.as_ref(), &feed).await.unwrap();

        fx.coordinator.remove_feeder(&a, pet.id).await.unwrap();

        assert!(fx.pet(pet.id).await.is_none());
        assert!(FeedStore::get(fx.store.as_ref(), pet.id, feed.id).await.unwrap().is_none());
        assert!(fx.media.paths().await.is_empty());
        assert!(fx.coordinator.list_pets(&a).await.unwrap().is_empty());

        // nothing left to remove
        let err = fx.coordinator.remove_feeder(&a, pet.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn strangers_cannot_remove_themselves_from_a_pet() {
        let fx = Fixture::new();
        let a = fx.account("a@x.com").await;
        let b = fx.account("b@x.com").await;
        let pet = fx.coordinator.add_pet(&a, new_pet("nabi")).await.unwrap();

        let err = fx.coordinator.remove_feeder(&b, pet.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(fx.pet(pet.id).await.unwrap().feeders, BTreeSet::from([a.account_id]));
    }

    #[tokio::test]
    async fn interrupted_feeder_removal_resumes() {
        let fx = Fixture::new();
        let a = fx.account("a@x.com").await;
        let b = fx.account("b@x.com").await;
        let pet = fx.coordinator.add_pet(&a, new_pet("nabi")).await.unwrap();
        fx.coordinator.accept_invite(&b, pet.id).await.unwrap();

        fx.store.fail_next("pet.remove_feeder");
        assert!(fx.coordinator.remove_feeder(&a, pet.id).await.is_err());

        // account side already applied, pet side not
        assert!(!fx.stored_account(&a).await.unwrap().has_pet(pet.id));
        assert!(fx.pet(pet.id).await.unwrap().is_fed_by(a.account_id));

        fx.coordinator.remove_feeder(&a, pet.id).await.unwrap();
        assert_eq!(fx.pet(pet.id).await.unwrap().feeders, BTreeSet::from([b.account_id]));
    }

    #[tokio::test]
    async fn failed_join_leaves_no_feeder_behind() {
        let fx = Fixture::new();
        let a = fx.account("a@x.com").await;
        let b = fx.account("b@x.com").await;
        let pet = fx.coordinator.add_pet(&a, new_pet("nabi")).await.unwrap();

        fx.store.fail_next("account.add_pet");
        let err = fx.coordinator.accept_invite(&b, pet.id).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
        assert_eq!(fx.pet(pet.id).await.unwrap().feeders, BTreeSet::from([a.account_id]));
        assert!(!fx.stored_account(&b).await.unwrap().has_pet(pet.id));

        // b goes away, then the last real feeder leaves
        fx.coordinator.delete_account(&b).await.unwrap();
        fx.coordinator.remove_feeder(&a, pet.id).await.unwrap();
        assert!(fx.pet(pet.id).await.is_none());
    }

    #[tokio::test]
    async fn interrupted_pet_deletion_resumes() {
        let fx = Fixture::new();
        let a = fx.account("a@x.com").await;
        let pet = fx.coordinator.add_pet(&a, new_pet("nabi")).await.unwrap();

        fx.store.fail_next("pet.delete");
        assert!(fx.coordinator.remove_feeder(&a, pet.id).await.is_err());
        assert!(fx.pet(pet.id).await.is_some());

        fx.coordinator.remove_feeder(&a, pet.id).await.unwrap();
        assert!(fx.pet(pet.id).await.is_none());
    }

    #[tokio::test]
    async fn deleting_accounts_unwinds_shared_pets() {
        let fx = Fixture::new();
        let a = fx.account("a@x.com").await;
        let b = fx.account("b@x.com").await;
        let pet = fx.coordinator.add_pet(&a, new_pet("nabi")).await.unwrap();
        fx.coordinator.accept_invite(&b, pet.id).await.unwrap();

        fx.coordinator.delete_account(&a).await.unwrap();
        assert!(fx.stored_account(&a).await.is_none());
        assert_eq!(fx.pet(pet.id).await.unwrap().feeders, BTreeSet::from([b.account_id]));

        fx.coordinator.delete_account(&b).await.unwrap();
        assert!(fx.stored_account(&b).await.is_none());
        assert!(fx.pet(pet.id).await.is_none());
    }

    #[tokio::test]
    async fn interrupted_account_deletion_resumes() {
        let fx = Fixture::new();
        let a = fx.account("a@x.com").await;
        let solo = fx.coordinator.add_pet(&a, new_pet("nabi")).await.unwrap();
        let other = fx.coordinator.add_pet(&a, new_pet("dubu")).await.unwrap();

        fx.store.fail_next("pet.delete");
        assert!(fx.coordinator.delete_account(&a).await.is_err());

        // pets are handled before the account goes away
        assert!(fx.stored_account(&a).await.is_some());

        fx.coordinator.delete_account(&a).await.unwrap();
        assert!(fx.stored_account(&a).await.is_none());
        assert!(fx.pet(solo.id).await.is_none());
        assert!(fx.pet(other.id).await.is_none());
    }

    #[tokio::test]
    async fn dangling_pet_ids_are_reported() {
        let fx = Fixture::new();
        let a = fx.account("a@x.com").await;
        fx.coordinator.add_pet(&a, new_pet("nabi")).await.unwrap();
        AccountStore::add_pet(fx.store.as_ref(), a.account_id, Uuid::now_v7())
            .await
            .unwrap();

        let err = fx.coordinator.list_pets(&a).await.unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[tokio::test]
    async fn pet_updates_require_a_feeder() {
        let fx = Fixture::new();
        let a = fx.account("a@x.com").await;
        let b = fx.account("b@x.com").await;
        let pet = fx.coordinator.add_pet(&a, new_pet("nabi")).await.unwrap();

        let updated = fx
            .coordinator
            .update_pet(&a, pet.id, vec![PetUpdate::Name("dubu".into())])
            .await
            .unwrap();
        assert_eq!(updated.name, "dubu");

        let err = fx
            .coordinator
            .update_pet(&b, pet.id, vec![PetUpdate::Name("mine".into())])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
