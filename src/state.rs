use std::sync::Arc;

use crate::auth::{CredentialCodec, TokenManager};
use crate::config::SecurityConfig;
use crate::database::{AccountStore, FeedStore, PetStore};
use crate::error::Result;
use crate::middleware::AuthorizationGate;
use crate::services::{AccountService, FeedService, IdentityResolver, OwnershipCoordinator};
use crate::storage::MediaStore;

/// Everything a handler can reach. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AuthorizationGate>,
    pub identity: Arc<IdentityResolver>,
    pub accounts: Arc<AccountService>,
    pub ownership: Arc<OwnershipCoordinator>,
    pub feeds: Arc<FeedService>,
    store: Arc<dyn AccountStore>,
}

impl AppState {
    /// Wire the services over one store backend and one media backend.
    pub fn new<S>(
        store: Arc<S>,
        media: Arc<dyn MediaStore>,
        security: &SecurityConfig,
    ) -> Result<Self>
    where
        S: AccountStore + PetStore + FeedStore + 'static,
    {
        let tokens = Arc::new(TokenManager::from_config(security)?);
        let codec = CredentialCodec::new();

        let gate = Arc::new(AuthorizationGate::new(
            tokens.clone(),
            security.bypass_methods.iter().cloned(),
        ));
        let identity = Arc::new(IdentityResolver::new(store.clone(), codec.clone(), tokens));
        let accounts = Arc::new(AccountService::new(store.clone(), media.clone(), codec));
        let ownership = Arc::new(OwnershipCoordinator::new(
            store.clone(),
            store.clone(),
            store.clone(),
            media,
        ));
        let feeds = Arc::new(FeedService::new(store.clone(), store.clone(), store.clone()));

        Ok(Self {
            gate,
            identity,
            accounts,
            ownership,
            feeds,
            store,
        })
    }

    /// Backend liveness for the health endpoint.
    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await?;
        Ok(())
    }
}
