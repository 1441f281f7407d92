use std::sync::Arc;

use crate::auth::CredentialCodec;
use crate::database::AccountStore;
use crate::error::{Error, Result};
use crate::middleware::CallerIdentity;
use crate::models::{AccountField, AccountUpdate, AccountView};
use crate::storage::{self, MediaObject, MediaStore};

/// Operations a signed-in caller runs on their own account.
pub struct AccountService {
    accounts: Arc<dyn AccountStore>,
    media: Arc<dyn MediaStore>,
    codec: CredentialCodec,
}

impl AccountService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        media: Arc<dyn MediaStore>,
        codec: CredentialCodec,
    ) -> Self {
        Self {
            accounts,
            media,
            codec,
        }
    }

    pub async fn get(&self, caller: &CallerIdentity) -> Result<AccountView> {
        self.accounts
            .get(caller.account_id)
            .await?
            .map(|account| account.view())
            .ok_or_else(|| Error::not_found(format!("Account{{id: {}}}", caller.account_id)))
    }

    /// Apply whitelisted updates. Passwords are re-hashed before they are stored.
    pub async fn update(
        &self,
        caller: &CallerIdentity,
        updates: Vec<AccountUpdate>,
    ) -> Result<AccountView> {
        let fields = updates
            .into_iter()
            .map(|update| -> Result<AccountField> {
                match update {
                    AccountUpdate::Name(name) => Ok(AccountField::Name(name)),
                    AccountUpdate::Password(password) => {
                        Ok(AccountField::PasswordHash(self.codec.hash(&password)?))
                    }
                    AccountUpdate::Photo(url) => Ok(AccountField::PhotoUrl(url)),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        for field in fields {
            self.accounts.update_field(caller.account_id, field).await?;
        }

        self.get(caller).await
    }

    /// Store a new profile photo and point the account at it.
    pub async fn upload_profile(
        &self,
        caller: &CallerIdentity,
        content_type: String,
        bytes: Vec<u8>,
    ) -> Result<AccountView> {
        if bytes.is_empty() {
            return Err(Error::invalid_param("profile photo is empty"));
        }

        let object = MediaObject {
            path: storage::new_profile_path(storage::USER_DIR, caller.account_id),
            content_type,
            bytes,
        };
        let link = self.media.upload(object).await?;

        self.update(caller, vec![AccountUpdate::Photo(link)]).await
    }

    /// Tokens are stateless, so there is nothing to revoke server-side.
    pub async fn sign_out(&self, caller: &CallerIdentity) -> Result<()> {
        tracing::info!(account_id = %caller.account_id, "account signed out");
        Ok(())
    }
}
