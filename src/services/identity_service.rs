use serde::Serialize;
use std::sync::Arc;

use crate::auth::{CredentialCodec, TokenManager, TokenPurpose};
use crate::database::AccountStore;
use crate::error::{Error, Result};
use crate::models::{
    Account, AccountCredential, AccountView, OAuthIdentity, OAUTH_PROVIDER_GOOGLE,
    OAUTH_PROVIDER_KAKAO,
};

const SUPPORTED_PROVIDERS: &[&str] = &[OAUTH_PROVIDER_GOOGLE, OAUTH_PROVIDER_KAKAO];

/// A credential as presented by a client, before any hashing.
#[derive(Debug, Clone)]
pub enum Credential {
    Password(String),
    OAuth {
        provider: String,
        identity: OAuthIdentity,
    },
}

#[derive(Debug, Clone)]
pub struct SignUp {
    pub name: String,
    pub email: String,
    pub photo_url: Option<String>,
    pub credential: Credential,
}

/// Returned by every successful sign-up, sign-in and refresh.
#[derive(Debug, Clone, Serialize)]
pub struct SignReply {
    pub account: AccountView,
    pub token: String,
    pub refresh_token: String,
}

/// Resolves credentials to a unique account.
pub struct IdentityResolver {
    accounts: Arc<dyn AccountStore>,
    codec: CredentialCodec,
    tokens: Arc<TokenManager>,
}

impl IdentityResolver {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        codec: CredentialCodec,
        tokens: Arc<TokenManager>,
    ) -> Self {
        Self {
            accounts,
            codec,
            tokens,
        }
    }

    pub async fn sign_up(&self, request: SignUp) -> Result<SignReply> {
        if request.name.is_empty() || request.email.is_empty() {
            return Err(Error::invalid_param(format!(
                "name [{}], email [{}]",
                request.name, request.email
            )));
        }
        validate_credential(&request.credential)?;

        if self.accounts.get_by_email(&request.email).await?.is_some() {
            return Err(Error::already_exists(format!("email [{}]", request.email)));
        }

        let credential = match request.credential {
            Credential::Password(password) => {
                AccountCredential::PasswordHash(self.codec.hash(&password)?)
            }
            Credential::OAuth { provider, identity } => {
                if self
                    .accounts
                    .get_by_oauth(&provider, &identity.id)
                    .await?
                    .is_some()
                {
                    return Err(Error::already_exists(format!(
                        "{} identity is already bound",
                        provider
                    )));
                }
                AccountCredential::OAuth { provider, identity }
            }
        };

        let account = Account::new(&request.name, &request.email, credential, request.photo_url)?;
        self.accounts.put(&account).await?;

        tracing::info!(account_id = %account.id, "account signed up");
        self.reply(&account)
    }

    pub async fn sign_in(&self, email: &str, credential: Credential) -> Result<SignReply> {
        validate_credential(&credential)?;

        let account = match credential {
            Credential::Password(password) => {
                if email.is_empty() {
                    return Err(Error::invalid_param("email is empty"));
                }
                let account = self
                    .accounts
                    .get_by_email(email)
                    .await?
                    .ok_or_else(|| self.codec.reject(&password, "unknown email"))?;
                let hashed = account.password_hash.as_deref().unwrap_or_default();
                self.codec.verify(hashed, &password)?;
                account
            }
            Credential::OAuth { provider, identity } => self
                .accounts
                .get_by_oauth(&provider, &identity.id)
                .await?
                .ok_or_else(|| {
                    Error::not_found(format!("no account for {} identity", provider))
                })?,
        };

        tracing::info!(account_id = %account.id, "account signed in");
        self.reply(&account)
    }

    /// Trade a refresh token for a fresh pair of tokens.
    pub async fn refresh(&self, refresh_token: &str) -> Result<SignReply> {
        if refresh_token.is_empty() {
            return Err(Error::invalid_param("refresh token is empty"));
        }
        let account_id = self.tokens.verify_refresh(refresh_token)?;
        let account = self
            .accounts
            .get(account_id)
            .await?
            .ok_or_else(|| Error::authentication("refresh for a deleted account"))?;

        self.reply(&account)
    }

    fn reply(&self, account: &Account) -> Result<SignReply> {
        Ok(SignReply {
            account: account.view(),
            token: self.tokens.issue(account.id, TokenPurpose::Auth)?,
            refresh_token: self.tokens.issue(account.id, TokenPurpose::Refresh)?,
        })
    }
}

fn validate_credential(credential: &Credential) -> Result<()> {
    match credential {
        Credential::Password(password) if password.is_empty() => {
            Err(Error::invalid_param("password is empty"))
        }
        Credential::Password(_) => Ok(()),
        Credential::OAuth { provider, identity } => {
            if provider.is_empty() || identity.id.is_empty() {
                return Err(Error::invalid_param(format!(
                    "oauth provider [{}], id [{}]",
                    provider, identity.id
                )));
            }
            if !SUPPORTED_PROVIDERS.contains(&provider.as_str()) {
                return Err(Error::unimplemented(format!("oauth provider [{}]", provider)));
            }
            Ok(())
        }
    }
}
