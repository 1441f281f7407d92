use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::storage;

pub const OAUTH_PROVIDER_GOOGLE: &str = "google";
pub const OAUTH_PROVIDER_KAKAO: &str = "kakao";

/// Identity issued by an OAuth provider. Unique per provider across all accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthIdentity {
    pub id: String,
    #[serde(default)]
    pub email: String,
}

/// How a new account proves who it is. The password variant carries the hash.
#[derive(Debug, Clone)]
pub enum AccountCredential {
    PasswordHash(String),
    OAuth {
        provider: String,
        identity: OAuthIdentity,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub oauth: BTreeMap<String, OAuthIdentity>,
    pub photo_url: Option<String>,
    pub signed_up: DateTime<Utc>,
    pub pets: BTreeSet<Uuid>,
}

impl Account {
    /// Build a fresh account with a time-ordered id and an empty pet set.
    pub fn new(
        name: &str,
        email: &str,
        credential: AccountCredential,
        photo_url: Option<String>,
    ) -> Result<Self> {
        if name.is_empty() || email.is_empty() {
            return Err(Error::invalid_param(format!(
                "name [{}], email [{}]",
                name, email
            )));
        }

        let mut account = Self {
            id: Uuid::now_v7(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: None,
            oauth: BTreeMap::new(),
            photo_url: photo_url.filter(|url| !url.is_empty()),
            signed_up: Utc::now(),
            pets: BTreeSet::new(),
        };

        match credential {
            AccountCredential::PasswordHash(hash) if !hash.is_empty() => {
                account.password_hash = Some(hash);
            }
            AccountCredential::OAuth { provider, identity }
                if !provider.is_empty() && !identity.id.is_empty() =>
            {
                account.oauth.insert(provider, identity);
            }
            _ => return Err(Error::invalid_param("password or oauth identity required")),
        }

        Ok(account)
    }

    /// An account must always hold a password hash, an OAuth identity, or both.
    pub fn has_credential(&self) -> bool {
        self.password_hash.as_deref().is_some_and(|h| !h.is_empty()) || !self.oauth.is_empty()
    }

    pub fn has_pet(&self, pet_id: Uuid) -> bool {
        self.pets.contains(&pet_id)
    }

    pub fn profile_dir(&self) -> String {
        storage::profile_dir(storage::USER_DIR, self.id)
    }

    pub fn view(&self) -> AccountView {
        AccountView {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            has_password: self.password_hash.is_some(),
            oauth: self.oauth.clone(),
            photo_url: self.photo_url.clone(),
            signed_up: self.signed_up,
            pets: self.pets.iter().copied().collect(),
        }
    }
}

/// Client-facing account. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub has_password: bool,
    pub oauth: BTreeMap<String, OAuthIdentity>,
    pub photo_url: Option<String>,
    pub signed_up: DateTime<Utc>,
    pub pets: Vec<Uuid>,
}

/// A single stored account column, as written by `AccountStore::update_field`.
#[derive(Debug, Clone, PartialEq)]
pub enum AccountField {
    Name(String),
    PasswordHash(String),
    PhotoUrl(String),
}

impl AccountField {
    pub fn apply(&self, account: &mut Account) {
        match self {
            AccountField::Name(name) => account.name = name.clone(),
            AccountField::PasswordHash(hash) => account.password_hash = Some(hash.clone()),
            AccountField::PhotoUrl(url) => account.photo_url = Some(url.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn google(id: &str) -> AccountCredential {
        AccountCredential::OAuth {
            provider: OAUTH_PROVIDER_GOOGLE.to_string(),
            identity: OAuthIdentity {
                id: id.to_string(),
                email: "a@gmail.com".to_string(),
            },
        }
    }

    #[test]
    fn new_account_with_password() {
        let account = Account::new(
            "A",
            "a@x.com",
            AccountCredential::PasswordHash("$argon2id$...".into()),
            None,
        )
        .unwrap();
        assert!(account.has_credential());
        assert!(account.oauth.is_empty());
        assert!(account.pets.is_empty());
    }

    #[test]
    fn new_account_with_oauth() {
        let account = Account::new("A", "a@x.com", google("g-1"), Some(String::new())).unwrap();
        assert!(account.password_hash.is_none());
        assert_eq!(account.oauth[OAUTH_PROVIDER_GOOGLE].id, "g-1");
        assert!(account.photo_url.is_none());
    }

    #[test]
    fn new_account_requires_a_credential() {
        let err = Account::new("A", "a@x.com", AccountCredential::PasswordHash(String::new()), None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParam(_)));

        let err = Account::new("A", "a@x.com", google(""), None).unwrap_err();
        assert!(matches!(err, Error::InvalidParam(_)));
    }

    #[test]
    fn new_account_requires_name_and_email() {
        let err = Account::new("", "a@x.com", google("g-1"), None).unwrap_err();
        assert!(matches!(err, Error::InvalidParam(_)));
        let err = Account::new("A", "", google("g-1"), None).unwrap_err();
        assert!(matches!(err, Error::InvalidParam(_)));
    }

    #[test]
    fn view_hides_password_hash() {
        let account = Account::new(
            "A",
            "a@x.com",
            AccountCredential::PasswordHash("secret-hash".into()),
            None,
        )
        .unwrap();
        let json = serde_json::to_string(&account.view()).unwrap();
        assert!(json.contains("\"has_password\":true"));
        assert!(!json.contains("secret-hash"));
    }
}
