use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::error::{Error, Result};

const ALGORITHM: Algorithm = Algorithm::HS256;

/// What a token may be used for. Stored in the `sub` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    Auth,
    Refresh,
}

impl TokenPurpose {
    pub fn subject(self) -> &'static str {
        match self {
            TokenPurpose::Auth => "auth",
            TokenPurpose::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub uid: Uuid,
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies stateless HS256 session tokens.
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    auth_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenManager {
    pub fn new(
        secret: &str,
        issuer: impl Into<String>,
        auth_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<Self> {
        if secret.is_empty() {
            return Err(Error::invalid_param("token secret is empty"));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            auth_ttl,
            refresh_ttl,
        })
    }

    pub fn from_config(security: &SecurityConfig) -> Result<Self> {
        Self::new(
            &security.jwt_secret,
            security.jwt_issuer.clone(),
            Duration::hours(security.auth_token_hours),
            Duration::days(security.refresh_token_days),
        )
    }

    pub fn issue(&self, account_id: Uuid, purpose: TokenPurpose) -> Result<String> {
        self.issue_at(account_id, purpose, Utc::now())
    }

    pub(crate) fn issue_at(
        &self,
        account_id: Uuid,
        purpose: TokenPurpose,
        issued_at: DateTime<Utc>,
    ) -> Result<String> {
        let ttl = match purpose {
            TokenPurpose::Auth => self.auth_ttl,
            TokenPurpose::Refresh => self.refresh_ttl,
        };

        let claims = Claims {
            uid: account_id,
            iss: self.issuer.clone(),
            sub: purpose.subject().to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
        };

        encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| Error::internal(format!("token signing failed: {}", e)))
    }

    /// Verify an auth token and return the account it was issued to.
    pub fn verify(&self, token: &str) -> Result<Uuid> {
        self.verify_for(token, TokenPurpose::Auth)
    }

    /// Verify a refresh token and return the account it was issued to.
    pub fn verify_refresh(&self, token: &str) -> Result<Uuid> {
        self.verify_for(token, TokenPurpose::Refresh)
    }

    fn verify_for(&self, token: &str, purpose: TokenPurpose) -> Result<Uuid> {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.sub = Some(purpose.subject().to_string());

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims.uid)
            .map_err(|_| Error::authentication("token rejected"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> TokenManager {
        TokenManager::new("test-secret", "ohmnyom", Duration::hours(24), Duration::days(30)).unwrap()
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(TokenManager::new("", "ohmnyom", Duration::hours(1), Duration::hours(1)).is_err());
    }

    #[test]
    fn verify_returns_issued_account() {
        let tokens = manager();
        let id = Uuid::now_v7();

        let token = tokens.issue(id, TokenPurpose::Auth).unwrap();
        assert_eq!(tokens.verify(&token).unwrap(), id);
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = manager();
        let id = Uuid::now_v7();

        let stale = tokens
            .issue_at(id, TokenPurpose::Auth, Utc::now() - Duration::hours(25))
            .unwrap();
        let err = tokens.verify(&stale).unwrap_err();
        assert!(matches!(err, Error::Authentication { .. }));

        // refresh tokens outlive auth tokens
        let refresh = tokens
            .issue_at(id, TokenPurpose::Refresh, Utc::now() - Duration::hours(25))
            .unwrap();
        assert_eq!(tokens.verify_refresh(&refresh).unwrap(), id);
    }

    #[test]
    fn purposes_are_not_interchangeable() {
        let tokens = manager();
        let id = Uuid::now_v7();

        let refresh = tokens.issue(id, TokenPurpose::Refresh).unwrap();
        assert!(tokens.verify(&refresh).is_err());

        let auth = tokens.issue(id, TokenPurpose::Auth).unwrap();
        assert!(tokens.verify_refresh(&auth).is_err());
    }

    #[test]
    fn foreign_secret_issuer_and_algorithm_are_rejected() {
        let tokens = manager();
        let id = Uuid::now_v7();

        let other_secret =
            TokenManager::new("other-secret", "ohmnyom", Duration::hours(1), Duration::hours(1))
                .unwrap();
        assert!(tokens.verify(&other_secret.issue(id, TokenPurpose::Auth).unwrap()).is_err());

        let other_issuer =
            TokenManager::new("test-secret", "someone-else", Duration::hours(1), Duration::hours(1))
                .unwrap();
        assert!(tokens.verify(&other_issuer.issue(id, TokenPurpose::Auth).unwrap()).is_err());

        let claims = Claims {
            uid: id,
            iss: "ohmnyom".into(),
            sub: "auth".into(),
            iat: Utc::now().timestamp(),
            exp: (Utc::now() + Duration::hours(1)).timestamp(),
        };
        let hs512 = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert!(tokens.verify(&hs512).is_err());

        assert!(tokens.verify("not-a-token").is_err());
        assert!(tokens.verify("").is_err());
    }
}
