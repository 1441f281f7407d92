/// Password hashing and verification using Argon2id
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use once_cell::sync::Lazy;

use crate::error::{Error, Result};

/// Hash of a throwaway password with the default parameters. Verifying
/// against it costs the same as a real check.
static DECOY_HASH: Lazy<Option<String>> = Lazy::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(b"ohmnyom-decoy", &salt)
        .map(|hash| hash.to_string())
        .ok()
});

/// One-way password codec.
///
/// Hashes are PHC strings with a random per-password salt. Verification is
/// constant-time inside argon2, and every failure is the same
/// `Authentication` error so callers can't tell which check failed.
#[derive(Default, Clone)]
pub struct CredentialCodec {
    argon2: Argon2<'static>,
}

impl CredentialCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hash(&self, plaintext: &str) -> Result<String> {
        if plaintext.is_empty() {
            return Err(Error::invalid_param("password is empty"));
        }

        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| Error::internal(format!("password hashing failed: {}", e)))
    }

    pub fn verify(&self, hashed: &str, plaintext: &str) -> Result<()> {
        if hashed.is_empty() {
            self.burn(plaintext);
            return Err(Error::authentication("no stored password hash"));
        }

        let parsed = PasswordHash::new(hashed)
            .map_err(|_| Error::authentication("stored password hash is malformed"))?;

        self.argon2
            .verify_password(plaintext.as_bytes(), &parsed)
            .map_err(|_| Error::authentication("password mismatch"))
    }

    /// Fail a sign-in that has no account behind it, after the same amount
    /// of hashing work a real mismatch takes.
    pub fn reject(&self, plaintext: &str, reason: &'static str) -> Error {
        self.burn(plaintext);
        Error::authentication(reason)
    }

    fn burn(&self, plaintext: &str) {
        if let Some(parsed) = DECOY_HASH.as_deref().and_then(|h| PasswordHash::new(h).ok()) {
            let _ = self.argon2.verify_password(plaintext.as_bytes(), &parsed);
        }
    }
}
