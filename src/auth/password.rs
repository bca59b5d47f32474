use std::fmt;

use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

/// Argon2id cost: 19 MiB of memory, 2 passes, single lane.
const MEMORY_KIB: u32 = 19 * 1024;
const ITERATIONS: u32 = 2;
const PARALLELISM: u32 = 1;

#[derive(Debug, thiserror::Error)]
#[error("credential hashing failed: {0}")]
pub struct CredentialError(password_hash::Error);

fn hasher() -> Result<Argon2<'static>, CredentialError> {
    let params = Params::new(MEMORY_KIB, ITERATIONS, PARALLELISM, None).map_err(|e| {
        error!(error = %e, "argon2 params error");
        CredentialError(e.into())
    })?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Password of an account.
///
/// Only the PHC hash string is ever persisted. The plaintext is kept while the
/// request that supplied it is being validated and is dropped with the value.
#[derive(Clone)]
pub struct Credential {
    plaintext: Option<String>,
    hash: String,
}

impl Credential {
    pub fn set(plaintext: &str) -> Result<Self, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = hasher()?
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                CredentialError(e)
            })?
            .to_string();
        Ok(Self {
            plaintext: Some(plaintext.to_string()),
            hash,
        })
    }

    /// Rehydrates a credential loaded from storage.
    pub fn from_hash(hash: impl Into<String>) -> Self {
        Self {
            plaintext: None,
            hash: hash.into(),
        }
    }

    /// `Ok(false)` only when the candidate does not match; any other failure is an error.
    pub fn matches(&self, candidate: &str) -> Result<bool, CredentialError> {
        let parsed = PasswordHash::new(&self.hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            CredentialError(e)
        })?;
        // Parameters come from the stored hash, not from the current cost constants.
        match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => {
                error!(error = %e, "argon2 verify_password error");
                Err(CredentialError(e))
            }
        }
    }

    pub fn plaintext(&self) -> Option<&str> {
        self.plaintext.as_deref()
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("plaintext", &self.plaintext.as_ref().map(|_| "[redacted]"))
            .field("hash", &"[redacted]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let credential = Credential::set("Secur3P@ssw0rd!").expect("hashing should succeed");
        assert!(credential
            .matches("Secur3P@ssw0rd!")
            .expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let credential =
            Credential::set("correct-horse-battery-staple").expect("hashing should succeed");
        assert!(!credential
            .matches("wrong-password")
            .expect("verify should not error"));
    }

    #[test]
    fn stored_form_is_salted_argon2id() {
        let a = Credential::set("same-password").unwrap();
        let b = Credential::set("same-password").unwrap();
        assert!(a.hash().starts_with("$argon2id$"));
        assert!(!a.hash().contains("same-password"));
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn rehydrated_credential_has_no_plaintext_but_verifies() {
        let original = Credential::set("hunter2hunter2").unwrap();
        assert_eq!(original.plaintext(), Some("hunter2hunter2"));
        let stored = Credential::from_hash(original.hash());
        assert_eq!(stored.plaintext(), None);
        assert!(stored.matches("hunter2hunter2").unwrap());
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = Credential::from_hash("not-a-valid-hash")
            .matches("anything")
            .unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let credential = Credential::set("super-secret-pw").unwrap();
        let rendered = format!("{:?}", credential);
        assert!(!rendered.contains("super-secret-pw"));
        assert!(!rendered.contains("argon2id"));
    }
}
