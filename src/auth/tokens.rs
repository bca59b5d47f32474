use std::time::Duration;

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use serde::Serialize;
use sha2::{Digest, Sha256};
use time::{Duration as TimeDuration, OffsetDateTime};

use crate::validator::Validator;

/// Random bytes per token.
const TOKEN_ENTROPY_BYTES: usize = 32;

/// Encoded length of a token plaintext (unpadded base64url of 32 bytes).
pub const TOKEN_PLAINTEXT_LEN: usize = 43;

/// Purpose a token was issued for. A token only resolves under its own scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Activation,
    Authentication,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Activation => "activation",
            Scope::Authentication => "authentication",
        }
    }
}

/// Persisted form of a bearer token. The plaintext is not part of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub hash: [u8; 32],
    pub user_id: i64,
    pub expiry: OffsetDateTime,
    pub scope: Scope,
}

impl AuthToken {
    /// Returns the plaintext to hand to the caller once, and the token to persist.
    pub fn generate(
        user_id: i64,
        ttl: Duration,
        scope: Scope,
    ) -> anyhow::Result<(String, AuthToken)> {
        let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| anyhow::anyhow!("failed to generate token: {e}"))?;
        let plaintext = Base64UrlUnpadded::encode_string(&bytes);

        let expiry = TimeDuration::try_from(ttl)
            .ok()
            .and_then(|ttl| OffsetDateTime::now_utc().checked_add(ttl))
            .ok_or_else(|| anyhow::anyhow!("token ttl of {ttl:?} is out of range"))?;
        let token = AuthToken {
            hash: hash_token(&plaintext),
            user_id,
            expiry,
            scope,
        };
        Ok((plaintext, token))
    }

    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expiry <= now
    }
}

/// Lookup key for a token plaintext.
pub fn hash_token(plaintext: &str) -> [u8; 32] {
    Sha256::digest(plaintext.as_bytes()).into()
}

pub fn validate_token_plaintext(v: &mut Validator, plaintext: &str) {
    v.check(!plaintext.is_empty(), "token", "must be provided");
    v.check(
        plaintext.len() == TOKEN_PLAINTEXT_LEN,
        "token",
        "must be 43 bytes long",
    );
}

/// Token returned to a caller after authentication.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expiry: OffsetDateTime,
}
