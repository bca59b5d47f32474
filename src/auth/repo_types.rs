use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::auth::password::Credential;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Registered,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Registered => "registered",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "registered" => Ok(Role::Registered),
            other => anyhow::bail!("unknown role: {other}"),
        }
    }
}

/// User account. The credential never leaves the service in JSON.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub name: String,
    pub surname: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub credential: Credential,
    pub role: Role,
    pub activated: bool,
    pub version: i32,
}

impl User {
    /// Unsaved account; id, timestamps and version are assigned on insert.
    pub fn new(name: String, surname: String, email: String, credential: Credential) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: 0,
            created_at: now,
            updated_at: now,
            name,
            surname,
            email,
            credential,
            role: Role::Registered,
            activated: false,
            version: 0,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin && self.activated
    }
}

/// Row layout of the `users` table.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub activated: bool,
    pub version: i32,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            name: row.name,
            surname: row.surname,
            email: row.email,
            credential: Credential::from_hash(row.password_hash),
            role: row.role.parse()?,
            activated: row.activated,
            version: row.version,
        })
    }
}
