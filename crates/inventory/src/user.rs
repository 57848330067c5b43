use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, Entity, UserId};

/// User role. Authorization decisions belong to the calling layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Staff,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
        }
    }
}

impl core::str::FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "staff" => Ok(Role::Staff),
            other => Err(DomainError::validation(format!("unknown role '{other}'"))),
        }
    }
}

/// Input for registering a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub role: Role,
}

/// A user that can act on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn register(id: UserId, new: NewUser, occurred_at: DateTime<Utc>) -> DomainResult<Self> {
        let username = new.username.trim();
        if username.is_empty() {
            return Err(DomainError::validation("username cannot be empty"));
        }
        let email = normalize_email(&new.email)?;
        Ok(Self {
            id,
            username: username.to_string(),
            email,
            role: new.role,
            is_active: true,
            created_at: occurred_at,
        })
    }
}

/// Trim and lowercase an email address, rejecting anything without a local
/// part and a dotted domain.
pub(crate) fn normalize_email(raw: &str) -> DomainResult<String> {
    let email = raw.trim().to_ascii_lowercase();
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.') =>
        {
            Ok(email)
        }
        _ => Err(DomainError::validation(format!("email '{}' is malformed", raw.trim()))),
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.is_active
    }
}
