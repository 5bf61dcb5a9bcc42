use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Operator,
    Admin,
    SuperAdmin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Operator => "operator",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "operator" => Ok(Role::Operator),
            "admin" => Ok(Role::Admin),
            "super_admin" => Ok(Role::SuperAdmin),
            _ => Err(()),
        }
    }
}

/// The persisted record behind an API key. The raw key is shown exactly
/// once at creation time; afterward only `key_hash`/`key_prefix` exist
/// (spec.md §6 "API-key representation").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub key_id: String,
    pub key_hash: String,
    pub key_prefix: String,
    pub role: Role,
    pub department: Option<String>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub allowed_ips: Option<Vec<String>>,
}

impl ApiKey {
    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }
}

/// An authenticated caller, resolved from a presented API key. This is the
/// type passed down into the policy engine and pipelines — deliberately
/// thinner than `ApiKey` (no hash/prefix) since it represents "who is
/// calling now", not the stored credential record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub key_id: String,
    pub role: Role,
    pub department: Option<String>,
}

impl From<&ApiKey> for Principal {
    fn from(key: &ApiKey) -> Self {
        Principal {
            key_id: key.key_id.clone(),
            role: key.role,
            department: key.department.clone(),
        }
    }
}
