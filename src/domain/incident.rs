use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentLevel {
    #[default]
    Normal,
    Quarantine,
    Lockdown,
}

impl fmt::Display for IncidentLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IncidentLevel::Normal => "NORMAL",
            IncidentLevel::Quarantine => "QUARANTINE",
            IncidentLevel::Lockdown => "LOCKDOWN",
        };
        write!(f, "{s}")
    }
}

impl FromStr for IncidentLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NORMAL" => Ok(IncidentLevel::Normal),
            "QUARANTINE" => Ok(IncidentLevel::Quarantine),
            "LOCKDOWN" => Ok(IncidentLevel::Lockdown),
            _ => Err(()),
        }
    }
}

/// One row in the append-only incident-level history. Current level is
/// whichever row has the latest `changed_at` (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentState {
    pub level: IncidentLevel,
    pub changed_by_key_id: Option<String>,
    pub reason: Option<String>,
    pub changed_at: DateTime<Utc>,
}
