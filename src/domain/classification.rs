use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of data classifications. Ordered least to most sensitive —
/// the ordering itself is not load-bearing for any decision in this crate,
/// only the exhaustive match at every branch point is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Public,
    Internal,
    Confidential,
    Secret,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Classification::Public => "PUBLIC",
            Classification::Internal => "INTERNAL",
            Classification::Confidential => "CONFIDENTIAL",
            Classification::Secret => "SECRET",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Classification {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PUBLIC" => Ok(Classification::Public),
            "INTERNAL" => Ok(Classification::Internal),
            "CONFIDENTIAL" => Ok(Classification::Confidential),
            "SECRET" => Ok(Classification::Secret),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_from_str() {
        for c in [
            Classification::Public,
            Classification::Internal,
            Classification::Confidential,
            Classification::Secret,
        ] {
            assert_eq!(Classification::from_str(&c.to_string()), Ok(c));
        }
    }

    #[test]
    fn rejects_unknown_classification() {
        assert!(Classification::from_str("TOP_SECRET").is_err());
    }
}
