use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Resource identifiers known to the portal.
///
/// These strings are the join key between UI gates and route guards, so they
/// are declared once here and referenced from both sides.
pub mod resources {
    pub const SECTORS: &str = "sectors";
    pub const SERVICES: &str = "services";
    pub const SERVICE_CATEGORIES: &str = "service-categories";
    pub const PROVIDERS: &str = "providers";
    pub const CLIENTS: &str = "clients";
    pub const SUBDIVISIONS: &str = "subdivisions";
    pub const REQUEST_TYPES: &str = "request-types";
    pub const DELIVERABLES: &str = "deliverables";
    pub const TEAMS: &str = "teams";
    pub const USERS: &str = "users";
    pub const ROLES: &str = "roles";
    pub const HOLIDAYS: &str = "holidays";
}

/// A lowercase, stable resource identifier (`[a-z0-9_-]+`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resource(String);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid resource identifier '{0}'")]
pub struct InvalidResource(pub String);

impl Resource {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_valid(s: &str) -> bool {
        !s.is_empty()
            && s.bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
    }
}

impl FromStr for Resource {
    type Err = InvalidResource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if Self::is_valid(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidResource(s.to_string()))
        }
    }
}

impl TryFrom<String> for Resource {
    type Error = InvalidResource;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if Self::is_valid(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidResource(value))
        }
    }
}

impl From<Resource> for String {
    fn from(value: Resource) -> Self {
        value.0
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_lowercase_identifiers() {
        assert!("sectors".parse::<Resource>().is_ok());
        assert!("service-categories".parse::<Resource>().is_ok());
        assert!("request_types2".parse::<Resource>().is_ok());
    }

    #[test]
    fn test_rejects_free_text() {
        assert!("Sectors".parse::<Resource>().is_err());
        assert!("sectors ".parse::<Resource>().is_err());
        assert!("".parse::<Resource>().is_err());
        assert!(serde_json::from_str::<Resource>("\"USERS\"").is_err());
    }
}
