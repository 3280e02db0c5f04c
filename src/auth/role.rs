//! User roles recognised by the parcel API.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// The role attached to a session.
///
/// Roles are parsed case-insensitively and always rendered upper-case, which
/// is the form kept in durable storage.
///
/// # Example
///
/// ```rust
/// use parcel_api::Role;
///
/// let role: Role = "admin".parse().unwrap();
/// assert_eq!(role, Role::Admin);
/// assert_eq!(role.to_string(), "ADMIN");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// A customer who creates and tracks parcels.
    Customer,
    /// An administrator who updates parcel status and location.
    Admin,
}

impl Role {
    /// Returns the canonical upper-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "CUSTOMER",
            Self::Admin => "ADMIN",
        }
    }
}

/// Error returned when a role string is not recognised.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown role '{0}'. Expected 'CUSTOMER' or 'ADMIN'.")]
pub struct UnknownRoleError(pub String);

impl FromStr for Role {
    type Err = UnknownRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("customer") {
            Ok(Self::Customer)
        } else if trimmed.eq_ignore_ascii_case("admin") {
            Ok(Self::Admin)
        } else {
            Err(UnknownRoleError(s.to_string()))
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
