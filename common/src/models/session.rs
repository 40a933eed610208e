// common/src/models/session.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Campus role as issued by the BFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Faculty,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Student, Role::Faculty, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::Admin => "admin",
        }
    }

    /// Faculty-level write calls are also open to admins.
    pub fn is_faculty_or_admin(&self) -> bool {
        matches!(self, Role::Faculty | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role: {}", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "faculty" => Ok(Role::Faculty),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// A fully verified sign-in: bearer token plus the profile it was issued for.
///
/// The three fields only ever exist together; anything less is treated as
/// "no session" by every reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque bearer credential
    pub token: String,
    pub role: Role,
    /// Algorand account address the token was issued to
    pub address: String,
}

impl Session {
    pub fn new(token: impl Into<String>, role: Role, address: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            role,
            address: address.into(),
        }
    }

    /// Assemble a session from individually stored parts, rejecting partial state.
    pub fn from_parts(token: Option<String>, role: Option<Role>, address: Option<String>) -> Option<Self> {
        match (token, role, address) {
            (Some(token), Some(role), Some(address)) if !token.is_empty() && !address.is_empty() => {
                Some(Self { token, role, address })
            }
            _ => None,
        }
    }
}

/// Locally chosen role used to explore the UI without a wallet signature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewIdentity {
    pub enabled: bool,
    pub role: Option<Role>,
}

impl PreviewIdentity {
    pub fn with_role(role: Role) -> Self {
        Self {
            enabled: true,
            role: Some(role),
        }
    }

    /// Role that preview mode currently contributes, if any.
    pub fn active_role(&self) -> Option<Role> {
        if self.enabled {
            self.role
        } else {
            None
        }
    }
}
