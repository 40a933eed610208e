// client/src/guard.rs
//! Role-based access derived from the preview identity and the verified
//! session. Preview changes what is shown, never what may be written.

use common::{PreviewIdentity, Role, Session};

use crate::error::{ClientError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleAccess {
    /// Role used for presentation: active preview role, else the session role
    pub effective_role: Option<Role>,
    /// Role the BFF verified for the signed-in address
    pub chain_role: Option<Role>,
    pub is_authenticated: bool,
    pub role_mismatch: bool,
    pub can_write_as_faculty: bool,
    pub can_write_as_admin: bool,
}

impl RoleAccess {
    pub fn derive(preview: &PreviewIdentity, session: Option<&Session>) -> Self {
        let session_role = session.map(|s| s.role);
        let is_authenticated = session.is_some();
        let chain_role = if is_authenticated { session_role } else { None };

        let previewed = preview.active_role();
        let role_mismatch = match (previewed, session_role) {
            (Some(previewed), Some(verified)) => previewed != verified,
            _ => false,
        };

        Self {
            effective_role: previewed.or(session_role),
            chain_role,
            is_authenticated,
            role_mismatch,
            can_write_as_faculty: chain_role.map_or(false, |r| r.is_faculty_or_admin()),
            can_write_as_admin: chain_role == Some(Role::Admin),
        }
    }

    pub fn require_faculty_write(&self) -> Result<()> {
        if self.can_write_as_faculty {
            Ok(())
        } else {
            Err(ClientError::Forbidden(self.denial("faculty")))
        }
    }

    pub fn require_admin_write(&self) -> Result<()> {
        if self.can_write_as_admin {
            Ok(())
        } else {
            Err(ClientError::Forbidden(self.denial("admin")))
        }
    }

    fn denial(&self, needed: &str) -> String {
        match self.chain_role {
            None => format!("Sign in with a {} wallet to continue", needed),
            Some(role) => format!("{} access required (signed in as {})", needed, role),
        }
    }
}
