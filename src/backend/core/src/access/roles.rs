//! Caller roles and the request context carrying them.
//!
//! | Role   | Reads                                             | Admin actions |
//! |--------|---------------------------------------------------|---------------|
//! | Public | published, enabled, non-deleted entities only     | no            |
//! | Admin  | everything                                        | yes           |

use serde::Serialize;

use crate::config::AccessConfig;

/// Capability level of a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Public,
    Admin,
}

impl Role {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Admin => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// Who is asking. Threaded explicitly through every read and admin call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestContext {
    pub username: String,
    pub role: Role,
}

impl RequestContext {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }

    /// Resolve the role of an already-authenticated user: admin iff the name
    /// matches the configured admin username.
    pub fn for_user(username: impl Into<String>, access: &AccessConfig) -> Self {
        let username = username.into();
        let role = if username == access.admin_username {
            Role::Admin
        } else {
            Role::Public
        };
        Self { username, role }
    }

    pub fn public(username: impl Into<String>) -> Self {
        Self::new(username, Role::Public)
    }

    pub fn admin(username: impl Into<String>) -> Self {
        Self::new(username, Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_user_resolves_admin() {
        let access = AccessConfig::default();
        assert!(RequestContext::for_user("admin", &access).is_admin());
        assert!(!RequestContext::for_user("reader", &access).is_admin());
        assert!(!RequestContext::for_user("Admin", &access).is_admin());
    }

    #[test]
    fn test_for_user_honours_configured_admin() {
        let access = AccessConfig {
            admin_username: "root".to_string(),
        };
        assert!(RequestContext::for_user("root", &access).is_admin());
        assert!(!RequestContext::for_user("admin", &access).is_admin());
    }

    #[test]
    fn test_role_ids() {
        assert_eq!(Role::Public.id(), "public");
        assert_eq!(Role::Admin.id(), "admin");
    }
}
