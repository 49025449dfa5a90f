//! Session and role handling

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Portal role attached to a signed-in user.
///
/// Resolved at login from the employee record matching the login
/// email. Accounts without an employee record are guardians.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access to every view
    Admin,

    /// Employee, payroll and intake management
    Hr,

    /// Read and update access to assigned students
    Educator,

    /// Read access to their own children
    Parent,
}

impl Role {
    /// Map a stored role string to a role, defaulting to Parent
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "admin" => Role::Admin,
            "hr" => Role::Hr,
            "educator" | "teacher" => Role::Educator,
            _ => Role::Parent,
        }
    }

    /// The stored string form of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Hr => "hr",
            Role::Educator => "educator",
            Role::Parent => "parent",
        }
    }

    /// Whether this role may manage employee and payroll records
    pub fn manages_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Hr)
    }
}

/// A signed-in portal session.
///
/// Issued by [`crate::Portal::login`] and cleared by
/// [`crate::Portal::logout`]; every table and storage request issued
/// while it is live carries its access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// The access token
    #[serde(rename = "access_token")]
    pub access_token: String,

    /// The refresh token
    #[serde(rename = "refresh_token")]
    pub refresh_token: String,

    /// The user ID
    #[serde(rename = "user_id")]
    pub user_id: String,

    /// The login email
    pub email: String,

    /// The resolved portal role
    pub role: Role,

    /// The token type
    #[serde(rename = "token_type")]
    pub token_type: String,

    /// Lifetime of the access token in seconds
    #[serde(rename = "expires_in")]
    pub expires_in: i64,

    /// The expiry timestamp
    #[serde(rename = "expires_at")]
    pub expires_at: Option<i64>,
}

impl Session {
    /// Create a new session expiring `expires_in` seconds from now
    pub fn new(
        access_token: String,
        refresh_token: String,
        user_id: String,
        email: String,
        role: Role,
        expires_in: i64,
    ) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_secs() as i64;

        Self {
            access_token,
            refresh_token,
            user_id,
            email,
            role,
            token_type: "bearer".to_string(),
            expires_in,
            expires_at: Some(now + expires_in),
        }
    }

    /// Whether the access token has already lapsed
    pub fn is_expired(&self) -> bool {
        if let Some(expires_at) = self.expires_at {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or(Duration::from_secs(0))
                .as_secs() as i64;

            now >= expires_at
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_labels_resolve_with_parent_fallback() {
        assert_eq!(Role::from_label("admin"), Role::Admin);
        assert_eq!(Role::from_label("HR"), Role::Hr);
        assert_eq!(Role::from_label("teacher"), Role::Educator);
        assert_eq!(Role::from_label("educator"), Role::Educator);
        assert_eq!(Role::from_label("volunteer"), Role::Parent);
        assert_eq!(Role::from_label(""), Role::Parent);
    }

    #[test]
    fn staff_management_is_admin_and_hr_only() {
        assert!(Role::Admin.manages_staff());
        assert!(Role::Hr.manages_staff());
        assert!(!Role::Educator.manages_staff());
        assert!(!Role::Parent.manages_staff());
    }

    #[test]
    fn fresh_sessions_are_not_expired() {
        let session = Session::new(
            "token".into(),
            "refresh".into(),
            "user-1".into(),
            "hr@beacon.org".into(),
            Role::Hr,
            3600,
        );
        assert!(!session.is_expired());

        let mut stale = session;
        stale.expires_at = Some(0);
        assert!(stale.is_expired());
    }
}
