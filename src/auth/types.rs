//! Wire types for the authentication service

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Authentication response for sign up and token grants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    /// The user data
    pub user: Option<User>,

    /// The access token
    #[serde(rename = "access_token")]
    pub access_token: Option<String>,

    /// The refresh token
    #[serde(rename = "refresh_token")]
    pub refresh_token: Option<String>,

    /// The token type
    #[serde(rename = "token_type")]
    pub token_type: Option<String>,

    /// Seconds until the access token lapses
    #[serde(rename = "expires_in")]
    pub expires_in: Option<i64>,

    /// Any error that occurred
    pub error: Option<String>,

    /// The error description
    #[serde(rename = "error_description")]
    pub error_description: Option<String>,
}

/// User data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// The user ID
    pub id: String,

    /// The app metadata
    #[serde(rename = "app_metadata", default)]
    pub app_metadata: HashMap<String, serde_json::Value>,

    /// The user metadata
    #[serde(rename = "user_metadata", default)]
    pub user_metadata: HashMap<String, serde_json::Value>,

    /// Sign-in providers linked to the account
    pub identities: Option<Vec<Identity>>,

    /// The user's email address
    pub email: Option<String>,

    /// When the email address was confirmed, if it has been
    #[serde(rename = "email_confirmed_at")]
    pub email_confirmed_at: Option<String>,

    /// The user's phone number
    pub phone: Option<String>,

    /// The last sign-in time
    #[serde(rename = "last_sign_in_at")]
    pub last_sign_in_at: Option<String>,

    /// The creation time
    #[serde(rename = "created_at")]
    pub created_at: Option<String>,

    /// The update time
    #[serde(rename = "updated_at")]
    pub updated_at: Option<String>,

    /// The authentication level role, not the portal role
    pub role: Option<String>,
}

/// One linked sign-in provider for an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// The identity ID
    pub id: String,

    /// The identity provider
    pub provider: String,

    /// The user ID
    #[serde(rename = "user_id")]
    pub user_id: String,

    /// The identity metadata
    pub identity_data: Option<HashMap<String, serde_json::Value>>,

    /// The creation time
    #[serde(rename = "created_at")]
    pub created_at: Option<String>,

    /// The update time
    #[serde(rename = "updated_at")]
    pub updated_at: Option<String>,

    /// The last sign-in time
    #[serde(rename = "last_sign_in_at")]
    pub last_sign_in_at: Option<String>,
}
