//! Authentication against the hosted identity service

mod session;
mod store;
mod types;

use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::Error;
use crate::fetch::{Fetch, CLIENT_INFO};

pub use session::{Role, Session};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};
pub use types::{AuthResponse, Identity, User};

/// Client for the authentication service.
///
/// Holds the current [`Session`] once a user signs in; the portal
/// reads it from here when attaching tokens to table and storage
/// requests.
#[derive(Clone)]
pub struct Auth {
    /// The base URL for the backend project
    url: String,

    /// The anonymous API key for the backend project
    key: String,

    /// Connection pool shared with the rest of the portal
    client: Client,

    /// The current session
    session: Arc<Mutex<Option<Session>>>,
}

impl Auth {
    /// Create a new Auth client
    pub(crate) fn new(url: &str, key: &str, client: Client) -> Self {
        Self {
            url: url.to_string(),
            key: key.to_string(),
            client,
            session: Arc::new(Mutex::new(None)),
        }
    }

    fn get_auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.url, path)
    }

    /// Sign up a new user with email and password.
    ///
    /// Used by admins when provisioning a login for a new employee or
    /// guardian; the portal role still comes from the employee record.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthResponse, Error> {
        let url = self.get_auth_url("/signup");

        let mut body = HashMap::new();
        body.insert("email".to_string(), email.to_string());
        body.insert("password".to_string(), password.to_string());

        let result = Fetch::post(&self.client, &url)
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO)
            .json(&body)?
            .execute::<AuthResponse>()
            .await?;

        Ok(result)
    }

    /// Exchange email and password for tokens.
    ///
    /// Returns the raw grant; [`crate::Portal::login`] turns it into a
    /// [`Session`] with the resolved portal role.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse, Error> {
        let url = self.get_auth_url("/token?grant_type=password");

        let mut body = HashMap::new();
        body.insert("email".to_string(), email.to_string());
        body.insert("password".to_string(), password.to_string());

        let result = Fetch::post(&self.client, &url)
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO)
            .json(&body)?
            .execute::<AuthResponse>()
            .await?;

        Ok(result)
    }

    /// Exchange a refresh token for fresh tokens
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, Error> {
        let url = self.get_auth_url("/token?grant_type=refresh_token");

        let mut body = HashMap::new();
        body.insert("refresh_token".to_string(), refresh_token.to_string());

        let result = Fetch::post(&self.client, &url)
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO)
            .json(&body)?
            .execute::<AuthResponse>()
            .await?;

        Ok(result)
    }

    /// Sign out the current user and clear the held session
    pub async fn sign_out(&self) -> Result<(), Error> {
        let url = self.get_auth_url("/logout");

        let token = {
            let current_session = self.session.lock().unwrap();
            match *current_session {
                Some(ref session) => session.access_token.clone(),
                None => return Err(Error::auth("Not logged in")),
            }
        };

        let response = Fetch::post(&self.client, &url)
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO)
            .bearer_auth(&token)
            .execute_raw()
            .await?;

        if !response.status().is_success() {
            return Err(Error::auth(format!(
                "Logout failed with status {}",
                response.status()
            )));
        }

        let mut current_session = self.session.lock().unwrap();
        *current_session = None;

        Ok(())
    }

    /// Send a password recovery email
    pub async fn reset_password_for_email(&self, email: &str) -> Result<(), Error> {
        let url = self.get_auth_url("/recover");

        let mut body = HashMap::new();
        body.insert("email".to_string(), email.to_string());

        let response = Fetch::post(&self.client, &url)
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO)
            .json(&body)?
            .execute_raw()
            .await?;

        if !response.status().is_success() {
            return Err(Error::auth(format!(
                "Password recovery failed with status {}",
                response.status()
            )));
        }

        Ok(())
    }

    /// Fetch the account record behind the current access token
    pub async fn get_user(&self) -> Result<User, Error> {
        let url = self.get_auth_url("/user");

        let token = {
            let current_session = self.session.lock().unwrap();
            match *current_session {
                Some(ref session) => session.access_token.clone(),
                None => return Err(Error::auth("Not logged in")),
            }
        };

        let user = Fetch::get(&self.client, &url)
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO)
            .bearer_auth(&token)
            .execute::<User>()
            .await?;

        Ok(user)
    }

    /// Get the current session
    pub fn get_session(&self) -> Option<Session> {
        let current_session = self.session.lock().unwrap();
        current_session.clone()
    }

    /// Set the session
    pub fn set_session(&self, session: Session) {
        let mut current_session = self.session.lock().unwrap();
        *current_session = Some(session);
    }

    /// Drop the session without calling the service
    pub fn clear_session(&self) {
        let mut current_session = self.session.lock().unwrap();
        *current_session = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_session() -> Session {
        Session::new(
            "token-1".to_string(),
            "refresh-1".to_string(),
            "user-1".to_string(),
            "admin@beacon.org".to_string(),
            Role::Admin,
            3600,
        )
    }

    #[test]
    fn sign_in_returns_the_raw_grant() {
        tokio_test::block_on(async {
            let server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/auth/v1/token"))
                .and(header("apikey", "test-key"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "access_token": "grant-token",
                    "refresh_token": "grant-refresh",
                    "token_type": "bearer",
                    "expires_in": 3600,
                    "user": {"id": "user-9"}
                })))
                .mount(&server)
                .await;

            let auth = Auth::new(&server.uri(), "test-key", Client::new());
            let grant = auth.sign_in("admin@beacon.org", "secret").await.unwrap();

            assert_eq!(grant.access_token.as_deref(), Some("grant-token"));
            assert_eq!(grant.user.unwrap().id, "user-9");
            assert!(grant.error.is_none());
        });
    }

    #[test]
    fn rejected_grants_carry_the_service_error() {
        tokio_test::block_on(async {
            let server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/auth/v1/token"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "error": "invalid_grant",
                    "error_description": "Invalid login credentials"
                })))
                .mount(&server)
                .await;

            let auth = Auth::new(&server.uri(), "test-key", Client::new());
            let grant = auth.sign_in("admin@beacon.org", "wrong").await.unwrap();

            assert_eq!(
                grant.error_description.as_deref(),
                Some("Invalid login credentials")
            );
            assert!(grant.access_token.is_none());
        });
    }

    #[test]
    fn sign_out_needs_a_session_and_drops_it() {
        tokio_test::block_on(async {
            let server = MockServer::start().await;

            Mock::given(method("POST"))
                .and(path("/auth/v1/logout"))
                .respond_with(ResponseTemplate::new(204))
                .mount(&server)
                .await;

            let auth = Auth::new(&server.uri(), "test-key", Client::new());
            assert!(matches!(auth.sign_out().await, Err(Error::Auth(_))));

            auth.set_session(sample_session());
            auth.sign_out().await.unwrap();
            assert!(auth.get_session().is_none());
        });
    }
}
