//! Account authentication
//!
//! Login and signup against the backend's shared auth endpoints. Both return
//! the same `{ user, token }` shape; the bearer token authorizes uploads.

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ApiConfig;
use crate::util::errors::{FreewayError, FreewayResult};
use crate::util::http::error_for_status;

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Both fields must be non-empty before any request is made.
    fn validate(&self) -> FreewayResult<()> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(FreewayError::Validation(
                "email and password are required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub email: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    user: AuthUser,
    token: String,
}

/// A logged-in account: the user record plus its bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub user: AuthUser,
    pub token: String,
}

pub struct AuthService {
    client: reqwest::Client,
    config: ApiConfig,
}

impl AuthService {
    pub fn new(config: ApiConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: ApiConfig) -> Self {
        Self { client, config }
    }

    pub async fn login(&self, credentials: &Credentials) -> FreewayResult<AuthSession> {
        self.authenticate(self.config.login_url(), credentials).await
    }

    pub async fn signup(&self, credentials: &Credentials) -> FreewayResult<AuthSession> {
        self.authenticate(self.config.signup_url(), credentials).await
    }

    async fn authenticate(
        &self,
        endpoint: String,
        credentials: &Credentials,
    ) -> FreewayResult<AuthSession> {
        credentials.validate()?;

        let response = self.client.post(&endpoint).json(credentials).send().await?;
        let response = error_for_status(response).await?;
        let auth: AuthResponse = response.json().await?;
        debug!("Authenticated as {}", auth.user.email);

        Ok(AuthSession {
            user: auth.user,
            token: auth.token,
        })
    }
}
