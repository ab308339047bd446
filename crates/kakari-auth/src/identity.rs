//! Identity service client.
//!
//! The service issues bearer tokens for a username/password pair and serves the
//! signed-in user's profile. All endpoints are relative to the configured API
//! base, e.g. `http://localhost:8000/api/v1`.

use crate::http::RequestDefaults;
use crate::types::{Registration, TokenPair, UserProfile};
use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use kakari_config::{Config, LoginEncoding};
use reqwest::Response;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

/// Operations the session lifecycle needs from the identity service.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// Exchange credentials for a token pair.
    async fn login(&self, username: &str, password: &str) -> AuthResult<TokenPair>;

    /// Fetch the profile of the user whose bearer token is attached.
    async fn fetch_profile(&self) -> AuthResult<UserProfile>;

    /// Create an account. Does not sign in.
    async fn register(&self, registration: &Registration) -> AuthResult<UserProfile>;
}

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

/// reqwest-backed [`IdentityApi`].
#[derive(Clone)]
pub struct IdentityClient {
    http_client: reqwest::Client,
    base_url: Url,
    defaults: RequestDefaults,
    login_encoding: LoginEncoding,
}

impl IdentityClient {
    pub fn new(base_url: Url, defaults: RequestDefaults) -> Self {
        Self::with_http_client(reqwest::Client::new(), base_url, defaults)
    }

    pub fn with_http_client(
        http_client: reqwest::Client,
        base_url: Url,
        defaults: RequestDefaults,
    ) -> Self {
        Self {
            http_client,
            base_url: with_trailing_slash(base_url),
            defaults,
            login_encoding: LoginEncoding::default(),
        }
    }

    /// Build a client for the configured API base and login encoding.
    pub fn from_config(config: &Config, defaults: RequestDefaults) -> AuthResult<Self> {
        Ok(Self::new(config.api_url()?, defaults).with_login_encoding(config.login_encoding))
    }

    pub fn with_login_encoding(mut self, encoding: LoginEncoding) -> Self {
        self.login_encoding = encoding;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> AuthResult<Url> {
        Ok(self.base_url.join(path)?)
    }
}

/// `Url::join` replaces the last path segment unless the base ends with `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Turn a non-success response into `AuthError::Http`.
async fn error_for_status(response: Response) -> AuthResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AuthError::Http {
        status: status.as_u16(),
        body,
    })
}

/// Human-readable reason from an error body. FastAPI-style services put it
/// under `detail`.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl IdentityApi for IdentityClient {
    async fn login(&self, username: &str, password: &str) -> AuthResult<TokenPair> {
        let url = self.endpoint("auth/login")?;
        debug!(url = %url, encoding = ?self.login_encoding, "Requesting token pair");

        let credentials = Credentials { username, password };
        let request = self.defaults.apply(self.http_client.post(url));
        let request = match self.login_encoding {
            LoginEncoding::Form => request.form(&credentials),
            LoginEncoding::Json => request.json(&credentials),
        };

        let response = request.send().await?;
        match error_for_status(response).await {
            Ok(response) => Ok(response.json().await?),
            Err(AuthError::Http { status, body }) if (400..500).contains(&status) => {
                warn!(status, "Identity service rejected credentials");
                Err(AuthError::InvalidCredentials(error_detail(&body)))
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_profile(&self) -> AuthResult<UserProfile> {
        let url = self.endpoint("user/me")?;
        debug!(url = %url, "Fetching user profile");

        let response = self.defaults.apply(self.http_client.get(url)).send().await?;
        let response = error_for_status(response).await?;
        Ok(response.json().await?)
    }

    async fn register(&self, registration: &Registration) -> AuthResult<UserProfile> {
        let url = self.endpoint("user/create")?;
        debug!(url = %url, email = %registration.email, "Creating account");

        let response = self
            .defaults
            .apply(self.http_client.post(url))
            .json(registration)
            .send()
            .await?;
        let response = error_for_status(response).await?;
        Ok(response.json().await?)
    }
}
