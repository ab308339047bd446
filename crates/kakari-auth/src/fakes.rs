//! In-process stand-ins for the identity service, used by unit tests.

use crate::http::RequestDefaults;
use crate::identity::IdentityApi;
use crate::types::{Registration, TokenPair, UserProfile};
use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Scriptable [`IdentityApi`] that records the bearer header it was called with.
pub(crate) struct FakeIdentity {
    defaults: RequestDefaults,
    /// `None` answers `/user/me` with 401.
    pub profile: Mutex<Option<UserProfile>>,
    /// `None` rejects the credentials.
    pub tokens: Mutex<Option<TokenPair>>,
    pub profile_calls: AtomicUsize,
    pub login_calls: AtomicUsize,
    pub bearers_seen: Mutex<Vec<Option<String>>>,
}

impl FakeIdentity {
    pub fn new(defaults: RequestDefaults) -> Self {
        Self {
            defaults,
            profile: Mutex::new(None),
            tokens: Mutex::new(None),
            profile_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            bearers_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_profile(self, profile: UserProfile) -> Self {
        *self.profile.lock() = Some(profile);
        self
    }

    pub fn with_tokens(self, access_token: &str, refresh_token: &str) -> Self {
        *self.tokens.lock() = Some(TokenPair {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
        });
        self
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityApi for FakeIdentity {
    async fn login(&self, _username: &str, _password: &str) -> AuthResult<TokenPair> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.tokens
            .lock()
            .clone()
            .ok_or_else(|| AuthError::InvalidCredentials("Incorrect email or password".to_string()))
    }

    async fn fetch_profile(&self) -> AuthResult<UserProfile> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.bearers_seen.lock().push(self.defaults.authorization());
        tokio::task::yield_now().await;
        self.profile.lock().clone().ok_or_else(|| AuthError::Http {
            status: 401,
            body: r#"{"detail":"Could not validate credentials"}"#.to_string(),
        })
    }

    async fn register(&self, registration: &Registration) -> AuthResult<UserProfile> {
        Ok(UserProfile::new(serde_json::json!({
            "user_id": "new-user",
            "email": registration.email,
            "username": registration.username,
        })))
    }
}
