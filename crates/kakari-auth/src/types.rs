//! Records exchanged with the identity service.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Profile returned by the identity service's `/user/me`.
///
/// Kept as raw JSON: the service owns the schema, the client only reads a few
/// well-known fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserProfile(Value);

impl UserProfile {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The raw JSON record.
    pub fn as_json(&self) -> &Value {
        &self.0
    }

    pub fn into_json(self) -> Value {
        self.0
    }

    /// User id; the service has used both `user_id` and `id` for it.
    pub fn user_id(&self) -> Option<String> {
        ["user_id", "id"]
            .iter()
            .find_map(|field| match self.0.get(*field)? {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }

    pub fn email(&self) -> Option<&str> {
        self.str_field("email")
    }

    pub fn username(&self) -> Option<&str> {
        self.str_field("username")
    }

    /// Best human-readable label: first and last name, then `name`, then
    /// username, then email.
    pub fn display_name(&self) -> Option<String> {
        let full_name = [self.str_field("first_name"), self.str_field("last_name")]
            .into_iter()
            .flatten()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !full_name.is_empty() {
            return Some(full_name);
        }
        self.str_field("name")
            .or_else(|| self.username())
            .or_else(|| self.email())
            .map(str::to_string)
    }

    fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }
}

impl From<Value> for UserProfile {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Token pair returned by `POST /auth/login`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Account creation request for `POST /user/create`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
