//! Storage key constants.

/// Storage keys used for the persisted session.
pub struct StorageKeys;

impl StorageKeys {
    /// Bearer access token
    pub const ACCESS_TOKEN: &'static str = "accessToken";

    /// Refresh token issued alongside the access token
    pub const REFRESH_TOKEN: &'static str = "refreshToken";

    /// Every key that makes up a session, in write order.
    pub const SESSION: [&'static str; 2] = [Self::ACCESS_TOKEN, Self::REFRESH_TOKEN];
}
