//! Storage key constants.

/// Keys the credential store persists under.
///
/// The names are shared with the browser storefront so a session written by
/// one client can be read by the other.
pub struct StorageKeys;

impl StorageKeys {
    /// Serialized identity snapshot (JSON)
    pub const USER: &'static str = "user";

    /// Short-lived bearer credential
    pub const ACCESS_TOKEN: &'static str = "accessToken";

    /// Long-lived credential exchanged for new access tokens
    pub const REFRESH_TOKEN: &'static str = "refreshToken";

    /// Every key owned by the session, in write order.
    pub const SESSION_KEYS: [&'static str; 3] =
        [Self::USER, Self::ACCESS_TOKEN, Self::REFRESH_TOKEN];
}
