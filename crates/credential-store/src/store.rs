//! Typed API over the raw key/value storage.

use crate::{CredentialPair, Identity, SecureStorage, StorageError, StorageKeys, StorageResult};
use tracing::{debug, warn};

/// Durable holder of the identity snapshot and the credential pair.
///
/// This is deliberately dumb: no token validation, no expiry checks. It only
/// keeps the three session keys consistent on login and logout.
pub struct CredentialStore {
    storage: Box<dyn SecureStorage>,
}

impl CredentialStore {
    /// Create a new credential store with the given storage backend
    pub fn new(storage: Box<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    // ==========================================
    // Credential pair
    // ==========================================

    /// Load the stored pair. `None` unless both tokens are present.
    pub fn load(&self) -> StorageResult<Option<CredentialPair>> {
        let access_token = self.access_token()?;
        let refresh_token = self.refresh_token()?;

        match (access_token, refresh_token) {
            (Some(access_token), Some(refresh_token)) => Ok(Some(CredentialPair {
                access_token,
                refresh_token,
            })),
            (Some(_), None) => {
                warn!("Access token stored without a refresh token");
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Store both tokens together
    pub fn save(&self, pair: &CredentialPair) -> StorageResult<()> {
        self.storage.set_many(&[
            (StorageKeys::ACCESS_TOKEN, pair.access_token.as_str()),
            (StorageKeys::REFRESH_TOKEN, pair.refresh_token.as_str()),
        ])
    }

    /// Retrieve the access token
    pub fn access_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::ACCESS_TOKEN)
    }

    /// Replace the access token only (refresh cycle)
    pub fn save_access_token(&self, token: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::ACCESS_TOKEN, token)
    }

    /// Retrieve the refresh token
    pub fn refresh_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::REFRESH_TOKEN)
    }

    /// Replace the refresh token (rotation)
    pub fn save_refresh_token(&self, token: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::REFRESH_TOKEN, token)
    }

    // ==========================================
    // Identity
    // ==========================================

    /// Retrieve the cached identity snapshot
    pub fn load_identity(&self) -> StorageResult<Option<Identity>> {
        match self.storage.get(StorageKeys::USER)? {
            Some(json) => {
                let identity = serde_json::from_str(&json)
                    .map_err(|e| StorageError::Encoding(e.to_string()))?;
                Ok(Some(identity))
            }
            None => Ok(None),
        }
    }

    /// Replace the cached identity snapshot
    pub fn save_identity(&self, identity: &Identity) -> StorageResult<()> {
        self.storage.set(StorageKeys::USER, &encode_identity(identity)?)
    }

    // ==========================================
    // Whole session
    // ==========================================

    /// Store identity and both tokens in one write (login). On error the
    /// previous session is left as it was.
    pub fn save_session(&self, identity: &Identity, pair: &CredentialPair) -> StorageResult<()> {
        let user = encode_identity(identity)?;
        self.storage.set_many(&[
            (StorageKeys::USER, user.as_str()),
            (StorageKeys::ACCESS_TOKEN, pair.access_token.as_str()),
            (StorageKeys::REFRESH_TOKEN, pair.refresh_token.as_str()),
        ])?;
        debug!(user_id = %identity.id, "Session stored");
        Ok(())
    }

    /// Check if an access token and an identity snapshot are both stored
    pub fn has_session(&self) -> StorageResult<bool> {
        let has_token = self.storage.has(StorageKeys::ACCESS_TOKEN)?;
        let has_user = self.storage.has(StorageKeys::USER)?;
        Ok(has_token && has_user)
    }

    /// Remove all three session keys in one write. Missing keys are not an
    /// error, so this is safe to call repeatedly.
    pub fn clear(&self) -> StorageResult<()> {
        self.storage
            .delete_many(&StorageKeys::SESSION_KEYS)
            .inspect_err(|e| warn!(error = %e, "Failed to delete session keys"))
    }
}

fn encode_identity(identity: &Identity) -> StorageResult<String> {
    serde_json::to_string(identity).map_err(|e| StorageError::Encoding(e.to_string()))
}
