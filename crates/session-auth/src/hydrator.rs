//! Identity hydrator.
//!
//! Re-fetches the canonical profile and reconciles it into the session.
//! Authorization failures are left to the coordinator: an expired token is
//! refreshed (or the session torn down) before this code sees a response.

use crate::client::AuthorizedClient;
use crate::state::SessionState;
use crate::{SessionError, SessionResult};
use credential_store::Identity;
use serde::Deserialize;
use tracing::debug;

/// Path of the profile endpoint, relative to the API base URL.
pub const PROFILE_PATH: &str = "/api/user/profile";

/// The profile endpoint answers with the bare identity; some deployments wrap
/// it as `{"user": ...}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProfileResponse {
    Wrapped { user: Identity },
    Bare(Identity),
}

impl From<ProfileResponse> for Identity {
    fn from(response: ProfileResponse) -> Self {
        match response {
            ProfileResponse::Wrapped { user } => user,
            ProfileResponse::Bare(user) => user,
        }
    }
}

/// Fetch the profile and replace the cached identity with it.
pub async fn hydrate(client: &AuthorizedClient, state: &SessionState) -> SessionResult<Identity> {
    if state.access_token().is_none() {
        return Err(SessionError::NotLoggedIn);
    }

    let profile: ProfileResponse = client.get_json(PROFILE_PATH).await?;
    let identity = Identity::from(profile);
    debug!(user_id = %identity.id, "Profile fetched");

    state.update_identity(identity.clone())?;
    Ok(identity)
}
