//! In-memory session state mirroring the credential store.
//!
//! Every mutation holds the session lock for its whole store-write plus
//! publish step, so observers never see a snapshot the store disagrees with.

use crate::events::{EndReason, SessionEvent, EVENT_CHANNEL_CAPACITY};
use crate::refresh::RefreshGrant;
use crate::session_fsm::{SessionMachine, SessionMachineInput, SessionPhase};
use crate::{SessionError, SessionResult};
use credential_store::{CredentialPair, CredentialStore, Identity};
use parking_lot::Mutex;
use std::fmt;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// Observable view of the session.
#[derive(Clone, PartialEq)]
pub struct SessionSnapshot {
    pub identity: Option<Identity>,
    pub access_token: Option<String>,
    /// True only until the stored credentials have been read.
    pub loading: bool,
    pub phase: SessionPhase,
}

impl SessionSnapshot {
    fn loading() -> Self {
        Self {
            identity: None,
            access_token: None,
            loading: true,
            phase: SessionPhase::Loading,
        }
    }
}

impl fmt::Debug for SessionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSnapshot")
            .field("identity", &self.identity)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .field("loading", &self.loading)
            .field("phase", &self.phase)
            .finish()
    }
}

/// Outcome of committing a refresh grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RefreshCommit {
    /// The new access token was stored.
    Applied(String),
    /// The session changed while the refresh was in flight (login or
    /// logout). Carries whatever access token the session holds now.
    Superseded(Option<String>),
}

/// Session state shared by the signer, coordinator, hydrator and facade.
pub struct SessionState {
    store: CredentialStore,
    fsm: Mutex<SessionMachine>,
    snapshot: watch::Sender<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionState {
    /// Create session state in the `Loading` phase. Call [`restore`](Self::restore)
    /// to read the stored credentials.
    pub fn new(store: CredentialStore) -> Self {
        let (snapshot, _) = watch::channel(SessionSnapshot::loading());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            store,
            fsm: Mutex::new(SessionMachine::new()),
            snapshot,
            events,
        }
    }

    /// Read the credential store and leave the `Loading` phase.
    ///
    /// The identity is restored optimistically when both an access token and a
    /// cached identity exist; nothing is verified with the server here.
    pub fn restore(&self) -> SessionResult<SessionPhase> {
        let mut fsm = self.fsm.lock();

        let access_token = self.store.access_token()?;
        let identity = match self.store.load_identity() {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "Cached identity unreadable, starting anonymous");
                None
            }
        };

        let restored = access_token.is_some() && identity.is_some();
        let input = if restored {
            SessionMachineInput::SessionRestored
        } else {
            SessionMachineInput::NoSession
        };
        let phase = transition(&mut fsm, input)?;

        self.publish(&fsm, |snapshot| {
            snapshot.identity = if restored { identity } else { None };
            snapshot.access_token = access_token;
        });

        match self.snapshot.borrow().identity.as_ref() {
            Some(identity) => info!(user_id = %identity.id, "Session restored"),
            None => debug!("No stored session"),
        }

        Ok(phase)
    }

    // ==========================================
    // Observation
    // ==========================================

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        self.snapshot.borrow().phase
    }

    pub fn identity(&self) -> Option<Identity> {
        self.snapshot.borrow().identity.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.snapshot.borrow().loading
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    // ==========================================
    // Tokens
    // ==========================================

    /// The token every outbound call is signed with.
    pub fn access_token(&self) -> Option<String> {
        self.snapshot.borrow().access_token.clone()
    }

    /// Replace the access token in the store and in memory.
    pub fn set_access_token(&self, token: &str) -> SessionResult<()> {
        let fsm = self.fsm.lock();
        self.store.save_access_token(token)?;
        self.publish(&fsm, |snapshot| {
            snapshot.access_token = Some(token.to_string());
        });
        Ok(())
    }

    pub fn refresh_token(&self) -> SessionResult<Option<String>> {
        Ok(self.store.refresh_token()?)
    }

    // ==========================================
    // Mutations
    // ==========================================

    /// Adopt a full credential set. Replaces identity and both tokens.
    pub fn login(&self, identity: Identity, pair: CredentialPair) -> SessionResult<()> {
        let mut fsm = self.fsm.lock();

        self.store.save_session(&identity, &pair)?;
        transition(&mut fsm, SessionMachineInput::LoginSucceeded)?;

        info!(user_id = %identity.id, username = %identity.username, "Logged in");

        let user = identity.clone();
        self.publish(&fsm, |snapshot| {
            snapshot.identity = Some(identity);
            snapshot.access_token = Some(pair.access_token);
        });
        let _ = self.events.send(SessionEvent::LoggedIn { user });

        Ok(())
    }

    /// Replace the cached identity. Valid while a session exists, or while
    /// anonymous with a stored access token, which the identity then completes.
    pub fn update_identity(&self, identity: Identity) -> SessionResult<()> {
        let mut fsm = self.fsm.lock();

        let recovering = match SessionPhase::from(fsm.state()) {
            SessionPhase::Authenticated | SessionPhase::Refreshing => false,
            SessionPhase::Anonymous if self.snapshot.borrow().access_token.is_some() => true,
            _ => return Err(SessionError::NotLoggedIn),
        };

        self.store.save_identity(&identity)?;
        if recovering {
            transition(&mut fsm, SessionMachineInput::IdentityHydrated)?;
            info!(user_id = %identity.id, "Session completed from stored token");
        } else {
            debug!(user_id = %identity.id, "Identity updated");
        }

        let user = identity.clone();
        self.publish(&fsm, |snapshot| snapshot.identity = Some(identity));
        let _ = self.events.send(SessionEvent::IdentityUpdated { user });

        Ok(())
    }

    pub(crate) fn begin_refresh(&self) {
        let mut fsm = self.fsm.lock();
        if let Err(e) = transition(&mut fsm, SessionMachineInput::RefreshStarted) {
            debug!(error = %e, "Refresh started outside an authenticated session");
        }
        self.publish(&fsm, |_| {});
    }

    /// Store a refresh grant, unless the refresh token it was minted from is
    /// no longer the stored one. A storage error abandons the refresh and
    /// leaves the previous token in place.
    pub(crate) fn complete_refresh(
        &self,
        exchanged: &str,
        grant: &RefreshGrant,
    ) -> SessionResult<RefreshCommit> {
        let mut fsm = self.fsm.lock();

        match self.store_grant(exchanged, grant) {
            Ok(true) => {}
            Ok(false) => {
                debug!("Session changed during refresh, discarding grant");
                return Ok(RefreshCommit::Superseded(
                    self.snapshot.borrow().access_token.clone(),
                ));
            }
            Err(e) => {
                if let Err(e) = transition(&mut fsm, SessionMachineInput::RefreshAbandoned) {
                    debug!(error = %e, "Refresh abandoned outside a refresh cycle");
                }
                self.publish(&fsm, |_| {});
                return Err(e);
            }
        }

        if let Err(e) = transition(&mut fsm, SessionMachineInput::RefreshSucceeded) {
            debug!(error = %e, "Refresh completed outside a refresh cycle");
        }

        self.publish(&fsm, |snapshot| {
            snapshot.access_token = Some(grant.access_token.clone());
        });
        let _ = self.events.send(SessionEvent::TokenRefreshed);

        info!("Access token refreshed");
        Ok(RefreshCommit::Applied(grant.access_token.clone()))
    }

    /// Persist `grant` if `exchanged` is still the stored refresh token.
    fn store_grant(&self, exchanged: &str, grant: &RefreshGrant) -> SessionResult<bool> {
        if self.store.refresh_token()?.as_deref() != Some(exchanged) {
            return Ok(false);
        }

        match &grant.refresh_token {
            Some(rotated) => {
                let pair = CredentialPair::new(grant.access_token.as_str(), rotated.as_str());
                self.store.save(&pair)?;
                debug!("Refresh token rotated");
            }
            None => self.store.save_access_token(&grant.access_token)?,
        }

        Ok(true)
    }

    // ==========================================
    // Teardown
    // ==========================================

    /// Clear the store and the in-memory session, then announce the end of
    /// the session. Safe to call when already logged out; the `Ended` event is
    /// published every time.
    pub fn teardown(&self, reason: EndReason) {
        let mut fsm = self.fsm.lock();
        self.teardown_locked(&mut fsm, reason);
    }

    /// Tear down only if the stored refresh token is still `exchanged`.
    /// Returns false when the session was replaced or already ended.
    pub(crate) fn teardown_if_current(&self, exchanged: &str, reason: EndReason) -> bool {
        let mut fsm = self.fsm.lock();

        match self.store.refresh_token() {
            Ok(Some(current)) if current == exchanged => {
                self.teardown_locked(&mut fsm, reason);
                true
            }
            Ok(_) => false,
            Err(e) => {
                warn!(error = %e, "Could not read refresh token, ending session");
                self.teardown_locked(&mut fsm, reason);
                true
            }
        }
    }

    fn teardown_locked(&self, fsm: &mut SessionMachine, reason: EndReason) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear credential store");
        }
        if let Err(e) = transition(fsm, SessionMachineInput::TornDown) {
            warn!(error = %e, "Teardown transition rejected");
        }

        info!(reason = reason.as_str(), "Session ended");

        self.publish(fsm, |snapshot| {
            snapshot.identity = None;
            snapshot.access_token = None;
        });
        let _ = self.events.send(SessionEvent::ended(reason));
    }

    fn publish(&self, fsm: &SessionMachine, update: impl FnOnce(&mut SessionSnapshot)) {
        let phase = SessionPhase::from(fsm.state());
        self.snapshot.send_modify(|snapshot| {
            update(snapshot);
            snapshot.phase = phase;
            snapshot.loading = phase == SessionPhase::Loading;
        });
    }
}

fn transition(fsm: &mut SessionMachine, input: SessionMachineInput) -> SessionResult<SessionPhase> {
    let old_phase = SessionPhase::from(fsm.state());

    fsm.consume(&input).map_err(|_| {
        SessionError::InvalidStateTransition(format!(
            "Cannot apply {:?} in phase {:?}",
            input, old_phase
        ))
    })?;

    let new_phase = SessionPhase::from(fsm.state());
    if old_phase != new_phase {
        debug!(old_phase = ?old_phase, new_phase = ?new_phase, "Session phase transition");
    }

    Ok(new_phase)
}
