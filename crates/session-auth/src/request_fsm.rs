//! Per-call state machine for the unauthorized-response coordinator.
//!
//! Every logical call gets its own machine and retry marker. They live for
//! one request/response/replay sequence and are never persisted.
//!
//! ```text
//!   Sent ──Succeeded──► Success
//!     │ ──Failed─────► FailedOther
//!     │
//!     └─Unauthorized─► FailedUnauthorizedFirst ──RefreshDenied──► RefreshDenied
//!                              │
//!                              │ RefreshStarted (marker := Retrying)
//!                              ▼
//!                          Refreshing ──Succeeded──────────► RetriedSuccess
//!                                     ──Failed/Unauthorized─► RetriedFailure
//!                                     ──RefreshDenied───────► RefreshDenied
//! ```

use crate::{SessionError, SessionResult};
use rust_fsm::*;
use uuid::Uuid;

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub request_machine(Sent)

    Sent => {
        Succeeded => Success,
        Failed => FailedOther,
        Unauthorized => FailedUnauthorizedFirst
    },
    FailedUnauthorizedFirst => {
        RefreshStarted => Refreshing,
        RefreshDenied => RefreshDenied
    },
    Refreshing => {
        Succeeded => RetriedSuccess,
        Failed => RetriedFailure,
        Unauthorized => RetriedFailure,
        RefreshDenied => RefreshDenied
    }
}

pub use request_machine::Input as RequestInput;
pub use request_machine::State as RequestState;
pub use request_machine::StateMachine as RequestMachine;

/// Whether a call is on its original attempt or its single replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryMarker {
    Initial,
    Retrying,
}

/// One logical outbound call.
#[derive(Debug)]
pub struct InFlightCall {
    id: Uuid,
    marker: RetryMarker,
    machine: RequestMachine,
}

impl InFlightCall {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            marker: RetryMarker::Initial,
            machine: RequestMachine::new(),
        }
    }

    /// Correlation id, logged with every step of the call.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn marker(&self) -> RetryMarker {
        self.marker
    }

    pub fn state(&self) -> &RequestState {
        self.machine.state()
    }

    /// Whether the call has reached an outcome.
    pub fn is_settled(&self) -> bool {
        !matches!(
            self.machine.state(),
            RequestState::Sent | RequestState::FailedUnauthorizedFirst | RequestState::Refreshing
        )
    }

    /// Apply an input. Entering `Refreshing` sets the retry marker.
    pub fn advance(&mut self, input: RequestInput) -> SessionResult<&RequestState> {
        self.machine.consume(&input).map_err(|_| {
            SessionError::InvalidStateTransition(format!(
                "Cannot apply {:?} to call {} in state {:?}",
                input,
                self.id,
                self.machine.state()
            ))
        })?;

        if *self.machine.state() == RequestState::Refreshing {
            self.marker = RetryMarker::Retrying;
        }

        Ok(self.machine.state())
    }
}

impl Default for InFlightCall {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_call_is_initial() {
        let call = InFlightCall::new();
        assert_eq!(call.marker(), RetryMarker::Initial);
        assert_eq!(*call.state(), RequestState::Sent);
        assert!(!call.is_settled());
    }

    #[test]
    fn test_plain_success_and_failure() {
        let mut call = InFlightCall::new();
        call.advance(RequestInput::Succeeded).unwrap();
        assert_eq!(*call.state(), RequestState::Success);
        assert!(call.is_settled());

        let mut call = InFlightCall::new();
        call.advance(RequestInput::Failed).unwrap();
        assert_eq!(*call.state(), RequestState::FailedOther);
        assert_eq!(call.marker(), RetryMarker::Initial);
    }

    #[test]
    fn test_refresh_sets_retry_marker() {
        let mut call = InFlightCall::new();
        call.advance(RequestInput::Unauthorized).unwrap();
        assert_eq!(call.marker(), RetryMarker::Initial);

        call.advance(RequestInput::RefreshStarted).unwrap();
        assert_eq!(call.marker(), RetryMarker::Retrying);

        call.advance(RequestInput::Succeeded).unwrap();
        assert_eq!(*call.state(), RequestState::RetriedSuccess);
    }

    #[test]
    fn test_second_unauthorized_is_terminal() {
        let mut call = InFlightCall::new();
        call.advance(RequestInput::Unauthorized).unwrap();
        call.advance(RequestInput::RefreshStarted).unwrap();
        call.advance(RequestInput::Unauthorized).unwrap();
        assert_eq!(*call.state(), RequestState::RetriedFailure);

        // No second refresh cycle.
        assert!(matches!(
            call.advance(RequestInput::RefreshStarted),
            Err(SessionError::InvalidStateTransition(_))
        ));
    }

    #[test]
    fn test_refresh_denied_paths() {
        let mut call = InFlightCall::new();
        call.advance(RequestInput::Unauthorized).unwrap();
        call.advance(RequestInput::RefreshDenied).unwrap();
        assert_eq!(*call.state(), RequestState::RefreshDenied);

        let mut call = InFlightCall::new();
        call.advance(RequestInput::Unauthorized).unwrap();
        call.advance(RequestInput::RefreshStarted).unwrap();
        call.advance(RequestInput::RefreshDenied).unwrap();
        assert_eq!(*call.state(), RequestState::RefreshDenied);
    }

    #[test]
    fn test_cannot_refresh_before_unauthorized() {
        let mut call = InFlightCall::new();
        assert!(call.advance(RequestInput::RefreshStarted).is_err());
        assert_eq!(call.marker(), RetryMarker::Initial);
    }
}
