//! Session lifecycle state machine using rust-fsm.
//!
//! Tracks the session-wide phase. The credential store holds the data; this
//! machine holds what the session is currently doing with it.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │     Loading     │ (initial)
//! └────────┬────────┘
//!          │ SessionRestored / NoSession
//!          ▼
//! ┌─────────────────┐  LoginSucceeded   ┌─────────────────┐
//! │    Anonymous    │ ────────────────► │  Authenticated  │
//! └─────────────────┘  IdentityHydrated └────────┬────────┘
//!          ▲                                     │ RefreshStarted
//!          │                                     ▼
//!          │          TornDown          ┌─────────────────┐
//!          └─────────────────────────── │   Refreshing    │
//!                 (from any phase)      └────────┬────────┘
//!                                                │ RefreshSucceeded
//!                                                │ RefreshAbandoned
//!                                                ▼
//!                                          Authenticated
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Loading)

    Loading => {
        SessionRestored => Authenticated,
        NoSession => Anonymous,
        LoginSucceeded => Authenticated,
        TornDown => Anonymous
    },
    Anonymous => {
        LoginSucceeded => Authenticated,
        IdentityHydrated => Authenticated,
        TornDown => Anonymous
    },
    Authenticated => {
        RefreshStarted => Refreshing,
        LoginSucceeded => Authenticated,
        TornDown => Anonymous
    },
    Refreshing => {
        RefreshSucceeded => Authenticated,
        RefreshAbandoned => Authenticated,
        LoginSucceeded => Authenticated,
        TornDown => Anonymous
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Session phase for external consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Stored credentials have not been read yet.
    Loading,
    /// No session.
    Anonymous,
    /// Logged in.
    Authenticated,
    /// Logged in, access token being renewed.
    Refreshing,
}

impl SessionPhase {
    /// Returns true while a session exists, including during a refresh.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionPhase::Authenticated | SessionPhase::Refreshing)
    }
}

impl From<&SessionMachineState> for SessionPhase {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Loading => SessionPhase::Loading,
            SessionMachineState::Anonymous => SessionPhase::Anonymous,
            SessionMachineState::Authenticated => SessionPhase::Authenticated,
            SessionMachineState::Refreshing => SessionPhase::Refreshing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_loading() {
        let machine = SessionMachine::new();
        assert_eq!(*machine.state(), SessionMachineState::Loading);
    }

    #[test]
    fn test_restore_flows() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::SessionRestored).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Authenticated);

        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::NoSession).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Anonymous);
    }

    #[test]
    fn test_refresh_cycle() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::SessionRestored).unwrap();

        machine.consume(&SessionMachineInput::RefreshStarted).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Refreshing);

        machine.consume(&SessionMachineInput::RefreshSucceeded).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Authenticated);
    }

    #[test]
    fn test_refresh_abandoned_keeps_session() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::SessionRestored).unwrap();
        machine.consume(&SessionMachineInput::RefreshStarted).unwrap();

        machine.consume(&SessionMachineInput::RefreshAbandoned).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Authenticated);
        assert!(machine.consume(&SessionMachineInput::RefreshAbandoned).is_err());
    }

    #[test]
    fn test_hydrated_identity_authenticates() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::NoSession).unwrap();

        machine.consume(&SessionMachineInput::IdentityHydrated).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Authenticated);
    }

    #[test]
    fn test_teardown_from_every_phase() {
        let paths: [&[SessionMachineInput]; 4] = [
            &[],
            &[SessionMachineInput::NoSession],
            &[SessionMachineInput::LoginSucceeded],
            &[
                SessionMachineInput::LoginSucceeded,
                SessionMachineInput::RefreshStarted,
            ],
        ];

        for inputs in paths {
            let mut machine = SessionMachine::new();
            for input in inputs {
                machine.consume(input).unwrap();
            }
            machine.consume(&SessionMachineInput::TornDown).unwrap();
            assert_eq!(*machine.state(), SessionMachineState::Anonymous);
        }
    }

    #[test]
    fn test_cannot_refresh_without_session() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::NoSession).unwrap();

        assert!(machine.consume(&SessionMachineInput::RefreshStarted).is_err());
        assert!(machine.consume(&SessionMachineInput::RefreshSucceeded).is_err());
        assert_eq!(*machine.state(), SessionMachineState::Anonymous);
    }

    #[test]
    fn test_login_during_refresh_wins() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::LoginSucceeded).unwrap();
        machine.consume(&SessionMachineInput::RefreshStarted).unwrap();

        machine.consume(&SessionMachineInput::LoginSucceeded).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Authenticated);

        // The stale refresh can no longer complete.
        assert!(machine.consume(&SessionMachineInput::RefreshSucceeded).is_err());
    }

    #[test]
    fn test_phase_conversion() {
        assert_eq!(
            SessionPhase::from(&SessionMachineState::Loading),
            SessionPhase::Loading
        );
        assert_eq!(
            SessionPhase::from(&SessionMachineState::Anonymous),
            SessionPhase::Anonymous
        );
        assert_eq!(
            SessionPhase::from(&SessionMachineState::Authenticated),
            SessionPhase::Authenticated
        );
        assert_eq!(
            SessionPhase::from(&SessionMachineState::Refreshing),
            SessionPhase::Refreshing
        );
    }

    #[test]
    fn test_phase_is_authenticated() {
        assert!(!SessionPhase::Loading.is_authenticated());
        assert!(!SessionPhase::Anonymous.is_authenticated());
        assert!(SessionPhase::Authenticated.is_authenticated());
        assert!(SessionPhase::Refreshing.is_authenticated());
    }
}
