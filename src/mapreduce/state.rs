//! Pure pipeline state machine
//!
//! ```text
//! Idle ─Start─▶ Fetching ─Fetched─▶ Tokenizing ─Tokenized─▶ Mapping
//!                                                              │
//!                                                           Mapped
//!                                                              ▼
//!                Done ◀─Ranked─ Ranking ◀─Reduced─ Reducing ───┘
//! ```
//!
//! `Fail` moves any non-terminal state to `Failed`. `Done` and `Failed` accept
//! `Start` again so one coordinator can execute runs back to back.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    #[default]
    Idle,
    Fetching,
    Tokenizing,
    Mapping,
    Reducing,
    Ranking,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }

    /// Whether a new run may start from this state
    pub fn is_ready(&self) -> bool {
        matches!(
            self,
            PipelineState::Idle | PipelineState::Done | PipelineState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Fetching => "fetching",
            PipelineState::Tokenizing => "tokenizing",
            PipelineState::Mapping => "mapping",
            PipelineState::Reducing => "reducing",
            PipelineState::Ranking => "ranking",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEvent {
    Start,
    Fetched,
    Tokenized,
    Mapped,
    Reduced,
    Ranked,
    Fail,
}

/// Error type for state transitions
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Invalid transition from {from} with {event:?}")]
    InvalidTransition {
        from: PipelineState,
        event: PipelineEvent,
    },
}

/// Apply an event to the current state, rejecting illegal transitions
pub fn apply_event(
    state: PipelineState,
    event: PipelineEvent,
) -> Result<PipelineState, StateError> {
    use PipelineEvent as E;
    use PipelineState as S;

    match (state, event) {
        (s, E::Start) if s.is_ready() => Ok(S::Fetching),
        (S::Fetching, E::Fetched) => Ok(S::Tokenizing),
        (S::Tokenizing, E::Tokenized) => Ok(S::Mapping),
        (S::Mapping, E::Mapped) => Ok(S::Reducing),
        (S::Reducing, E::Reduced) => Ok(S::Ranking),
        (S::Ranking, E::Ranked) => Ok(S::Done),
        (s, E::Fail) if !s.is_terminal() => Ok(S::Failed),
        (from, event) => Err(StateError::InvalidTransition { from, event }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut state = PipelineState::Idle;
        for event in [
            PipelineEvent::Start,
            PipelineEvent::Fetched,
            PipelineEvent::Tokenized,
            PipelineEvent::Mapped,
            PipelineEvent::Reduced,
            PipelineEvent::Ranked,
        ] {
            state = apply_event(state, event).unwrap();
        }
        assert_eq!(state, PipelineState::Done);
    }

    #[test]
    fn test_fail_from_any_active_state() {
        for state in [
            PipelineState::Idle,
            PipelineState::Fetching,
            PipelineState::Tokenizing,
            PipelineState::Mapping,
            PipelineState::Reducing,
            PipelineState::Ranking,
        ] {
            assert_eq!(
                apply_event(state, PipelineEvent::Fail).unwrap(),
                PipelineState::Failed
            );
        }
    }

    #[test]
    fn test_terminal_states_cannot_fail_again() {
        assert!(apply_event(PipelineState::Done, PipelineEvent::Fail).is_err());
        assert!(apply_event(PipelineState::Failed, PipelineEvent::Fail).is_err());
    }

    #[test]
    fn test_restart_after_terminal() {
        assert_eq!(
            apply_event(PipelineState::Done, PipelineEvent::Start).unwrap(),
            PipelineState::Fetching
        );
        assert_eq!(
            apply_event(PipelineState::Failed, PipelineEvent::Start).unwrap(),
            PipelineState::Fetching
        );
    }

    #[test]
    fn test_skipping_stages_is_rejected() {
        assert!(apply_event(PipelineState::Fetching, PipelineEvent::Mapped).is_err());
        assert!(apply_event(PipelineState::Mapping, PipelineEvent::Start).is_err());
        assert!(apply_event(PipelineState::Idle, PipelineEvent::Ranked).is_err());
    }
}
