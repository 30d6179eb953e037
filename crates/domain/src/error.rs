//! Error kinds surfaced across the orchestrator's command boundary.
//!
//! Every public command returns `Result<T>`; nothing panics or throws
//! across the boundary (§7 of the design — callers never observe
//! exceptions, only a discriminated error kind).

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("discussion not found: {0}")]
    NotFound(String),

    #[error("invalid state transition: {0}")]
    InvalidState(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("participant not found: {0}")]
    ParticipantNotFound(String),

    #[error("participant inactive: {0}")]
    ParticipantInactive(String),

    #[error("not your turn: {0}")]
    NotYourTurn(String),

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("bus error: {0}")]
    Bus(String),
}

impl Error {
    /// The stable error-kind tag used by callers to branch on failure,
    /// matching the closed set in §7 (`NOT_FOUND`, `INVALID_STATE`, …).
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "NOT_FOUND",
            Error::InvalidState(_) => "INVALID_STATE",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::ParticipantNotFound(_) => "PARTICIPANT_NOT_FOUND",
            Error::ParticipantInactive(_) => "PARTICIPANT_INACTIVE",
            Error::NotYourTurn(_) => "NOT_YOUR_TURN",
            Error::LimitExceeded(_) => "LIMIT_EXCEEDED",
            Error::Store(_) => "STORE_ERROR",
            Error::Bus(_) => "BUS_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_match_spec_names() {
        assert_eq!(Error::NotFound("x".into()).kind(), "NOT_FOUND");
        assert_eq!(Error::NotYourTurn("x".into()).kind(), "NOT_YOUR_TURN");
        assert_eq!(Error::Store("x".into()).kind(), "STORE_ERROR");
    }
}
