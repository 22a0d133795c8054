use thiserror::Error;

use crate::session::Phase;

/// Everything the drill core can refuse to do.
///
/// None of these are fatal to a session: the host logs them and keeps going,
/// and the worst the player ever sees is the Ready screen with default settings.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DrillError {
    #[error("unknown note name '{0}'")]
    UnknownNote(String),

    #[error("unknown degree '{0}'")]
    UnknownDegree(String),

    #[error("unknown key '{0}'")]
    UnknownKey(String),

    /// An event arrived while the session was in a phase that does not accept it.
    #[error("{event} is not valid while {phase}")]
    InvalidTransition { event: &'static str, phase: Phase },

    #[error("settings store unavailable: {0}")]
    PersistenceUnavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            DrillError::UnknownNote("H".into()).to_string(),
            "unknown note name 'H'"
        );
        let err = DrillError::InvalidTransition {
            event: "skip",
            phase: Phase::Ended,
        };
        assert_eq!(err.to_string(), "skip is not valid while ended");
    }
}
