use thiserror::Error;

use crate::tracker::HandLabel;

/// Failures the engine reports to its callers.
///
/// None of these are fatal: a malformed hand is dropped for the tick, an
/// unknown key degrades to "no target", and a rejected config leaves the
/// previous one in effect.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("malformed observation for {hand:?} hand: expected {expected} landmarks, got {got}")]
    MalformedObservation {
        hand: HandLabel,
        expected: usize,
        got: usize,
    },

    #[error("unknown key '{0}' for the active layout")]
    UnknownKey(String),

    #[error("unknown layout '{0}'")]
    UnknownLayout(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
