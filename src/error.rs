//! Errors that prevent a session from starting

use thiserror::Error;

use crate::{
    names,
    question::Difficulty,
    repository::{self, SessionId},
};

/// Failures that keep the engine idle
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] garde::Report),
    /// The player name was rejected
    #[error("invalid player name: {0}")]
    InvalidPlayer(#[from] names::Error),
    /// The question repository failed
    #[error("could not fetch questions: {0}")]
    Repository(#[source] repository::Error),
    /// The repository had no question for the request
    #[error("no {difficulty} questions available")]
    EmptyBatch {
        /// Requested difficulty
        difficulty: Difficulty,
    },
    /// The session record could not be created
    #[error("could not create session: {0}")]
    SessionCreation(#[source] repository::Error),
    /// The store handed out an unusable session id
    #[error("store returned invalid session id {0}")]
    InvalidSessionId(SessionId),
    /// Another session has not finished yet
    #[error("a session is already running")]
    SessionRunning,
}
