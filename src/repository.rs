//! External collaborators
//!
//! The engine does not know where questions come from or where results go.
//! It talks to a [`QuestionRepository`] to fetch a batch and to a
//! [`SessionStore`] to persist sessions, answers and leaderboard entries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    lifeline::{Lifeline, LifelineUsage},
    question::{Difficulty, Question, QuestionId},
    summary::SessionResult,
};

/// Failures reported by a collaborator
#[derive(Error, Debug)]
pub enum Error {
    /// The backing service could not be reached or refused the request
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    /// The request was understood but rejected
    #[error("request rejected: {0}")]
    Rejected(String),
    /// Stored data could not be decoded
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Stored data could not be read
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type of collaborator calls
pub type Result<T> = std::result::Result<T, Error>;

/// Handle of a persisted session
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl SessionId {
    /// Whether the store handed out a usable id
    pub fn is_valid(self) -> bool {
        self.0 > 0
    }
}

/// Totals written when a session is finalized
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FinalTotals {
    /// Total score
    pub score: u64,
    /// Correct answers
    pub correct: u32,
    /// Wrong answers and skips
    pub incorrect: u32,
    /// Questions resolved
    pub total_questions: u32,
    /// Percentage of correct answers
    pub accuracy: f64,
    /// Speed bonus included in the score
    pub speed_bonus: u64,
    /// Seconds of round clock used
    pub time_taken_seconds: u32,
    /// Skips used
    pub skips_used: u32,
    /// Whether 50/50 was used
    pub fifty_fifty_used: bool,
    /// Whether the hint was used
    pub hint_used: bool,
}

impl FinalTotals {
    /// Combines a session result with clock and lifeline usage
    pub fn new(result: &SessionResult, time_taken_seconds: u32, lifelines: &LifelineUsage) -> Self {
        Self {
            score: result.score,
            correct: result.correct,
            incorrect: result.incorrect,
            total_questions: result.total_questions,
            accuracy: result.accuracy,
            speed_bonus: result.speed_bonus_total,
            time_taken_seconds,
            skips_used: lifelines.used(Lifeline::Skip),
            fifty_fifty_used: lifelines.fifty_fifty_used(),
            hint_used: lifelines.hint_used(),
        }
    }
}

/// A leaderboard row submitted when a session ends
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    /// Player name
    pub player: String,
    /// Session the score was achieved in
    pub session: SessionId,
    /// Final score
    pub score: u64,
    /// Questions resolved
    pub questions_answered: u32,
    /// Percentage of correct answers
    pub accuracy: f64,
}

/// Source of question batches
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Fetches up to `limit` shuffled questions
    ///
    /// `category` of `None` selects every category.
    async fn fetch_questions(
        &self,
        category: Option<&str>,
        difficulty: Difficulty,
        limit: usize,
    ) -> Result<Vec<Question>>;
}

/// Persistence of sessions, answers and leaderboard entries
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Creates the session record and returns its id
    async fn create_session(
        &self,
        player: &str,
        category: Option<&str>,
        difficulty: Difficulty,
    ) -> Result<SessionId>;

    /// Records one resolved question
    async fn record_answer(
        &self,
        session: SessionId,
        question: QuestionId,
        answer: &str,
        correct: bool,
    ) -> Result<()>;

    /// Writes the final totals of a session
    async fn finalize_session(&self, session: SessionId, totals: &FinalTotals) -> Result<()>;

    /// Adds a leaderboard row
    async fn add_leaderboard_entry(&self, entry: &LeaderboardEntry) -> Result<()>;
}
