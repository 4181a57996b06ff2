//! In-memory collaborators
//!
//! [`MemoryQuestionBank`] serves questions from a list loaded up front and
//! [`MemoryStore`] keeps every write in memory. They back the terminal demo
//! and the engine tests.

use std::sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use itertools::Itertools;

use crate::{
    question::{Difficulty, Question, QuestionId},
    repository::{
        self, FinalTotals, LeaderboardEntry, QuestionRepository, SessionId, SessionStore,
    },
};

/// A question repository over a fixed list
#[derive(Debug, Clone)]
pub struct MemoryQuestionBank {
    questions: Vec<Question>,
    shuffle: bool,
}

impl MemoryQuestionBank {
    /// Creates a bank that shuffles every batch it serves
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            shuffle: true,
        }
    }

    /// Parses a JSON array of questions
    ///
    /// # Errors
    ///
    /// Returns `repository::Error::Json` if the text is not a question list.
    pub fn from_json(text: &str) -> repository::Result<Self> {
        Ok(Self::new(serde_json::from_str(text)?))
    }

    /// Serves batches in stored order instead of shuffling
    #[must_use]
    pub fn in_order(mut self) -> Self {
        self.shuffle = false;
        self
    }

    /// Number of stored questions
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Whether the bank holds no questions
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

#[async_trait]
impl QuestionRepository for MemoryQuestionBank {
    async fn fetch_questions(
        &self,
        category: Option<&str>,
        difficulty: Difficulty,
        limit: usize,
    ) -> repository::Result<Vec<Question>> {
        let mut selected = self
            .questions
            .iter()
            .filter(|q| q.difficulty == difficulty)
            .filter(|q| category.is_none_or(|c| q.category.eq_ignore_ascii_case(c)))
            .cloned()
            .collect_vec();
        if self.shuffle {
            fastrand::shuffle(&mut selected);
        }
        selected.truncate(limit);
        Ok(selected)
    }
}

/// A session created through [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSession {
    /// Issued id
    pub id: SessionId,
    /// Player name
    pub player: String,
    /// Requested category
    pub category: Option<String>,
    /// Requested difficulty
    pub difficulty: Difficulty,
}

/// An answer recorded through [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAnswer {
    /// Session of the answer
    pub session: SessionId,
    /// Answered question
    pub question: QuestionId,
    /// Option letter or `"SKIP"`
    pub answer: String,
    /// Correctness
    pub correct: bool,
}

#[derive(Debug, Default)]
struct Records {
    next_id: i64,
    sessions: Vec<CreatedSession>,
    answers: Vec<RecordedAnswer>,
    finalized: Vec<(SessionId, FinalTotals)>,
    leaderboard: Vec<LeaderboardEntry>,
}

/// A session store that keeps everything in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Records>,
    fail_sessions: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    fn records(&self) -> MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes session creation fail
    pub fn fail_sessions(&self, fail: bool) {
        self.fail_sessions.store(fail, Ordering::Relaxed);
    }

    /// Makes every write after session creation fail
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Sets the id handed to the next created session
    pub fn issue_ids_from(&self, next: i64) {
        self.records().next_id = next - 1;
    }

    /// Sessions created so far
    pub fn sessions(&self) -> Vec<CreatedSession> {
        self.records().sessions.clone()
    }

    /// Answers recorded so far
    pub fn answers(&self) -> Vec<RecordedAnswer> {
        self.records().answers.clone()
    }

    /// Finalize calls received so far
    pub fn finalized(&self) -> Vec<(SessionId, FinalTotals)> {
        self.records().finalized.clone()
    }

    /// Leaderboard rows received so far
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        self.records().leaderboard.clone()
    }

    fn check_writes(&self) -> repository::Result<()> {
        if self.fail_writes.load(Ordering::Relaxed) {
            Err(repository::Error::Unavailable("store offline".to_owned()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(
        &self,
        player: &str,
        category: Option<&str>,
        difficulty: Difficulty,
    ) -> repository::Result<SessionId> {
        if self.fail_sessions.load(Ordering::Relaxed) {
            return Err(repository::Error::Unavailable("store offline".to_owned()));
        }
        let mut records = self.records();
        records.next_id += 1;
        let id = SessionId(records.next_id);
        records.sessions.push(CreatedSession {
            id,
            player: player.to_owned(),
            category: category.map(str::to_owned),
            difficulty,
        });
        Ok(id)
    }

    async fn record_answer(
        &self,
        session: SessionId,
        question: QuestionId,
        answer: &str,
        correct: bool,
    ) -> repository::Result<()> {
        self.check_writes()?;
        self.records().answers.push(RecordedAnswer {
            session,
            question,
            answer: answer.to_owned(),
            correct,
        });
        Ok(())
    }

    async fn finalize_session(
        &self,
        session: SessionId,
        totals: &FinalTotals,
    ) -> repository::Result<()> {
        self.check_writes()?;
        self.records().finalized.push((session, *totals));
        Ok(())
    }

    async fn add_leaderboard_entry(&self, entry: &LeaderboardEntry) -> repository::Result<()> {
        self.check_writes()?;
        self.records().leaderboard.push(entry.clone());
        Ok(())
    }
}
