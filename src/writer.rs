//! Fire-and-forget persistence
//!
//! The session actor never awaits the store. It hands writes to a
//! [`WriterHandle`], which queues them on an unbounded channel drained by a
//! single writer task. Failed writes are logged and dropped.

use std::sync::Arc;

use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    question::QuestionId,
    repository::{FinalTotals, LeaderboardEntry, SessionId, SessionStore},
};

/// A write queued for the store
#[derive(Debug, Clone, PartialEq)]
pub enum PersistCommand {
    /// One resolved question
    RecordAnswer {
        /// Session the answer belongs to
        session: SessionId,
        /// The question
        question: QuestionId,
        /// Option letter or `"SKIP"`
        answer: String,
        /// Whether the answer was correct
        correct: bool,
    },
    /// Final totals of a session
    Finalize {
        /// The session
        session: SessionId,
        /// Its totals
        totals: FinalTotals,
    },
    /// A leaderboard row
    Leaderboard(LeaderboardEntry),
}

/// Sending side of the writer; cheap to clone
#[derive(Debug, Clone)]
pub struct WriterHandle {
    tx: mpsc::UnboundedSender<PersistCommand>,
}

impl WriterHandle {
    /// Queues a write without waiting for it
    pub fn submit(&self, command: PersistCommand) {
        if let Err(mpsc::error::SendError(command)) = self.tx.send(command) {
            tracing::warn!("writer is gone, dropping {command:?}");
        }
    }
}

/// Creates a handle together with the queue it feeds
pub fn channel() -> (WriterHandle, mpsc::UnboundedReceiver<PersistCommand>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (WriterHandle { tx }, rx)
}

/// Spawns the writer task for `store`
///
/// The task ends once every [`WriterHandle`] has been dropped and the queue
/// is drained.
pub fn spawn_writer(store: Arc<dyn SessionStore>) -> (WriterHandle, JoinHandle<()>) {
    let (handle, rx) = channel();
    let join_handle = tokio::spawn(run_writer(store, rx));
    (handle, join_handle)
}

/// Drains `rx` into `store`, one write at a time
pub async fn run_writer(
    store: Arc<dyn SessionStore>,
    mut rx: mpsc::UnboundedReceiver<PersistCommand>,
) {
    while let Some(command) = rx.recv().await {
        let result = match &command {
            PersistCommand::RecordAnswer {
                session,
                question,
                answer,
                correct,
            } => {
                store
                    .record_answer(*session, *question, answer, *correct)
                    .await
            }
            PersistCommand::Finalize { session, totals } => {
                store.finalize_session(*session, totals).await
            }
            PersistCommand::Leaderboard(entry) => store.add_leaderboard_entry(entry).await,
        };
        if let Err(e) = result {
            tracing::warn!("dropping failed write {command:?}: {e}");
        }
    }
    tracing::debug!("writer drained");
}
