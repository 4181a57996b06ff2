//! Next-question preloader
//!
//! The preloader keeps "the next unconsumed question after the current
//! one" staged one step ahead of the session. It only reads an immutable
//! batch and a cursor snapshot published by the actor, and writes into its
//! own watch channel. The actor trusts a staged value only when it was
//! computed for the cursor revision it published last; otherwise it looks
//! the next question up directly.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use tokio::sync::watch;

use crate::{producer::Shutdown, question::QuestionBatch};

/// Position of the session as published to the preloader
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    /// Increases with every publication
    pub revision: u64,
    /// Index of the question on screen
    pub current: usize,
    /// Indices already answered or skipped
    pub consumed: BTreeSet<usize>,
}

/// A lookahead result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Staged {
    /// Revision of the cursor this was computed for
    pub revision: u64,
    /// Next unconsumed index after the cursor, if any
    pub next: Option<usize>,
}

/// Actor side of the preloader
#[derive(Debug)]
pub struct Preloader {
    cursor: watch::Sender<Cursor>,
    staged: watch::Receiver<Option<Staged>>,
    revision: u64,
}

/// Task side of the preloader, consumed by [`PreloadTask::run`]
#[derive(Debug)]
pub struct PreloadTask {
    cursor: watch::Receiver<Cursor>,
    staged: watch::Sender<Option<Staged>>,
}

/// Creates a connected preloader pair
pub fn channel() -> (Preloader, PreloadTask) {
    let (cursor_tx, cursor_rx) = watch::channel(Cursor::default());
    let (staged_tx, staged_rx) = watch::channel(None);
    (
        Preloader {
            cursor: cursor_tx,
            staged: staged_rx,
            revision: 0,
        },
        PreloadTask {
            cursor: cursor_rx,
            staged: staged_tx,
        },
    )
}

impl Preloader {
    /// Publishes a new cursor; never blocks
    pub fn publish(&mut self, current: usize, consumed: &BTreeSet<usize>) {
        self.revision += 1;
        self.cursor.send_replace(Cursor {
            revision: self.revision,
            current,
            consumed: consumed.clone(),
        });
    }

    /// The staged lookahead for the last published cursor
    ///
    /// Returns `None` when the preloader has not caught up yet.
    pub fn lookup(&self) -> Option<Option<usize>> {
        let staged = (*self.staged.borrow())?;
        (staged.revision == self.revision).then_some(staged.next)
    }
}

impl PreloadTask {
    /// Keeps the lookahead current until shutdown
    ///
    /// Recomputes on every cursor change and, as a fallback, every
    /// `interval`.
    pub async fn run(
        mut self,
        batch: Arc<QuestionBatch>,
        interval: Duration,
        mut shutdown: Shutdown,
    ) {
        loop {
            let staged = {
                let cursor = self.cursor.borrow_and_update();
                Staged {
                    revision: cursor.revision,
                    next: batch.next_unconsumed(cursor.current, |i| cursor.consumed.contains(&i)),
                }
            };
            self.staged.send_replace(Some(staged));

            tokio::select! {
                changed = self.cursor.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                () = tokio::time::sleep(interval) => {}
                () = shutdown.recv() => {
                    tracing::debug!("preloader stopped");
                    return;
                }
            }
        }
    }
}
