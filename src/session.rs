//! Presentation session management
//!
//! This module defines the trait through which the engine talks to whatever
//! renders the quiz (a terminal, a window, a test recorder). The engine only
//! emits messages and cue requests; it never waits on the presentation side.

use serde::Serialize;

use super::UpdateMessage;

/// Short sound effects requested by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Cue {
    /// One countdown step elapsed
    CountdownTick,
    /// A command was accepted
    Click,
    /// An answer was correct
    Correct,
    /// An answer was wrong or skipped
    Wrong,
    /// The round clock ran out
    TimeUp,
}

/// Trait for sending messages to the presentation layer
///
/// Implementations must not block: they are called from the session actor,
/// which also drives the round clock.
pub trait Tunnel: Send + Sync + 'static {
    /// Sends an update message to the presentation layer
    ///
    /// # Arguments
    ///
    /// * `message` - The update message to send
    fn send_message(&self, message: &UpdateMessage);

    /// Requests an audio cue
    ///
    /// The default implementation ignores cues, for silent front ends.
    fn play_cue(&self, _cue: Cue) {}
}

impl<T: Tunnel> Tunnel for std::sync::Arc<T> {
    fn send_message(&self, message: &UpdateMessage) {
        (**self).send_message(message);
    }

    fn play_cue(&self, cue: Cue) {
        (**self).play_cue(cue);
    }
}
