//! Lifelines: skip, 50/50 and hint
//!
//! Usage counting against the configured [`LifelinePolicy`], the choice of
//! options each lifeline touches, and the fade animation that runs before
//! the 50/50 options are finally disabled.

use std::time::Duration;

use itertools::Itertools;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::{
    AlarmMessage,
    config::LifelinePolicy,
    constants::batch::FIFTY_FIFTY_REMOVED,
    producer::{Epoch, Shutdown, Stamped},
    question::Question,
};

/// The player aids available during a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Lifeline {
    /// Give up on the current question
    Skip,
    /// Remove two wrong options
    FiftyFifty,
    /// Highlight the correct option
    Hint,
}

/// How often each lifeline has been used in the current session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LifelineUsage {
    skips: u32,
    fifty_fifty: u32,
    hints: u32,
}

impl LifelineUsage {
    /// Number of times `lifeline` was used
    pub fn used(&self, lifeline: Lifeline) -> u32 {
        match lifeline {
            Lifeline::Skip => self.skips,
            Lifeline::FiftyFifty => self.fifty_fifty,
            Lifeline::Hint => self.hints,
        }
    }

    /// Uses left for `lifeline` under `policy`, `None` when unlimited
    pub fn remaining(&self, lifeline: Lifeline, policy: &LifelinePolicy) -> Option<u32> {
        let limit = match lifeline {
            Lifeline::Skip => policy.skip_limit,
            Lifeline::FiftyFifty => policy.fifty_fifty_limit,
            Lifeline::Hint => policy.hint_limit,
        };
        limit.map(|limit| limit.saturating_sub(self.used(lifeline)))
    }

    /// Whether `lifeline` may be used once more under `policy`
    pub fn available(&self, lifeline: Lifeline, policy: &LifelinePolicy) -> bool {
        self.remaining(lifeline, policy) != Some(0)
    }

    /// Records one use of `lifeline`
    pub fn record(&mut self, lifeline: Lifeline) {
        match lifeline {
            Lifeline::Skip => self.skips += 1,
            Lifeline::FiftyFifty => self.fifty_fifty += 1,
            Lifeline::Hint => self.hints += 1,
        }
    }

    /// Whether the 50/50 lifeline has been used at least once
    pub fn fifty_fifty_used(&self) -> bool {
        self.fifty_fifty > 0
    }

    /// Whether the hint lifeline has been used at least once
    pub fn hint_used(&self) -> bool {
        self.hints > 0
    }
}

/// Options removed by the 50/50 lifeline
///
/// Always the first two incorrect options in letter order, so the choice is
/// deterministic and never includes the correct option.
pub fn fifty_fifty_targets(question: &Question) -> Vec<usize> {
    question
        .incorrect_indices()
        .take(FIFTY_FIFTY_REMOVED)
        .collect_vec()
}

/// Option highlighted by the hint lifeline
pub fn hint_target(question: &Question) -> usize {
    question.correct_index()
}

/// Fade animation events delivered to the session actor
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Alarm {
    /// The fading options reached the given opacity
    FadeStep {
        /// Opacity between 0 and 1
        alpha: f32,
    },
    /// The animation finished; the options can now be disabled
    FadeComplete,
}

/// Lifeline updates sent to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum UpdateMessage {
    /// The lifeline state of the current question changed
    Changed {
        /// Options removed by 50/50 on this question
        removed: Vec<usize>,
        /// Option highlighted by the hint on this question
        hint: Option<usize>,
        /// Uses left per lifeline, `None` meaning unlimited
        skips_left: Option<u32>,
        /// 50/50 uses left
        fifty_fifty_left: Option<u32>,
        /// Hints left
        hints_left: Option<u32>,
    },
    /// One frame of the 50/50 fade
    FadeProgress {
        /// Options being faded
        options: Vec<usize>,
        /// Their current opacity
        alpha: f32,
    },
}

/// Runs the 50/50 fade animation
///
/// Emits one [`Alarm::FadeStep`] per `step` until `duration` has elapsed,
/// then [`Alarm::FadeComplete`]. A zero duration completes at once.
pub async fn run_fade(
    duration: Duration,
    step: Duration,
    epoch: Epoch,
    alarms: mpsc::UnboundedSender<Stamped<AlarmMessage>>,
    mut shutdown: Shutdown,
) {
    let frames = if step.is_zero() {
        0
    } else {
        duration.as_nanos().div_ceil(step.as_nanos()) as u32
    };

    for frame in 1..=frames {
        tokio::select! {
            () = tokio::time::sleep(step) => {}
            () = shutdown.recv() => {
                tracing::debug!("fade animation interrupted at frame {frame}");
                return;
            }
        }
        let alpha = 1.0 - frame as f32 / frames as f32;
        if alarms
            .send(Stamped::new(epoch, Alarm::FadeStep { alpha }.into()))
            .is_err()
        {
            return;
        }
    }
    let _ = alarms.send(Stamped::new(epoch, Alarm::FadeComplete.into()));
}
