//! Speed bonus computation
//!
//! The speed bonus is not an independent timer. It is a pure function of the
//! round clock: the clock value recorded when a question was shown minus the
//! current clock value gives the seconds spent on the question, and the bonus
//! decays linearly over the configured window.

use serde::Serialize;

/// Computes the decaying speed bonus for a correct answer
///
/// `floor(base * max(0, window - elapsed) / window)`, clamped to
/// `[0, base]`. A zero window yields no bonus.
///
/// # Arguments
///
/// * `base_points` - Base points of the question's difficulty
/// * `elapsed_seconds` - Seconds since the question was shown
/// * `window_seconds` - Width of the bonus window
pub fn speed_bonus(base_points: u64, elapsed_seconds: u32, window_seconds: u32) -> u64 {
    if window_seconds == 0 {
        return 0;
    }
    let left = u64::from(window_seconds.saturating_sub(elapsed_seconds));
    (base_points * left / u64::from(window_seconds)).min(base_points)
}

/// Tracks the bonus of the question currently on screen
///
/// The tracker only remembers the clock value at which the question was
/// shown; everything else is derived on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BonusTracker {
    /// Remaining round seconds when the current question was shown
    shown_at: Option<u32>,
}

impl BonusTracker {
    /// Records that a question was shown while the clock read `remaining`
    pub fn question_shown(&mut self, remaining: u32) {
        self.shown_at = Some(remaining);
    }

    /// Forgets the current question
    pub fn clear(&mut self) {
        self.shown_at = None;
    }

    /// Seconds spent on the current question when the clock reads `remaining`
    pub fn elapsed(&self, remaining: u32) -> u32 {
        self.shown_at
            .map_or(0, |shown_at| shown_at.saturating_sub(remaining))
    }

    /// The bonus a correct answer would earn right now
    pub fn preview(&self, base_points: u64, remaining: u32, window_seconds: u32) -> u64 {
        if self.shown_at.is_none() {
            return 0;
        }
        speed_bonus(base_points, self.elapsed(remaining), window_seconds)
    }
}
