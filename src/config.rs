//! Engine configuration
//!
//! [`QuizConfig`] gathers every timing and scoring policy of a speed round.
//! It is deserializable from JSON and validated with `garde` before an
//! engine accepts it.

use std::time::Duration;

use enum_map::{EnumMap, enum_map};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{batch, round, scoring, timing},
    question::Difficulty,
};

type ValidationResult = garde::Result;

/// Validates that a duration falls within bounds given in milliseconds
///
/// # Errors
///
/// Returns a `garde::Error` naming `field` if the duration is outside the
/// inclusive range.
fn validate_millis<const MIN_MILLIS: u64, const MAX_MILLIS: u64>(
    field: &'static str,
    val: &Duration,
) -> ValidationResult {
    if (MIN_MILLIS..=MAX_MILLIS).contains(&(val.as_millis() as u64)) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "{field} is outside of the bounds [{MIN_MILLIS}ms,{MAX_MILLIS}ms]",
        )))
    }
}

fn validate_fade_duration(val: &Duration) -> ValidationResult {
    validate_millis::<0, { timing::MAX_FADE_DURATION }>("fade_duration", val)
}

fn validate_fade_step(val: &Duration) -> ValidationResult {
    validate_millis::<{ timing::MIN_FADE_STEP }, { timing::MAX_FADE_DURATION }>("fade_step", val)
}

fn validate_preload_interval(val: &Duration) -> ValidationResult {
    validate_millis::<{ timing::MIN_PRELOAD_INTERVAL }, { timing::MAX_PRELOAD_INTERVAL }>(
        "preload_interval",
        val,
    )
}

fn validate_shutdown_grace(val: &Duration) -> ValidationResult {
    validate_millis::<0, { timing::MAX_SHUTDOWN_GRACE }>("shutdown_grace", val)
}

fn validate_base_points(val: &EnumMap<Difficulty, u64>) -> ValidationResult {
    match val.iter().find(|(_, points)| **points > scoring::MAX_BASE_POINTS) {
        Some((difficulty, _)) => Err(garde::Error::new(format!(
            "base points for {difficulty} exceed {}",
            scoring::MAX_BASE_POINTS
        ))),
        None => Ok(()),
    }
}

/// How often each lifeline may be used within one session
///
/// `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LifelinePolicy {
    /// Maximum skips per session
    #[garde(skip)]
    pub skip_limit: Option<u32>,
    /// Maximum 50/50 uses per session
    #[garde(skip)]
    pub fifty_fifty_limit: Option<u32>,
    /// Maximum hints per session
    #[garde(skip)]
    pub hint_limit: Option<u32>,
}

impl Default for LifelinePolicy {
    fn default() -> Self {
        Self {
            skip_limit: None,
            fifty_fifty_limit: Some(1),
            hint_limit: Some(1),
        }
    }
}

/// Timing and scoring policy for a speed round
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct QuizConfig {
    /// Length of the round clock in seconds
    #[garde(range(min = round::MIN_SECONDS, max = round::MAX_SECONDS))]
    pub round_seconds: u32,
    /// Length of the pre-round countdown in seconds
    #[garde(range(max = round::MAX_COUNTDOWN))]
    pub countdown_seconds: u32,
    /// Width of the speed bonus window in seconds
    #[garde(range(min = scoring::MIN_BONUS_WINDOW, max = scoring::MAX_BONUS_WINDOW))]
    pub bonus_window_seconds: u32,
    /// Maximum number of questions fetched for a session
    #[garde(range(min = 1, max = batch::MAX_QUESTIONS))]
    pub max_questions: usize,
    /// Base points per difficulty tier
    #[garde(custom(|v, _| validate_base_points(v)))]
    pub base_points: EnumMap<Difficulty, u64>,
    /// Total duration of the 50/50 fade animation
    #[garde(custom(|v, _| validate_fade_duration(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub fade_duration: Duration,
    /// Interval between two fade frames
    #[garde(custom(|v, _| validate_fade_step(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub fade_step: Duration,
    /// Interval at which the preloader re-checks its cursor
    #[garde(custom(|v, _| validate_preload_interval(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub preload_interval: Duration,
    /// Grace period granted to a background producer before it is aborted
    #[garde(custom(|v, _| validate_shutdown_grace(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub shutdown_grace: Duration,
    /// Lifeline usage limits
    #[garde(dive)]
    pub lifelines: LifelinePolicy,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            round_seconds: round::DEFAULT_SECONDS,
            countdown_seconds: round::DEFAULT_COUNTDOWN,
            bonus_window_seconds: scoring::DEFAULT_BONUS_WINDOW,
            max_questions: batch::DEFAULT_MAX_QUESTIONS,
            base_points: enum_map! {
                Difficulty::Easy => scoring::EASY_POINTS,
                Difficulty::Medium => scoring::MEDIUM_POINTS,
                Difficulty::Hard => scoring::HARD_POINTS,
            },
            fade_duration: Duration::from_millis(timing::DEFAULT_FADE_DURATION),
            fade_step: Duration::from_millis(timing::DEFAULT_FADE_STEP),
            preload_interval: Duration::from_millis(timing::DEFAULT_PRELOAD_INTERVAL),
            shutdown_grace: Duration::from_millis(timing::DEFAULT_SHUTDOWN_GRACE),
            lifelines: LifelinePolicy::default(),
        }
    }
}

impl QuizConfig {
    /// Parses a configuration from JSON, filling missing fields with defaults
    ///
    /// # Errors
    ///
    /// Returns a `serde_json::Error` if the text is not a valid configuration.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Base points awarded for a correct answer at `difficulty`
    pub fn base_points(&self, difficulty: Difficulty) -> u64 {
        self.base_points[difficulty]
    }
}
