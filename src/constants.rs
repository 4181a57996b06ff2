//! Configuration constants for the RapidQ engine
//!
//! This module contains the default policy values and the validation
//! bounds used throughout the engine, so that timing and scoring numbers
//! are surfaced once instead of being scattered across modules.

/// Round clock and countdown constants
pub mod round {
    /// Default length of a speed round in seconds
    pub const DEFAULT_SECONDS: u32 = 60;
    /// Minimum allowed round length in seconds
    pub const MIN_SECONDS: u32 = 10;
    /// Maximum allowed round length in seconds
    pub const MAX_SECONDS: u32 = 600;
    /// Default length of the pre-round countdown in seconds
    pub const DEFAULT_COUNTDOWN: u32 = 3;
    /// Maximum allowed countdown length in seconds
    pub const MAX_COUNTDOWN: u32 = 10;
    /// Remaining seconds at or below which the clock is shown as a warning
    pub const WARNING_THRESHOLD: u32 = 30;
    /// Remaining seconds at or below which the clock is shown as critical
    pub const CRITICAL_THRESHOLD: u32 = 10;
}

/// Speed bonus and base point constants
pub mod scoring {
    /// Default width of the speed bonus window in seconds
    pub const DEFAULT_BONUS_WINDOW: u32 = 10;
    /// Minimum bonus window in seconds
    pub const MIN_BONUS_WINDOW: u32 = 1;
    /// Maximum bonus window in seconds
    pub const MAX_BONUS_WINDOW: u32 = 60;
    /// Base points for an easy question
    pub const EASY_POINTS: u64 = 10;
    /// Base points for a medium question
    pub const MEDIUM_POINTS: u64 = 15;
    /// Base points for a hard question
    pub const HARD_POINTS: u64 = 25;
    /// Maximum base points accepted for any difficulty
    pub const MAX_BASE_POINTS: u64 = 1000;
}

/// Question batch constants
pub mod batch {
    /// Default maximum number of questions fetched for a session
    pub const DEFAULT_MAX_QUESTIONS: usize = 30;
    /// Upper bound on the configurable batch size
    pub const MAX_QUESTIONS: usize = 100;
    /// Number of answer options on every question
    pub const OPTION_COUNT: usize = 4;
    /// Number of options removed by the 50/50 lifeline
    pub const FIFTY_FIFTY_REMOVED: usize = 2;
}

/// Background producer timing constants, in milliseconds
pub mod timing {
    /// Default total duration of the 50/50 fade animation
    pub const DEFAULT_FADE_DURATION: u64 = 1000;
    /// Default interval between two fade animation frames
    pub const DEFAULT_FADE_STEP: u64 = 50;
    /// Minimum fade step
    pub const MIN_FADE_STEP: u64 = 10;
    /// Maximum fade duration
    pub const MAX_FADE_DURATION: u64 = 5000;
    /// Default interval at which the preloader re-checks its cursor
    pub const DEFAULT_PRELOAD_INTERVAL: u64 = 500;
    /// Minimum preloader re-check interval
    pub const MIN_PRELOAD_INTERVAL: u64 = 50;
    /// Maximum preloader re-check interval
    pub const MAX_PRELOAD_INTERVAL: u64 = 5000;
    /// Default grace period granted to a producer before it is aborted
    pub const DEFAULT_SHUTDOWN_GRACE: u64 = 250;
    /// Maximum shutdown grace period
    pub const MAX_SHUTDOWN_GRACE: u64 = 5000;
}

/// Player name constants
pub mod player {
    /// Maximum length of a player name in bytes
    pub const MAX_NAME_LENGTH: usize = 30;
    /// Number of words in a generated guest name
    pub const GENERATED_NAME_WORDS: u8 = 2;
}
