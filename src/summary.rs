//! Session results
//!
//! Aggregates the answer outcomes of a session into the read-only
//! [`SessionResult`] returned when the session ends, and into the
//! [`Summary`] that additionally lists every outcome in order.

use serde::Serialize;
use web_time::SystemTime;

use crate::question::{OptionLetter, QuestionId};

/// Answer recorded for a skipped question
pub const SKIP_ANSWER: &str = "SKIP";

/// What the player did with a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Choice {
    /// The player picked an option
    Option(OptionLetter),
    /// The player skipped the question
    Skip,
}

impl Choice {
    /// The answer as persisted: the option letter or `"SKIP"`
    pub fn as_answer(&self) -> String {
        match self {
            Self::Option(letter) => letter.to_string(),
            Self::Skip => SKIP_ANSWER.to_owned(),
        }
    }
}

/// Resolution of a single question
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerOutcome {
    /// The question that was resolved
    pub question_id: QuestionId,
    /// The player's choice
    pub choice: Choice,
    /// Whether the choice was correct
    pub correct: bool,
    /// Points awarded, base and bonus together
    pub points: u64,
    /// Speed bonus part of `points`
    pub bonus: u64,
    /// When the question was resolved
    pub answered_at: SystemTime,
}

/// Final totals of a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionResult {
    /// Total score
    pub score: u64,
    /// Correctly answered questions
    pub correct: u32,
    /// Wrongly answered or skipped questions
    pub incorrect: u32,
    /// Sum of the speed bonuses included in `score`
    pub speed_bonus_total: u64,
    /// Number of questions resolved
    pub total_questions: u32,
    /// Percentage of resolved questions answered correctly
    pub accuracy: f64,
}

impl SessionResult {
    /// Builds the result from the session counters
    pub fn new(score: u64, correct: u32, incorrect: u32, speed_bonus_total: u64) -> Self {
        let total_questions = correct + incorrect;
        Self {
            score,
            correct,
            incorrect,
            speed_bonus_total,
            total_questions,
            accuracy: accuracy(correct, total_questions),
        }
    }
}

/// `correct * 100 / total`, or zero when nothing was answered
pub fn accuracy(correct: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(correct) * 100.0 / f64::from(total)
    }
}

/// A finished session: its totals and every outcome in order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Name the session was played under
    pub player: String,
    /// Final totals
    pub result: SessionResult,
    /// Outcomes in the order the questions were resolved
    pub outcomes: Vec<AnswerOutcome>,
}

impl Summary {
    /// Builds a summary, deriving the totals from `outcomes`
    pub fn from_outcomes(player: String, outcomes: Vec<AnswerOutcome>) -> Self {
        let (correct, incorrect) = outcomes.iter().fold((0, 0), |(c, i), outcome| {
            if outcome.correct {
                (c + 1, i)
            } else {
                (c, i + 1)
            }
        });
        let score = outcomes.iter().map(|outcome| outcome.points).sum();
        let bonus = outcomes.iter().map(|outcome| outcome.bonus).sum();
        Self {
            player,
            result: SessionResult::new(score, correct, incorrect, bonus),
            outcomes,
        }
    }

    /// Outcomes of skipped questions
    pub fn skipped(&self) -> impl Iterator<Item = &AnswerOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.choice == Choice::Skip)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn outcome(id: u32, choice: Choice, correct: bool, points: u64, bonus: u64) -> AnswerOutcome {
        AnswerOutcome {
            question_id: QuestionId(id),
            choice,
            correct,
            points,
            bonus,
            answered_at: SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_choice_as_answer() {
        assert_eq!(Choice::Option(OptionLetter::B).as_answer(), "B");
        assert_eq!(Choice::Skip.as_answer(), "SKIP");
    }

    #[test]
    fn test_accuracy() {
        assert!((accuracy(3, 4) - 75.0).abs() < f64::EPSILON);
        assert!(accuracy(0, 0).abs() < f64::EPSILON);
        assert!((accuracy(1, 3) - 33.333_333).abs() < 1e-5);
    }

    #[test]
    fn test_result_new() {
        let result = SessionResult::new(41, 2, 1, 6);
        assert_eq!(result.total_questions, 3);
        assert_eq!(result.score, 41);
        assert_eq!(result.speed_bonus_total, 6);
    }

    #[test]
    fn test_summary_from_outcomes() {
        let summary = Summary::from_outcomes(
            "Rina".to_string(),
            vec![
                outcome(1, Choice::Option(OptionLetter::A), true, 16, 6),
                outcome(2, Choice::Skip, false, 0, 0),
                outcome(3, Choice::Option(OptionLetter::C), false, 0, 0),
                outcome(4, Choice::Option(OptionLetter::D), true, 25, 0),
            ],
        );
        assert_eq!(summary.result, SessionResult::new(41, 2, 2, 6));
        assert_eq!(summary.skipped().count(), 1);
        assert!((summary.result.accuracy - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_summary() {
        let summary = Summary::from_outcomes("Guest".to_string(), Vec::new());
        assert_eq!(summary.result, SessionResult::new(0, 0, 0, 0));
    }
}
