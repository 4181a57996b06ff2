//! Question records and session batches
//!
//! Questions are immutable once fetched from the repository. A session works
//! on a [`QuestionBatch`], an ordered and capped sequence of questions that
//! is shared read-only between the session actor and the preloader.

use std::{fmt::Display, str::FromStr};

use enum_map::Enum;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::batch::OPTION_COUNT;

/// Identifier of a question in the repository
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct QuestionId(pub u32);

/// Difficulty tier of a question
///
/// The tier selects the base points awarded for a correct answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    /// Easy questions
    Easy,
    /// Medium questions
    Medium,
    /// Hard questions
    Hard,
}

/// Error returned when a difficulty name is not recognised
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown difficulty `{0}`")]
pub struct UnknownDifficulty(String);

impl FromStr for Difficulty {
    type Err = UnknownDifficulty;

    /// Parses a difficulty name, case-insensitively
    ///
    /// Besides the English names this also accepts the Indonesian tier
    /// names (`mudah`, `sedang`, `sulit`) found in older question banks.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EASY" | "MUDAH" => Ok(Self::Easy),
            "MEDIUM" | "SEDANG" => Ok(Self::Medium),
            "HARD" | "SULIT" => Ok(Self::Hard),
            _ => Err(UnknownDifficulty(s.to_owned())),
        }
    }
}

impl Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Easy => "EASY",
            Self::Medium => "MEDIUM",
            Self::Hard => "HARD",
        })
    }
}

/// Letter naming one of the four answer options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionLetter {
    /// First option
    A,
    /// Second option
    B,
    /// Third option
    C,
    /// Fourth option
    D,
}

impl OptionLetter {
    /// All letters in display order
    pub const ALL: [OptionLetter; OPTION_COUNT] = [Self::A, Self::B, Self::C, Self::D];

    /// Returns the zero-based option index of this letter
    pub fn index(self) -> usize {
        self as usize
    }

    /// Returns the letter for a zero-based option index
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl Display for OptionLetter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let letter = match self {
            Self::A => 'A',
            Self::B => 'B',
            Self::C => 'C',
            Self::D => 'D',
        };
        write!(f, "{letter}")
    }
}

/// A single multiple choice question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Repository identifier
    pub id: QuestionId,
    /// Category the question belongs to
    pub category: String,
    /// Difficulty tier
    pub difficulty: Difficulty,
    /// The prompt shown to the player
    pub prompt: String,
    /// The four answer options, in letter order
    pub options: [String; OPTION_COUNT],
    /// Letter of the correct option
    pub correct: OptionLetter,
}

impl Question {
    /// Returns the index of the correct option
    pub fn correct_index(&self) -> usize {
        self.correct.index()
    }

    /// Checks whether the option at `index` is the correct one
    pub fn is_correct(&self, index: usize) -> bool {
        index == self.correct_index()
    }

    /// Indices of the incorrect options, in ascending order
    pub fn incorrect_indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..OPTION_COUNT).filter(|i| !self.is_correct(*i))
    }
}

/// The ordered questions played during one session
#[derive(Debug, Clone, Default, Serialize)]
pub struct QuestionBatch {
    questions: Vec<Question>,
}

impl QuestionBatch {
    /// Builds a batch from repository output
    ///
    /// Questions past `cap` are dropped, as are later occurrences of an id
    /// that was already seen.
    pub fn new(questions: Vec<Question>, cap: usize) -> Self {
        let fetched = questions.len();
        let questions = questions
            .into_iter()
            .unique_by(|q| q.id)
            .take(cap)
            .collect_vec();
        if questions.len() < fetched.min(cap) {
            tracing::warn!(
                "dropped {} duplicate question(s) from batch",
                fetched.min(cap) - questions.len()
            );
        }
        Self { questions }
    }

    /// Number of questions in the batch
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Whether the batch has no questions
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Returns the question at `index`
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// Finds the first index after `current` that `is_consumed` rejects
    ///
    /// The search walks forward and wraps to the start of the batch; the
    /// current index itself is never returned.
    pub fn next_unconsumed<F: Fn(usize) -> bool>(
        &self,
        current: usize,
        is_consumed: F,
    ) -> Option<usize> {
        let len = self.len();
        (current + 1..len)
            .chain(0..current.min(len))
            .find(|i| !is_consumed(*i))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn question(id: u32, difficulty: Difficulty, correct: OptionLetter) -> Question {
        Question {
            id: QuestionId(id),
            category: "General".to_string(),
            difficulty,
            prompt: format!("Question {id}?"),
            options: [
                "Alpha".to_string(),
                "Bravo".to_string(),
                "Charlie".to_string(),
                "Delta".to_string(),
            ],
            correct,
        }
    }

    #[test]
    fn test_difficulty_from_str() {
        assert_eq!("easy".parse::<Difficulty>(), Ok(Difficulty::Easy));
        assert_eq!("MEDIUM".parse::<Difficulty>(), Ok(Difficulty::Medium));
        assert_eq!(" Hard ".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert_eq!("sulit".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert_eq!("Mudah".parse::<Difficulty>(), Ok(Difficulty::Easy));
        assert!("extreme".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_difficulty_serialization() {
        let json = serde_json::to_string(&Difficulty::Medium).unwrap();
        assert_eq!(json, "\"MEDIUM\"");
        assert_eq!(Difficulty::Hard.to_string(), "HARD");
    }

    #[test]
    fn test_option_letter_index() {
        assert_eq!(OptionLetter::C.index(), 2);
        assert_eq!(OptionLetter::from_index(3), Some(OptionLetter::D));
        assert_eq!(OptionLetter::from_index(4), None);
        assert_eq!(OptionLetter::B.to_string(), "B");
    }

    #[test]
    fn test_incorrect_indices() {
        let q = question(1, Difficulty::Easy, OptionLetter::B);
        assert_eq!(q.incorrect_indices().collect_vec(), vec![0, 2, 3]);
        assert!(q.is_correct(1));
        assert!(!q.is_correct(0));
    }

    #[test]
    fn test_batch_caps_and_dedups() {
        let questions = vec![
            question(1, Difficulty::Easy, OptionLetter::A),
            question(1, Difficulty::Easy, OptionLetter::A),
            question(2, Difficulty::Easy, OptionLetter::A),
            question(3, Difficulty::Easy, OptionLetter::A),
        ];
        let batch = QuestionBatch::new(questions, 2);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.get(1).map(|q| q.id), Some(QuestionId(2)));
    }

    #[test]
    fn test_batch_smaller_than_cap() {
        let batch = QuestionBatch::new(vec![question(7, Difficulty::Hard, OptionLetter::D)], 30);
        assert_eq!(batch.len(), 1);
        assert!(!batch.is_empty());
    }

    #[test]
    fn test_next_unconsumed_wraps_and_skips() {
        let batch = QuestionBatch::new(
            (1..=5)
                .map(|id| question(id, Difficulty::Easy, OptionLetter::A))
                .collect(),
            30,
        );
        assert_eq!(batch.next_unconsumed(1, |_| false), Some(2));
        assert_eq!(batch.next_unconsumed(1, |i| i == 2 || i == 3), Some(4));
        assert_eq!(batch.next_unconsumed(4, |i| i != 0), Some(0));
        assert_eq!(batch.next_unconsumed(2, |_| true), None);
    }

    #[test]
    fn test_next_unconsumed_single_question() {
        let batch = QuestionBatch::new(vec![question(1, Difficulty::Easy, OptionLetter::A)], 30);
        assert_eq!(batch.next_unconsumed(0, |_| false), None);
    }
}
