//! Quiz session state machine
//!
//! [`QuizSession`] owns the [`SessionState`] of one speed round and is only
//! ever driven by the session actor, one message at a time. It reacts to
//! player commands, countdown and fade alarms and round clock ticks, talks
//! to the presentation layer through a [`Tunnel`], and asks the actor to
//! start or stop producers through a `schedule` closure.

use std::{collections::BTreeSet, sync::Arc};

use serde::Serialize;
use web_time::SystemTime;

use crate::{
    AlarmMessage,
    clock::{self, Tick, Urgency},
    config::QuizConfig,
    constants::batch::OPTION_COUNT,
    countdown,
    lifeline::{self, Lifeline, LifelineUsage},
    preload::Preloader,
    question::{Difficulty, OptionLetter, Question, QuestionBatch, QuestionId},
    repository::{FinalTotals, LeaderboardEntry, SessionId},
    scoring::BonusTracker,
    session::{Cue, Tunnel},
    summary::{AnswerOutcome, Choice, SessionResult, Summary},
    writer::{PersistCommand, WriterHandle},
};

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Phase {
    /// No session is running
    #[default]
    Idle,
    /// The pre-round countdown is running; commands are rejected
    Countdown,
    /// Questions are on screen and the round clock is running
    Active,
    /// The session has ended; reached exactly once
    Ended,
}

/// Player commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Command {
    /// Answer the current question with the option at this index
    Answer(usize),
    /// Skip the current question
    Skip,
    /// Remove two wrong options
    FiftyFifty,
    /// Highlight the correct option
    Hint,
    /// End the session now
    EndSession,
}

/// Producer requests issued by the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Start the round clock
    StartClock,
    /// Start the 50/50 fade animation
    StartFade,
    /// Stop every running producer
    StopProducers,
}

/// Read-only view of a session, published after every handled message
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    /// Lifecycle phase
    pub phase: Phase,
    /// Batch index of the question on screen
    pub index: usize,
    /// Number of questions in the batch
    pub total_questions: usize,
    /// Indices already answered or skipped
    pub consumed: BTreeSet<usize>,
    /// Cumulative score
    pub score: u64,
    /// Correct answers
    pub correct: u32,
    /// Wrong answers and skips
    pub incorrect: u32,
    /// Sum of the speed bonuses included in `score`
    pub speed_bonus_total: u64,
    /// Seconds left on the round clock
    pub remaining_seconds: u32,
    /// Seconds spent on the current question
    pub question_elapsed: u32,
    /// Value shown by the countdown, while it runs
    pub countdown: Option<u32>,
    /// Lifeline usage counters
    pub lifelines: LifelineUsage,
    /// Whether the 50/50 fade is in flight
    pub animating: bool,
    /// Options being faded by 50/50
    pub fading: Vec<usize>,
    /// Options disabled on the current question
    pub disabled: BTreeSet<usize>,
    /// Option highlighted by the hint on the current question
    pub highlighted: Option<usize>,
    #[serde(skip)]
    bonus: BonusTracker,
}

/// A question as shown to the player, without its answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    /// Repository identifier
    pub id: QuestionId,
    /// Category
    pub category: String,
    /// Difficulty tier
    pub difficulty: Difficulty,
    /// Prompt text
    pub prompt: String,
    /// The four options, in letter order
    pub options: [String; OPTION_COUNT],
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id,
            category: question.category.clone(),
            difficulty: question.difficulty,
            prompt: question.prompt.clone(),
            options: question.options.clone(),
        }
    }
}

/// Question and score updates sent to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum UpdateMessage {
    /// A new question is on screen
    QuestionDisplayed {
        /// Batch index of the question
        index: usize,
        /// Number of questions resolved before this one
        resolved: usize,
        /// Number of questions in the batch
        total: usize,
        /// The question itself
        question: QuestionView,
    },
    /// The bonus a correct answer would earn right now
    BonusPreview {
        /// Bonus points
        bonus: u64,
    },
    /// The current question was answered or skipped
    AnswerResolved {
        /// Whether the answer was correct
        correct: bool,
        /// Chosen option, `None` for a skip
        option: Option<usize>,
        /// Points awarded including the bonus
        points: u64,
        /// Score after this answer
        score: u64,
    },
    /// The session is over
    SessionEnded(SessionResult),
}

/// The live state machine of one session
#[derive(Debug)]
pub struct QuizSession<T: Tunnel> {
    config: Arc<QuizConfig>,
    batch: Arc<QuestionBatch>,
    session: SessionId,
    player: String,
    tunnel: T,
    writer: WriterHandle,
    preloader: Option<Preloader>,
    state: SessionState,
    outcomes: Vec<AnswerOutcome>,
    final_summary: once_cell_serde::sync::OnceCell<Summary>,
}

impl<T: Tunnel> QuizSession<T> {
    /// Creates an idle session over `batch`
    ///
    /// # Arguments
    ///
    /// * `config` - Validated engine configuration
    /// * `batch` - Questions to play, shared with the preloader
    /// * `session` - Id of the persisted session record
    /// * `player` - Name the session is played under
    /// * `tunnel` - Presentation layer
    /// * `writer` - Persistence queue
    /// * `preloader` - Lookahead handle, if a preloader runs
    pub fn new(
        config: Arc<QuizConfig>,
        batch: Arc<QuestionBatch>,
        session: SessionId,
        player: String,
        tunnel: T,
        writer: WriterHandle,
        preloader: Option<Preloader>,
    ) -> Self {
        let state = SessionState {
            total_questions: batch.len(),
            remaining_seconds: config.round_seconds,
            ..SessionState::default()
        };
        Self {
            config,
            batch,
            session,
            player,
            tunnel,
            writer,
            preloader,
            state,
            outcomes: Vec::new(),
            final_summary: once_cell_serde::sync::OnceCell::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Final summary, once the session has ended
    pub fn summary(&self) -> Option<&Summary> {
        self.final_summary.get()
    }

    fn change_phase(&mut self, before: Phase, after: Phase) -> bool {
        if self.state.phase == before {
            self.state.phase = after;

            true
        } else {
            false
        }
    }

    fn current_question(&self) -> Option<&Question> {
        self.batch.get(self.state.index)
    }

    fn send(&self, message: impl Into<crate::UpdateMessage>) {
        self.tunnel.send_message(&message.into());
    }

    /// Enters the countdown phase
    ///
    /// Returns `false` if the session had already been started.
    pub fn begin(&mut self) -> bool {
        if self.change_phase(Phase::Idle, Phase::Countdown) {
            tracing::info!(
                "session {} started for {} with {} question(s)",
                self.session,
                self.player,
                self.batch.len()
            );
            true
        } else {
            false
        }
    }

    /// Handles a countdown or fade alarm
    pub fn receive_alarm<S: FnMut(Schedule)>(&mut self, alarm: AlarmMessage, mut schedule: S) {
        match alarm {
            AlarmMessage::Countdown(countdown::Alarm::Tick(value)) => {
                if self.state.phase == Phase::Countdown {
                    self.state.countdown = Some(value);
                    self.send(countdown::UpdateMessage::Tick(value));
                    self.tunnel.play_cue(Cue::CountdownTick);
                }
            }
            AlarmMessage::Countdown(countdown::Alarm::Complete) => {
                if self.change_phase(Phase::Countdown, Phase::Active) {
                    self.state.countdown = None;
                    self.send(countdown::UpdateMessage::Complete);
                    schedule(Schedule::StartClock);
                    self.display(0, &mut schedule);
                }
            }
            AlarmMessage::Lifeline(lifeline::Alarm::FadeStep { alpha }) => {
                if self.state.animating {
                    self.send(lifeline::UpdateMessage::FadeProgress {
                        options: self.state.fading.clone(),
                        alpha,
                    });
                }
            }
            AlarmMessage::Lifeline(lifeline::Alarm::FadeComplete) => {
                if self.state.animating {
                    self.state.animating = false;
                    self.state
                        .disabled
                        .extend(std::mem::take(&mut self.state.fading));
                    self.send_lifelines();
                }
            }
        }
    }

    /// Handles a round clock tick
    ///
    /// Remaining values that do not strictly decrease are ignored.
    pub fn receive_tick<S: FnMut(Schedule)>(&mut self, tick: Tick, schedule: S) {
        if self.state.phase != Phase::Active {
            tracing::debug!("ignoring {tick:?} outside of an active round");
            return;
        }
        match tick {
            Tick::Remaining(remaining) => {
                if remaining >= self.state.remaining_seconds {
                    tracing::debug!(
                        "ignoring clock value {remaining}, already at {}",
                        self.state.remaining_seconds
                    );
                    return;
                }
                self.state.remaining_seconds = remaining;
                self.state.question_elapsed = self.state.bonus.elapsed(remaining);
                self.send(clock::UpdateMessage::Tick {
                    remaining,
                    urgency: Urgency::from_remaining(remaining),
                });
                self.send_bonus_preview();
            }
            Tick::TimeUp => {
                self.state.remaining_seconds = 0;
                self.send(clock::UpdateMessage::TimeUp);
                self.tunnel.play_cue(Cue::TimeUp);
                self.end_session(schedule);
            }
        }
    }

    /// Handles a player command
    ///
    /// Returns whether the command was accepted. Rejected commands leave the
    /// state untouched.
    pub fn receive_command<S: FnMut(Schedule)>(&mut self, command: Command, mut schedule: S) -> bool {
        match command {
            Command::EndSession => return self.end_session(schedule),
            _ if !self.accepts_input(command) => return false,
            Command::Answer(option) => {
                let Some(letter) = OptionLetter::from_index(option) else {
                    tracing::debug!("rejecting answer for unknown option {option}");
                    return false;
                };
                if self.state.disabled.contains(&option) {
                    tracing::debug!("rejecting answer for disabled option {option}");
                    return false;
                }
                self.tunnel.play_cue(Cue::Click);
                self.resolve(Choice::Option(letter), &mut schedule);
            }
            Command::Skip => {
                if !self.claim(Lifeline::Skip) {
                    return false;
                }
                self.resolve(Choice::Skip, &mut schedule);
            }
            Command::FiftyFifty => {
                if !self.state.disabled.is_empty() {
                    tracing::debug!("rejecting 50/50, options already removed");
                    return false;
                }
                let Some(targets) = self.current_question().map(lifeline::fifty_fifty_targets)
                else {
                    return false;
                };
                if !self.claim(Lifeline::FiftyFifty) {
                    return false;
                }
                self.state.fading = targets;
                self.state.animating = true;
                self.send_lifelines();
                schedule(Schedule::StartFade);
            }
            Command::Hint => {
                if self.state.highlighted.is_some() {
                    tracing::debug!("rejecting hint, already shown");
                    return false;
                }
                let Some(target) = self.current_question().map(lifeline::hint_target) else {
                    return false;
                };
                if !self.claim(Lifeline::Hint) {
                    return false;
                }
                self.state.highlighted = Some(target);
                self.send_lifelines();
            }
        }
        true
    }

    /// Whether the current question can take `command` right now
    fn accepts_input(&self, command: Command) -> bool {
        if self.state.phase != Phase::Active {
            tracing::debug!("rejecting {command:?} in phase {:?}", self.state.phase);
            false
        } else if self.state.animating {
            tracing::debug!("rejecting {command:?} during the 50/50 fade");
            false
        } else if self.state.consumed.contains(&self.state.index) {
            tracing::debug!("rejecting {command:?}, question already resolved");
            false
        } else {
            true
        }
    }

    /// Records one use of `lifeline` if the policy allows it
    fn claim(&mut self, lifeline: Lifeline) -> bool {
        if !self
            .state
            .lifelines
            .available(lifeline, &self.config.lifelines)
        {
            tracing::debug!("rejecting {lifeline:?}, limit reached");
            return false;
        }
        self.tunnel.play_cue(Cue::Click);
        self.state.lifelines.record(lifeline);
        true
    }

    fn resolve<S: FnMut(Schedule)>(&mut self, choice: Choice, schedule: &mut S) {
        let Some(question) = self.current_question() else {
            tracing::warn!("no question at index {}", self.state.index);
            self.end_session(schedule);
            return;
        };
        let question_id = question.id;
        let correct = matches!(choice, Choice::Option(letter) if letter == question.correct);
        let (points, bonus) = if correct {
            let base = self.config.base_points(question.difficulty);
            let bonus = self.state.bonus.preview(
                base,
                self.state.remaining_seconds,
                self.config.bonus_window_seconds,
            );
            (base + bonus, bonus)
        } else {
            (0, 0)
        };

        self.state.consumed.insert(self.state.index);
        self.state.bonus.clear();
        if correct {
            self.state.score += points;
            self.state.correct += 1;
            self.state.speed_bonus_total += bonus;
            self.tunnel.play_cue(Cue::Correct);
        } else {
            self.state.incorrect += 1;
            self.tunnel.play_cue(Cue::Wrong);
        }

        self.writer.submit(PersistCommand::RecordAnswer {
            session: self.session,
            question: question_id,
            answer: choice.as_answer(),
            correct,
        });
        self.outcomes.push(AnswerOutcome {
            question_id,
            choice,
            correct,
            points,
            bonus,
            answered_at: SystemTime::now(),
        });
        self.send(UpdateMessage::AnswerResolved {
            correct,
            option: match choice {
                Choice::Option(letter) => Some(letter.index()),
                Choice::Skip => None,
            },
            points,
            score: self.state.score,
        });

        self.advance(schedule);
    }

    fn advance<S: FnMut(Schedule)>(&mut self, schedule: &mut S) {
        let next = match self.preloader.as_ref().and_then(Preloader::lookup) {
            Some(next) => next,
            None => {
                tracing::debug!("preloaded question not ready, looking it up directly");
                self.batch
                    .next_unconsumed(self.state.index, |i| self.state.consumed.contains(&i))
            }
        };
        match next {
            Some(index) => self.display(index, schedule),
            None => {
                self.end_session(schedule);
            }
        }
    }

    fn display<S: FnMut(Schedule)>(&mut self, index: usize, schedule: &mut S) {
        let Some(question) = self.batch.get(index) else {
            tracing::warn!("no question at index {index}");
            self.end_session(schedule);
            return;
        };
        let view = QuestionView::from(question);

        self.state.index = index;
        self.state.disabled.clear();
        self.state.fading.clear();
        self.state.highlighted = None;
        self.state.question_elapsed = 0;
        self.state.bonus.question_shown(self.state.remaining_seconds);
        if let Some(preloader) = self.preloader.as_mut() {
            preloader.publish(index, &self.state.consumed);
        }

        self.send(UpdateMessage::QuestionDisplayed {
            index,
            resolved: self.state.consumed.len(),
            total: self.batch.len(),
            question: view,
        });
        self.send_lifelines();
        self.send_bonus_preview();
    }

    fn send_bonus_preview(&self) {
        let Some(question) = self.current_question() else {
            return;
        };
        let bonus = self.state.bonus.preview(
            self.config.base_points(question.difficulty),
            self.state.remaining_seconds,
            self.config.bonus_window_seconds,
        );
        self.send(UpdateMessage::BonusPreview { bonus });
    }

    fn send_lifelines(&self) {
        let policy = &self.config.lifelines;
        let usage = &self.state.lifelines;
        self.send(lifeline::UpdateMessage::Changed {
            removed: self.state.disabled.iter().copied().collect(),
            hint: self.state.highlighted,
            skips_left: usage.remaining(Lifeline::Skip, policy),
            fifty_fifty_left: usage.remaining(Lifeline::FiftyFifty, policy),
            hints_left: usage.remaining(Lifeline::Hint, policy),
        });
    }

    /// Ends the session
    ///
    /// The first call stops every producer, queues the final totals and the
    /// leaderboard entry and publishes the result. Later calls do nothing
    /// and return `false`.
    pub fn end_session<S: FnMut(Schedule)>(&mut self, mut schedule: S) -> bool {
        if self.state.phase == Phase::Ended {
            tracing::debug!("session {} already ended", self.session);
            return false;
        }
        self.state.phase = Phase::Ended;
        self.state.animating = false;
        self.state.fading.clear();
        self.state.countdown = None;
        self.state.bonus.clear();
        schedule(Schedule::StopProducers);

        let summary = Summary::from_outcomes(self.player.clone(), self.outcomes.clone());
        let result = summary.result;
        let time_taken = self
            .config
            .round_seconds
            .saturating_sub(self.state.remaining_seconds);

        self.writer.submit(PersistCommand::Finalize {
            session: self.session,
            totals: FinalTotals::new(&result, time_taken, &self.state.lifelines),
        });
        self.writer
            .submit(PersistCommand::Leaderboard(LeaderboardEntry {
                player: self.player.clone(),
                session: self.session,
                score: result.score,
                questions_answered: result.total_questions,
                accuracy: result.accuracy,
            }));
        self.send(UpdateMessage::SessionEnded(result));

        tracing::info!(
            "session {} ended: score {}, {} correct, {} incorrect",
            self.session,
            result.score,
            result.correct,
            result.incorrect
        );
        let _ = self.final_summary.set(summary);
        true
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
pub(crate) mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{
        config::LifelinePolicy,
        preload,
        producer::ProducerSet,
        question::tests::question,
        writer::{self, PersistCommand},
    };

    #[derive(Debug, Clone, Default)]
    pub(crate) struct MockTunnel {
        pub(crate) messages: Arc<Mutex<VecDeque<crate::UpdateMessage>>>,
        pub(crate) cues: Arc<Mutex<Vec<Cue>>>,
    }

    impl MockTunnel {
        pub(crate) fn take(&self) -> Vec<crate::UpdateMessage> {
            self.messages.lock().unwrap().drain(..).collect()
        }

        pub(crate) fn cues(&self) -> Vec<Cue> {
            self.cues.lock().unwrap().clone()
        }
    }

    impl Tunnel for MockTunnel {
        fn send_message(&self, message: &crate::UpdateMessage) {
            self.messages.lock().unwrap().push_back(message.clone());
        }

        fn play_cue(&self, cue: Cue) {
            self.cues.lock().unwrap().push(cue);
        }
    }

    struct Harness {
        quiz: QuizSession<MockTunnel>,
        tunnel: MockTunnel,
        writes: mpsc::UnboundedReceiver<PersistCommand>,
        scheduled: Vec<Schedule>,
    }

    impl Harness {
        fn new(config: QuizConfig, questions: Vec<Question>) -> Self {
            Self::build(config, questions, None)
        }

        fn build(config: QuizConfig, questions: Vec<Question>, preloader: Option<Preloader>) -> Self {
            let tunnel = MockTunnel::default();
            let (writer, writes) = writer::channel();
            let batch = Arc::new(QuestionBatch::new(questions, config.max_questions));
            let quiz = QuizSession::new(
                Arc::new(config),
                batch,
                SessionId(7),
                "Rina".to_string(),
                tunnel.clone(),
                writer,
                preloader,
            );
            Self {
                quiz,
                tunnel,
                writes,
                scheduled: Vec::new(),
            }
        }

        fn active(config: QuizConfig, questions: Vec<Question>) -> Self {
            let mut harness = Self::new(config, questions);
            assert!(harness.quiz.begin());
            harness.alarm(countdown::Alarm::Complete.into());
            harness.tunnel.take();
            harness.scheduled.clear();
            harness
        }

        fn command(&mut self, command: Command) -> bool {
            let scheduled = &mut self.scheduled;
            self.quiz
                .receive_command(command, |schedule| scheduled.push(schedule))
        }

        fn alarm(&mut self, alarm: AlarmMessage) {
            let scheduled = &mut self.scheduled;
            self.quiz
                .receive_alarm(alarm, |schedule| scheduled.push(schedule));
        }

        fn tick(&mut self, tick: Tick) {
            let scheduled = &mut self.scheduled;
            self.quiz
                .receive_tick(tick, |schedule| scheduled.push(schedule));
        }

        fn writes(&mut self) -> Vec<PersistCommand> {
            let mut writes = Vec::new();
            while let Ok(command) = self.writes.try_recv() {
                writes.push(command);
            }
            writes
        }

        fn lookahead(&self) -> Option<Option<usize>> {
            self.quiz.preloader.as_ref().and_then(Preloader::lookup)
        }

        async fn staged_lookahead(&self) -> Option<usize> {
            loop {
                if let Some(next) = self.lookahead() {
                    return next;
                }
                tokio::task::yield_now().await;
            }
        }

        fn finalize_count(&mut self) -> usize {
            self.writes()
                .iter()
                .filter(|command| matches!(command, PersistCommand::Finalize { .. }))
                .count()
        }
    }

    fn easy_questions(count: u32) -> Vec<Question> {
        (1..=count)
            .map(|id| question(id, Difficulty::Easy, OptionLetter::A))
            .collect()
    }

    #[test]
    fn test_countdown_phase() {
        let mut harness = Harness::new(QuizConfig::default(), easy_questions(3));
        assert_eq!(harness.quiz.phase(), Phase::Idle);
        assert!(!harness.command(Command::Answer(0)));

        assert!(harness.quiz.begin());
        assert!(!harness.quiz.begin());
        harness.alarm(countdown::Alarm::Tick(3).into());
        assert_eq!(harness.quiz.state().countdown, Some(3));
        assert!(!harness.command(Command::Answer(0)));
        assert!(!harness.command(Command::Skip));
        assert_eq!(harness.quiz.state().consumed.len(), 0);

        harness.alarm(countdown::Alarm::Complete.into());
        assert_eq!(harness.quiz.phase(), Phase::Active);
        assert_eq!(harness.scheduled, vec![Schedule::StartClock]);
        assert_eq!(harness.tunnel.cues(), vec![Cue::CountdownTick]);

        let messages = harness.tunnel.take();
        assert_eq!(
            messages[0],
            crate::UpdateMessage::Countdown(countdown::UpdateMessage::Tick(3))
        );
        assert!(messages.iter().any(|m| matches!(
            m,
            crate::UpdateMessage::Quiz(UpdateMessage::QuestionDisplayed { index: 0, .. })
        )));
    }

    #[test]
    fn test_easy_correct_after_four_seconds() {
        let mut harness = Harness::active(QuizConfig::default(), easy_questions(2));
        for remaining in (56..60).rev() {
            harness.tick(Tick::Remaining(remaining));
        }
        assert_eq!(harness.quiz.state().question_elapsed, 4);

        assert!(harness.command(Command::Answer(0)));
        let state = harness.quiz.state();
        assert_eq!(state.score, 16);
        assert_eq!(state.speed_bonus_total, 6);
        assert_eq!(state.correct, 1);
        assert_eq!(state.index, 1);
        assert!(
            harness
                .tunnel
                .take()
                .contains(&crate::UpdateMessage::Quiz(UpdateMessage::AnswerResolved {
                    correct: true,
                    option: Some(0),
                    points: 16,
                    score: 16,
                }))
        );
        assert_eq!(
            harness.writes(),
            vec![PersistCommand::RecordAnswer {
                session: SessionId(7),
                question: QuestionId(1),
                answer: "A".to_string(),
                correct: true,
            }]
        );
    }

    #[test]
    fn test_bonus_resets_per_question() {
        let mut harness = Harness::active(QuizConfig::default(), easy_questions(2));
        for remaining in (50..60).rev() {
            harness.tick(Tick::Remaining(remaining));
        }
        assert!(harness.command(Command::Answer(1)));
        assert_eq!(harness.quiz.state().score, 0);

        harness.tick(Tick::Remaining(49));
        assert!(harness.command(Command::Answer(0)));
        // one second into the second question: 10 + floor(10 * 9 / 10)
        assert_eq!(harness.quiz.state().score, 19);
    }

    #[test]
    fn test_stale_clock_values_ignored() {
        let mut harness = Harness::active(QuizConfig::default(), easy_questions(2));
        harness.tick(Tick::Remaining(55));
        harness.tick(Tick::Remaining(57));
        harness.tick(Tick::Remaining(55));
        assert_eq!(harness.quiz.state().remaining_seconds, 55);
        let ticks = harness
            .tunnel
            .take()
            .into_iter()
            .filter(|m| matches!(m, crate::UpdateMessage::Clock(_)))
            .count();
        assert_eq!(ticks, 1);
    }

    #[test]
    fn test_wrong_and_skip_only_increment_incorrect() {
        let mut harness = Harness::active(QuizConfig::default(), easy_questions(3));
        assert!(harness.command(Command::Answer(3)));
        assert!(harness.command(Command::Skip));
        let state = harness.quiz.state();
        assert_eq!(state.incorrect, 2);
        assert_eq!(state.correct, 0);
        assert_eq!(state.score, 0);

        let answers = harness
            .writes()
            .into_iter()
            .filter_map(|command| match command {
                PersistCommand::RecordAnswer { answer, .. } => Some(answer),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(answers, vec!["D".to_string(), "SKIP".to_string()]);
    }

    #[test]
    fn test_last_answer_ends_session() {
        let mut harness = Harness::active(QuizConfig::default(), easy_questions(2));
        assert!(harness.command(Command::Answer(0)));
        assert!(harness.command(Command::Answer(0)));
        assert_eq!(harness.quiz.phase(), Phase::Ended);
        assert_eq!(harness.scheduled, vec![Schedule::StopProducers]);

        let state = harness.quiz.state().clone();
        assert_eq!(
            (state.correct + state.incorrect) as usize,
            state.consumed.len()
        );
        let summary = harness.quiz.summary().unwrap();
        assert_eq!(summary.result.score, state.score);
        assert_eq!(summary.outcomes.len(), 2);
        assert_eq!(harness.finalize_count(), 1);
    }

    #[test]
    fn test_end_session_twice_finalizes_once() {
        let mut harness = Harness::active(QuizConfig::default(), easy_questions(3));
        assert!(harness.command(Command::EndSession));
        assert!(!harness.command(Command::EndSession));
        harness.tick(Tick::TimeUp);
        assert_eq!(harness.finalize_count(), 1);
        assert!(!harness.command(Command::Answer(0)));
    }

    #[test]
    fn test_end_session_during_countdown_and_fade() {
        let mut harness = Harness::new(QuizConfig::default(), easy_questions(3));
        assert!(harness.quiz.begin());
        assert!(harness.command(Command::EndSession));
        assert_eq!(harness.quiz.phase(), Phase::Ended);
        assert_eq!(harness.scheduled, vec![Schedule::StopProducers]);
        assert_eq!(harness.finalize_count(), 1);

        let mut harness = Harness::active(QuizConfig::default(), easy_questions(3));
        assert!(harness.command(Command::FiftyFifty));
        assert!(harness.command(Command::EndSession));
        let state = harness.quiz.state();
        assert!(!state.animating);
        assert!(state.fading.is_empty());
        assert!(!harness.command(Command::EndSession));
    }

    #[tokio::test(start_paused = true)]
    async fn test_advance_uses_staged_lookahead() {
        let (preloader, task) = preload::channel();
        let mut harness = Harness::build(QuizConfig::default(), easy_questions(3), Some(preloader));
        let producers = ProducerSet::new(Duration::from_millis(10));
        let handle = tokio::spawn(task.run(
            harness.quiz.batch.clone(),
            Duration::from_millis(500),
            producers.subscribe(),
        ));

        assert!(harness.quiz.begin());
        harness.alarm(countdown::Alarm::Complete.into());
        assert_eq!(harness.staged_lookahead().await, Some(1));
        assert!(harness.command(Command::Answer(0)));
        assert_eq!(harness.quiz.state().index, 1);

        // the task has not seen the new cursor yet
        assert_eq!(harness.lookahead(), None);
        assert!(harness.command(Command::Skip));
        assert_eq!(harness.quiz.state().index, 2);

        assert_eq!(harness.staged_lookahead().await, None);
        assert!(harness.command(Command::Answer(0)));
        assert_eq!(harness.quiz.phase(), Phase::Ended);
        assert_eq!(harness.quiz.state().consumed, BTreeSet::from([0, 1, 2]));

        producers.stop();
        handle.await.unwrap();
    }

    #[test]
    fn test_time_up_ends_session() {
        let mut harness = Harness::active(QuizConfig::default(), easy_questions(3));
        harness.tick(Tick::TimeUp);
        assert_eq!(harness.quiz.phase(), Phase::Ended);
        assert!(harness.tunnel.cues().contains(&Cue::TimeUp));

        let writes = harness.writes();
        assert!(writes.iter().any(|command| matches!(
            command,
            PersistCommand::Finalize { totals, .. } if totals.time_taken_seconds == 60
        )));
        assert!(writes.iter().any(|command| matches!(
            command,
            PersistCommand::Leaderboard(entry) if entry.player == "Rina" && entry.score == 0
        )));
    }

    #[test]
    fn test_fifty_fifty_flow() {
        let mut harness = Harness::active(QuizConfig::default(), easy_questions(3));
        assert!(harness.command(Command::FiftyFifty));
        assert!(harness.quiz.state().animating);
        assert_eq!(harness.scheduled, vec![Schedule::StartFade]);

        assert!(!harness.command(Command::Answer(0)));
        assert!(!harness.command(Command::Skip));
        assert!(!harness.command(Command::Hint));

        harness.alarm(lifeline::Alarm::FadeStep { alpha: 0.5 }.into());
        harness.alarm(lifeline::Alarm::FadeComplete.into());
        let state = harness.quiz.state();
        assert!(!state.animating);
        assert_eq!(state.disabled, BTreeSet::from([1, 2]));

        assert!(!harness.command(Command::Answer(1)));
        assert!(!harness.command(Command::FiftyFifty));
        assert!(harness.command(Command::Answer(3)));
        assert!(harness.quiz.state().disabled.is_empty());

        assert!(!harness.command(Command::FiftyFifty));
        assert!(
            harness
                .tunnel
                .take()
                .contains(&crate::UpdateMessage::Lifeline(
                    lifeline::UpdateMessage::FadeProgress {
                        options: vec![1, 2],
                        alpha: 0.5,
                    }
                ))
        );
    }

    #[test]
    fn test_hint_once() {
        let mut harness = Harness::active(
            QuizConfig::default(),
            vec![
                question(1, Difficulty::Hard, OptionLetter::C),
                question(2, Difficulty::Hard, OptionLetter::B),
            ],
        );
        assert!(harness.command(Command::Hint));
        assert_eq!(harness.quiz.state().highlighted, Some(2));
        assert!(!harness.command(Command::Hint));
        assert_eq!(harness.quiz.state().score, 0);

        assert!(harness.command(Command::Skip));
        assert_eq!(harness.quiz.state().highlighted, None);
        assert!(!harness.command(Command::Hint));
    }

    #[test]
    fn test_skip_limit_policy() {
        let config = QuizConfig {
            lifelines: LifelinePolicy {
                skip_limit: Some(1),
                ..LifelinePolicy::default()
            },
            ..QuizConfig::default()
        };
        let mut harness = Harness::active(config, easy_questions(3));
        assert!(harness.command(Command::Skip));
        assert!(!harness.command(Command::Skip));
        assert_eq!(harness.quiz.state().incorrect, 1);
    }

    #[test]
    fn test_invalid_option_rejected() {
        let mut harness = Harness::active(QuizConfig::default(), easy_questions(2));
        assert!(!harness.command(Command::Answer(4)));
        assert!(harness.quiz.state().consumed.is_empty());
        assert!(harness.writes().is_empty());
    }

    #[test]
    fn test_cues() {
        let mut harness = Harness::active(QuizConfig::default(), easy_questions(3));
        assert!(harness.command(Command::Answer(0)));
        assert!(harness.command(Command::Answer(1)));
        assert_eq!(
            harness.tunnel.cues(),
            vec![Cue::Click, Cue::Correct, Cue::Click, Cue::Wrong]
        );
    }

    #[test]
    fn test_score_is_sum_of_outcomes() {
        let mut harness = Harness::active(
            QuizConfig::default(),
            vec![
                question(1, Difficulty::Easy, OptionLetter::A),
                question(2, Difficulty::Medium, OptionLetter::B),
                question(3, Difficulty::Hard, OptionLetter::C),
            ],
        );
        harness.tick(Tick::Remaining(58));
        assert!(harness.command(Command::Answer(0)));
        harness.tick(Tick::Remaining(53));
        assert!(harness.command(Command::Answer(1)));
        harness.tick(Tick::Remaining(40));
        assert!(harness.command(Command::Answer(2)));

        let summary = harness.quiz.summary().unwrap().clone();
        // 10+8, 15+7, 25+0
        assert_eq!(summary.result.score, 65);
        assert_eq!(summary.result.speed_bonus_total, 15);
        assert_eq!(
            summary.result.score,
            summary.outcomes.iter().map(|o| o.points).sum::<u64>()
        );
        assert!((summary.result.accuracy - 100.0).abs() < f64::EPSILON);
    }
}
