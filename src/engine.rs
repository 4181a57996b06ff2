//! Session engine
//!
//! [`QuizEngine`] is the public face of the crate. Starting a session fetches
//! a batch, creates the persistent record and spawns a single actor task that
//! owns the [`QuizSession`]. Player commands, producer alarms and round clock
//! ticks all reach the actor over channels and are handled one at a time;
//! readers follow along through a watch channel of [`SessionState`]
//! snapshots.

use std::{sync::Arc, time::Duration};

use garde::Validate;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

use crate::{
    AlarmMessage, Error,
    clock::{self, TickReceiver, TickSender},
    config::QuizConfig,
    countdown, lifeline, names,
    preload::{self, PreloadTask},
    producer::{Epoch, ProducerSet, Stamped},
    question::{Difficulty, QuestionBatch},
    quiz::{Command, Phase, QuizSession, Schedule, SessionState},
    repository::{QuestionRepository, SessionId, SessionStore},
    session::Tunnel,
    summary::{SessionResult, Summary},
    writer,
};

const SECOND: Duration = Duration::from_secs(1);

/// What the player asked to play
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    /// Player name; a guest name is generated when missing or blank
    pub player: Option<String>,
    /// Category filter; `None` plays every category
    pub category: Option<String>,
    /// Difficulty tier
    pub difficulty: Difficulty,
}

#[derive(Debug)]
enum Control {
    Command(Command),
    Abandon,
}

#[derive(Debug)]
struct Running {
    session: SessionId,
    control: mpsc::UnboundedSender<Control>,
    actor: JoinHandle<Option<Summary>>,
    writer: JoinHandle<()>,
}

/// The speed-quiz engine
///
/// One engine runs at most one session at a time.
pub struct QuizEngine<T: Tunnel + Clone> {
    config: Arc<QuizConfig>,
    repository: Arc<dyn QuestionRepository>,
    store: Arc<dyn SessionStore>,
    tunnel: T,
    epoch: Epoch,
    state: Arc<watch::Sender<SessionState>>,
    running: Option<Running>,
    last_summary: Option<Summary>,
}

impl<T: Tunnel + Clone> QuizEngine<T> {
    /// Creates an idle engine
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if `config` fails validation.
    pub fn new(
        config: QuizConfig,
        repository: Arc<dyn QuestionRepository>,
        store: Arc<dyn SessionStore>,
        tunnel: T,
    ) -> Result<Self, Error> {
        config.validate()?;
        let (state, _) = watch::channel(SessionState::default());
        Ok(Self {
            config: Arc::new(config),
            repository,
            store,
            tunnel,
            epoch: Epoch::default(),
            state: Arc::new(state),
            running: None,
            last_summary: None,
        })
    }

    /// Phase of the current session, `Idle` when there is none
    pub fn phase(&self) -> Phase {
        self.state.borrow().phase
    }

    /// A copy of the latest published state
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Subscribes to state snapshots
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Id of the running session
    pub fn session_id(&self) -> Option<SessionId> {
        self.running.as_ref().map(|running| running.session)
    }

    /// Summary of the last session that ended
    pub fn last_summary(&self) -> Option<&Summary> {
        self.last_summary.as_ref()
    }

    /// Starts a new session
    ///
    /// On success the engine is in `Countdown` and the countdown producer is
    /// running. On failure the engine stays `Idle`.
    ///
    /// # Errors
    ///
    /// * `Error::SessionRunning` - The previous session has not ended
    /// * `Error::InvalidPlayer` - The supplied player name was rejected
    /// * `Error::Repository` - The question repository failed
    /// * `Error::EmptyBatch` - No question matched the request
    /// * `Error::SessionCreation` - The session record could not be created
    /// * `Error::InvalidSessionId` - The store returned an id of zero or less
    pub async fn start_session(&mut self, request: SessionRequest) -> Result<SessionId, Error> {
        if self
            .running
            .as_ref()
            .is_some_and(|running| !running.actor.is_finished())
        {
            return Err(Error::SessionRunning);
        }
        self.reap().await;
        self.state.send_replace(SessionState::default());

        let player = names::resolve_player(request.player.as_deref())?;
        let category = request.category.as_deref();

        let questions = self
            .repository
            .fetch_questions(category, request.difficulty, self.config.max_questions)
            .await
            .map_err(Error::Repository)?;
        let batch = Arc::new(QuestionBatch::new(questions, self.config.max_questions));
        if batch.is_empty() {
            tracing::warn!("no {} questions for {category:?}", request.difficulty);
            return Err(Error::EmptyBatch {
                difficulty: request.difficulty,
            });
        }

        let session = self
            .store
            .create_session(&player, category, request.difficulty)
            .await
            .map_err(Error::SessionCreation)?;
        if !session.is_valid() {
            return Err(Error::InvalidSessionId(session));
        }

        self.epoch = self.epoch.next();
        let (writer, writer_task) = writer::spawn_writer(self.store.clone());
        let (preloader, preload_task) = preload::channel();
        let quiz = QuizSession::new(
            self.config.clone(),
            batch.clone(),
            session,
            player,
            self.tunnel.clone(),
            writer,
            Some(preloader),
        );

        let (control, commands) = mpsc::unbounded_channel();
        let (alarms_tx, alarms_rx) = mpsc::unbounded_channel();
        let (ticks_tx, ticks_rx) = clock::channel();
        let mut actor = Actor {
            quiz,
            config: self.config.clone(),
            batch,
            epoch: self.epoch,
            producers: ProducerSet::new(self.config.shutdown_grace),
            commands,
            alarms_tx,
            alarms_rx,
            ticks_tx,
            ticks_rx,
            state: self.state.clone(),
        };
        actor.start(preload_task);
        self.running = Some(Running {
            session,
            control,
            actor: tokio::spawn(actor.run()),
            writer: writer_task,
        });
        Ok(session)
    }

    fn send(&self, command: Command) {
        match &self.running {
            Some(running) => {
                if running.control.send(Control::Command(command)).is_err() {
                    tracing::debug!("ignoring {command:?}, session already over");
                }
            }
            None => tracing::debug!("ignoring {command:?} without a session"),
        }
    }

    /// Answers the current question with the option at `option`
    pub fn submit_answer(&self, option: usize) {
        self.send(Command::Answer(option));
    }

    /// Skips the current question
    pub fn skip(&self) {
        self.send(Command::Skip);
    }

    /// Uses the 50/50 lifeline
    pub fn use_fifty_fifty(&self) {
        self.send(Command::FiftyFifty);
    }

    /// Uses the hint lifeline
    pub fn use_hint(&self) {
        self.send(Command::Hint);
    }

    /// Ends the session and returns its result
    ///
    /// Works whether the session is still running or already ended on its
    /// own; returns the previous result if called again. Waits until the
    /// final writes have been handed to the store.
    pub async fn end_session(&mut self) -> Option<SessionResult> {
        if let Some(running) = &self.running {
            let _ = running.control.send(Control::Command(Command::EndSession));
        }
        self.reap().await;
        self.last_summary.as_ref().map(|summary| summary.result)
    }

    /// Abandons the session without finalizing it
    ///
    /// Every producer is stopped and the engine returns to `Idle`.
    pub async fn abandon(&mut self) {
        let Some(running) = &self.running else {
            return;
        };
        tracing::info!("abandoning session {}", running.session);
        let _ = running.control.send(Control::Abandon);
        self.reap().await;
        self.state.send_replace(SessionState::default());
    }

    /// Waits for the actor and writer of the last session to finish
    async fn reap(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        match running.actor.await {
            Ok(Some(summary)) => self.last_summary = Some(summary),
            Ok(None) => {}
            Err(e) => tracing::warn!("session {} actor failed: {e}", running.session),
        }
        if let Err(e) = running.writer.await {
            tracing::warn!("session {} writer failed: {e}", running.session);
        }
    }
}

/// The task owning one session
struct Actor<T: Tunnel> {
    quiz: QuizSession<T>,
    config: Arc<QuizConfig>,
    batch: Arc<QuestionBatch>,
    epoch: Epoch,
    producers: ProducerSet,
    commands: mpsc::UnboundedReceiver<Control>,
    alarms_tx: mpsc::UnboundedSender<Stamped<AlarmMessage>>,
    alarms_rx: mpsc::UnboundedReceiver<Stamped<AlarmMessage>>,
    ticks_tx: TickSender,
    ticks_rx: TickReceiver,
    state: Arc<watch::Sender<SessionState>>,
}

impl<T: Tunnel> Actor<T> {
    /// Enters the countdown and starts the countdown and preloader producers
    fn start(&mut self, preload_task: PreloadTask) {
        self.quiz.begin();
        self.producers.spawn(
            "countdown",
            countdown::run(
                self.config.countdown_seconds,
                SECOND,
                self.epoch,
                self.alarms_tx.clone(),
                self.producers.subscribe(),
            ),
        );
        self.producers.spawn(
            "preloader",
            preload_task.run(
                self.batch.clone(),
                self.config.preload_interval,
                self.producers.subscribe(),
            ),
        );
        self.publish();
    }

    async fn run(mut self) -> Option<Summary> {
        loop {
            let mut scheduled = Vec::new();
            tokio::select! {
                control = self.commands.recv() => match control {
                    Some(Control::Command(command)) => {
                        self.quiz.receive_command(command, |s| scheduled.push(s));
                    }
                    Some(Control::Abandon) | None => {
                        self.producers.join().await;
                        return None;
                    }
                },
                Some(alarm) = self.alarms_rx.recv() => {
                    if let Some(alarm) = self.current(alarm) {
                        self.quiz.receive_alarm(alarm, |s| scheduled.push(s));
                    }
                }
                Ok(()) = self.ticks_rx.changed() => {
                    let tick = *self.ticks_rx.borrow_and_update();
                    if let Some(tick) = tick.and_then(|tick| self.current(tick)) {
                        self.quiz.receive_tick(tick, |s| scheduled.push(s));
                    }
                }
            }

            for schedule in scheduled {
                self.apply(schedule);
            }
            self.publish();

            if self.quiz.phase() == Phase::Ended {
                self.producers.join().await;
                return self.quiz.summary().cloned();
            }
        }
    }

    /// Unwraps a producer message of this session's epoch
    fn current<M: std::fmt::Debug>(&self, stamped: Stamped<M>) -> Option<M> {
        if stamped.epoch == self.epoch {
            Some(stamped.message)
        } else {
            tracing::debug!(
                "dropping {:?} from epoch {}, now at {}",
                stamped.message,
                stamped.epoch,
                self.epoch
            );
            None
        }
    }

    fn apply(&mut self, schedule: Schedule) {
        match schedule {
            Schedule::StartClock => self.producers.spawn(
                "clock",
                clock::run(
                    self.config.round_seconds,
                    SECOND,
                    self.epoch,
                    self.ticks_tx.clone(),
                    self.producers.subscribe(),
                ),
            ),
            Schedule::StartFade => self.producers.spawn(
                "fade",
                lifeline::run_fade(
                    self.config.fade_duration,
                    self.config.fade_step,
                    self.epoch,
                    self.alarms_tx.clone(),
                    self.producers.subscribe(),
                ),
            ),
            Schedule::StopProducers => self.producers.stop(),
        }
    }

    fn publish(&self) {
        self.state.send_replace(self.quiz.state().clone());
    }
}
