//! Terminal front end for the RapidQ engine
//!
//! Loads a JSON question bank, plays one session against in-memory storage
//! and reads the player's input from stdin.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use itertools::Itertools;
use rapidq::{
    UpdateMessage,
    clock::{self, Urgency},
    config::QuizConfig,
    countdown,
    engine::{QuizEngine, SessionRequest},
    lifeline,
    memory::{MemoryQuestionBank, MemoryStore},
    question::{Difficulty, OptionLetter},
    quiz::{self, Command, Phase},
    session::{Cue, Tunnel},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "rapidq", about = "Timed speed quiz in the terminal", version)]
struct Cli {
    /// JSON file holding the question bank
    questions: PathBuf,

    /// Only play questions of this category
    #[arg(short, long)]
    category: Option<String>,

    /// Difficulty tier (easy, medium, hard)
    #[arg(short, long, default_value = "easy")]
    difficulty: Difficulty,

    /// Player name; a guest name is generated when omitted
    #[arg(short, long)]
    player: Option<String>,

    /// JSON engine configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// Prints engine updates to stdout
struct Terminal;

impl Tunnel for Terminal {
    fn send_message(&self, message: &UpdateMessage) {
        match message {
            UpdateMessage::Countdown(countdown::UpdateMessage::Tick(value)) => println!("{value}..."),
            UpdateMessage::Countdown(countdown::UpdateMessage::Complete) => println!("Go!"),
            UpdateMessage::Clock(clock::UpdateMessage::Tick { remaining, urgency }) => {
                if remaining % 10 == 0 || *urgency == Urgency::Critical {
                    println!("[{remaining}s left]");
                }
            }
            UpdateMessage::Clock(clock::UpdateMessage::TimeUp) => println!("Time's up!"),
            UpdateMessage::Lifeline(lifeline::UpdateMessage::Changed { removed, hint, .. }) => {
                if !removed.is_empty() {
                    println!("Removed: {}", letters(removed));
                }
                if let Some(hint) = hint {
                    println!("Hint: {}", letters(&[*hint]));
                }
            }
            UpdateMessage::Lifeline(lifeline::UpdateMessage::FadeProgress { .. })
            | UpdateMessage::Quiz(quiz::UpdateMessage::BonusPreview { .. }) => {}
            UpdateMessage::Quiz(quiz::UpdateMessage::QuestionDisplayed {
                resolved,
                total,
                question,
                ..
            }) => {
                println!();
                println!(
                    "Question {} of {total} [{}]",
                    resolved + 1,
                    question.difficulty
                );
                println!("{}", question.prompt);
                for (letter, option) in OptionLetter::ALL.iter().zip(&question.options) {
                    println!("  {letter}. {option}");
                }
            }
            UpdateMessage::Quiz(quiz::UpdateMessage::AnswerResolved {
                correct,
                points,
                score,
                ..
            }) => {
                if *correct {
                    println!("Correct! +{points} (score {score})");
                } else {
                    println!("Wrong. (score {score})");
                }
            }
            UpdateMessage::Quiz(quiz::UpdateMessage::SessionEnded(result)) => {
                println!();
                println!(
                    "Final score {} with {} correct and {} incorrect ({:.1}% accuracy, {} bonus)",
                    result.score,
                    result.correct,
                    result.incorrect,
                    result.accuracy,
                    result.speed_bonus_total
                );
            }
        }
    }

    fn play_cue(&self, cue: Cue) {
        tracing::debug!("cue {cue:?}");
    }
}

fn letters(indices: &[usize]) -> String {
    indices
        .iter()
        .filter_map(|i| OptionLetter::from_index(*i))
        .join(", ")
}

/// Maps a line of input to a command
fn parse_input(line: &str) -> Option<Command> {
    match line.trim().to_ascii_lowercase().as_str() {
        "a" => Some(Command::Answer(0)),
        "b" => Some(Command::Answer(1)),
        "c" => Some(Command::Answer(2)),
        "d" => Some(Command::Answer(3)),
        "s" | "skip" => Some(Command::Skip),
        "5050" | "50" => Some(Command::FiftyFifty),
        "h" | "hint" => Some(Command::Hint),
        "q" | "quit" => Some(Command::EndSession),
        _ => None,
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => QuizConfig::from_json(
            &std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?,
        )?,
        None => QuizConfig::default(),
    };
    let bank = MemoryQuestionBank::from_json(
        &std::fs::read_to_string(&cli.questions)
            .with_context(|| format!("reading {}", cli.questions.display()))?,
    )?;
    tracing::info!("loaded {} question(s)", bank.len());

    let store = Arc::new(MemoryStore::default());
    let mut engine = QuizEngine::new(config, Arc::new(bank), store.clone(), Arc::new(Terminal))?;
    engine
        .start_session(SessionRequest {
            player: cli.player,
            category: cli.category,
            difficulty: cli.difficulty,
        })
        .await?;
    println!("Answer with a-d, or type skip, 5050, hint or quit.");

    let mut state = engine.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_input(&line) {
                    Some(Command::Answer(option)) => engine.submit_answer(option),
                    Some(Command::Skip) => engine.skip(),
                    Some(Command::FiftyFifty) => engine.use_fifty_fifty(),
                    Some(Command::Hint) => engine.use_hint(),
                    Some(Command::EndSession) => break,
                    None => println!("Unknown input `{}`", line.trim()),
                }
            }
            changed = state.changed() => {
                if changed.is_err() || state.borrow_and_update().phase == Phase::Ended {
                    break;
                }
            }
        }
    }

    engine.end_session().await;
    if let Some(summary) = engine.last_summary() {
        println!(
            "{} answered {} question(s), {} skipped",
            summary.player,
            summary.outcomes.len(),
            summary.skipped().count()
        );
    }
    for entry in store.leaderboard() {
        println!(
            "Leaderboard: {} scored {} in session {}",
            entry.player, entry.score, entry.session
        );
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(cli));
    // stdin reads block a worker thread until the next line arrives
    runtime.shutdown_background();
    result
}
