//! Round clock
//!
//! The round clock is the master deadline of a session. It is started once,
//! when the countdown completes, and keeps running across question changes.
//! Remaining time is always derived from the fixed deadline, so a delayed
//! or dropped tick never skews it. Ticks travel over a watch channel, so a
//! slow reader always sees the latest value and never a backlog.

use std::time::Duration;

use serde::Serialize;
use tokio::{
    sync::watch,
    time::{Instant, MissedTickBehavior},
};

use crate::{
    constants::round::{CRITICAL_THRESHOLD, WARNING_THRESHOLD},
    producer::{Epoch, Shutdown, Stamped},
};

/// Clock events delivered to the session actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Whole seconds left on the round clock
    Remaining(u32),
    /// The clock ran out; sent exactly once
    TimeUp,
}

/// How close the round is to its deadline, for display purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Urgency {
    /// More than 30 seconds left
    Normal,
    /// 30 seconds or less
    Warning,
    /// 10 seconds or less
    Critical,
}

impl Urgency {
    /// Classifies a remaining time
    pub fn from_remaining(remaining: u32) -> Self {
        if remaining <= CRITICAL_THRESHOLD {
            Self::Critical
        } else if remaining <= WARNING_THRESHOLD {
            Self::Warning
        } else {
            Self::Normal
        }
    }
}

/// Clock updates sent to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpdateMessage {
    /// Seconds left on the round clock
    Tick {
        /// Whole seconds left
        remaining: u32,
        /// Display urgency of the remaining time
        urgency: Urgency,
    },
    /// The round is over
    TimeUp,
}

/// Sending half of the clock channel
pub type TickSender = watch::Sender<Option<Stamped<Tick>>>;

/// Receiving half of the clock channel
pub type TickReceiver = watch::Receiver<Option<Stamped<Tick>>>;

/// Creates the channel the clock delivers on
///
/// At most one tick is ever pending: a newer tick replaces one the reader
/// has not seen yet.
pub fn channel() -> (TickSender, TickReceiver) {
    watch::channel(None)
}

/// Whole periods left before `deadline`, rounded to the nearest period
fn remaining_periods(deadline: Instant, now: Instant, period: Duration) -> u32 {
    let left = deadline.saturating_duration_since(now).as_nanos();
    let period = period.as_nanos().max(1);
    ((left + period / 2) / period) as u32
}

/// Runs the round clock for `total` periods
///
/// Every period the remaining time replaces whatever tick is still pending.
/// The terminal [`Tick::TimeUp`] is the last value ever sent, so nothing
/// can replace it before the reader sees it.
pub async fn run(
    total: u32,
    period: Duration,
    epoch: Epoch,
    ticks: TickSender,
    mut shutdown: Shutdown,
) {
    let start = Instant::now();
    let deadline = start + period * total;
    let mut interval = tokio::time::interval_at(start + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            () = shutdown.recv() => {
                tracing::debug!("round clock stopped");
                return;
            }
        }

        if ticks.is_closed() {
            tracing::debug!("round clock outlived its session");
            return;
        }

        let remaining = remaining_periods(deadline, Instant::now(), period);
        let tick = if remaining == 0 {
            Tick::TimeUp
        } else {
            Tick::Remaining(remaining)
        };
        if let Some(unseen) = ticks.send_replace(Some(Stamped::new(epoch, tick))) {
            tracing::trace!("replaced {:?}", unseen.message);
        }
        if tick == Tick::TimeUp {
            return;
        }
    }
}
