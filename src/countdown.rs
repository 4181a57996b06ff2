//! Pre-round countdown
//!
//! The countdown ticks once per second from `n` down to 1 and then reports
//! completion. It does not guard commands itself; the session rejects every
//! command while its phase is `Countdown`.

use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::{
    AlarmMessage,
    producer::{Epoch, Shutdown, Stamped},
};

/// Countdown events delivered to the session actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alarm {
    /// The countdown shows `value`
    Tick(u32),
    /// The countdown reached zero
    Complete,
}

/// Countdown updates sent to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpdateMessage {
    /// The countdown shows the given number
    Tick(u32),
    /// Gameplay is about to start
    Complete,
}

/// Runs a countdown from `from` down to 1, one tick per `period`
///
/// Returns early, without error, when shutdown is requested or when the
/// session actor has gone away.
pub async fn run(
    from: u32,
    period: Duration,
    epoch: Epoch,
    alarms: mpsc::UnboundedSender<Stamped<AlarmMessage>>,
    mut shutdown: Shutdown,
) {
    for value in (1..=from).rev() {
        if alarms
            .send(Stamped::new(epoch, Alarm::Tick(value).into()))
            .is_err()
        {
            return;
        }
        tokio::select! {
            () = tokio::time::sleep(period) => {}
            () = shutdown.recv() => {
                tracing::debug!("countdown cancelled at {value}");
                return;
            }
        }
    }
    let _ = alarms.send(Stamped::new(epoch, Alarm::Complete.into()));
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::producer::ProducerSet;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_countdown_ticks_then_completes() {
        let set = ProducerSet::new(Duration::from_millis(10));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let started = Instant::now();
        tokio::spawn(run(
            3,
            Duration::from_secs(1),
            Epoch::default(),
            tx,
            set.subscribe(),
        ));

        let mut seen = Vec::new();
        while let Some(Stamped { message, .. }) = rx.recv().await {
            seen.push((message, started.elapsed().as_secs()));
        }
        assert_eq!(
            seen,
            vec![
                (Alarm::Tick(3).into(), 0),
                (Alarm::Tick(2).into(), 1),
                (Alarm::Tick(1).into(), 2),
                (Alarm::Complete.into(), 3),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_zero_completes_immediately() {
        let set = ProducerSet::new(Duration::from_millis(10));
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(run(
            0,
            Duration::from_secs(1),
            Epoch::default(),
            tx,
            set.subscribe(),
        ));
        let first = rx.recv().await.map(|stamped| stamped.message);
        assert_eq!(first, Some(Alarm::Complete.into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_cancelled() {
        let set = ProducerSet::new(Duration::from_millis(10));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(
            3,
            Duration::from_secs(1),
            Epoch::default(),
            tx,
            set.subscribe(),
        ));

        assert!(rx.recv().await.is_some());
        set.stop();
        handle.await.unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_survives_dropped_receiver() {
        let set = ProducerSet::new(Duration::from_millis(10));
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        run(3, Duration::from_secs(1), Epoch::default(), tx, set.subscribe()).await;
    }
}
