//! Background producer plumbing
//!
//! Countdown, round clock, fade animation and preloader each run on their
//! own task. They never touch session state; they only send messages
//! stamped with the [`Epoch`] of the session that started them, and they
//! all listen to one broadcast shutdown signal owned by a [`ProducerSet`].

use std::{future::Future, time::Duration};

use serde::Serialize;
use tokio::{sync::broadcast, task::JoinHandle};

/// Generation counter of a session
///
/// Every producer message carries the epoch it was started under, so the
/// actor can recognise and drop stray messages of an abandoned generation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    derive_more::Display,
)]
pub struct Epoch(u64);

impl Epoch {
    /// Returns the epoch following this one
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// A producer message tagged with its epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamped<T> {
    /// Epoch of the session that started the producer
    pub epoch: Epoch,
    /// The message itself
    pub message: T,
}

impl<T> Stamped<T> {
    /// Tags `message` with `epoch`
    pub fn new(epoch: Epoch, message: T) -> Self {
        Self { epoch, message }
    }
}

/// Receiving end of the shutdown signal
///
/// Resolves once shutdown is requested or once the owning [`ProducerSet`]
/// is dropped, whichever comes first.
#[derive(Debug)]
pub struct Shutdown {
    rx: broadcast::Receiver<()>,
}

impl Shutdown {
    /// Waits until shutdown is requested
    pub async fn recv(&mut self) {
        let _ = self.rx.recv().await;
    }
}

/// The running producers of one session
#[derive(Debug)]
pub struct ProducerSet {
    shutdown: broadcast::Sender<()>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    grace: Duration,
}

impl ProducerSet {
    /// Creates an empty set whose producers get `grace` to stop
    pub fn new(grace: Duration) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            shutdown,
            tasks: Vec::new(),
            grace,
        }
    }

    /// Returns a new shutdown listener
    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.shutdown.subscribe(),
        }
    }

    /// Spawns a named producer task
    pub fn spawn<F>(&mut self, name: &'static str, producer: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::debug!("starting {name} producer");
        self.tasks.retain(|(_, task)| !task.is_finished());
        self.tasks.push((name, tokio::spawn(producer)));
    }

    /// Number of producers that have not finished yet
    pub fn running(&self) -> usize {
        self.tasks.iter().filter(|(_, task)| !task.is_finished()).count()
    }

    /// Signals every producer to stop without waiting for them
    ///
    /// Signalling a set whose producers already stopped is harmless.
    pub fn stop(&self) {
        let _ = self.shutdown.send(());
    }

    /// Signals shutdown and waits for every producer, bounded by the grace period
    ///
    /// A producer still running after its grace period is aborted.
    pub async fn join(&mut self) {
        tracing::debug!("stopping {} running producer(s)", self.running());
        self.stop();
        for (name, mut task) in self.tasks.drain(..) {
            if tokio::time::timeout(self.grace, &mut task).await.is_err() {
                tracing::warn!("{name} producer ignored shutdown, aborting it");
                task.abort();
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_next() {
        let epoch = Epoch::default();
        assert_eq!(epoch.next(), Epoch(1));
        assert!(epoch.next() > epoch);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_stops_cooperative_producer() {
        let mut set = ProducerSet::new(Duration::from_millis(100));
        let mut shutdown = set.subscribe();
        set.spawn("cooperative", async move {
            shutdown.recv().await;
        });
        assert_eq!(set.running(), 1);

        set.join().await;
        assert_eq!(set.running(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_aborts_stubborn_producer() {
        let mut set = ProducerSet::new(Duration::from_millis(100));
        set.spawn("stubborn", async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        let started = tokio::time::Instant::now();
        set.join().await;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(set.running(), 0);
    }

    #[tokio::test]
    async fn test_stop_without_producers() {
        let set = ProducerSet::new(Duration::from_millis(10));
        set.stop();
        set.stop();
    }

    #[tokio::test]
    async fn test_dropping_set_releases_listeners() {
        let set = ProducerSet::new(Duration::from_millis(10));
        let mut shutdown = set.subscribe();
        drop(set);
        shutdown.recv().await;
    }
}
