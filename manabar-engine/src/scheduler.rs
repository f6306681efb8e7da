//! Poll scheduling.
//!
//! One driver task owns the timer. Each tick starts a round unless one is
//! already in flight. Manual triggers share the same reentrancy guard, so a
//! trigger during a round waits for that round instead of starting another.
//!
//! ```text
//! Idle --start--> Scheduled --tick/trigger--> Polling --done--> Scheduled
//!   ^                 |
//!   +------stop-------+
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A poll round: fetch every enabled provider and merge the results.
pub type RoundFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Observable scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No timer running.
    Idle,
    /// Timer armed, no round in flight.
    Scheduled,
    /// A round is in flight.
    Polling,
}

enum Command {
    SetInterval(Duration),
    Stop,
}

struct Driver {
    commands: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<()>,
}

// ============================================================================
// Shared Round State
// ============================================================================

struct Shared {
    round: RoundFn,
    polling: AtomicBool,
    running: AtomicBool,
    completed: watch::Sender<u64>,
}

impl Shared {
    /// Claims the reentrancy guard, or returns `None` if a round is in flight.
    fn try_begin(self: &Arc<Self>) -> Option<RoundGuard> {
        self.polling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RoundGuard {
                shared: Arc::clone(self),
            })
    }

    /// Starts a round in the background unless one is in flight.
    ///
    /// Returns false if the tick was skipped.
    fn spawn_round(self: &Arc<Self>) -> bool {
        match self.try_begin() {
            Some(guard) => {
                let round = (self.round)();
                tokio::spawn(async move {
                    round.await;
                    drop(guard);
                });
                true
            }
            None => {
                debug!("Round still in flight, skipping tick");
                false
            }
        }
    }
}

/// Releases the reentrancy guard and publishes completion, even if the
/// round future is dropped early.
struct RoundGuard {
    shared: Arc<Shared>,
}

impl Drop for RoundGuard {
    fn drop(&mut self) {
        self.shared.polling.store(false, Ordering::Release);
        self.shared.completed.send_modify(|rounds| *rounds += 1);
    }
}

// ============================================================================
// Poll Scheduler
// ============================================================================

/// Drives poll rounds on a configurable interval.
pub struct PollScheduler {
    shared: Arc<Shared>,
    driver: Mutex<Option<Driver>>,
}

impl PollScheduler {
    /// Creates an idle scheduler for a round function.
    pub fn new(round: RoundFn) -> Self {
        let (completed, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                round,
                polling: AtomicBool::new(false),
                running: AtomicBool::new(false),
                completed,
            }),
            driver: Mutex::new(None),
        }
    }

    /// Creates an idle scheduler from an async closure.
    pub fn from_fn<F, Fut>(round: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::new(Arc::new(move || round().boxed()))
    }

    /// Current state.
    pub fn state(&self) -> SchedulerState {
        if self.shared.polling.load(Ordering::Acquire) {
            SchedulerState::Polling
        } else if self.shared.running.load(Ordering::Acquire) {
            SchedulerState::Scheduled
        } else {
            SchedulerState::Idle
        }
    }

    /// Number of completed rounds.
    pub fn completed_rounds(&self) -> u64 {
        *self.shared.completed.borrow()
    }

    /// Subscribes to the completed-round counter.
    pub fn subscribe_rounds(&self) -> watch::Receiver<u64> {
        self.shared.completed.subscribe()
    }

    /// Arms the timer and runs the first round immediately, or as soon as a
    /// round already in flight finishes.
    ///
    /// Returns false if the scheduler was already running.
    pub async fn start(&self, interval: Duration) -> bool {
        let mut driver = self.driver.lock().await;
        if driver.is_some() {
            return false;
        }

        let (commands, rx) = mpsc::unbounded_channel();
        let shared = Arc::clone(&self.shared);
        self.shared.running.store(true, Ordering::Release);
        let handle = tokio::spawn(drive(shared, interval, rx));

        info!(interval_secs = interval.as_secs(), "Poll scheduler started");
        *driver = Some(Driver { commands, handle });
        true
    }

    /// Cancels the timer. A round already in flight runs to completion.
    pub async fn stop(&self) {
        let Some(driver) = self.driver.lock().await.take() else {
            return;
        };

        if driver.commands.send(Command::Stop).is_err() {
            driver.handle.abort();
        }
        if let Err(e) = driver.handle.await {
            if !e.is_cancelled() {
                warn!(error = %e, "Poll driver task failed");
            }
        }
        self.shared.running.store(false, Ordering::Release);
        info!("Poll scheduler stopped");
    }

    /// Re-arms the timer with a new interval.
    ///
    /// The next round fires one full `interval` from now. Has no effect on
    /// an idle scheduler.
    pub async fn set_interval(&self, interval: Duration) {
        let driver = self.driver.lock().await;
        if let Some(driver) = driver.as_ref() {
            debug!(interval_secs = interval.as_secs(), "Re-arming poll timer");
            if driver.commands.send(Command::SetInterval(interval)).is_err() {
                warn!("Poll driver is gone, interval change ignored");
            }
        }
    }

    /// Runs a round now, or waits for the one in flight.
    pub async fn trigger_now(&self) {
        let mut completed = self.shared.completed.subscribe();
        match self.shared.try_begin() {
            Some(guard) => {
                debug!("Manual refresh");
                (self.shared.round)().await;
                drop(guard);
            }
            None => {
                debug!("Manual refresh joined the round in flight");
                // Err only if the sender is dropped, which cannot outlive self.
                let _ = completed.changed().await;
            }
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.get_mut().take() {
            driver.handle.abort();
        }
    }
}

async fn drive(
    shared: Arc<Shared>,
    mut interval: Duration,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let mut completed = shared.completed.subscribe();
    let mut next = Instant::now();
    let mut opening = true;
    // The opening round found another round in flight and runs after it.
    let mut owed = false;
    loop {
        tokio::select! {
            () = tokio::time::sleep_until(next) => {
                let spawned = shared.spawn_round();
                owed = opening && !spawned;
                opening = false;
                next = Instant::now() + interval;
            }
            Ok(()) = completed.changed(), if owed => {
                owed = !shared.spawn_round();
            }
            command = commands.recv() => match command {
                Some(Command::SetInterval(new_interval)) => {
                    interval = new_interval;
                    next = Instant::now() + interval;
                }
                Some(Command::Stop) | None => break,
            },
        }
    }
    debug!("Poll driver exiting");
}

// ============================================================================
// Tests
// ============================================================================
