//! Recurring refresh timer.
//!
//! A [`FallbackScheduler`] runs one [`Refresh`] on a fixed cadence. The
//! session keeps two: the backstop poll that runs only while the push channel
//! is down, and an optional steady refresh that runs regardless of
//! connectivity. Both are the same type with a different interval.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::notify::{report, NotificationSink};

/// Shortest interval a timer will run at; zero is raised to this.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Work performed on every tick.
#[async_trait]
pub trait Refresh: Send + Sync + 'static {
    async fn refresh(&self) -> Result<()>;
}

/// Public view of the scheduler's timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTask {
    pub interval: Duration,
    pub active: bool,
}

/// Dropping this stops the loop at its next wait.
struct RunningPoll {
    interval: Duration,
    handle: JoinHandle<()>,
    _stop_tx: oneshot::Sender<()>,
}

/// Idempotent start/stop wrapper around one interval task.
pub struct FallbackScheduler {
    name: &'static str,
    sink: Arc<dyn NotificationSink>,
    running: Mutex<Option<RunningPoll>>,
}

impl FallbackScheduler {
    /// `name` labels log lines and error toasts.
    pub fn new(name: &'static str, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            name,
            sink,
            running: Mutex::new(None),
        }
    }

    /// Start ticking every `interval`. The first tick fires one interval
    /// after the call.
    ///
    /// Returns `false` without touching the running timer if one is already
    /// active, so repeated disconnects never stack timers. Intervals below
    /// [`MIN_INTERVAL`] are raised to it.
    pub async fn start(&self, interval: Duration, refresh: Arc<dyn Refresh>) -> bool {
        let interval = if interval < MIN_INTERVAL {
            warn!(scheduler = self.name, ?interval, "interval too short, using {MIN_INTERVAL:?}");
            MIN_INTERVAL
        } else {
            interval
        };
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|p| !p.handle.is_finished()) {
            debug!(scheduler = self.name, "already active");
            return false;
        }

        info!(scheduler = self.name, ?interval, "starting");
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(poll_loop(
            self.name,
            interval,
            refresh,
            Arc::clone(&self.sink),
            stop_rx,
        ));
        *running = Some(RunningPoll {
            interval,
            handle,
            _stop_tx: stop_tx,
        });
        true
    }

    /// Cancel the timer. Returns `false` if it was not active.
    ///
    /// A tick that is already running finishes and applies its result; no
    /// further ticks fire.
    pub async fn stop(&self) -> bool {
        match self.running.lock().await.take() {
            Some(_poll) => {
                info!(scheduler = self.name, "stopped");
                true
            }
            None => false,
        }
    }

    pub async fn is_active(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|p| !p.handle.is_finished())
    }

    /// Snapshot of the timer, or `None` if it was never started or has
    /// been stopped.
    pub async fn task(&self) -> Option<PollTask> {
        self.running.lock().await.as_ref().map(|p| PollTask {
            interval: p.interval,
            active: !p.handle.is_finished(),
        })
    }
}

impl fmt::Debug for FallbackScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackScheduler")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ticks run one after another; a slow refresh delays the next tick instead
/// of overlapping it. The stop signal is only observed between ticks.
async fn poll_loop(
    name: &'static str,
    period: Duration,
    refresh: Arc<dyn Refresh>,
    sink: Arc<dyn NotificationSink>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {}
        }
        debug!(scheduler = name, "tick");
        if let Err(e) = refresh.refresh().await {
            warn!(scheduler = name, error = %e, "refresh tick failed, continuing");
            report(sink.as_ref(), "Scheduled refresh failed", &e);
        }
    }
    debug!(scheduler = name, "poll loop exited");
}
