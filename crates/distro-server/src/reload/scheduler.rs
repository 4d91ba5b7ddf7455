//! Periodic background rebuilds.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info};

use super::server::HotReloadServer;

/// Configuration for the refresh scheduler.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Interval between rebuilds.
    pub interval: Duration,
    /// Consecutive failures tolerated before backing off.
    pub max_failures: u32,
    /// Backoff multiplier for failures.
    pub backoff_multiplier: f64,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            max_failures: 3,
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(600),
        }
    }
}

impl RefreshConfig {
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    /// Period to wait after a rebuild, given the current period and the
    /// number of consecutive failures so far.
    pub fn next_period(&self, current: Duration, failures: u32) -> Duration {
        if failures == 0 {
            return self.interval;
        }
        if failures < self.max_failures {
            return current;
        }
        Duration::from_secs_f64(current.as_secs_f64() * self.backoff_multiplier)
            .min(self.max_backoff)
    }
}

/// Handle for controlling a running refresh scheduler.
///
/// Dropping the handle stops the scheduler.
pub struct RefreshHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl RefreshHandle {
    /// Signals the scheduler to stop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Rebuilds the server on a fixed interval.
pub struct RefreshScheduler {
    server: Arc<HotReloadServer>,
    config: RefreshConfig,
}

impl RefreshScheduler {
    pub fn new(server: Arc<HotReloadServer>, config: RefreshConfig) -> Self {
        Self { server, config }
    }

    /// Starts the background task. The first rebuild happens one interval
    /// from now.
    pub fn start(self) -> RefreshHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(self.run(shutdown_rx));
        RefreshHandle { shutdown_tx }
    }

    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut period = self.config.interval;
        let mut timer = Self::timer(period);

        info!("Starting refresh scheduler with interval {:?}", period);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    debug!("Starting scheduled rebuild");
                    // Failures are logged and recorded by the server.
                    let _ = self.server.rebuild().await;

                    let next = self.config.next_period(period, self.server.state().failure_count());
                    if next != period {
                        debug!("Refresh period is now {:?}", next);
                        period = next;
                        timer = Self::timer(period);
                    }
                }
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        info!("Refresh scheduler shutting down");
                        break;
                    }
                }
            }
        }
    }

    fn timer(period: Duration) -> tokio::time::Interval {
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    }
}
