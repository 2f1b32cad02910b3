//! Fixed-interval sweep scheduler for fleetgate.
//!
//! Drives slow periodic maintenance such as the session reaper. A sweep is
//! due every `interval`; if the loop falls behind (a sweep ran long, or the
//! runtime was starved) the missed sweeps are skipped and the cadence
//! restarts from now. Maintenance passes are idempotent, so running three
//! back-to-back after a stall would only repeat work.
//!
//! # Integration
//!
//! The scheduler sits inside the owner's `tokio::select!` loop next to its
//! shutdown signal:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = &mut stop_rx => break,
//!         info = scheduler.wait_for_sweep() => {
//!             run_one_sweep(info.sweep).await;
//!             scheduler.record_sweep_end();
//!         }
//!     }
//! }
//! ```
//!
//! `wait_for_sweep` is cancel-safe: dropping it in a `select!` loses no
//! state, the next call waits for the same deadline.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a [`SweepScheduler`].
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Time between sweeps. Values below [`Self::MIN_INTERVAL`] are raised
    /// to it by [`validated`](Self::validated).
    pub interval: Duration,
    /// Track per-sweep execution time.
    pub metrics_enabled: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            metrics_enabled: true,
        }
    }
}

impl SweepConfig {
    /// Shortest accepted interval.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1000);

    /// Config for a given interval in milliseconds, other fields default.
    pub fn with_interval_ms(interval_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            ..Default::default()
        }
    }

    /// Clamps out-of-range values so the config is safe to use.
    ///
    /// Called by [`SweepScheduler::new`]. An interval below
    /// [`Self::MIN_INTERVAL`] is raised to it with a warning.
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                requested_ms = self.interval.as_millis() as u64,
                min_ms = Self::MIN_INTERVAL.as_millis() as u64,
                "sweep interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Sweep info
// ---------------------------------------------------------------------------

/// Returned by [`SweepScheduler::wait_for_sweep`] each time a sweep is due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepInfo {
    /// Sweep number, starting at 1.
    pub sweep: u64,
    /// How late the scheduler woke up relative to the deadline.
    pub late_by: Duration,
    /// Whole intervals that passed without a sweep (0 in normal operation).
    pub sweeps_skipped: u64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Counters kept by the scheduler.
#[derive(Debug, Clone, Default)]
pub struct SweepMetrics {
    pub total_sweeps: u64,
    pub total_skipped: u64,
    /// Sweeps whose work, as reported by
    /// [`SweepScheduler::record_sweep_end`], took longer than the interval.
    pub total_overruns: u64,
    pub last_sweep_time: Duration,
    pub max_sweep_time: Duration,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-interval scheduler with skip-ahead on overrun.
pub struct SweepScheduler {
    config: SweepConfig,
    sweep_count: u64,
    next_sweep: Instant,
    /// Set by `wait_for_sweep`, consumed by `record_sweep_end`.
    sweep_start: Option<Instant>,
    metrics: SweepMetrics,
}

impl SweepScheduler {
    /// The first sweep is due one full interval from now.
    pub fn new(config: SweepConfig) -> Self {
        let config = config.validated();
        debug!(
            interval_ms = config.interval.as_millis() as u64,
            "sweep scheduler created"
        );
        Self {
            next_sweep: Instant::now() + config.interval,
            config,
            sweep_count: 0,
            sweep_start: None,
            metrics: SweepMetrics::default(),
        }
    }

    /// Waits until the next sweep is due.
    pub async fn wait_for_sweep(&mut self) -> SweepInfo {
        time::sleep_until(self.next_sweep).await;

        let now = Instant::now();
        let interval = self.config.interval;
        let late_by = now.saturating_duration_since(self.next_sweep);
        let sweeps_skipped = (late_by.as_nanos() / interval.as_nanos()) as u64;
        if sweeps_skipped > 0 {
            warn!(
                sweep = self.sweep_count + 1,
                skipped = sweeps_skipped,
                late_ms = late_by.as_millis() as u64,
                "sweep loop fell behind, skipping ahead"
            );
        }

        self.sweep_count += 1;
        self.next_sweep = now + interval;
        self.sweep_start = Some(now);
        self.metrics.total_sweeps += 1;
        self.metrics.total_skipped += sweeps_skipped;

        trace!(sweep = self.sweep_count, "sweep due");

        SweepInfo {
            sweep: self.sweep_count,
            late_by,
            sweeps_skipped,
        }
    }

    /// Records that the current sweep's work has finished.
    ///
    /// A no-op if no sweep is in progress.
    pub fn record_sweep_end(&mut self) {
        let Some(start) = self.sweep_start.take() else {
            return;
        };
        let elapsed = start.elapsed();

        if elapsed > self.config.interval {
            self.metrics.total_overruns += 1;
            warn!(
                sweep = self.sweep_count,
                elapsed_ms = elapsed.as_millis() as u64,
                interval_ms = self.config.interval.as_millis() as u64,
                "sweep took longer than its interval"
            );
        }

        if self.config.metrics_enabled {
            self.metrics.last_sweep_time = elapsed;
            self.metrics.max_sweep_time = self.metrics.max_sweep_time.max(elapsed);
        }
    }

    pub fn sweep_count(&self) -> u64 {
        self.sweep_count
    }

    pub fn metrics(&self) -> &SweepMetrics {
        &self.metrics
    }

    /// The effective interval, after clamping.
    pub fn interval(&self) -> Duration {
        self.config.interval
    }
}
