//! Fixed-period room clock for Fillmath.
//!
//! Every room with a running game owns one [`RoomClock`]: a Tokio task that
//! fires once per period (one second by default) and hands each tick to a
//! callback. The engine's callback posts a tick command into its own
//! channel, so ticks are serialized with player commands.
//!
//! # Cancellation
//!
//! A clock stops when its handle is cancelled or dropped, or when the
//! callback returns [`ControlFlow::Break`]. Aborting the task cannot recall
//! a tick that was already delivered, so every clock carries a unique
//! [`ClockEpoch`]; the receiver ignores ticks whose epoch is no longer the
//! room's current one.
//!
//! ```ignore
//! let clock = RoomClock::spawn(ClockConfig::default(), move |epoch, info| {
//!     match commands.send(Command::Tick { room_id: room_id.clone(), epoch }) {
//!         Ok(()) => ControlFlow::Continue(()),
//!         Err(_) => ControlFlow::Break(()),
//!     }
//! });
//! ```

use std::fmt;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when a tick fires late (the runtime was busy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickPolicy {
    /// Skip the missed tick(s) and schedule the next one a full period
    /// from now. A stalled runtime never produces a burst of ticks.
    #[default]
    Skip,
    /// Keep the original cadence: the next tick fires at its originally
    /// scheduled time even if that is immediately.
    Drop,
}

/// Clock settings.
#[derive(Debug, Clone)]
pub struct ClockConfig {
    /// Time between ticks. Zero is raised to one millisecond.
    pub period: Duration,
    /// Overrun handling policy.
    pub policy: TickPolicy,
    /// Upper bound of a random delay added to the *first* tick so rooms
    /// started in the same instant don't tick in lockstep. Zero disables it.
    pub initial_jitter: Duration,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(1),
            policy: TickPolicy::default(),
            initial_jitter: Duration::ZERO,
        }
    }
}

impl ClockConfig {
    /// A config ticking every `period`, with default policy and no jitter.
    pub fn with_period(period: Duration) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    fn validated(mut self) -> Self {
        if self.period.is_zero() {
            warn!("clock period is zero, raising to 1ms");
            self.period = Duration::from_millis(1);
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// Information about one tick.
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// `true` if this tick fired more than 10% of a period late.
    pub overrun: bool,
    /// How many whole periods were skipped (only under [`TickPolicy::Skip`]).
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Produces fixed-period ticks. Drives one [`RoomClock`].
pub struct TickScheduler {
    config: ClockConfig,
    tick_count: u64,
    next_tick: Instant,
}

impl TickScheduler {
    /// Creates a scheduler whose first tick is one period (plus jitter)
    /// from now.
    pub fn new(config: ClockConfig) -> Self {
        let config = config.validated();
        let jitter = if config.initial_jitter.is_zero() {
            Duration::ZERO
        } else {
            let max_us = config.initial_jitter.as_micros() as u64;
            Duration::from_micros(rand::rng().random_range(0..=max_us))
        };
        let next_tick = Instant::now() + config.period + jitter;

        debug!(
            period_ms = config.period.as_millis() as u64,
            policy = ?config.policy,
            "tick scheduler created"
        );

        Self {
            config,
            tick_count: 0,
            next_tick,
        }
    }

    /// Waits until the next tick is due.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let due = self.next_tick;
        let period = self.config.period;
        time::sleep_until(due).await;

        let now = Instant::now();
        self.tick_count += 1;

        let late_by = now.saturating_duration_since(due);
        let overrun = late_by > period / 10;
        let mut ticks_skipped = 0u64;

        self.next_tick = match self.config.policy {
            TickPolicy::Skip => {
                if overrun {
                    ticks_skipped = (late_by.as_nanos() / period.as_nanos()) as u64;
                    if ticks_skipped > 0 {
                        warn!(
                            tick = self.tick_count,
                            skipped = ticks_skipped,
                            late_ms = late_by.as_millis() as u64,
                            "clock overrun, skipping ahead"
                        );
                    }
                }
                now + period
            }
            TickPolicy::Drop => {
                if overrun {
                    warn!(
                        tick = self.tick_count,
                        late_ms = late_by.as_millis() as u64,
                        "clock overrun, keeping original schedule"
                    );
                }
                due + period
            }
        };

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        }
    }

    /// Ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// The configured period.
    pub fn period(&self) -> Duration {
        self.config.period
    }
}

// ---------------------------------------------------------------------------
// Room clock
// ---------------------------------------------------------------------------

static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

/// Identifies one run of one room clock. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClockEpoch(u64);

impl ClockEpoch {
    fn next() -> Self {
        Self(NEXT_EPOCH.fetch_add(1, Ordering::Relaxed))
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClockEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clock-{}", self.0)
    }
}

/// Handle to a running clock task.
///
/// Dropping the handle aborts the task, so removing a clock from whatever
/// map owns it is enough to stop it.
#[derive(Debug)]
pub struct RoomClock {
    epoch: ClockEpoch,
    task: JoinHandle<()>,
}

impl RoomClock {
    /// Spawns a clock task that calls `on_tick` once per period until the
    /// callback breaks or the handle goes away.
    pub fn spawn<F>(config: ClockConfig, mut on_tick: F) -> Self
    where
        F: FnMut(ClockEpoch, TickInfo) -> ControlFlow<()> + Send + 'static,
    {
        let epoch = ClockEpoch::next();
        let mut scheduler = TickScheduler::new(config);

        let task = tokio::spawn(async move {
            loop {
                let info = scheduler.wait_for_tick().await;
                if on_tick(epoch, info).is_break() {
                    debug!(%epoch, "clock callback stopped the clock");
                    break;
                }
            }
        });

        debug!(%epoch, "clock started");
        Self { epoch, task }
    }

    pub fn epoch(&self) -> ClockEpoch {
        self.epoch
    }

    /// `true` once the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the clock. Equivalent to dropping the handle.
    pub fn cancel(self) {
        debug!(epoch = %self.epoch, "clock cancelled");
    }
}

impl Drop for RoomClock {
    fn drop(&mut self) {
        self.task.abort();
    }
}
