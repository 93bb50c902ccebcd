//! Per-watch periodic wake-ups.
//!
//! [`TimerBinding`] turns "watch W has interval I" into a tokio task that
//! sends W's id down a shared channel every I minutes. The first fire comes
//! one full period after scheduling, never immediately.
//!
//! The binding owns an explicit id→task table. Rescheduling an id aborts its
//! previous task before spawning the new one, so a watch never has two live
//! timers. Dropping the binding aborts every task.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tokio::sync::mpsc;
//! use tabkeeper::timers::TimerBinding;
//! use tabkeeper::types::WatchId;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (fire_tx, mut fire_rx) = mpsc::channel(64);
//!     let mut timers = TimerBinding::new(fire_tx, Duration::from_secs(60));
//!
//!     timers.schedule(&WatchId::from("w-1"), 5);
//!
//!     while let Some(id) = fire_rx.recv().await {
//!         println!("{id} is due");
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::types::WatchId;

/// Length of one schedule minute in production.
pub const DEFAULT_MINUTE: Duration = Duration::from_secs(60);

/// Longest period a timer will wait between fires.
pub const MAX_PERIOD: Duration = Duration::from_secs(366 * 24 * 60 * 60);

/// Prefix of timer names, used in logs.
const TIMER_NAME_PREFIX: &str = "watch-";

/// Returns the log name of the timer for `id`.
#[must_use]
pub fn timer_name(id: &WatchId) -> String {
    format!("{TIMER_NAME_PREFIX}{id}")
}

/// Multiplexes per-watch schedules onto one fire channel.
#[derive(Debug)]
pub struct TimerBinding {
    fire_tx: mpsc::Sender<WatchId>,
    minute: Duration,
    timers: HashMap<WatchId, JoinHandle<()>>,
}

impl TimerBinding {
    /// Creates a binding delivering fires to `fire_tx`.
    ///
    /// `minute` is the wall-clock length of one schedule minute; production
    /// uses [`DEFAULT_MINUTE`].
    #[must_use]
    pub fn new(fire_tx: mpsc::Sender<WatchId>, minute: Duration) -> Self {
        Self {
            fire_tx,
            minute,
            timers: HashMap::new(),
        }
    }

    /// Wall-clock period for an interval expressed in schedule minutes,
    /// capped at [`MAX_PERIOD`].
    #[must_use]
    pub fn period(&self, interval_minutes: u32) -> Duration {
        self.minute
            .checked_mul(interval_minutes.max(1))
            .map_or(MAX_PERIOD, |period| period.min(MAX_PERIOD))
    }

    /// Installs (or reinstalls) the periodic wake-up for `id`.
    pub fn schedule(&mut self, id: &WatchId, interval_minutes: u32) {
        if self.cancel(id) {
            trace!(timer = %timer_name(id), "Replaced existing timer");
        }

        let period = self.period(interval_minutes);
        let fire_tx = self.fire_tx.clone();
        let task_id = id.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                trace!(timer = %timer_name(&task_id), "Timer fired");
                if fire_tx.send(task_id.clone()).await.is_err() {
                    debug!(timer = %timer_name(&task_id), "Fire channel closed, timer exiting");
                    break;
                }
            }
        });

        debug!(
            timer = %timer_name(id),
            interval_minutes,
            period_secs = period.as_secs(),
            "Timer scheduled"
        );
        self.timers.insert(id.clone(), handle);
    }

    /// Removes the wake-up for `id`. Returns whether one existed.
    pub fn cancel(&mut self, id: &WatchId) -> bool {
        match self.timers.remove(id) {
            Some(handle) => {
                handle.abort();
                debug!(timer = %timer_name(id), "Timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancels every timer.
    pub fn cancel_all(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }

    #[must_use]
    pub fn is_scheduled(&self, id: &WatchId) -> bool {
        self.timers.contains_key(id)
    }

    #[must_use]
    pub fn scheduled_count(&self) -> usize {
        self.timers.len()
    }
}

impl Drop for TimerBinding {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    const MINUTE: Duration = Duration::from_secs(60);

    fn binding() -> (TimerBinding, mpsc::Receiver<WatchId>) {
        let (tx, rx) = mpsc::channel(16);
        (TimerBinding::new(tx, MINUTE), rx)
    }

    #[test]
    fn timer_name_is_namespaced() {
        assert_eq!(timer_name(&WatchId::from("w-1")), "watch-w-1");
    }

    #[tokio::test(start_paused = true)]
    async fn first_fire_waits_one_full_period() {
        let (mut timers, mut rx) = binding();
        let id = WatchId::from("w-1");
        let start = Instant::now();

        timers.schedule(&id, 5);

        let early = timeout(Duration::from_secs(5 * 60 - 1), rx.recv()).await;
        assert!(early.is_err(), "timer fired before its period elapsed");

        let fired = rx.recv().await.unwrap();
        assert_eq!(fired, id);
        assert_eq!(start.elapsed(), Duration::from_secs(5 * 60));
    }

    #[tokio::test(start_paused = true)]
    async fn timer_repeats_every_period() {
        let (mut timers, mut rx) = binding();
        let id = WatchId::from("w-1");
        let start = Instant::now();

        timers.schedule(&id, 2);

        rx.recv().await.unwrap();
        rx.recv().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(4 * 60));
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_replaces_previous_timer() {
        let (mut timers, mut rx) = binding();
        let id = WatchId::from("w-1");
        let start = Instant::now();

        timers.schedule(&id, 5);
        timers.schedule(&id, 3);
        assert_eq!(timers.scheduled_count(), 1);

        rx.recv().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(3 * 60));

        // Next fire is the 3-minute timer again, not the cancelled 5-minute one.
        rx.recv().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(6 * 60));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_fires() {
        let (mut timers, mut rx) = binding();
        let id = WatchId::from("w-1");

        timers.schedule(&id, 1);
        assert!(timers.cancel(&id));
        assert!(!timers.is_scheduled(&id));

        let result = timeout(Duration::from_secs(10 * 60), rx.recv()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn cancel_unknown_id_is_noop() {
        let (mut timers, _rx) = binding();
        assert!(!timers.cancel(&WatchId::from("missing")));
        assert_eq!(timers.scheduled_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn independent_watches_fire_on_their_own_schedules() {
        let (mut timers, mut rx) = binding();
        timers.schedule(&WatchId::from("fast"), 2);
        timers.schedule(&WatchId::from("slow"), 3);

        let mut order = Vec::new();
        for _ in 0..3 {
            order.push(rx.recv().await.unwrap().to_string());
        }
        assert_eq!(order, vec!["fast", "slow", "fast"]);
    }

    #[test]
    fn zero_interval_is_treated_as_one_minute() {
        let (tx, _rx) = mpsc::channel(1);
        let timers = TimerBinding::new(tx, MINUTE);
        assert_eq!(timers.period(0), MINUTE);
        assert_eq!(timers.period(5), MINUTE * 5);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_period_is_capped() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut timers = TimerBinding::new(tx, Duration::from_secs(100_000_000_000_000_000));
        assert_eq!(timers.period(1440), MAX_PERIOD);

        let id = WatchId::from("w-1");
        timers.schedule(&id, 1440);
        assert!(timers.is_scheduled(&id));

        let early = timeout(Duration::from_secs(24 * 60 * 60), rx.recv()).await;
        assert!(early.is_err());
    }
}
