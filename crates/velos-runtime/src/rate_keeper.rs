//! [`RateKeeper`] – fixed-cadence pacing for the cycle loop.
//!
//! Deadlines advance by exactly one interval per cycle, so a late cycle is
//! followed by shorter sleeps rather than a permanent phase shift. Lag is
//! judged on the rolling average cycle time, not on a single slow cycle.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

const DT_WINDOW: usize = 100;
/// Lagging once the average cycle time exceeds the interval by this factor.
const LAG_RATIO: f64 = 1.0 / 0.9;

#[derive(Debug)]
pub struct RateKeeper {
    interval: Duration,
    next_frame_time: Instant,
    last_monitor_time: Instant,
    dts: VecDeque<Duration>,
    frame: u64,
    /// Seconds until the next deadline, negative when late.
    remaining: f64,
    /// Late cycles are logged when later than this.
    print_delay_threshold: Option<Duration>,
}

impl RateKeeper {
    /// Pace at `rate_hz` cycles per second.
    pub fn new(rate_hz: f64) -> Self {
        let interval = Duration::from_secs_f64(1.0 / rate_hz.max(f64::MIN_POSITIVE));
        let now = Instant::now();
        Self {
            interval,
            next_frame_time: now + interval,
            last_monitor_time: now,
            dts: VecDeque::from([interval]),
            frame: 0,
            remaining: 0.0,
            print_delay_threshold: None,
        }
    }

    pub fn with_print_delay_threshold(mut self, threshold: Duration) -> Self {
        self.print_delay_threshold = Some(threshold);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Seconds left before the current deadline; negative when late.
    pub fn remaining(&self) -> f64 {
        self.remaining
    }

    pub fn avg_dt(&self) -> Duration {
        let total: Duration = self.dts.iter().sum();
        total / u32::try_from(self.dts.len().max(1)).unwrap_or(u32::MAX)
    }

    /// The loop has been running measurably slower than its rate.
    pub fn lagging(&self) -> bool {
        self.avg_dt().as_secs_f64() > self.interval.as_secs_f64() * LAG_RATIO
    }

    /// Record the end of a cycle without sleeping. Returns `true` when the
    /// cycle finished past its deadline by more than the print threshold.
    pub fn monitor_time(&mut self) -> bool {
        let now = Instant::now();
        self.dts.push_back(now - self.last_monitor_time);
        if self.dts.len() > DT_WINDOW {
            self.dts.pop_front();
        }
        self.last_monitor_time = now;

        let remaining = if self.next_frame_time >= now {
            (self.next_frame_time - now).as_secs_f64()
        } else {
            -(now - self.next_frame_time).as_secs_f64()
        };
        self.next_frame_time += self.interval;
        self.frame += 1;
        self.remaining = remaining;

        match self.print_delay_threshold {
            Some(threshold) if remaining < -threshold.as_secs_f64() => {
                debug!(lag_ms = -remaining * 1000.0, frame = self.frame, "cycle late");
                true
            }
            _ => false,
        }
    }

    /// [`RateKeeper::monitor_time`], then sleep until the next deadline.
    pub async fn keep_time(&mut self) -> bool {
        let lagged = self.monitor_time();
        if self.remaining > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(self.remaining)).await;
        }
        lagged
    }
}
