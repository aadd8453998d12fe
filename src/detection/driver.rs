//! Tick drivers.
//!
//! A hunting session samples once per new frame when the capture source
//! reports frame arrivals, and on a fixed interval otherwise.

use std::time::{Duration, Instant};

/// Fallback sampling period.
pub const FALLBACK_INTERVAL: Duration = Duration::from_millis(100);

pub trait FrameDriver: Send {
    /// Returns true when a sample should be taken now.
    ///
    /// `frame_counter` is the source's frame arrival count, if it has one.
    fn poll(&mut self, now: Instant, frame_counter: Option<u64>) -> bool;

    fn name(&self) -> &'static str;
}

/// Ticks once per newly arrived frame.
#[derive(Debug, Default)]
pub struct FrameCallbackDriver {
    last_seen: Option<u64>,
}

impl FrameDriver for FrameCallbackDriver {
    fn poll(&mut self, _now: Instant, frame_counter: Option<u64>) -> bool {
        match frame_counter {
            Some(count) if self.last_seen != Some(count) => {
                self.last_seen = Some(count);
                true
            }
            _ => false,
        }
    }

    fn name(&self) -> &'static str {
        "frame-callback"
    }
}

/// Ticks every `interval`, starting one interval after the first poll.
#[derive(Debug)]
pub struct IntervalDriver {
    interval: Duration,
    next_due: Option<Instant>,
}

impl IntervalDriver {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }
}

impl Default for IntervalDriver {
    fn default() -> Self {
        Self::new(FALLBACK_INTERVAL)
    }
}

impl FrameDriver for IntervalDriver {
    fn poll(&mut self, now: Instant, _frame_counter: Option<u64>) -> bool {
        match self.next_due {
            None => {
                self.next_due = Some(now + self.interval);
                false
            }
            Some(due) if now >= due => {
                self.next_due = Some(now + self.interval);
                true
            }
            Some(_) => false,
        }
    }

    fn name(&self) -> &'static str {
        "interval"
    }
}

/// Picks the per-frame driver when the source notifies frame arrivals.
pub fn select_driver(has_frame_notifications: bool) -> Box<dyn FrameDriver> {
    if has_frame_notifications {
        Box::new(FrameCallbackDriver::default())
    } else {
        Box::new(IntervalDriver::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_callback_ticks_once_per_frame() {
        let now = Instant::now();
        let mut driver = FrameCallbackDriver::default();
        assert!(driver.poll(now, Some(1)));
        assert!(!driver.poll(now, Some(1)));
        assert!(driver.poll(now, Some(2)));
        assert!(!driver.poll(now, None));
    }

    #[test]
    fn test_interval_ticks_every_period() {
        let start = Instant::now();
        let mut driver = IntervalDriver::default();
        assert!(!driver.poll(start, None));
        assert!(!driver.poll(start + Duration::from_millis(50), None));
        assert!(driver.poll(start + Duration::from_millis(100), None));
        assert!(!driver.poll(start + Duration::from_millis(150), None));
        assert!(driver.poll(start + Duration::from_millis(200), None));
    }

    #[test]
    fn test_select_driver() {
        assert_eq!(select_driver(true).name(), "frame-callback");
        assert_eq!(select_driver(false).name(), "interval");
    }
}
