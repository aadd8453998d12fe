//! Hysteresis/hold state machine.
//!
//! A score must stay at or above the ON threshold for `ON_HOLD` consecutive
//! samples before a lock starts, and must fall to the OFF threshold before a
//! new rising edge can count. While locked no new lock can start; the lock
//! ends through the alarm scheduler.

use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

use crate::detection::alarm::{AlarmEvent, AlarmScheduler, FIRST_ALARM_AFTER};
use crate::vision::MatchResult;

pub const SCORE_ON_TH: f32 = 0.29;
pub const SCORE_OFF_TH: f32 = 0.25;
/// Consecutive high samples needed to start a lock.
pub const ON_HOLD: u32 = 3;
pub const HISTORY_LEN: usize = 60;
pub const RECENT_VALUES_LEN: usize = 5;
/// Floor of the informational adaptive threshold.
const ADAPTIVE_FLOOR: f32 = 0.55;

/// Coarse phase, for display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Rising,
    Locked,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "Idle"),
            Phase::Rising => write!(f, "Rising"),
            Phase::Locked => write!(f, "Locked"),
        }
    }
}

/// What one sample did to the machine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Transition {
    /// Hold satisfied; a lock started and alarms are scheduled.
    LockStarted { score: f32, value: u32 },
    /// Above ON, counting towards the hold.
    Rising { score: f32, hold: u32 },
    /// Still above ON after the rising edge was consumed.
    Holding { score: f32 },
    /// Between OFF and ON; nothing changes.
    Band { score: f32 },
    /// At or below OFF; the rising edge is re-armed.
    Low { score: f32, hint: f32 },
}

impl Transition {
    pub fn is_lock_start(&self) -> bool {
        matches!(self, Transition::LockStarted { .. })
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::LockStarted { score, .. } => {
                write!(f, "Detected! score={:.2} (lock started)", score)
            }
            Transition::Rising { score, .. } => write!(f, "Detecting... score={:.2}", score),
            Transition::Holding { score } => write!(f, "Holding... score={:.2}", score),
            Transition::Band { score } => write!(f, "Waiting... score={:.2}", score),
            Transition::Low { score, hint } => {
                write!(f, "Waiting... score={:.2} (th~{:.2})", score, hint)
            }
        }
    }
}

/// Mutable detection state of a hunting session.
#[derive(Clone, Debug, Default)]
pub struct DetectionState {
    pub lock_active: bool,
    pub lock_start_at: Option<Instant>,
    /// Set after a lock starts; cleared when the score falls to OFF.
    pub was_high: bool,
    pub on_hold_counter: u32,
    pub score_history: VecDeque<f32>,
    pub recent_values: VecDeque<u32>,
}

/// Detection state plus the alarms of the current lock episode.
#[derive(Debug, Default)]
pub struct DetectionMachine {
    state: DetectionState,
    alarms: AlarmScheduler,
}

impl DetectionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DetectionState {
        &self.state
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock_active
    }

    pub fn phase(&self) -> Phase {
        if self.state.lock_active {
            Phase::Locked
        } else if self.state.on_hold_counter > 0 {
            Phase::Rising
        } else {
            Phase::Idle
        }
    }

    /// Feeds one best-match sample. Must not be called while locked.
    pub fn observe(&mut self, result: &MatchResult, now: Instant) -> Transition {
        let score = result.score;
        push_capped(&mut self.state.score_history, score.max(0.0), HISTORY_LEN);
        if score >= SCORE_ON_TH {
            push_capped(&mut self.state.recent_values, result.value, RECENT_VALUES_LEN);
        }

        if score >= SCORE_ON_TH {
            if self.state.was_high {
                return Transition::Holding { score };
            }
            self.state.on_hold_counter += 1;
            if self.state.on_hold_counter < ON_HOLD {
                return Transition::Rising {
                    score,
                    hold: self.state.on_hold_counter,
                };
            }
            self.state.lock_active = true;
            self.state.lock_start_at = Some(now);
            self.state.on_hold_counter = 0;
            self.state.was_high = true;
            self.alarms.schedule(now, now);
            Transition::LockStarted {
                score,
                value: result.value,
            }
        } else if score <= SCORE_OFF_TH {
            self.state.was_high = false;
            self.state.on_hold_counter = 0;
            Transition::Low {
                score,
                hint: self.adaptive_hint(),
            }
        } else {
            Transition::Band { score }
        }
    }

    /// Checks the alarm deadlines; either event ends the lock.
    pub fn poll_timers(&mut self, now: Instant) -> Option<AlarmEvent> {
        let event = self.alarms.poll(now)?;
        self.state.lock_active = false;
        self.state.lock_start_at = None;
        Some(event)
    }

    /// Countdown text shown while locked.
    pub fn lock_status(&self, now: Instant) -> String {
        let elapsed = self
            .state
            .lock_start_at
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default();
        let remaining = FIRST_ALARM_AFTER.saturating_sub(elapsed).as_secs_f32().ceil();
        format!("Locked: {:.0}s until alarm", remaining)
    }

    /// `max(0.55, mean + 0.25 * stddev)` over the score history. Display only.
    pub fn adaptive_hint(&self) -> f32 {
        let history = &self.state.score_history;
        if history.is_empty() {
            return ADAPTIVE_FLOOR;
        }
        let n = history.len() as f32;
        let mean = history.iter().sum::<f32>() / n;
        let var = history.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / n;
        (mean + 0.25 * var.sqrt()).max(ADAPTIVE_FLOOR)
    }

    /// Cancels pending alarms and clears all state. Idempotent.
    pub fn teardown(&mut self) {
        self.alarms.cancel();
        self.state = DetectionState::default();
    }

    pub fn alarms_pending(&self) -> bool {
        self.alarms.is_pending()
    }
}

fn push_capped<T>(queue: &mut VecDeque<T>, value: T, cap: usize) {
    queue.push_back(value);
    while queue.len() > cap {
        queue.pop_front();
    }
}
