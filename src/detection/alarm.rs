//! Alarm scheduling relative to a lock start.
//!
//! One lock episode owns two deadlines: the first alarm (shortly before the
//! in-game cooldown expires) and a later safety unlock that clears a lock whose
//! alarm never ran. Deadlines are plain `Instant`s polled by the host loop, so
//! cancelling is just clearing them.

use std::fmt;
use std::time::{Duration, Instant};

/// The alarm fires this long after lock start (in-game cooldown ~58s, alarm ~6s early).
pub const FIRST_ALARM_AFTER: Duration = Duration::from_secs(52);
/// Floor for the first alarm delay when scheduling late.
pub const MIN_FIRST_ALARM_DELAY: Duration = Duration::from_millis(500);
/// Safety unlock horizon from lock start.
pub const SAFETY_UNLOCK_AFTER: Duration = Duration::from_secs(70);
/// Floor for the safety unlock delay.
pub const MIN_SAFETY_UNLOCK_DELAY: Duration = Duration::from_secs(60);

/// Which of the two alarm sounds to play. Alarms alternate between them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AlarmCue {
    First,
    Second,
}

impl AlarmCue {
    pub fn other(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }
}

/// A deadline that came due.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlarmEvent {
    /// Play this cue; the lock is over.
    Alarm(AlarmCue),
    /// The alarm never ran in time; the lock is forcibly cleared.
    SafetyUnlock,
}

impl fmt::Display for AlarmEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlarmEvent::Alarm(_) => write!(
                f,
                "Alarm: {}s elapsed (about 6s left)",
                FIRST_ALARM_AFTER.as_secs()
            ),
            AlarmEvent::SafetyUnlock => write!(f, "Safety unlock (timer expired)"),
        }
    }
}

/// Deadlines of the current lock episode plus the alternating cue index.
#[derive(Debug)]
pub struct AlarmScheduler {
    first_alarm_at: Option<Instant>,
    safety_unlock_at: Option<Instant>,
    next_cue: AlarmCue,
}

impl Default for AlarmScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl AlarmScheduler {
    pub fn new() -> Self {
        Self {
            first_alarm_at: None,
            safety_unlock_at: None,
            next_cue: AlarmCue::First,
        }
    }

    /// Schedules both deadlines for a lock that started at `lock_start`.
    ///
    /// Any previous episode's deadlines are replaced.
    pub fn schedule(&mut self, lock_start: Instant, now: Instant) {
        self.cancel();
        let elapsed = now.saturating_duration_since(lock_start);
        let to_first = FIRST_ALARM_AFTER
            .saturating_sub(elapsed)
            .max(MIN_FIRST_ALARM_DELAY);
        let to_safety = SAFETY_UNLOCK_AFTER
            .saturating_sub(elapsed)
            .max(MIN_SAFETY_UNLOCK_DELAY);
        self.first_alarm_at = Some(now + to_first);
        self.safety_unlock_at = Some(now + to_safety);
    }

    /// Returns the deadline that came due, if any, and ends the episode.
    ///
    /// If both are overdue the host stalled past the safety horizon: the
    /// safety unlock wins and the stale alarm is dropped.
    pub fn poll(&mut self, now: Instant) -> Option<AlarmEvent> {
        if self.safety_unlock_at.is_some_and(|at| now >= at) {
            self.cancel();
            return Some(AlarmEvent::SafetyUnlock);
        }
        if self.first_alarm_at.is_some_and(|at| now >= at) {
            let cue = self.next_cue;
            self.next_cue = cue.other();
            self.cancel();
            return Some(AlarmEvent::Alarm(cue));
        }
        None
    }

    /// Clears both deadlines. The cue alternation is kept.
    pub fn cancel(&mut self) {
        self.first_alarm_at = None;
        self.safety_unlock_at = None;
    }

    pub fn is_pending(&self) -> bool {
        self.first_alarm_at.is_some() || self.safety_unlock_at.is_some()
    }

    pub fn first_alarm_at(&self) -> Option<Instant> {
        self.first_alarm_at
    }

    pub fn safety_unlock_at(&self) -> Option<Instant> {
        self.safety_unlock_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_on_time() {
        let start = Instant::now();
        let mut alarms = AlarmScheduler::new();
        alarms.schedule(start, start);
        assert_eq!(alarms.first_alarm_at(), Some(start + Duration::from_secs(52)));
        assert_eq!(alarms.safety_unlock_at(), Some(start + Duration::from_secs(70)));
    }

    #[test]
    fn test_schedule_late_is_clamped() {
        let start = Instant::now();
        let now = start + Duration::from_secs(55);
        let mut alarms = AlarmScheduler::new();
        alarms.schedule(start, now);
        assert_eq!(alarms.first_alarm_at(), Some(now + MIN_FIRST_ALARM_DELAY));
        assert_eq!(alarms.safety_unlock_at(), Some(now + MIN_SAFETY_UNLOCK_DELAY));
    }

    #[test]
    fn test_alarm_fires_once_and_cancels_safety() {
        let start = Instant::now();
        let mut alarms = AlarmScheduler::new();
        alarms.schedule(start, start);

        assert_eq!(alarms.poll(start + Duration::from_secs(51)), None);
        assert_eq!(
            alarms.poll(start + Duration::from_secs(52)),
            Some(AlarmEvent::Alarm(AlarmCue::First))
        );
        assert!(!alarms.is_pending());
        assert_eq!(alarms.poll(start + Duration::from_secs(80)), None);
    }

    #[test]
    fn test_cues_alternate_across_episodes() {
        let start = Instant::now();
        let mut alarms = AlarmScheduler::new();
        let mut cues = Vec::new();
        for episode in 0..3u64 {
            let t = start + Duration::from_secs(episode * 100);
            alarms.schedule(t, t);
            if let Some(AlarmEvent::Alarm(cue)) = alarms.poll(t + FIRST_ALARM_AFTER) {
                cues.push(cue);
            }
        }
        assert_eq!(cues, vec![AlarmCue::First, AlarmCue::Second, AlarmCue::First]);
    }

    #[test]
    fn test_safety_wins_when_alarm_is_stale() {
        let start = Instant::now();
        let mut alarms = AlarmScheduler::new();
        alarms.schedule(start, start);
        assert_eq!(
            alarms.poll(start + Duration::from_secs(71)),
            Some(AlarmEvent::SafetyUnlock)
        );
        assert!(!alarms.is_pending());
    }

    #[test]
    fn test_cancel_clears_everything() {
        let start = Instant::now();
        let mut alarms = AlarmScheduler::new();
        alarms.schedule(start, start);
        alarms.cancel();
        assert!(!alarms.is_pending());
        assert_eq!(alarms.poll(start + Duration::from_secs(100)), None);
    }

    #[test]
    fn test_event_display() {
        assert_eq!(
            AlarmEvent::SafetyUnlock.to_string(),
            "Safety unlock (timer expired)"
        );
        assert!(AlarmEvent::Alarm(AlarmCue::First).to_string().starts_with("Alarm: 52s"));
    }
}
