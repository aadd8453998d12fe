//! Cooldown detection over time.
//!
//! This module provides:
//! - The hysteresis/hold state machine (`state`)
//! - Alarm and safety-unlock deadlines (`alarm`)
//! - Tick drivers (`driver`)
//! - The `CooldownDetector` façade tying capture, selection and matching together (`detector`)

pub mod alarm;
pub mod detector;
pub mod driver;
pub mod state;

pub use alarm::{AlarmCue, AlarmEvent, AlarmScheduler};
pub use detector::{CooldownDetector, DetectorStatus};
pub use driver::{select_driver, FrameCallbackDriver, FrameDriver, IntervalDriver};
pub use state::{DetectionMachine, DetectionState, Phase, Transition};
