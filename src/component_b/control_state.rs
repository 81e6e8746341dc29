//! control_state.rs
//! Mode, manual intensity, automatic setpoint and PI duty cycle.
//!
//! Written from three contexts (button handler, Processing, Actuation) and read
//! by Actuation. Each field is an atomic so every access is race-free without
//! a lock; the fields are independent, so no cross-field invariant needs one.

use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Manual,
    Automatic,
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Manual => "manual",
            Mode::Automatic => "automatic",
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Mode::Manual => 0,
            Mode::Automatic => 1,
        }
    }

    fn from_u8(raw: u8) -> Self {
        if raw == 1 { Mode::Automatic } else { Mode::Manual }
    }
}

pub const MAX_PERCENT: u8 = 100;

#[derive(Debug)]
pub struct ControlState {
    mode: AtomicU8,
    intensity: AtomicU8,
    target: AtomicU8,
    duty_cycle: AtomicU8,
}

pub type SharedControlState = Arc<ControlState>;

impl ControlState {
    pub fn new(mode: Mode, intensity: u8, target: u8) -> Self {
        Self {
            mode: AtomicU8::new(mode.as_u8()),
            intensity: AtomicU8::new(intensity.min(MAX_PERCENT)),
            target: AtomicU8::new(target.min(MAX_PERCENT)),
            duty_cycle: AtomicU8::new(0),
        }
    }

    pub fn shared(mode: Mode, intensity: u8, target: u8) -> SharedControlState {
        Arc::new(Self::new(mode, intensity, target))
    }

    pub fn mode(&self) -> Mode {
        Mode::from_u8(self.mode.load(Ordering::Acquire))
    }

    /// Returns the previous mode.
    pub fn set_mode(&self, mode: Mode) -> Mode {
        Mode::from_u8(self.mode.swap(mode.as_u8(), Ordering::AcqRel))
    }

    /// Manual intensity (percent).
    pub fn intensity(&self) -> u8 {
        self.intensity.load(Ordering::Acquire)
    }

    /// Adds `delta` to the manual intensity, saturating at 0 and 100.
    /// Returns the new value.
    pub fn step_intensity(&self, delta: i16) -> u8 {
        let step = |cur: u8| -> Option<u8> {
            Some((i16::from(cur) + delta).clamp(0, i16::from(MAX_PERCENT)) as u8)
        };
        match self.intensity.fetch_update(Ordering::AcqRel, Ordering::Acquire, step) {
            Ok(prev) | Err(prev) => step(prev).unwrap_or(prev),
        }
    }

    /// Automatic setpoint (percent).
    pub fn target(&self) -> u8 {
        self.target.load(Ordering::Acquire)
    }

    pub fn set_target(&self, target: u8) {
        self.target.store(target.min(MAX_PERCENT), Ordering::Release);
    }

    pub fn duty_cycle(&self) -> u8 {
        self.duty_cycle.load(Ordering::Acquire)
    }

    pub fn set_duty_cycle(&self, duty: u8) {
        self.duty_cycle.store(duty.min(MAX_PERCENT), Ordering::Release);
    }

    /// Percentage the actuator should apply right now, with the mode it came from.
    pub fn actuation_percent(&self) -> (Mode, u8) {
        match self.mode() {
            Mode::Manual => (Mode::Manual, self.intensity()),
            Mode::Automatic => (Mode::Automatic, self.duty_cycle()),
        }
    }
}
