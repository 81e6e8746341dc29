//! config.rs
//! Tunable parameters of the light controller.
//!
//! Defaults reproduce the board build: 1 s sampling, one-minute calendar tick,
//! 10-sample filter window, 10 schedule slots, 1 ms PWM period on pin 0x0e.
//! Tests and demos shorten the periods through the `with_*` builders.

use std::{path::PathBuf, time::Duration};

use crate::component_b::control_state::Mode;
use crate::utils::error::{ControlError, Result};

/// Window size of the sample filter.
pub const FILTER_SIZE: usize = 10;
/// Number of schedule slots.
pub const MEM_SIZE: usize = 10;

pub const SAMP_PERIOD_MS: u64 = 1_000;
pub const TIMER_PERIOD_MS: u64 = 60_000;

pub const PWM_PIN: u32 = 0x0e;
pub const PWM_PERIOD_US: u32 = 1_000;

#[derive(Debug, Clone)]
pub struct ControlConfig {
    pub sampling_period_ms: u64,
    pub timer_period_ms: u64,
    pub filter_size: usize,
    pub schedule_capacity: usize,

    // PI controller
    pub kp: f32,
    pub ti: f32,
    pub integral_low: f32,
    pub integral_high: f32,

    /// Raw-to-percent mapping: real = (raw - offset) * 100 / span
    pub calibration_offset: i32,
    pub calibration_span: i32,

    pub pwm_pin: u32,
    pub pwm_period_us: u32,

    pub initial_mode: Mode,
    pub initial_intensity: u8,
    /// Automatic setpoint used until a schedule entry matches.
    pub initial_target: u8,

    /// Pin every control task to this core (single-core MCU emulation).
    pub pin_core: Option<usize>,
    pub log_dir: PathBuf,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            sampling_period_ms: SAMP_PERIOD_MS,
            timer_period_ms: TIMER_PERIOD_MS,
            filter_size: FILTER_SIZE,
            schedule_capacity: MEM_SIZE,
            kp: 0.5,
            ti: 0.1,
            integral_low: -14.0,
            integral_high: 14.0,
            calibration_offset: 0,
            calibration_span: 3_000, // ADC reports millivolts, 0..3000
            pwm_pin: PWM_PIN,
            pwm_period_us: PWM_PERIOD_US,
            initial_mode: Mode::Manual,
            initial_intensity: 1,
            initial_target: 50,
            pin_core: None,
            log_dir: PathBuf::from("data/logs"),
        }
    }
}

impl ControlConfig {
    pub fn with_sampling_period_ms(mut self, ms: u64) -> Self {
        self.sampling_period_ms = ms;
        self
    }

    pub fn with_timer_period_ms(mut self, ms: u64) -> Self {
        self.timer_period_ms = ms;
        self
    }

    pub fn with_gains(mut self, kp: f32, ti: f32) -> Self {
        self.kp = kp;
        self.ti = ti;
        self
    }

    pub fn with_integral_limits(mut self, low: f32, high: f32) -> Self {
        self.integral_low = low;
        self.integral_high = high;
        self
    }

    pub fn with_calibration(mut self, offset: i32, span: i32) -> Self {
        self.calibration_offset = offset;
        self.calibration_span = span;
        self
    }

    pub fn with_initial_mode(mut self, mode: Mode) -> Self {
        self.initial_mode = mode;
        self
    }

    pub fn with_initial_target(mut self, target: u8) -> Self {
        self.initial_target = target;
        self
    }

    pub fn with_pin_core(mut self, core: usize) -> Self {
        self.pin_core = Some(core);
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn sampling_period(&self) -> Duration {
        Duration::from_millis(self.sampling_period_ms)
    }

    pub fn timer_period(&self) -> Duration {
        Duration::from_millis(self.timer_period_ms)
    }

    /// Rejects settings the tasks cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sampling_period_ms == 0 || self.timer_period_ms == 0 {
            return Err(ControlError::Config("task periods must be non-zero".into()));
        }
        if self.filter_size == 0 {
            return Err(ControlError::Config("filter window must hold at least one sample".into()));
        }
        if self.schedule_capacity == 0 {
            return Err(ControlError::Config("schedule capacity must be non-zero".into()));
        }
        if self.calibration_span <= 0 {
            return Err(ControlError::Config(format!(
                "calibration span must be positive, got {}",
                self.calibration_span
            )));
        }
        if self.integral_low > self.integral_high {
            return Err(ControlError::Config(format!(
                "integral limits inverted: [{}, {}]",
                self.integral_low, self.integral_high
            )));
        }
        if self.pwm_period_us == 0 {
            return Err(ControlError::Config("pwm period must be non-zero".into()));
        }
        if self.initial_intensity > 100 || self.initial_target > 100 {
            return Err(ControlError::Config("intensities are percentages (0..=100)".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_above_full_scale_is_refused() {
        assert!(ControlConfig::default().with_initial_target(100).validate().is_ok());
        let err = ControlConfig::default().with_initial_target(101).validate();
        assert!(matches!(err, Err(ControlError::Config(_))));
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = ControlConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.filter_size, FILTER_SIZE);
        assert_eq!(cfg.schedule_capacity, MEM_SIZE);
        assert_eq!(cfg.integral_low, -14.0);
        assert_eq!(cfg.integral_high, 14.0);
    }

    #[test]
    fn zero_span_is_rejected() {
        let cfg = ControlConfig::default().with_calibration(0, 0);
        assert!(matches!(cfg.validate(), Err(ControlError::Config(_))));
    }

    #[test]
    fn inverted_integral_limits_are_rejected() {
        let cfg = ControlConfig::default().with_integral_limits(5.0, -5.0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_period_is_rejected() {
        let cfg = ControlConfig::default().with_sampling_period_ms(0);
        assert!(cfg.validate().is_err());
    }
}
