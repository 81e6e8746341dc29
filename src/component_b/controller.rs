//! controller.rs
//! PI controller producing the automatic PWM duty cycle.
//!
//! Incremental form: the new duty cycle is the previous one plus the
//! proportional and (clamped) integral terms, saturated to [0, 100].
//! The integral term is the only state carried between calls.

use crate::utils::config::ControlConfig;

pub const DEFAULT_INTEGRAL_LOW: f32 = -14.0;
pub const DEFAULT_INTEGRAL_HIGH: f32 = 14.0;

const DUTY_MIN: f32 = 0.0;
const DUTY_MAX: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PiConfig {
    pub kp: f32,
    pub ti: f32,
    pub integral_low: f32,
    pub integral_high: f32,
}

impl PiConfig {
    pub fn new(kp: f32, ti: f32) -> Self {
        Self {
            kp,
            ti,
            integral_low: DEFAULT_INTEGRAL_LOW,
            integral_high: DEFAULT_INTEGRAL_HIGH,
        }
    }

    pub fn with_integral_limits(mut self, low: f32, high: f32) -> Self {
        self.integral_low = low;
        self.integral_high = high;
        self
    }
}

impl From<&ControlConfig> for PiConfig {
    fn from(cfg: &ControlConfig) -> Self {
        PiConfig::new(cfg.kp, cfg.ti).with_integral_limits(cfg.integral_low, cfg.integral_high)
    }
}

#[derive(Debug, Clone)]
pub struct PiController {
    config: PiConfig,
    error: f32,
    proportional_term: f32,
    integral_term: f32,
}

impl PiController {
    /// Gains fixed for the controller's lifetime; all signals start at zero.
    pub fn new(config: PiConfig) -> Self {
        Self {
            config,
            error: 0.0,
            proportional_term: 0.0,
            integral_term: 0.0,
        }
    }

    pub fn config(&self) -> &PiConfig {
        &self.config
    }

    pub fn error(&self) -> f32 {
        self.error
    }

    pub fn proportional_term(&self) -> f32 {
        self.proportional_term
    }

    pub fn integral_term(&self) -> f32 {
        self.integral_term
    }

    /// Zeroes the signals, keeping gains and limits.
    pub fn reset(&mut self) {
        self.error = 0.0;
        self.proportional_term = 0.0;
        self.integral_term = 0.0;
    }

    /// One control step. `previous_duty` is the duty cycle applied in the
    /// last cycle; the result is always within [0, 100].
    pub fn update(&mut self, reference: i32, measured: i32, previous_duty: u8) -> u8 {
        self.error = (reference - measured) as f32;
        self.proportional_term = self.error * self.config.kp;

        // Anti-windup: the accumulated term never leaves [low, high].
        self.integral_term += self.error * self.config.ti;
        self.integral_term = self
            .integral_term
            .max(self.config.integral_low)
            .min(self.config.integral_high);

        let duty = f32::from(previous_duty) + self.proportional_term + self.integral_term;
        // NaN (degenerate gains) saturates to 0 through the cast.
        duty.max(DUTY_MIN).min(DUTY_MAX) as u8
    }
}
