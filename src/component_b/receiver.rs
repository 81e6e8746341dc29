//! receiver.rs
//! Actuation task: turns the current percentage into a PWM waveform.
//! - woken by Processing (automatic cycle) or by the button handler (manual fast path)
//! - manual mode drives the operator intensity, automatic mode the PI duty cycle
//! - the output is active-low: 0% → full on-time, 100% → zero on-time

use log::{debug, info, warn};
use std::sync::Arc;

use crate::component_a::signal::Waiter;
use crate::component_b::{
    control_state::{MAX_PERCENT, Mode, SharedControlState},
    pwm::{PwmOutput, PwmWaveform},
};
use crate::utils::error::Result;
use crate::utils::metrics::{Event, EventRecorder, SharedMetrics, lock_metrics, push_capped_u64};

/// On-time for `percent` of light with the inverted output polarity.
pub fn on_time_us(percent: u8, period_us: u32) -> u32 {
    let pct = u64::from(percent.min(MAX_PERCENT));
    let period = u64::from(period_us);
    (period - pct * period / 100) as u32
}

pub struct Actuator {
    wake: Waiter,
    state: SharedControlState,
    pwm: Box<dyn PwmOutput>,
    pin: u32,
    period_us: u32,
    metrics: SharedMetrics,
    event_recorder: Arc<EventRecorder>,
}

impl Actuator {
    pub fn new(
        wake: Waiter,
        state: SharedControlState,
        pwm: Box<dyn PwmOutput>,
        pin: u32,
        period_us: u32,
        metrics: SharedMetrics,
        event_recorder: Arc<EventRecorder>,
    ) -> Self {
        Self {
            wake,
            state,
            pwm,
            pin,
            period_us,
            metrics,
            event_recorder,
        }
    }

    /// Runs until every notifier (Processing, buttons) has been dropped.
    pub fn run(&mut self) {
        info!("[Actuation] started pin={:#x} period={}us", self.pin, self.period_us);
        while self.wake.wait() {
            if let Err(e) = self.actuate_once() {
                // Keep the previous waveform; the next wake-up retries.
                warn!("[Actuation] {}", e);
                lock_metrics(&self.metrics).pwm_faults += 1;
            }
        }
        info!(
            "[Actuation] all {} sources closed; exiting ({} wake-ups, {} coalesced)",
            self.wake.name(),
            self.wake.stats().taken(),
            self.wake.stats().coalesced()
        );
    }

    /// Reads mode and percentage once and applies the waveform.
    pub fn actuate_once(&mut self) -> Result<PwmWaveform> {
        let (mode, percent) = self.state.actuation_percent();
        let on_time = on_time_us(percent, self.period_us);

        self.pwm.set_pwm_duty(self.pin, self.period_us, on_time)?;
        debug!("[Actuation] {} {}% → ton={}us", mode.name(), percent, on_time);

        self.event_recorder.record(Event::Actuated {
            ts_ns: self.event_recorder.now_ns(),
            mode,
            percent,
            on_time_us: on_time,
        });
        {
            let mut m = lock_metrics(&self.metrics);
            m.actuation_cycles += 1;
            if mode == Mode::Manual {
                m.manual_actuations += 1;
            }
            push_capped_u64(&mut m.on_time_us, u64::from(on_time));
        }

        Ok(PwmWaveform {
            pin: self.pin,
            period_us: self.period_us,
            on_time_us: on_time,
        })
    }
}
