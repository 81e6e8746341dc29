//! pwm.rs
//! PWM output collaborator and its host simulation.
//!
//! The lamp driver is active-low: the light produced is proportional to the
//! OFF part of the period. `LightPlant` carries that light level to the
//! simulated sensor so the loop is closed on the host.

use log::debug;
use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicU8, AtomicU64, Ordering},
};

use crate::utils::error::Result;

/// One applied waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmWaveform {
    pub pin: u32,
    pub period_us: u32,
    pub on_time_us: u32,
}

pub trait PwmOutput: Send {
    fn set_pwm_duty(&mut self, pin: u32, period_us: u32, on_time_us: u32) -> Result<()>;
}

/// Light currently emitted by the lamp, in percent of full brightness.
#[derive(Debug, Clone, Default)]
pub struct LightPlant {
    lamp_percent: Arc<AtomicU8>,
}

impl LightPlant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lamp_percent(&self) -> u8 {
        self.lamp_percent.load(Ordering::Relaxed)
    }

    fn drive(&self, waveform: &PwmWaveform) {
        if waveform.period_us == 0 {
            return;
        }
        let off = u64::from(waveform.period_us.saturating_sub(waveform.on_time_us));
        let pct = (off * 100 / u64::from(waveform.period_us)).min(100) as u8;
        self.lamp_percent.store(pct, Ordering::Relaxed);
    }
}

/// Read side of a `SimulatedPwm`, kept by whoever wants to observe the output.
#[derive(Debug, Clone, Default)]
pub struct PwmMonitor {
    last: Arc<Mutex<Option<PwmWaveform>>>,
    writes: Arc<AtomicU64>,
}

impl PwmMonitor {
    pub fn last(&self) -> Option<PwmWaveform> {
        *self.last.lock()
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Acquire)
    }
}

pub struct SimulatedPwm {
    plant: LightPlant,
    monitor: PwmMonitor,
}

impl SimulatedPwm {
    pub fn new(plant: LightPlant) -> Self {
        Self {
            plant,
            monitor: PwmMonitor::default(),
        }
    }

    pub fn monitor(&self) -> PwmMonitor {
        self.monitor.clone()
    }
}

impl PwmOutput for SimulatedPwm {
    fn set_pwm_duty(&mut self, pin: u32, period_us: u32, on_time_us: u32) -> Result<()> {
        let waveform = PwmWaveform { pin, period_us, on_time_us };
        self.plant.drive(&waveform);
        *self.monitor.last.lock() = Some(waveform);
        self.monitor.writes.fetch_add(1, Ordering::AcqRel);
        debug!("[PWM] pin={:#x} period={}us ton={}us", pin, period_us, on_time_us);
        Ok(())
    }
}
