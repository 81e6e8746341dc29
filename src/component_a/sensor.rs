//! sensor.rs
//! Light sensor collaborator and the periodic Sampling task.
//! - Periodic release on a fixed grid (PeriodicTimer, SpinSleeper underneath)
//! - Samples only in automatic mode; manual cycles just wait out the period
//! - Each stored sample signals Processing through a single-slot signal

use log::{debug, info, warn};
use rand::{random_bool, random_range};
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use crate::component_a::{signal::Notifier, window::SharedWindow};
use crate::component_b::{
    control_state::{Mode, SharedControlState},
    pwm::LightPlant,
};
use crate::utils::error::{ControlError, Result};
use crate::utils::metrics::{
    DeadlineComponent, Event, EventRecorder, SharedMetrics, lock_metrics, push_capped,
};
use crate::utils::scheduler::PeriodicTimer;

/// ADC full scale in millivolts.
pub const ADC_FULL_SCALE_MV: i32 = 3_000;

pub trait LightSensor: Send {
    /// One conversion, blocking until done.
    fn read_raw_sample(&mut self) -> Result<i32>;
}

/// Photodiode looking at the simulated lamp plus ambient light.
pub struct SimulatedLightSensor {
    plant: LightPlant,
    ambient_mv: i32,
    lamp_gain_mv: i32,
    noise_mv: i32,
    spike_probability: f64,
    fault_probability: f64,
}

impl SimulatedLightSensor {
    pub fn new(plant: LightPlant) -> Self {
        Self {
            plant,
            ambient_mv: 300,
            lamp_gain_mv: 2_400,
            noise_mv: 15,
            spike_probability: 0.02,
            fault_probability: 0.0,
        }
    }

    pub fn with_ambient_mv(mut self, mv: i32) -> Self {
        self.ambient_mv = mv;
        self
    }

    pub fn with_noise_mv(mut self, mv: i32) -> Self {
        self.noise_mv = mv.max(0);
        self
    }

    pub fn with_spike_probability(mut self, p: f64) -> Self {
        self.spike_probability = p.clamp(0.0, 1.0);
        self
    }

    pub fn with_fault_probability(mut self, p: f64) -> Self {
        self.fault_probability = p.clamp(0.0, 1.0);
        self
    }
}

impl LightSensor for SimulatedLightSensor {
    fn read_raw_sample(&mut self) -> Result<i32> {
        if self.fault_probability > 0.0 && random_bool(self.fault_probability) {
            return Err(ControlError::SensorRead("conversion timed out".into()));
        }

        let lamp = i32::from(self.plant.lamp_percent());
        let mut reading = self.ambient_mv + lamp * self.lamp_gain_mv / 100;
        if self.noise_mv > 0 {
            reading += random_range(-self.noise_mv..=self.noise_mv);
        }
        if self.spike_probability > 0.0 && random_bool(self.spike_probability) {
            // Reflection / flash picked up by the photodiode.
            reading *= 3;
        }
        Ok(reading.clamp(0, ADC_FULL_SCALE_MV))
    }
}

/// Replays a fixed sequence of readings, then repeats the last one.
pub struct ScriptedSensor {
    script: VecDeque<Result<i32>>,
    last: i32,
}

impl ScriptedSensor {
    pub fn new(readings: impl IntoIterator<Item = i32>) -> Self {
        Self::from_results(readings.into_iter().map(Ok))
    }

    pub fn from_results(readings: impl IntoIterator<Item = Result<i32>>) -> Self {
        Self {
            script: readings.into_iter().collect(),
            last: 0,
        }
    }
}

impl LightSensor for ScriptedSensor {
    fn read_raw_sample(&mut self) -> Result<i32> {
        match self.script.pop_front() {
            Some(Ok(v)) => {
                self.last = v;
                Ok(v)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self.last),
        }
    }
}

pub struct Sampler {
    sensor: Box<dyn LightSensor>,
    window: SharedWindow,
    state: SharedControlState,
    ready: Notifier,
    running: Arc<AtomicBool>,
    period: Duration,
    metrics: SharedMetrics,
    event_recorder: Arc<EventRecorder>,
    seq: u64,
    last_good: Option<i32>,
}

impl Sampler {
    pub fn new(
        sensor: Box<dyn LightSensor>,
        window: SharedWindow,
        state: SharedControlState,
        ready: Notifier,
        running: Arc<AtomicBool>,
        period: Duration,
        metrics: SharedMetrics,
        event_recorder: Arc<EventRecorder>,
    ) -> Self {
        Self {
            sensor,
            window,
            state,
            ready,
            running,
            period,
            metrics,
            event_recorder,
            seq: 0,
            last_good: None,
        }
    }

    /// One cycle body. Returns the sample written to the window, if any.
    ///
    /// A failed read reuses the last good sample; before the first good read
    /// the cycle is skipped.
    pub fn sample_once(&mut self) -> Option<i32> {
        if self.state.mode() != Mode::Automatic {
            return None;
        }
        self.seq += 1;

        let (sample, reused) = match self.sensor.read_raw_sample() {
            Ok(v) => {
                self.last_good = Some(v);
                (v, false)
            }
            Err(e) => {
                warn!("[Sampling] {} (seq {})", e, self.seq);
                self.event_recorder.record(Event::SensorFault {
                    seq: self.seq,
                    ts_ns: self.event_recorder.now_ns(),
                });
                lock_metrics(&self.metrics).sensor_faults += 1;
                match self.last_good {
                    Some(v) => (v, true),
                    None => return None,
                }
            }
        };

        {
            let mut window = self.window.lock();
            window.push(sample);
        }

        debug!("[Sampling] sample={} seq={}", sample, self.seq);
        self.event_recorder.record(Event::SampleTaken {
            seq: self.seq,
            ts_ns: self.event_recorder.now_ns(),
            raw: sample,
            reused,
        });
        push_capped(&mut lock_metrics(&self.metrics).raw_samples, f64::from(sample));

        self.ready.notify();
        Some(sample)
    }

    pub fn run(mut self) {
        info!("[Sampling] started period={:?}", self.period);
        let mut timer = PeriodicTimer::new(self.period);

        while self.running.load(Ordering::Acquire) {
            self.sample_once();

            let Some(release) = timer.wait_next_while(&self.running) else {
                break;
            };
            if release.is_late() {
                debug!("[Sampling] overrun, skipped {} release(s)", release.missed);
                self.event_recorder.record(Event::DeadlineMiss {
                    ts_ns: self.event_recorder.now_ns(),
                    component: DeadlineComponent::Sampling,
                    missed: release.missed,
                });
                lock_metrics(&self.metrics).record_deadline_miss(DeadlineComponent::Sampling, release.missed);
            }
        }

        info!("[Sampling] stopped after {} samples", self.seq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component_a::{signal::signal, window::SampleWindow};
    use crate::component_b::control_state::ControlState;
    use crate::utils::metrics::new_shared_metrics;

    fn sampler(sensor: impl LightSensor + 'static, mode: Mode) -> (Sampler, crate::component_a::signal::Waiter, SharedWindow) {
        let window = SampleWindow::shared(4).unwrap();
        let (tx, rx) = signal("adc");
        let s = Sampler::new(
            Box::new(sensor),
            window.clone(),
            ControlState::shared(mode, 1, 50),
            tx,
            Arc::new(AtomicBool::new(true)),
            Duration::from_millis(1),
            new_shared_metrics(),
            Arc::new(EventRecorder::new()),
        );
        (s, rx, window)
    }

    #[test]
    fn automatic_cycle_stores_and_signals() {
        let (mut s, rx, window) = sampler(ScriptedSensor::new([300, 310]), Mode::Automatic);
        assert_eq!(s.sample_once(), Some(300));
        assert!(rx.try_wait());
        assert_eq!(s.sample_once(), Some(310));
        let w = window.lock();
        assert_eq!(w.head(), 2);
        assert_eq!(&w.as_slice()[..2], &[300, 310]);
    }

    #[test]
    fn manual_cycle_does_nothing() {
        let (mut s, rx, window) = sampler(ScriptedSensor::new([300]), Mode::Manual);
        assert_eq!(s.sample_once(), None);
        assert!(!rx.try_wait());
        assert_eq!(window.lock().head(), 0);
    }

    #[test]
    fn read_failure_reuses_last_good_sample() {
        let script = vec![
            Err(ControlError::SensorRead("boot".into())),
            Ok(250),
            Err(ControlError::SensorRead("glitch".into())),
        ];
        let (mut s, rx, _window) = sampler(ScriptedSensor::from_results(script), Mode::Automatic);
        assert_eq!(s.sample_once(), None);
        assert!(!rx.try_wait());
        assert_eq!(s.sample_once(), Some(250));
        assert_eq!(s.sample_once(), Some(250));
        assert_eq!(lock_metrics(&s.metrics).sensor_faults, 2);
    }

    #[test]
    fn simulated_sensor_tracks_lamp() {
        let plant = LightPlant::new();
        let mut sensor = SimulatedLightSensor::new(plant.clone())
            .with_noise_mv(0)
            .with_spike_probability(0.0);
        assert_eq!(sensor.read_raw_sample().unwrap(), 300);

        let mut dark_room = SimulatedLightSensor::new(plant)
            .with_ambient_mv(0)
            .with_noise_mv(0)
            .with_spike_probability(0.0);
        assert_eq!(dark_room.read_raw_sample().unwrap(), 0);
    }

    #[test]
    fn run_exits_when_flag_clears() {
        let (s, _rx, _window) = sampler(ScriptedSensor::new([1]), Mode::Automatic);
        let running = s.running.clone();
        let handle = std::thread::spawn(move || s.run());
        std::thread::sleep(Duration::from_millis(10));
        running.store(false, Ordering::Release);
        handle.join().unwrap();
    }
}
