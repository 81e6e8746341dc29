//! Processor: sporadic task woken by Sampling.
//!
//! Per cycle: schedule lookup against the calendar → outlier filter over the
//! sample window → raw-to-percent conversion → PI step → signal Actuation.

use log::{debug, info};
use std::{sync::Arc, time::Instant};

use crate::component_a::{
    filter::filter,
    signal::{Notifier, Waiter},
    window::SharedWindow,
};
use crate::component_b::{
    control_state::{MAX_PERCENT, SharedControlState},
    controller::PiController,
};
use crate::component_c::{calendar::SharedCalendar, schedule::SharedSchedule};
use crate::utils::config::ControlConfig;
use crate::utils::metrics::{Event, EventRecorder, SharedMetrics, lock_metrics, push_capped, push_capped_u64};

/// Linear sensor calibration: real = (raw - offset) * 100 / span, clamped to 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    pub offset: i32,
    pub span: i32,
}

impl Calibration {
    pub fn new(offset: i32, span: i32) -> Self {
        Self { offset, span }
    }

    pub fn to_percent(&self, raw: i32) -> i32 {
        if self.span <= 0 {
            return 0;
        }
        let real = (i64::from(raw) - i64::from(self.offset)) * 100 / i64::from(self.span);
        real.clamp(0, i64::from(MAX_PERCENT)) as i32
    }
}

impl From<&ControlConfig> for Calibration {
    fn from(cfg: &ControlConfig) -> Self {
        Calibration::new(cfg.calibration_offset, cfg.calibration_span)
    }
}

/// What one processing cycle decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub schedule_hit: Option<u8>,
    pub filtered: i32,
    pub real_intensity: i32,
    pub target: u8,
    pub duty_cycle: u8,
}

pub struct Processor {
    ready: Waiter,
    actuate: Notifier,
    window: SharedWindow,
    calendar: SharedCalendar,
    schedule: SharedSchedule,
    state: SharedControlState,
    pi: PiController,
    calibration: Calibration,
    metrics: SharedMetrics,
    event_recorder: Arc<EventRecorder>,
    seq: u64,
}

impl Processor {
    pub fn new(
        ready: Waiter,
        actuate: Notifier,
        window: SharedWindow,
        calendar: SharedCalendar,
        schedule: SharedSchedule,
        state: SharedControlState,
        pi: PiController,
        calibration: Calibration,
        metrics: SharedMetrics,
        event_recorder: Arc<EventRecorder>,
    ) -> Self {
        Self {
            ready,
            actuate,
            window,
            calendar,
            schedule,
            state,
            pi,
            calibration,
            metrics,
            event_recorder,
            seq: 0,
        }
    }

    /// Blocks on the data-ready signal until every sampler is gone.
    pub fn run(&mut self) {
        let window_size = self.window.lock().capacity();
        info!("[Processor] started window={}", window_size);
        while self.ready.wait() {
            self.process_once();
        }
        info!(
            "[Processor] sampling closed; exiting after {} cycles ({} data-ready signals coalesced)",
            self.seq,
            self.ready.stats().coalesced()
        );
    }

    /// One cycle; signals Actuation at the end.
    pub fn process_once(&mut self) -> CycleReport {
        let cycle_start = Instant::now();
        self.seq += 1;

        // Copy the calendar under its lock; the scan runs on the copy.
        let now = *self.calendar.lock();
        let schedule_hit = self.schedule.read().lookup(&now).map(|e| e.intensity);
        if let Some(intensity) = schedule_hit {
            self.state.set_target(intensity);
            info!("[Processor] schedule hit at {} → target {}%", now, intensity);
        }

        let filtered = {
            let window = self.window.lock();
            filter(window.as_slice())
        };
        let real_intensity = self.calibration.to_percent(filtered);

        let target = self.state.target();
        let duty_cycle = self.pi.update(
            i32::from(target),
            real_intensity,
            self.state.duty_cycle(),
        );
        self.state.set_duty_cycle(duty_cycle);

        debug!(
            "[Processor] avg={} lum={} target={} duty={}",
            filtered, real_intensity, target, duty_cycle
        );
        self.event_recorder.record(Event::Processed {
            seq: self.seq,
            ts_ns: self.event_recorder.now_ns(),
            filtered,
            real: real_intensity,
            target,
            duty: duty_cycle,
        });

        {
            let mut m = lock_metrics(&self.metrics);
            push_capped(&mut m.filtered, f64::from(filtered));
            push_capped(&mut m.real_intensity, f64::from(real_intensity));
            push_capped(&mut m.duty_cycle, f64::from(duty_cycle));
            push_capped_u64(&mut m.processing_us, cycle_start.elapsed().as_micros() as u64);
            m.processing_cycles += 1;
            if schedule_hit.is_some() {
                m.schedule_hits += 1;
            }
        }

        self.actuate.notify();

        CycleReport {
            schedule_hit,
            filtered,
            real_intensity,
            target,
            duty_cycle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component_a::{signal::signal, window::SampleWindow};
    use crate::component_b::{
        control_state::{ControlState, Mode},
        controller::PiConfig,
    };
    use crate::component_c::{
        calendar::Calendar,
        schedule::{ScheduleEntry, ScheduleStore},
    };
    use crate::utils::metrics::new_shared_metrics;

    struct Rig {
        processor: Processor,
        actuate_rx: Waiter,
        window: SharedWindow,
        calendar: SharedCalendar,
        schedule: SharedSchedule,
        state: SharedControlState,
    }

    fn rig() -> Rig {
        let (_ready_tx, ready_rx) = signal("adc");
        let (actuate_tx, actuate_rx) = signal("proc");
        let window = SampleWindow::shared(10).unwrap();
        let calendar = Calendar::shared(Calendar::default());
        let schedule = ScheduleStore::shared(10);
        let state = ControlState::shared(Mode::Automatic, 1, 50);
        let processor = Processor::new(
            ready_rx,
            actuate_tx,
            window.clone(),
            calendar.clone(),
            schedule.clone(),
            state.clone(),
            PiController::new(PiConfig::new(0.5, 0.1)),
            Calibration::new(0, 3000),
            new_shared_metrics(),
            Arc::new(EventRecorder::new()),
        );
        Rig { processor, actuate_rx, window, calendar, schedule, state }
    }

    #[test]
    fn calibration_maps_and_clamps() {
        let cal = Calibration::new(0, 3000);
        assert_eq!(cal.to_percent(1500), 50);
        assert_eq!(cal.to_percent(3000), 100);
        assert_eq!(cal.to_percent(9000), 100);
        assert_eq!(cal.to_percent(-5), 0);
        let cal = Calibration::new(500, 2000);
        assert_eq!(cal.to_percent(1500), 50);
        assert_eq!(cal.to_percent(400), 0);
    }

    #[test]
    fn schedule_hit_sets_target() {
        let mut r = rig();
        r.schedule.write().push(ScheduleEntry::new(2, 8, 0, 70).unwrap()).unwrap();
        *r.calendar.lock() = Calendar::new(2, 8, 0).unwrap();

        let report = r.processor.process_once();
        assert_eq!(report.schedule_hit, Some(70));
        assert_eq!(r.state.target(), 70);
        assert_eq!(report.target, 70);
    }

    #[test]
    fn neighbouring_minute_does_not_match() {
        let mut r = rig();
        r.schedule.write().push(ScheduleEntry::new(2, 8, 0, 70).unwrap()).unwrap();
        *r.calendar.lock() = Calendar::new(2, 8, 1).unwrap();

        let report = r.processor.process_once();
        assert_eq!(report.schedule_hit, None);
        assert_eq!(r.state.target(), 50);
    }

    #[test]
    fn colliding_entries_use_last_appended() {
        let mut r = rig();
        {
            let mut store = r.schedule.write();
            store.push(ScheduleEntry::new(5, 18, 30, 10).unwrap()).unwrap();
            store.push(ScheduleEntry::new(5, 18, 30, 90).unwrap()).unwrap();
        }
        *r.calendar.lock() = Calendar::new(5, 18, 30).unwrap();
        assert_eq!(r.processor.process_once().schedule_hit, Some(90));
    }

    #[test]
    fn cycle_updates_duty_and_signals_actuation() {
        let mut r = rig();
        {
            let mut w = r.window.lock();
            for _ in 0..10 {
                w.push(600); // 20%
            }
        }
        let report = r.processor.process_once();
        assert_eq!(report.filtered, 600);
        assert_eq!(report.real_intensity, 20);
        // error 30: up 15, ui 3 → 18
        assert_eq!(report.duty_cycle, 18);
        assert_eq!(r.state.duty_cycle(), 18);
        assert!(r.actuate_rx.try_wait());
    }
}
