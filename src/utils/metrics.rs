//! Metrics collection and event recording for the control loop.
//!
//! Two independent paths:
//! - **EventRecorder:** lock-free queue (16K capacity) → background CSV export.
//! - **Metrics:** shared mutex buffer of recent values and counters (1000 points per series).
//!
//! Event trace of one automatic cycle: SampleTaken → Processed → Actuated.
//! Manual button presses produce Actuated directly.

use crossbeam_queue::ArrayQueue;
use log::{debug, error};
use serde::Serialize;
use std::{
    collections::VecDeque,
    fs::File,
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use crate::component_b::control_state::Mode;

/// Control-loop event with a nanosecond timestamp relative to recorder creation.
#[derive(Debug, Clone)]
pub enum Event {
    SampleTaken {
        seq: u64,
        ts_ns: u64,
        raw: i32,
        reused: bool,
    },
    SensorFault {
        seq: u64,
        ts_ns: u64,
    },
    Processed {
        seq: u64,
        ts_ns: u64,
        filtered: i32,
        real: i32,
        target: u8,
        duty: u8,
    },
    Actuated {
        ts_ns: u64,
        mode: Mode,
        percent: u8,
        on_time_us: u32,
    },
    CalendarTick {
        ts_ns: u64,
        day: u8,
        hour: u8,
        minute: u8,
    },
    DeadlineMiss {
        ts_ns: u64,
        component: DeadlineComponent,
        missed: u32,
    },
}

#[derive(Debug, Serialize)]
struct EventRow<'a> {
    seq: u64,
    ts_ns: u64,
    event: &'a str,
    field1: String,
    field2: String,
    field3: String,
}

impl Event {
    fn to_row(&self) -> EventRow<'static> {
        match self {
            Event::SampleTaken { seq, ts_ns, raw, reused } => EventRow {
                seq: *seq,
                ts_ns: *ts_ns,
                event: "SampleTaken",
                field1: raw.to_string(),
                field2: reused.to_string(),
                field3: String::new(),
            },
            Event::SensorFault { seq, ts_ns } => EventRow {
                seq: *seq,
                ts_ns: *ts_ns,
                event: "SensorFault",
                field1: String::new(),
                field2: String::new(),
                field3: String::new(),
            },
            Event::Processed { seq, ts_ns, filtered, real, target, duty } => EventRow {
                seq: *seq,
                ts_ns: *ts_ns,
                event: "Processed",
                field1: format!("filtered={}", filtered),
                field2: format!("real={} target={}", real, target),
                field3: format!("duty={}", duty),
            },
            Event::Actuated { ts_ns, mode, percent, on_time_us } => EventRow {
                seq: 0,
                ts_ns: *ts_ns,
                event: "Actuated",
                field1: mode.name().to_string(),
                field2: percent.to_string(),
                field3: on_time_us.to_string(),
            },
            Event::CalendarTick { ts_ns, day, hour, minute } => EventRow {
                seq: 0,
                ts_ns: *ts_ns,
                event: "CalendarTick",
                field1: day.to_string(),
                field2: format!("{:02}", hour),
                field3: format!("{:02}", minute),
            },
            Event::DeadlineMiss { ts_ns, component, missed } => EventRow {
                seq: 0,
                ts_ns: *ts_ns,
                event: "DeadlineMiss",
                field1: component.name().to_string(),
                field2: missed.to_string(),
                field3: String::new(),
            },
        }
    }
}

const EVENT_QUEUE_CAPACITY: usize = 16_384;

/// Non-blocking event recorder with background CSV export.
///
/// `record()` pushes to a lock-free queue and returns immediately; events are
/// dropped silently when the queue is full so no control task ever blocks on logging.
#[derive(Clone)]
pub struct EventRecorder {
    queue: Arc<ArrayQueue<Event>>,
    run_start: Instant,
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRecorder {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(EVENT_QUEUE_CAPACITY)),
            run_start: Instant::now(),
        }
    }

    #[inline]
    pub fn record(&self, event: Event) {
        let _ = self.queue.push(event);
    }

    #[inline]
    pub fn now_ns(&self) -> u64 {
        self.run_start.elapsed().as_nanos() as u64
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Pops everything currently queued. Used by tests and by the exporter.
    pub fn drain(&self) -> Vec<Event> {
        let mut out = Vec::with_capacity(self.queue.len());
        while let Some(event) = self.queue.pop() {
            out.push(event);
        }
        out
    }

    /// Spawns a thread draining the queue into `output_csv` until `running`
    /// goes false and the queue is empty.
    pub fn start_exporter(
        &self,
        output_csv: PathBuf,
        running: Arc<AtomicBool>,
    ) -> thread::JoinHandle<()> {
        let queue = self.queue.clone();

        thread::spawn(move || {
            let file = match File::create(&output_csv) {
                Ok(f) => f,
                Err(e) => {
                    error!("Failed to create event CSV {:?}: {}", output_csv, e);
                    return;
                }
            };
            let mut writer = csv::Writer::from_writer(file);

            loop {
                match queue.pop() {
                    Some(event) => {
                        if let Err(e) = writer.serialize(event.to_row()) {
                            error!("Event CSV write failed: {}", e);
                        }
                    }
                    None => {
                        if !running.load(Ordering::Acquire) && queue.is_empty() {
                            break;
                        }
                        thread::sleep(Duration::from_millis(10));
                    }
                }
            }

            if let Err(e) = writer.flush() {
                error!("Event CSV flush failed: {}", e);
            }
            debug!("Event exporter stopped ({:?})", output_csv);
        })
    }
}

/// Component identifier for deadline miss attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineComponent {
    Sampling,
    Timer,
}

impl DeadlineComponent {
    pub fn name(&self) -> &'static str {
        match self {
            DeadlineComponent::Sampling => "sampling",
            DeadlineComponent::Timer => "timer",
        }
    }
}

/// Recent values and counters for the whole run; bounded to MAX_POINTS per series.
#[derive(Default, Clone)]
pub struct Metrics {
    pub raw_samples: VecDeque<f64>,
    pub filtered: VecDeque<f64>,
    pub real_intensity: VecDeque<f64>,
    pub duty_cycle: VecDeque<f64>,
    pub on_time_us: VecDeque<u64>,

    /// Processing cycle execution time (microseconds)
    pub processing_us: VecDeque<u64>,

    pub miss_sampling: u64,
    pub miss_timer: u64,
    pub deadline_miss: u64,

    pub sensor_faults: u64,
    pub pwm_faults: u64,
    pub schedule_hits: u64,
    pub processing_cycles: u64,
    pub actuation_cycles: u64,
    pub manual_actuations: u64,
}

impl Metrics {
    pub fn record_deadline_miss(&mut self, component: DeadlineComponent, missed: u32) {
        let missed = u64::from(missed);
        match component {
            DeadlineComponent::Sampling => self.miss_sampling += missed,
            DeadlineComponent::Timer => self.miss_timer += missed,
        }
        self.deadline_miss += missed;
    }
}

pub type SharedMetrics = Arc<Mutex<Metrics>>;

pub fn new_shared_metrics() -> SharedMetrics {
    Arc::new(Mutex::new(Metrics::default()))
}

/// Locks the metrics, recovering the data if a task panicked while holding it.
pub fn lock_metrics(metrics: &SharedMetrics) -> std::sync::MutexGuard<'_, Metrics> {
    match metrics.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub const MAX_POINTS: usize = 1_000;

/// Appends value to a metrics buffer; drops the oldest at capacity.
#[inline]
pub fn push_capped(buf: &mut VecDeque<f64>, val: f64) {
    if buf.len() >= MAX_POINTS {
        buf.pop_front();
    }
    buf.push_back(val);
}

#[inline]
pub fn push_capped_u64(buf: &mut VecDeque<u64>, val: u64) {
    if buf.len() >= MAX_POINTS {
        buf.pop_front();
    }
    buf.push_back(val);
}

#[derive(Debug, Clone)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: usize,
}

pub fn calculate_stats(data: &VecDeque<f64>) -> Option<Stats> {
    if data.is_empty() {
        return None;
    }

    let count = data.len();
    let min = data.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = data.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mean = data.iter().sum::<f64>() / count as f64;

    Some(Stats { min, max, mean, count })
}

pub fn calculate_stats_u64(data: &VecDeque<u64>) -> Option<Stats> {
    if data.is_empty() {
        return None;
    }

    let count = data.len();
    let min = data.iter().map(|&x| x as f64).fold(f64::INFINITY, f64::min);
    let max = data.iter().map(|&x| x as f64).fold(f64::NEG_INFINITY, f64::max);
    let mean = data.iter().map(|&x| x as f64).sum::<f64>() / count as f64;

    Some(Stats { min, max, mean, count })
}
