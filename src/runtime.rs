//! runtime.rs
//! Wires the control tasks to OS threads and tears them down again.
//!
//! ## Tasks
//! - **Sampling** (periodic, `sampling_period_ms`) → window + data-ready signal
//! - **Processing** (sporadic, on data-ready) → duty cycle + actuate signal
//! - **Actuation** (sporadic, on actuate from Processing or the buttons)
//! - **Timer** (periodic, `timer_period_ms`) → calendar tick
//! - **Buttons** (drains the interrupt mailbox)
//!
//! Every task thread asks for `ThreadPriority::Max` and is optionally pinned
//! to `pin_core`. Neither is fatal when the OS refuses.
//!
//! ## Shutdown
//! Clearing `running` stops the periodic tasks and the button task. Sampling
//! drops its notifier, which ends Processing; Processing and Buttons drop
//! theirs, which ends Actuation. The event exporter is stopped last so it
//! drains everything the tasks recorded.

use log::{debug, error, info, warn};
use std::{
    fs::create_dir_all,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
};
use thread_priority::{ThreadBuilderExt, ThreadPriority};

use crate::component_a::{
    processor::{Calibration, Processor},
    sensor::{LightSensor, Sampler},
    signal::signal,
    window::{SampleWindow, SharedWindow},
};
use crate::component_b::{
    control_state::{ControlState, SharedControlState},
    controller::{PiConfig, PiController},
    pwm::PwmOutput,
    receiver::Actuator,
};
use crate::component_c::{
    buttons::{ButtonHandler, ButtonIrq, button_irq},
    calendar::{Calendar, CalendarTimer, SharedCalendar},
    schedule::{ScheduleStore, SharedSchedule},
};
use crate::utils::config::ControlConfig;
use crate::utils::error::{ControlError, Result};
use crate::utils::metrics::{EventRecorder, SharedMetrics, new_shared_metrics};

/// Event log written by `start_event_export`, inside `log_dir`.
pub const EVENTS_FILE: &str = "events.csv";

struct Exporter {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
    path: PathBuf,
}

/// The running controller: shared state plus the task threads.
pub struct LightControlSystem {
    config: ControlConfig,
    state: SharedControlState,
    window: SharedWindow,
    calendar: SharedCalendar,
    schedule: SharedSchedule,
    buttons: ButtonIrq,
    metrics: SharedMetrics,
    event_recorder: Arc<EventRecorder>,
    running: Arc<AtomicBool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    exporter: Option<Exporter>,
}

impl LightControlSystem {
    /// Validates `config`, builds the shared state and spawns every task.
    pub fn start(
        config: ControlConfig,
        sensor: Box<dyn LightSensor>,
        pwm: Box<dyn PwmOutput>,
    ) -> Result<Self> {
        config.validate()?;

        let state = ControlState::shared(
            config.initial_mode,
            config.initial_intensity,
            config.initial_target,
        );
        let window = SampleWindow::shared(config.filter_size)?;
        let calendar = Calendar::shared(Calendar::default());
        let schedule = ScheduleStore::shared(config.schedule_capacity);
        let metrics = new_shared_metrics();
        let event_recorder = Arc::new(EventRecorder::new());
        let running = Arc::new(AtomicBool::new(true));

        let (ready_tx, ready_rx) = signal("data-ready");
        let (actuate_tx, actuate_rx) = signal("actuate");

        let sampler = Sampler::new(
            sensor,
            window.clone(),
            state.clone(),
            ready_tx,
            running.clone(),
            config.sampling_period(),
            metrics.clone(),
            event_recorder.clone(),
        );
        let mut processor = Processor::new(
            ready_rx,
            actuate_tx.clone(),
            window.clone(),
            calendar.clone(),
            schedule.clone(),
            state.clone(),
            PiController::new(PiConfig::from(&config)),
            Calibration::from(&config),
            metrics.clone(),
            event_recorder.clone(),
        );
        let mut actuator = Actuator::new(
            actuate_rx,
            state.clone(),
            pwm,
            config.pwm_pin,
            config.pwm_period_us,
            metrics.clone(),
            event_recorder.clone(),
        );
        let timer = CalendarTimer::new(
            calendar.clone(),
            config.timer_period(),
            running.clone(),
            metrics.clone(),
            event_recorder.clone(),
        );
        let (buttons, button_task) = button_irq(ButtonHandler::new(state.clone(), actuate_tx));
        let button_task = button_task.with_stop_flag(running.clone());

        let mut system = Self {
            config,
            state,
            window,
            calendar,
            schedule,
            buttons,
            metrics,
            event_recorder,
            running,
            tasks: Vec::with_capacity(5),
            exporter: None,
        };

        // Consumers first so no signal is raised before its waiter exists.
        let core = system.config.pin_core;
        let spawned = [
            spawn_task("actuation", core, move || actuator.run()),
            spawn_task("processing", core, move || processor.run()),
            spawn_task("buttons", core, move || button_task.run()),
            spawn_task("timer", core, move || timer.run()),
            spawn_task("sampling", core, move || sampler.run()),
        ];
        let mut spawn_error = None;
        for task in spawned {
            match task {
                Ok(entry) => system.tasks.push(entry),
                Err(e) => {
                    spawn_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = spawn_error {
            // Unwind whatever did start before reporting.
            if let Err(stop) = system.stop_tasks() {
                error!("[Runtime] while unwinding failed start: {}", stop);
            }
            return Err(e);
        }

        info!(
            "[Runtime] started {} tasks, mode={} sampling={}ms timer={}ms",
            system.tasks.len(),
            system.state.mode().name(),
            system.config.sampling_period_ms,
            system.config.timer_period_ms
        );
        Ok(system)
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn state(&self) -> &SharedControlState {
        &self.state
    }

    pub fn window(&self) -> &SharedWindow {
        &self.window
    }

    pub fn calendar(&self) -> &SharedCalendar {
        &self.calendar
    }

    pub fn schedule(&self) -> &SharedSchedule {
        &self.schedule
    }

    /// A handle onto the button mailbox (for the console or a GPIO shim).
    pub fn buttons(&self) -> ButtonIrq {
        self.buttons.clone()
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    pub fn event_recorder(&self) -> &Arc<EventRecorder> {
        &self.event_recorder
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Streams the event log to `<log_dir>/events.csv` until shutdown.
    pub fn start_event_export(&mut self) -> Result<PathBuf> {
        if let Some(exporter) = &self.exporter {
            return Ok(exporter.path.clone());
        }
        create_dir_all(&self.config.log_dir)?;
        let path = self.config.log_dir.join(EVENTS_FILE);
        let running = Arc::new(AtomicBool::new(true));
        let handle = self
            .event_recorder
            .start_exporter(path.clone(), running.clone());
        info!("[Runtime] exporting events to {:?}", path);
        self.exporter = Some(Exporter {
            handle,
            running,
            path: path.clone(),
        });
        Ok(path)
    }

    /// Stops every task, then the exporter. Errors if any task panicked.
    pub fn shutdown(mut self) -> Result<()> {
        info!("[Runtime] shutting down");
        let result = self.stop_tasks();

        if let Some(exporter) = self.exporter.take() {
            exporter.running.store(false, Ordering::Release);
            if exporter.handle.join().is_err() {
                error!("[Runtime] event exporter panicked");
            }
        }

        info!("[Runtime] all tasks joined");
        result
    }

    fn stop_tasks(&mut self) -> Result<()> {
        self.running.store(false, Ordering::Release);

        let mut failed = None;
        for (name, handle) in self.tasks.drain(..) {
            match handle.join() {
                Ok(()) => debug!("[Runtime] {} joined", name),
                Err(_) => {
                    error!("[Runtime] {} panicked", name);
                    failed.get_or_insert(name);
                }
            }
        }
        match failed {
            Some(name) => Err(ControlError::Task(name)),
            None => Ok(()),
        }
    }
}

/// Spawns one task thread at max priority, optionally pinned to `pin_core`.
fn spawn_task<F>(
    name: &'static str,
    pin_core: Option<usize>,
    body: F,
) -> Result<(&'static str, JoinHandle<()>)>
where
    F: FnOnce() + Send + 'static,
{
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn_with_priority(ThreadPriority::Max, move |priority| {
            if let Err(e) = priority {
                debug!("[{}] running at default priority: {:?}", name, e);
            }
            if let Some(core) = pin_core {
                pin_to_core(name, core);
            }
            body();
        })
        .map_err(|e| {
            error!("[Runtime] failed to spawn {}: {}", name, e);
            ControlError::Task(name)
        })?;
    Ok((name, handle))
}

fn pin_to_core(name: &str, core: usize) {
    let core_ids = core_affinity::get_core_ids().unwrap_or_default();
    match core_ids.into_iter().find(|id| id.id == core) {
        Some(core_id) => {
            if core_affinity::set_for_current(core_id) {
                info!("[{}] pinned to core {}", name, core);
            } else {
                warn!("[{}] failed to pin to core {}", name, core);
            }
        }
        None => warn!("[{}] core {} not among available cores", name, core),
    }
}
