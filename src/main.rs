//! # Light Control Entry Point
//!
//! Runs the light-intensity controller against a simulated lamp and light
//! sensor, with the operator console on stdin/stdout.
//!
//! ## Tasks
//! - **Sampling:** 1 s period, fills the 10-sample window (automatic mode only).
//! - **Processing:** schedule lookup → outlier filter → PI step.
//! - **Actuation:** inverted PWM on pin 0x0e, 1 ms period.
//! - **Timer:** advances the software calendar once per minute.
//! - **Buttons:** console keys `a` `m` `+` `-` stand in for the board buttons.
//!
//! ## Outputs
//! - `data/logs/events.csv`: every sample, cycle, actuation and tick.
//! - `data/logs/metrics_summary.csv`, `data/logs/runs.csv`: end-of-run totals.
//!
//! Close stdin (Ctrl-D) to stop.

use light_control::{
    component_b::pwm::{LightPlant, SimulatedPwm},
    component_a::sensor::SimulatedLightSensor,
    component_c::interface::{OperatorInterface, StdinConsole},
    runtime::LightControlSystem,
    utils::{config::ControlConfig, error::Result, export::run_exports},
};

use log::{error, info};
use std::{io::stdout, process::ExitCode};

fn main() -> ExitCode {
    env_logger::init();
    info!("=== LIGHT CONTROL START ===");

    match run(ControlConfig::default()) {
        Ok(()) => {
            info!("=== LIGHT CONTROL FINISHED ===");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("light control stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(config: ControlConfig) -> Result<()> {
    let log_dir = config.log_dir.clone();

    // The sensor looks at the same lamp the PWM output drives.
    let plant = LightPlant::new();
    let sensor = SimulatedLightSensor::new(plant.clone());
    let pwm = SimulatedPwm::new(plant);

    let mut system = LightControlSystem::start(config, Box::new(sensor), Box::new(pwm))?;
    if let Err(e) = system.start_event_export() {
        error!("[Main] event export disabled: {}", e);
    }

    let session = {
        let mut console = OperatorInterface::new(
            StdinConsole::new(),
            stdout(),
            system.calendar().clone(),
            system.schedule().clone(),
        )
        .with_buttons(system.buttons());
        console.run()
    };

    let metrics = system.metrics().clone();
    let stopped = system.shutdown();

    run_exports(&metrics, &log_dir)?;
    info!("[Main] summary exported to {:?}", log_dir);

    session.and(stopped)
}
