//! Light-intensity control: a multi-task control loop that samples a light
//! sensor, filters it, runs a PI controller and drives an inverted PWM output,
//! with manual/automatic modes, a software calendar and a schedule of
//! automatic setpoints.
//!
//! Pipeline: Sampling → (window + signal) → Processing → (duty + signal) → Actuation.
//! Operator side: console interface, button mailbox, calendar timer.

pub mod component_a;
pub mod component_b;
pub mod component_c;
pub mod runtime;
pub mod utils;
