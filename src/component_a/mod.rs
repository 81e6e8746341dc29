// Component A: acquisition and processing
// Samples the light sensor into a circular window, filters it and runs
// the PI step that produces the duty cycle for Actuation.

pub mod filter;
pub mod processor;
pub mod sensor;
pub mod signal;
pub mod window;
