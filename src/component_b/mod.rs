// Component B: actuation
// Shared control state (mode, intensities, duty), the PI controller and the
// inverted PWM output driving the lamp.
pub mod control_state;
pub mod controller;
pub mod pwm;
pub mod receiver;
