//! error.rs
//! Error taxonomy for the control application.
//!
//! - Capacity / configuration: store full, invalid config, out-of-range fields.
//! - Transient hardware: sensor read or PWM write failures (cycle-local, retried next period).
//! - Operator input: malformed integers typed on the console.
//!
//! Nothing here is fatal to the process; task loops log and carry on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlError {
    /// Schedule store already holds `capacity` entries; the store is left unchanged.
    #[error("schedule store is full ({capacity} entries)")]
    StoreFull { capacity: usize },

    /// A schedule or calendar field is outside its allowed range.
    #[error("{field} out of range: {value}")]
    InvalidEntry { field: &'static str, value: i64 },

    #[error("sensor read failed: {0}")]
    SensorRead(String),

    #[error("pwm write failed: {0}")]
    PwmWrite(String),

    /// Operator typed something that is not an integer.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// A task thread could not be spawned or panicked before shutdown.
    #[error("task {0} failed")]
    Task(&'static str),

    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ControlError>;
