//! Ambient support: configuration, errors, periodic release timer,
//! metrics / event recording and CSV export.

pub mod config;
pub mod error;
pub mod export;
pub mod metrics;
pub mod scheduler;
