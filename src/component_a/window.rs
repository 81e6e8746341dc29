//! window.rs
//! Circular buffer holding the most recent raw samples.
//!
//! Starts zero-filled; the filter always sees the whole buffer, so the first
//! cycles after start-up average against those zeros until it has wrapped once.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::utils::error::{ControlError, Result};

/// Upper bound on the window size accepted at construction.
pub const MAX_WINDOW: usize = 1_024;

#[derive(Debug, Clone)]
pub struct SampleWindow {
    data: Vec<i32>,
    head: usize,
}

/// Written by Sampling, copied out by Processing.
pub type SharedWindow = Arc<Mutex<SampleWindow>>;

impl SampleWindow {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 || capacity > MAX_WINDOW {
            return Err(ControlError::Config(format!(
                "sample window size {} outside 1..={}",
                capacity, MAX_WINDOW
            )));
        }
        Ok(Self {
            data: vec![0; capacity],
            head: 0,
        })
    }

    pub fn shared(capacity: usize) -> Result<SharedWindow> {
        Ok(Arc::new(Mutex::new(Self::new(capacity)?)))
    }

    /// Overwrites the oldest slot and advances `head`.
    pub fn push(&mut self, sample: i32) {
        self.data[self.head] = sample;
        self.head = (self.head + 1) % self.data.len();
    }

    /// Next write index, always in `[0, capacity)`.
    pub fn head(&self) -> usize {
        self.head
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Slot order, not time order; the filter does not care.
    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_wraps_and_oldest_is_overwritten() {
        let mut w = SampleWindow::new(3).unwrap();
        for s in 1..=4 {
            w.push(s);
        }
        assert_eq!(w.head(), 1);
        assert_eq!(w.as_slice(), &[4, 2, 3]);
    }

    #[test]
    fn starts_zeroed() {
        let w = SampleWindow::new(10).unwrap();
        assert_eq!(w.as_slice(), &[0; 10]);
        assert_eq!(w.head(), 0);
    }

    #[test]
    fn bad_sizes_are_rejected() {
        assert!(SampleWindow::new(0).is_err());
        assert!(SampleWindow::new(MAX_WINDOW + 1).is_err());
    }
}
