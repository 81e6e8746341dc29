//! filter.rs
//! Single-pass outlier filter over the sample window.
//!
//! 1. Integer mean of all samples.
//! 2. Keep samples inside [mean * 0.9, mean * 1.1] (floating bounds).
//! 3. Integer mean of the kept samples; an empty kept set averages to 0.

const LOW_FACTOR: f64 = 0.9;
const HIGH_FACTOR: f64 = 1.1;

/// Truncating integer mean; 0 for an empty slice.
pub fn array_average(data: &[i32]) -> i32 {
    if data.is_empty() {
        return 0;
    }
    let sum: i64 = data.iter().map(|&v| i64::from(v)).sum();
    (sum / data.len() as i64) as i32
}

/// Representative value of `window` with samples further than 10% from
/// the mean removed.
pub fn filter(window: &[i32]) -> i32 {
    let avg = f64::from(array_average(window));
    // For a negative mean the scaled bounds swap places.
    let (low, high) = {
        let a = avg * LOW_FACTOR;
        let b = avg * HIGH_FACTOR;
        if a <= b { (a, b) } else { (b, a) }
    };

    let (sum, kept) = window
        .iter()
        .map(|&v| f64::from(v))
        .filter(|&v| v >= low && v <= high)
        .fold((0i64, 0i64), |(sum, n), v| (sum + v as i64, n + 1));

    (sum / kept.max(1)) as i32
}
