//! CSV export of run results.
//!
//! Two outputs per run, written at shutdown:
//! - `metrics_summary.csv`: min/max/avg of the recorded series plus counters.
//! - `runs.csv`: one appended row per run (deadline misses, faults, cycles) for trending.

use log::info;
use serde::Serialize;
use std::{
    fs::{OpenOptions, create_dir_all},
    path::Path,
};

use crate::utils::error::Result;
use crate::utils::metrics::{Metrics, SharedMetrics, calculate_stats, calculate_stats_u64, lock_metrics};

#[derive(Debug, Serialize)]
struct MetricRow {
    metric: String,
    value: f64,
    description: &'static str,
}

#[derive(Debug, Serialize)]
struct RunRow {
    processing_cycles: u64,
    actuation_cycles: u64,
    manual_actuations: u64,
    deadline_miss: u64,
    miss_sampling: u64,
    miss_timer: u64,
    sensor_faults: u64,
    pwm_faults: u64,
    schedule_hits: u64,
    avg_processing_us: u64,
}

/// Writes both CSV files into `dir`, creating it if needed.
pub fn run_exports(metrics: &SharedMetrics, dir: &Path) -> Result<()> {
    create_dir_all(dir)?;
    let snapshot = lock_metrics(metrics).clone();

    let summary_path = dir.join("metrics_summary.csv");
    export_metrics_summary(&snapshot, &summary_path)?;
    info!("Metrics summary exported to {:?}", summary_path);

    let runs_path = dir.join("runs.csv");
    append_run_row(&snapshot, &runs_path)?;
    info!("Run row appended to {:?}", runs_path);
    Ok(())
}

fn export_metrics_summary(m: &Metrics, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    for row in summary_rows(m) {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn summary_rows(m: &Metrics) -> Vec<MetricRow> {
    let mut rows = Vec::new();
    let mut push = |metric: &str, value: f64, description: &'static str| {
        rows.push(MetricRow { metric: metric.to_string(), value, description });
    };

    push("deadline_misses", m.deadline_miss as f64, "Skipped periodic releases");
    push("processing_cycles", m.processing_cycles as f64, "Automatic control cycles");
    push("actuation_cycles", m.actuation_cycles as f64, "PWM updates");
    push("sensor_faults", m.sensor_faults as f64, "Failed sensor reads");
    push("pwm_faults", m.pwm_faults as f64, "Failed PWM writes");
    push("schedule_hits", m.schedule_hits as f64, "Schedule entries applied");

    let series = [
        ("raw", &m.raw_samples, "raw sample"),
        ("filtered", &m.filtered, "filtered sample"),
        ("real_intensity", &m.real_intensity, "measured intensity (%)"),
        ("duty", &m.duty_cycle, "PI duty cycle (%)"),
    ];
    for (name, data, description) in series {
        if let Some(s) = calculate_stats(data) {
            push(&format!("{}_min", name), s.min, description);
            push(&format!("{}_max", name), s.max, description);
            push(&format!("{}_avg", name), s.mean, description);
        }
    }

    if let Some(s) = calculate_stats_u64(&m.processing_us) {
        push("processing_max_us", s.max, "Processing cycle time");
        push("processing_avg_us", s.mean, "Processing cycle time");
    }

    rows
}

fn append_run_row(m: &Metrics, path: &Path) -> Result<()> {
    let file_exists = path.exists();
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    let avg_processing_us = if m.processing_us.is_empty() {
        0
    } else {
        m.processing_us.iter().sum::<u64>() / m.processing_us.len() as u64
    };

    writer.serialize(RunRow {
        processing_cycles: m.processing_cycles,
        actuation_cycles: m.actuation_cycles,
        manual_actuations: m.manual_actuations,
        deadline_miss: m.deadline_miss,
        miss_sampling: m.miss_sampling,
        miss_timer: m.miss_timer,
        sensor_faults: m.sensor_faults,
        pwm_faults: m.pwm_faults,
        schedule_hits: m.schedule_hits,
        avg_processing_us,
    })?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::metrics::{new_shared_metrics, push_capped};

    #[test]
    fn summary_contains_series_stats() {
        let mut m = Metrics::default();
        push_capped(&mut m.duty_cycle, 10.0);
        push_capped(&mut m.duty_cycle, 30.0);
        let rows = summary_rows(&m);
        let avg = rows.iter().find(|r| r.metric == "duty_avg").unwrap();
        assert_eq!(avg.value, 20.0);
        assert!(rows.iter().all(|r| r.metric != "raw_avg"));
    }

    #[test]
    fn run_rows_append_with_single_header() {
        let dir = std::env::temp_dir().join(format!("light_control_export_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let metrics = new_shared_metrics();

        run_exports(&metrics, &dir).unwrap();
        run_exports(&metrics, &dir).unwrap();

        let runs = std::fs::read_to_string(dir.join("runs.csv")).unwrap();
        assert_eq!(runs.lines().count(), 3);
        assert!(runs.starts_with("processing_cycles,"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
