//! schedule.rs
//! Append-only store of (weekday, hour, minute, intensity) setpoints.
//!
//! Entries keep insertion order and are never edited or removed. A full store
//! refuses new entries with `StoreFull` and stays unchanged.

use parking_lot::RwLock;
use std::{fmt, sync::Arc};

use crate::component_c::calendar::{Calendar, WEEK_DAYS, check_range};
use crate::utils::error::{ControlError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub weekday: u8,
    pub hour: u8,
    pub minute: u8,
    pub intensity: u8,
}

impl ScheduleEntry {
    pub fn new(weekday: i64, hour: i64, minute: i64, intensity: i64) -> Result<Self> {
        Ok(Self {
            weekday: check_range("weekday", weekday, 6)?,
            hour: check_range("hour", hour, 23)?,
            minute: check_range("minute", minute, 59)?,
            intensity: check_range("intensity", intensity, 100)?,
        })
    }

    /// Exact (weekday, hour, minute) equality.
    pub fn matches(&self, now: &Calendar) -> bool {
        self.weekday == now.day() && self.hour == now.hour() && self.minute == now.minute()
    }
}

impl fmt::Display for ScheduleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:02}:{:02} -> {}%",
            WEEK_DAYS[usize::from(self.weekday)],
            self.hour,
            self.minute,
            self.intensity
        )
    }
}

#[derive(Debug, Clone)]
pub struct ScheduleStore {
    entries: Vec<ScheduleEntry>,
    capacity: usize,
}

/// Appended by the console, scanned by Processing every cycle.
pub type SharedSchedule = Arc<RwLock<ScheduleStore>>;

impl ScheduleStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn shared(capacity: usize) -> SharedSchedule {
        Arc::new(RwLock::new(Self::new(capacity)))
    }

    /// Appends and returns the entry's index.
    pub fn push(&mut self, entry: ScheduleEntry) -> Result<usize> {
        if self.is_full() {
            return Err(ControlError::StoreFull { capacity: self.capacity });
        }
        self.entries.push(entry);
        Ok(self.entries.len() - 1)
    }

    /// Setpoint for `now`. When several entries share the timestamp the one
    /// appended last wins.
    pub fn lookup(&self, now: &Calendar) -> Option<&ScheduleEntry> {
        self.entries.iter().rev().find(|e| e.matches(now))
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(d: i64, h: i64, m: i64) -> Calendar {
        Calendar::new(d, h, m).unwrap()
    }

    #[test]
    fn exact_timestamp_matches() {
        let mut store = ScheduleStore::new(10);
        store.push(ScheduleEntry::new(2, 8, 0, 70).unwrap()).unwrap();
        assert_eq!(store.lookup(&at(2, 8, 0)).map(|e| e.intensity), Some(70));
        assert!(store.lookup(&at(2, 8, 1)).is_none());
        assert!(store.lookup(&at(3, 8, 0)).is_none());
    }

    #[test]
    fn last_appended_wins_on_collision() {
        let mut store = ScheduleStore::new(10);
        store.push(ScheduleEntry::new(1, 6, 30, 20).unwrap()).unwrap();
        store.push(ScheduleEntry::new(4, 6, 30, 99).unwrap()).unwrap();
        store.push(ScheduleEntry::new(1, 6, 30, 45).unwrap()).unwrap();
        assert_eq!(store.lookup(&at(1, 6, 30)).map(|e| e.intensity), Some(45));
    }

    #[test]
    fn full_store_refuses_and_stays_unchanged() {
        let mut store = ScheduleStore::new(2);
        assert_eq!(store.push(ScheduleEntry::new(0, 0, 0, 1).unwrap()).unwrap(), 0);
        assert_eq!(store.push(ScheduleEntry::new(0, 0, 1, 2).unwrap()).unwrap(), 1);
        let err = store.push(ScheduleEntry::new(0, 0, 2, 3).unwrap()).unwrap_err();
        assert!(matches!(err, ControlError::StoreFull { capacity: 2 }));
        assert_eq!(store.len(), 2);
        assert_eq!(store.entries()[1].intensity, 2);
    }

    #[test]
    fn entry_fields_are_range_checked() {
        assert!(ScheduleEntry::new(7, 0, 0, 0).is_err());
        assert!(ScheduleEntry::new(0, 0, 0, 101).is_err());
        assert!(ScheduleEntry::new(6, 23, 59, 100).is_ok());
    }

    #[test]
    fn display_is_readable() {
        let e = ScheduleEntry::new(1, 7, 5, 40).unwrap();
        assert_eq!(e.to_string(), "Monday 07:05 -> 40%");
    }
}
