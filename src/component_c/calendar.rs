//! calendar.rs
//! Software calendar (weekday, hour, minute) and the Timer task that advances it.
//!
//! The calendar sits behind a parking_lot mutex shared by the Timer task
//! (tick), the operator console (set / show) and Processing (schedule lookup).
//! Every holder does a copy or a short update under the lock; printing happens
//! after the guard is dropped.

use log::{debug, info};
use parking_lot::Mutex;
use std::{
    fmt,
    sync::{Arc, atomic::AtomicBool},
    time::Duration,
};

use crate::utils::error::{ControlError, Result};
use crate::utils::metrics::{DeadlineComponent, Event, EventRecorder, SharedMetrics, lock_metrics};
use crate::utils::scheduler::PeriodicTimer;

pub const WEEK_DAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Calendar {
    day: u8,
    hour: u8,
    minute: u8,
}

pub type SharedCalendar = Arc<Mutex<Calendar>>;

pub(crate) fn check_range(field: &'static str, value: i64, max: i64) -> Result<u8> {
    if (0..=max).contains(&value) {
        Ok(value as u8)
    } else {
        Err(ControlError::InvalidEntry { field, value })
    }
}

impl Calendar {
    pub fn new(day: i64, hour: i64, minute: i64) -> Result<Self> {
        Ok(Self {
            day: check_range("weekday", day, 6)?,
            hour: check_range("hour", hour, 23)?,
            minute: check_range("minute", minute, 59)?,
        })
    }

    pub fn shared(calendar: Calendar) -> SharedCalendar {
        Arc::new(Mutex::new(calendar))
    }

    pub fn day(&self) -> u8 {
        self.day
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn weekday_name(&self) -> &'static str {
        WEEK_DAYS[usize::from(self.day)]
    }

    /// Advances one minute with carry into hour and day; day wraps after Saturday.
    pub fn tick(&mut self) {
        self.minute += 1;
        if self.minute == 60 {
            self.minute = 0;
            self.hour += 1;
        }
        if self.hour == 24 {
            self.hour = 0;
            self.day = (self.day + 1) % 7;
        }
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {:02} h : {:02} min", self.weekday_name(), self.hour, self.minute)
    }
}

/// Periodic task: one tick per simulated minute.
pub struct CalendarTimer {
    calendar: SharedCalendar,
    period: Duration,
    running: Arc<AtomicBool>,
    metrics: SharedMetrics,
    event_recorder: Arc<EventRecorder>,
}

impl CalendarTimer {
    pub fn new(
        calendar: SharedCalendar,
        period: Duration,
        running: Arc<AtomicBool>,
        metrics: SharedMetrics,
        event_recorder: Arc<EventRecorder>,
    ) -> Self {
        Self {
            calendar,
            period,
            running,
            metrics,
            event_recorder,
        }
    }

    /// Tick under the lock and return the new reading.
    pub fn tick_once(&self) -> Calendar {
        let now = {
            let mut cal = self.calendar.lock();
            cal.tick();
            *cal
        };
        self.event_recorder.record(Event::CalendarTick {
            ts_ns: self.event_recorder.now_ns(),
            day: now.day(),
            hour: now.hour(),
            minute: now.minute(),
        });
        now
    }

    pub fn run(self) {
        let start = *self.calendar.lock();
        info!("[Timer] started period={:?} at {}", self.period, start);
        let mut timer = PeriodicTimer::new(self.period);

        while let Some(release) = timer.wait_next_while(&self.running) {
            if release.is_late() {
                debug!("[Timer] overrun, skipped {} release(s)", release.missed);
                self.event_recorder.record(Event::DeadlineMiss {
                    ts_ns: self.event_recorder.now_ns(),
                    component: DeadlineComponent::Timer,
                    missed: release.missed,
                });
                lock_metrics(&self.metrics).record_deadline_miss(DeadlineComponent::Timer, release.missed);
            }

            let now = self.tick_once();
            info!("DAY = {}", now);
        }

        info!("[Timer] stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::metrics::new_shared_metrics;
    use std::sync::atomic::Ordering;

    #[test]
    fn end_of_week_rolls_over() {
        let mut cal = Calendar::new(6, 23, 59).unwrap();
        cal.tick();
        assert_eq!(cal, Calendar::new(0, 0, 0).unwrap());
    }

    #[test]
    fn minute_carries_into_hour() {
        let mut cal = Calendar::new(2, 7, 59).unwrap();
        cal.tick();
        assert_eq!((cal.day(), cal.hour(), cal.minute()), (2, 8, 0));
        cal.tick();
        assert_eq!(cal.minute(), 1);
    }

    #[test]
    fn out_of_range_fields_are_rejected() {
        assert!(Calendar::new(7, 0, 0).is_err());
        assert!(Calendar::new(0, 24, 0).is_err());
        assert!(matches!(
            Calendar::new(0, 0, 60),
            Err(ControlError::InvalidEntry { field: "minute", value: 60 })
        ));
        assert!(Calendar::new(-1, 0, 0).is_err());
    }

    #[test]
    fn display_uses_weekday_names() {
        let cal = Calendar::new(3, 9, 5).unwrap();
        assert_eq!(cal.to_string(), "Wednesday, 09 h : 05 min");
    }

    #[test]
    fn timer_ticks_shared_calendar() {
        let calendar = Calendar::shared(Calendar::default());
        let timer = CalendarTimer::new(
            calendar.clone(),
            Duration::from_millis(1),
            Arc::new(AtomicBool::new(true)),
            new_shared_metrics(),
            Arc::new(EventRecorder::new()),
        );
        for _ in 0..61 {
            timer.tick_once();
        }
        assert_eq!(*calendar.lock(), Calendar::new(0, 1, 1).unwrap());
    }

    #[test]
    fn timer_task_advances_until_stopped() {
        let calendar = Calendar::shared(Calendar::default());
        let running = Arc::new(AtomicBool::new(true));
        let timer = CalendarTimer::new(
            calendar.clone(),
            Duration::from_millis(2),
            running.clone(),
            new_shared_metrics(),
            Arc::new(EventRecorder::new()),
        );
        let handle = std::thread::spawn(move || timer.run());
        std::thread::sleep(Duration::from_millis(30));
        running.store(false, Ordering::Release);
        handle.join().unwrap();
        assert!(calendar.lock().minute() > 0);
    }
}
