//! interface.rs
//! Operator console: one keystroke per command.
//!
//! - `1` add a schedule entry (weekday, hour, minute, intensity)
//! - `2` list schedule entries in insertion order
//! - `3` set the calendar (weekday, hour, minute)
//! - `4` show the calendar
//! - `a` / `m` / `+` / `-` press the automatic / manual / increase / decrease
//!   board button (host builds have no GPIO panel)
//!
//! Anything else is ignored. Integer fields are typed as digits ended by
//! whitespace; a malformed or out-of-range value is rejected and the same
//! field is prompted again.

use log::{debug, info, warn};
use std::io::{self, Write};

use crate::component_c::{
    buttons::{Button, ButtonIrq},
    calendar::{Calendar, SharedCalendar},
    schedule::{ScheduleEntry, SharedSchedule},
};
use crate::utils::error::{ControlError, Result};

pub trait Console: Send {
    /// Next keystroke; `None` once the input is closed.
    fn read_char(&mut self) -> Option<char>;
}

/// Console on the process' standard input (line-buffered by the terminal).
pub struct StdinConsole {
    input: io::Stdin,
    pending: Vec<char>,
}

impl StdinConsole {
    pub fn new() -> Self {
        Self {
            input: io::stdin(),
            pending: Vec::new(),
        }
    }
}

impl Default for StdinConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for StdinConsole {
    fn read_char(&mut self) -> Option<char> {
        if self.pending.is_empty() {
            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) | Err(_) => return None,
                Ok(_) => self.pending = line.chars().rev().collect(),
            }
        }
        self.pending.pop()
    }
}

/// Console fed from a string; used by tests and demos.
pub struct ScriptedConsole {
    chars: std::vec::IntoIter<char>,
}

impl ScriptedConsole {
    pub fn new(script: &str) -> Self {
        Self {
            chars: script.chars().collect::<Vec<_>>().into_iter(),
        }
    }
}

impl Console for ScriptedConsole {
    fn read_char(&mut self) -> Option<char> {
        self.chars.next()
    }
}

pub struct OperatorInterface<C: Console, W: Write> {
    console: C,
    out: W,
    calendar: SharedCalendar,
    schedule: SharedSchedule,
    buttons: Option<ButtonIrq>,
}

impl<C: Console, W: Write> OperatorInterface<C, W> {
    pub fn new(console: C, out: W, calendar: SharedCalendar, schedule: SharedSchedule) -> Self {
        Self {
            console,
            out,
            calendar,
            schedule,
            buttons: None,
        }
    }

    pub fn with_buttons(mut self, buttons: ButtonIrq) -> Self {
        self.buttons = Some(buttons);
        self
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Command loop; returns when the console closes.
    pub fn run(&mut self) -> Result<()> {
        self.print_menu()?;
        while let Some(c) = self.console.read_char() {
            match self.handle(c) {
                Ok(()) => {}
                Err(ControlError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(ControlError::Io(e)) => return Err(e.into()),
                Err(e) => debug!("[Interface] command '{}' refused: {}", c, e),
            }
        }
        info!("[Interface] console closed");
        Ok(())
    }

    pub fn print_menu(&mut self) -> Result<()> {
        writeln!(self.out, "┌──────────────────────────────────────┐")?;
        writeln!(self.out, "│  1) add schedule entry               │")?;
        writeln!(self.out, "│  2) list schedule                    │")?;
        writeln!(self.out, "│  3) set calendar                     │")?;
        writeln!(self.out, "│  4) show calendar                    │")?;
        writeln!(self.out, "│  a/m) automatic/manual  +/-) light   │")?;
        writeln!(self.out, "└──────────────────────────────────────┘")?;
        self.out.flush()?;
        Ok(())
    }

    /// Runs one command.
    pub fn handle(&mut self, command: char) -> Result<()> {
        match command {
            '1' => self.add_entry().map(|_| ()),
            '2' => self.list_entries(),
            '3' => self.set_calendar(),
            '4' => self.show_calendar(),
            'a' => self.press(Button::SelectAutomatic),
            'm' => self.press(Button::SelectManual),
            '+' => self.press(Button::Increase),
            '-' => self.press(Button::Decrease),
            _ => Ok(()),
        }
    }

    /// Reads the four fields and appends; refuses with `StoreFull` when at capacity.
    pub fn add_entry(&mut self) -> Result<usize> {
        let weekday = self.prompt_int("weekday (0=Sunday..6)", 0, 6)?;
        let hour = self.prompt_int("hour (0-23)", 0, 23)?;
        let minute = self.prompt_int("minute (0-59)", 0, 59)?;
        let intensity = self.prompt_int("intensity (0-100)", 0, 100)?;
        let entry = ScheduleEntry::new(weekday, hour, minute, intensity)?;

        let result = self.schedule.write().push(entry);
        match result {
            Ok(idx) => {
                writeln!(self.out, "entry {} stored: {}", idx, entry)?;
                Ok(idx)
            }
            Err(e) => {
                warn!("[Interface] {}", e);
                writeln!(self.out, "error: {}; entry discarded", e)?;
                Err(e)
            }
        }
    }

    pub fn list_entries(&mut self) -> Result<()> {
        let entries = self.schedule.read().entries().to_vec();
        if entries.is_empty() {
            writeln!(self.out, "schedule is empty")?;
        }
        for (i, e) in entries.iter().enumerate() {
            writeln!(self.out, "{}: {}", i, e)?;
        }
        Ok(())
    }

    pub fn set_calendar(&mut self) -> Result<()> {
        let day = self.prompt_int("weekday (0=Sunday..6)", 0, 6)?;
        let hour = self.prompt_int("hour (0-23)", 0, 23)?;
        let minute = self.prompt_int("minute (0-59)", 0, 59)?;
        let new = Calendar::new(day, hour, minute)?;

        *self.calendar.lock() = new;
        writeln!(self.out, "calendar set to {}", new)?;
        Ok(())
    }

    pub fn show_calendar(&mut self) -> Result<()> {
        let now = *self.calendar.lock();
        writeln!(self.out, "DAY = {}", now)?;
        Ok(())
    }

    fn press(&mut self, button: Button) -> Result<()> {
        match &self.buttons {
            Some(irq) => {
                irq.press(button);
            }
            None => writeln!(self.out, "no button panel attached")?,
        }
        Ok(())
    }

    /// Prompts until a valid integer in `min..=max` is typed.
    fn prompt_int(&mut self, label: &str, min: i64, max: i64) -> Result<i64> {
        loop {
            write!(self.out, "{}: ", label)?;
            self.out.flush()?;
            match self.read_int() {
                Ok(v) if (min..=max).contains(&v) => return Ok(v),
                Ok(v) => writeln!(self.out, "{} is out of range {}..={}, try again", v, min, max)?,
                Err(ControlError::InvalidInput(token)) => {
                    writeln!(self.out, "'{}' is not a number, try again", token)?
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Reads one whitespace-terminated token and parses it as an integer.
    fn read_int(&mut self) -> Result<i64> {
        let mut token = String::new();
        loop {
            match self.console.read_char() {
                None if token.is_empty() => {
                    return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "console closed").into());
                }
                None => break,
                Some(c) if c.is_whitespace() => {
                    if token.is_empty() {
                        continue;
                    }
                    break;
                }
                Some(c) => token.push(c),
            }
        }
        token
            .parse::<i64>()
            .map_err(|_| ControlError::InvalidInput(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component_c::schedule::ScheduleStore;

    fn interface(script: &str, capacity: usize) -> OperatorInterface<ScriptedConsole, Vec<u8>> {
        OperatorInterface::new(
            ScriptedConsole::new(script),
            Vec::new(),
            Calendar::shared(Calendar::default()),
            ScheduleStore::shared(capacity),
        )
    }

    fn output(ui: OperatorInterface<ScriptedConsole, Vec<u8>>) -> String {
        String::from_utf8(ui.into_output()).unwrap()
    }

    #[test]
    fn add_then_list() {
        let mut ui = interface("1 2 8 0 70\n1\n3\n15\n40\n40\n2", 10);
        let schedule = ui.schedule.clone();
        ui.run().unwrap();
        let store = schedule.read();
        assert_eq!(store.len(), 2);
        assert_eq!(store.entries()[0], ScheduleEntry::new(2, 8, 0, 70).unwrap());
        assert_eq!(store.entries()[1], ScheduleEntry::new(3, 15, 40, 40).unwrap());
        drop(store);
        let text = output(ui);
        assert!(text.contains("0: Tuesday 08:00 -> 70%"));
        assert!(text.contains("1: Wednesday 15:40 -> 40%"));
    }

    #[test]
    fn non_numeric_input_is_reprompted() {
        let mut ui = interface("1 x2 2 8 0 70 ", 10);
        let schedule = ui.schedule.clone();
        ui.run().unwrap();
        assert_eq!(schedule.read().entries()[0].weekday, 2);
        assert!(output(ui).contains("'x2' is not a number"));
    }

    #[test]
    fn out_of_range_input_is_reprompted() {
        let mut ui = interface("1 9 2 8 0 170 70 ", 10);
        let schedule = ui.schedule.clone();
        ui.run().unwrap();
        assert_eq!(schedule.read().entries()[0].intensity, 70);
        let text = output(ui);
        assert!(text.contains("9 is out of range 0..=6"));
        assert!(text.contains("170 is out of range 0..=100"));
    }

    #[test]
    fn full_store_refuses_entry() {
        let mut ui = interface("", 1);
        ui.schedule.write().push(ScheduleEntry::new(0, 0, 0, 10).unwrap()).unwrap();
        ui.console = ScriptedConsole::new("1 1 1 1 1 ");
        ui.run().unwrap();
        assert_eq!(ui.schedule.read().len(), 1);
        assert_eq!(ui.schedule.read().entries()[0].intensity, 10);
        assert!(output(ui).contains("schedule store is full (1 entries)"));
    }

    #[test]
    fn add_entry_reports_store_full_error() {
        let mut ui = interface("0 0 0 5 ", 0);
        assert!(matches!(ui.add_entry(), Err(ControlError::StoreFull { capacity: 0 })));
    }

    #[test]
    fn set_and_show_calendar() {
        let mut ui = interface("3 6 23 59 4", 10);
        let calendar = ui.calendar.clone();
        ui.run().unwrap();
        assert_eq!(*calendar.lock(), Calendar::new(6, 23, 59).unwrap());
        assert!(output(ui).contains("DAY = Saturday, 23 h : 59 min"));
    }

    #[test]
    fn other_keys_are_ignored() {
        let mut ui = interface("xyz9\n", 10);
        let schedule = ui.schedule.clone();
        let calendar = ui.calendar.clone();
        ui.run().unwrap();
        assert!(schedule.read().is_empty());
        assert_eq!(*calendar.lock(), Calendar::default());
    }

    #[test]
    fn eof_mid_command_ends_session() {
        let mut ui = interface("1 2 8", 10);
        let schedule = ui.schedule.clone();
        assert!(ui.run().is_ok());
        assert!(schedule.read().is_empty());
    }

    #[test]
    fn button_keys_without_panel_are_reported() {
        let mut ui = interface("+", 10);
        ui.run().unwrap();
        assert!(output(ui).contains("no button panel attached"));
    }
}
