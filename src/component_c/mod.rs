// Component C: operator side
// Software calendar and its timer task, the schedule store, the board
// buttons and the console interface.

pub mod buttons;
pub mod calendar;
pub mod interface;
pub mod schedule;
