//! buttons.rs
//! Board buttons: interrupt-side mailbox and the handler that applies presses.
//!
//! The interrupt context only pushes the fired-pins bitmask into a bounded
//! crossbeam channel (`ButtonIrq::fire`, never blocks). The button task pops
//! masks and runs `ButtonHandler::on_edge`, which owns the mode / manual
//! intensity updates and the manual fast path straight into Actuation.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, info, warn};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use crate::component_a::signal::Notifier;
use crate::component_b::control_state::{Mode, SharedControlState};

/// GPIO line numbers of the four board buttons.
pub const BOARDBUT1: u32 = 0x0b;
pub const BOARDBUT2: u32 = 0x0c;
pub const BOARDBUT3: u32 = 0x18;
pub const BOARDBUT4: u32 = 0x19;

const IRQ_QUEUE_CAPACITY: usize = 16;
const STOP_POLL: Duration = Duration::from_millis(50);

#[inline]
pub const fn bit(line: u32) -> u32 {
    1 << line
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    SelectAutomatic,
    SelectManual,
    Increase,
    Decrease,
}

impl Button {
    /// Callback order when several lines fire together.
    pub const ALL: [Button; 4] = [
        Button::SelectAutomatic,
        Button::SelectManual,
        Button::Increase,
        Button::Decrease,
    ];

    pub fn line(&self) -> u32 {
        match self {
            Button::SelectAutomatic => BOARDBUT1,
            Button::SelectManual => BOARDBUT2,
            Button::Increase => BOARDBUT3,
            Button::Decrease => BOARDBUT4,
        }
    }

    pub fn mask(&self) -> u32 {
        bit(self.line())
    }
}

/// What one edge callback changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonOutcome {
    pub mode: Option<Mode>,
    pub intensity: Option<u8>,
    pub actuations: u32,
}

pub struct ButtonHandler {
    state: SharedControlState,
    actuate: Notifier,
}

impl ButtonHandler {
    pub fn new(state: SharedControlState, actuate: Notifier) -> Self {
        Self { state, actuate }
    }

    /// Applies every button whose line is set in `pins`.
    ///
    /// Mode buttons always apply. Increase/decrease only act in manual mode:
    /// they step the intensity by one (saturating) and wake Actuation directly.
    pub fn on_edge(&self, pins: u32) -> ButtonOutcome {
        let mut outcome = ButtonOutcome::default();

        for button in Button::ALL {
            if pins & button.mask() == 0 {
                continue;
            }
            match button {
                Button::SelectAutomatic => {
                    self.state.set_mode(Mode::Automatic);
                    outcome.mode = Some(Mode::Automatic);
                    info!("Changed to Automatic mode");
                }
                Button::SelectManual => {
                    self.state.set_mode(Mode::Manual);
                    outcome.mode = Some(Mode::Manual);
                    info!("Changed to Manual mode");
                }
                Button::Increase | Button::Decrease => {
                    if self.state.mode() != Mode::Manual {
                        continue;
                    }
                    let delta = if button == Button::Increase { 1 } else { -1 };
                    let intensity = self.state.step_intensity(delta);
                    outcome.intensity = Some(intensity);
                    info!("intensity = {}", intensity);
                    self.actuate.notify();
                    outcome.actuations += 1;
                }
            }
        }

        outcome
    }
}

/// Interrupt-side handle. Cheap to clone, never blocks.
#[derive(Clone)]
pub struct ButtonIrq {
    tx: Sender<u32>,
    dropped: Arc<AtomicU64>,
}

impl ButtonIrq {
    /// Queues an edge event; returns `false` if it had to be dropped.
    pub fn fire(&self, pins: u32) -> bool {
        match self.tx.try_send(pins) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("[Buttons] event queue full, dropped pins={:#x}", pins);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn press(&self, button: Button) -> bool {
        self.fire(button.mask())
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Task side: drains edge events into the handler.
pub struct ButtonTask {
    rx: Receiver<u32>,
    handler: ButtonHandler,
    running: Option<Arc<AtomicBool>>,
}

pub fn button_irq(handler: ButtonHandler) -> (ButtonIrq, ButtonTask) {
    let (tx, rx) = channel::bounded(IRQ_QUEUE_CAPACITY);
    (
        ButtonIrq { tx, dropped: Arc::new(AtomicU64::new(0)) },
        ButtonTask { rx, handler, running: None },
    )
}

impl ButtonTask {
    /// Also stop once `running` is cleared, even if some `ButtonIrq` is still alive.
    pub fn with_stop_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = Some(running);
        self
    }

    fn stop_requested(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|r| !r.load(Ordering::Acquire))
    }

    /// Runs until every `ButtonIrq` is dropped or the stop flag clears.
    pub fn run(self) {
        info!("[Buttons] started");
        loop {
            match self.rx.recv_timeout(STOP_POLL) {
                Ok(pins) => {
                    let outcome = self.handler.on_edge(pins);
                    debug!("[Buttons] pins={:#x} → {:?}", pins, outcome);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.stop_requested() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!("[Buttons] exiting");
    }
}
