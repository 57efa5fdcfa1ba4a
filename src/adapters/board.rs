//! Board outputs: relay, warning LED and link LED behind [`OutputPort`].
//!
//! Generic over `embedded-hal` 1.0 [`OutputPin`]s.  On the device the pins
//! are `esp-idf-hal` `PinDriver`s; host tests use any fake pin.  Polarity
//! comes from [`crate::pins`].

use embedded_hal::digital::{OutputPin, PinState};
use log::warn;

use crate::app::ports::OutputPort;
use crate::pins::{LED_ACTIVE_LOW, RELAY_ACTIVE_HIGH};

fn level(on: bool, active_high: bool) -> PinState {
    PinState::from(on == active_high)
}

pub struct BoardOutputs<R, W, L> {
    relay: R,
    warning_led: W,
    link_led: L,
}

impl<R, W, L> BoardOutputs<R, W, L>
where
    R: OutputPin,
    W: OutputPin,
    L: OutputPin,
{
    /// Take ownership of the pins.  Nothing is driven until the first
    /// `set_*` call.
    pub fn new(relay: R, warning_led: W, link_led: L) -> Self {
        Self {
            relay,
            warning_led,
            link_led,
        }
    }

}

impl<R, W, L> OutputPort for BoardOutputs<R, W, L>
where
    R: OutputPin,
    W: OutputPin,
    L: OutputPin,
{
    fn set_relay(&mut self, energized: bool) -> bool {
        let ok = self.relay.set_state(level(energized, RELAY_ACTIVE_HIGH)).is_ok();
        if !ok {
            warn!("Board: relay pin write failed");
        }
        ok
    }

    fn set_warning_led(&mut self, on: bool) -> bool {
        let ok = self.warning_led.set_state(level(on, !LED_ACTIVE_LOW)).is_ok();
        if !ok {
            warn!("Board: warning LED pin write failed");
        }
        ok
    }

    fn set_link_led(&mut self, on: bool) {
        if self.link_led.set_state(level(on, !LED_ACTIVE_LOW)).is_err() {
            warn!("Board: link LED pin write failed");
        }
    }
}
