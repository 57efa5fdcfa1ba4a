//! Serial console adapter.
//!
//! Implements [`SerialPort`] over the USB-UART the boot log also uses.
//!
//! - **`target_os = "espidf"`**: an `esp-idf-hal` `UartDriver` polled with a
//!   zero timeout, so reads never block the control loop.
//! - **`not(target_os = "espidf")`**: in-memory receive queue and transmit
//!   buffer for host tests.

use crate::app::ports::SerialPort;

#[cfg(target_os = "espidf")]
use esp_idf_hal::{delay::NON_BLOCK, uart::UartDriver};
#[cfg(target_os = "espidf")]
use log::warn;

pub struct SerialAdapter {
    #[cfg(target_os = "espidf")]
    uart: UartDriver<'static>,

    #[cfg(not(target_os = "espidf"))]
    rx: std::collections::VecDeque<u8>,
    #[cfg(not(target_os = "espidf"))]
    tx: Vec<u8>,
}

#[cfg(target_os = "espidf")]
impl SerialAdapter {
    pub fn new(uart: UartDriver<'static>) -> Self {
        Self { uart }
    }
}

#[cfg(not(target_os = "espidf"))]
impl SerialAdapter {
    pub fn new() -> Self {
        Self {
            rx: std::collections::VecDeque::new(),
            tx: Vec::new(),
        }
    }

    /// Queue bytes as if typed on the terminal.
    pub fn push_input(&mut self, text: &str) {
        self.rx.extend(text.bytes());
    }

    /// Drain everything written so far.
    pub fn take_output(&mut self) -> String {
        String::from_utf8_lossy(&core::mem::take(&mut self.tx)).into_owned()
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for SerialAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialPort for SerialAdapter {
    #[cfg(target_os = "espidf")]
    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match self.uart.read(&mut byte, NON_BLOCK) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_byte(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    #[cfg(target_os = "espidf")]
    fn write_bytes(&mut self, data: &[u8]) {
        let mut pending = data;
        while !pending.is_empty() {
            match self.uart.write(pending) {
                Ok(0) => break,
                Ok(n) => pending = &pending[n..],
                Err(e) => {
                    warn!("Serial: write failed ({})", e);
                    break;
                }
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_bytes(&mut self, data: &[u8]) {
        self.tx.extend_from_slice(data);
    }
}
