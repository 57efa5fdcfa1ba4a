//! Serial console: echoes input and assembles newline-terminated lines.

use log::{debug, warn};

use crate::config::SERIAL_LINE_CAPACITY;
use crate::error::CommandError;

use super::command::{self, Response};
use super::ports::{Platform, SerialPort, StoragePort};
use super::store::ConfigStore;

/// A finished console line, or the reason it was thrown away.
pub type LineResult = core::result::Result<String, CommandError>;

pub struct SerialConsole {
    line: heapless::Vec<u8, SERIAL_LINE_CAPACITY>,
    overflowed: bool,
}

impl Default for SerialConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialConsole {
    pub fn new() -> Self {
        Self {
            line: heapless::Vec::new(),
            overflowed: false,
        }
    }

    /// Drain available bytes, echoing each one unchanged.  Once a newline
    /// arrives, returns the line without its `\n`; bytes after it stay
    /// unread.  A line that overran the buffer or is not UTF-8 comes back
    /// as an error and is never run.
    pub fn poll_line(&mut self, serial: &mut impl SerialPort) -> Option<LineResult> {
        while let Some(byte) = serial.read_byte() {
            serial.write_bytes(&[byte]);

            if byte == b'\n' {
                debug!("Console: command is complete");
                return Some(self.finish_line());
            }
            if self.line.push(byte).is_err() && !self.overflowed {
                warn!("Console: line longer than {} bytes, discarding", SERIAL_LINE_CAPACITY);
                self.overflowed = true;
            }
        }
        None
    }

    fn finish_line(&mut self) -> LineResult {
        let overflowed = core::mem::replace(&mut self.overflowed, false);
        let bytes = core::mem::take(&mut self.line);
        if overflowed {
            return Err(CommandError::LineTooLong {
                capacity: SERIAL_LINE_CAPACITY,
            });
        }
        core::str::from_utf8(&bytes)
            .map(String::from)
            .map_err(|_| CommandError::InvalidEncoding)
    }

    /// Read input and run any completed line as a command, answering on
    /// serial.  Returns the response when a line was processed.
    pub fn service<S: StoragePort>(
        &mut self,
        hw: &mut impl Platform,
        store: &mut ConfigStore<S>,
    ) -> Option<Response> {
        let response = match self.poll_line(hw)? {
            Ok(line) => command::execute(&line, store, hw),
            Err(e) => command::reject(e, store.settings(), hw),
        };
        match &response {
            Response::Ok => hw.write_line(command::SUCCESS_REPLY),
            Response::Settings(dump) => {
                for l in dump.lines() {
                    hw.write_line(l);
                }
            }
            // The listing has already been written.
            Response::Failed => {}
        }
        Some(response)
    }
}
