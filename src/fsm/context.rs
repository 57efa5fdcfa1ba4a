//! Shared mutable context threaded through every FSM handler.
//!
//! `RunContext` is the single struct that state handlers read from and
//! write to: elapsed run time, the deadline fixed at boot, the output
//! levels the handlers request and the timeout latch.  The service applies
//! [`OutputCommands`] to the hardware after each tick.

// ---------------------------------------------------------------------------
// Output commands (written by state handlers; applied by the service)
// ---------------------------------------------------------------------------

/// Requested levels for the relay and the warning indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputCommands {
    pub relay_energized: bool,
    pub warning_led: bool,
}

impl Default for OutputCommands {
    fn default() -> Self {
        Self::safe()
    }
}

impl OutputCommands {
    /// Relay de-energised, indicator off.
    pub fn safe() -> Self {
        Self {
            relay_energized: false,
            warning_led: false,
        }
    }
}

// ---------------------------------------------------------------------------
// RunContext
// ---------------------------------------------------------------------------

pub struct RunContext {
    // -- Timing --
    /// Run time since boot, accumulated from wrapping clock deltas.
    pub elapsed_ms: u64,
    /// Run time allowed before the relay is cut.
    pub deadline_ms: u64,

    // -- Outputs --
    pub commands: OutputCommands,

    // -- Timeout reporting --
    /// Latched once the timeout status has been published.  Only a reboot
    /// clears it.
    pub timeout_message_sent: bool,
    /// Elapsed time at which the warning indicator next toggles.
    pub next_flash_ms: u64,
}

impl RunContext {
    pub fn new(deadline_ms: u64) -> Self {
        Self {
            elapsed_ms: 0,
            deadline_ms,
            commands: OutputCommands::safe(),
            timeout_message_sent: false,
            next_flash_ms: 0,
        }
    }

    pub fn deadline_reached(&self) -> bool {
        self.elapsed_ms >= self.deadline_ms
    }

    /// Milliseconds left before the deadline, zero once passed.
    pub fn remaining_ms(&self) -> u64 {
        self.deadline_ms.saturating_sub(self.elapsed_ms)
    }
}
