//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers: no closures, no dynamic
//! dispatch, no heap.
//!
//! ```text
//!  RUNNING ──[elapsed ≥ deadline]──▶ TIMED_OUT
//!  (relay on, LED off)              (relay off, LED on / flashing)
//! ```
//!
//! There is no way back: only a reboot leaves `TimedOut`.

use super::context::RunContext;
use super::{StateDescriptor, StateId};
use crate::config::WARNING_FLASH_PERIOD_MS;
use crate::pins::FLASH_WARNING_LED;
use log::{info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Running
        StateDescriptor {
            id: StateId::Running,
            name: "Running",
            on_enter: Some(running_enter),
            on_exit: None,
            on_update: running_update,
        },
        // Index 1: TimedOut
        StateDescriptor {
            id: StateId::TimedOut,
            name: "TimedOut",
            on_enter: Some(timed_out_enter),
            on_exit: None,
            on_update: timed_out_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  RUNNING state
// ═══════════════════════════════════════════════════════════════════════════

fn running_enter(ctx: &mut RunContext) {
    ctx.commands.relay_energized = true;
    ctx.commands.warning_led = false;
    info!("RUNNING: relay energised");
}

fn running_update(ctx: &mut RunContext) -> Option<StateId> {
    if ctx.deadline_reached() {
        return Some(StateId::TimedOut);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  TIMED_OUT state
// ═══════════════════════════════════════════════════════════════════════════

fn timed_out_enter(ctx: &mut RunContext) {
    ctx.commands.relay_energized = false;
    ctx.commands.warning_led = true;
    ctx.next_flash_ms = ctx.elapsed_ms;
    warn!(
        "TIMED_OUT: run time {} ms reached limit {} ms, relay cut",
        ctx.elapsed_ms, ctx.deadline_ms
    );
}

fn timed_out_update(ctx: &mut RunContext) -> Option<StateId> {
    // Steady indicator until the timeout has been reported.
    if FLASH_WARNING_LED && ctx.timeout_message_sent && ctx.elapsed_ms >= ctx.next_flash_ms {
        ctx.commands.warning_led = !ctx.commands.warning_led;
        ctx.next_flash_ms = ctx.elapsed_ms + WARNING_FLASH_PERIOD_MS;
    }
    None
}
