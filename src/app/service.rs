//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the FSM, the configuration store, the serial console
//! and the connectivity manager.  All I/O flows through the [`Platform`]
//! passed to each call, so the whole service runs against mock adapters.
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!  Serial ──────▶ │          AppService          │ ──▶ Relay / LEDs
//!  MQTT inbox ──▶ │  FSM · Store · Connectivity  │ ──▶ MQTT status / replies
//!  Clock ───────▶ │                              │ ──▶ Watchdog
//!                 └──────────────────────────────┘
//! ```
//!
//! Per tick, in order: broker housekeeping and inbound commands, serial
//! input, firmware update poll, elapsed time and FSM, outputs, timeout
//! report, debug countdown, watchdog.

use log::{debug, error, info, warn};

use crate::config::COUNTDOWN_REPORT_INTERVAL_MS;
use crate::fsm::context::RunContext;
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};

use super::command;
use super::connectivity::ConnectivityManager;
use super::console::SerialConsole;
use super::ports::{InboundMessage, Platform, StoragePort};
use super::reporter;
use super::store::{ConfigStore, LoadOutcome};

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

pub struct AppService<S: StoragePort> {
    fsm: Fsm,
    ctx: RunContext,
    store: ConfigStore<S>,
    console: SerialConsole,
    connectivity: ConnectivityManager,
    /// Relay level last written successfully.
    applied_relay: Option<bool>,
    /// Warning LED level last written successfully.
    applied_warning_led: Option<bool>,
    last_clock_ms: u32,
    next_countdown_ms: u64,
}

impl<S: StoragePort> AppService<S> {
    /// Construct the service around a store.
    ///
    /// Does **not** touch hardware; call [`boot`](Self::boot) next.
    pub fn new(store: ConfigStore<S>) -> Self {
        Self {
            fsm: Fsm::new(build_state_table(), StateId::Running),
            ctx: RunContext::new(0),
            store,
            console: SerialConsole::new(),
            connectivity: ConnectivityManager::new(),
            applied_relay: None,
            applied_warning_led: None,
            last_clock_ms: 0,
            next_countdown_ms: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Power-on sequence: energise the relay, load settings, fix the
    /// deadline, connect and announce the run message.
    pub fn boot(&mut self, hw: &mut impl Platform) -> LoadOutcome {
        self.last_clock_ms = hw.now_ms();
        hw.set_link_led(false);
        self.fsm.start(&mut self.ctx);
        self.apply_outputs(hw);
        info!("Running.");

        let outcome = match self.store.load_or_initialize() {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Boot: settings unavailable ({}), running on defaults", e);
                LoadOutcome::Blank
            }
        };

        self.ctx.deadline_ms = self.store.settings().deadline_ms();
        info!(
            "Boot: timeout in {} ms, settings {}",
            self.ctx.deadline_ms,
            if self.store.is_valid() { "valid" } else { "incomplete" }
        );

        if self.store.is_valid() {
            self.connectivity
                .ensure_connected(hw, &mut self.store, &mut self.console);
        }

        if hw.is_link_up() {
            // Announced once; a lost run message is not retried.
            let settings = self.store.settings();
            if let Err(e) = reporter::publish_status(hw, settings, &settings.run_message) {
                warn!("Boot: run message not sent ({})", e);
            }
            hw.begin();
        }
        outcome
    }

    // ── Per-tick orchestration ────────────────────────────────

    pub fn tick(&mut self, hw: &mut impl Platform) {
        // 1. Broker housekeeping and queued commands
        hw.service();
        while let Some(message) = hw.poll_inbound() {
            self.handle_inbound(hw, &message);
        }

        // 2. Serial console
        self.console.service(hw, &mut self.store);

        // 3. Firmware update
        hw.poll();

        // 4. Elapsed time and FSM
        let now = hw.now_ms();
        self.ctx.elapsed_ms += u64::from(now.wrapping_sub(self.last_clock_ms));
        self.last_clock_ms = now;
        self.fsm.tick(&mut self.ctx);

        // 5. Outputs (written only when they change)
        self.apply_outputs(hw);

        // 6. Timeout report, retried every tick until it goes out
        if self.fsm.current_state() == StateId::TimedOut
            && !self.ctx.timeout_message_sent
            && self.store.is_valid()
        {
            self.report_timeout(hw);
        }

        // 7. Debug countdown
        self.report_countdown();

        hw.feed();
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn timeout_message_sent(&self) -> bool {
        self.ctx.timeout_message_sent
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.ctx.elapsed_ms
    }

    pub fn deadline_ms(&self) -> u64 {
        self.ctx.deadline_ms
    }

    pub fn store(&self) -> &ConfigStore<S> {
        &self.store
    }

    pub fn connectivity(&self) -> &ConnectivityManager {
        &self.connectivity
    }

    // ── Internal ──────────────────────────────────────────────

    fn handle_inbound(&mut self, hw: &mut impl Platform, message: &InboundMessage) {
        debug!("MQTT: command received on {}: {}", message.topic, message.payload);
        let command_text = message.payload.as_str();
        let response = command::execute(command_text, &mut self.store, hw);

        // The reply topic is the root plus the command text itself.
        let topic = self.store.settings().topic(command_text);
        if let Err(e) = reporter::publish_reply(hw, &topic, response.reply_text()) {
            warn!("MQTT: reply not sent ({})", e);
        }
    }

    fn report_timeout(&mut self, hw: &mut impl Platform) {
        self.connectivity
            .ensure_connected(hw, &mut self.store, &mut self.console);

        let settings = self.store.settings();
        match reporter::publish_status(hw, settings, &settings.timeout_message) {
            Ok(()) => {
                info!("Timeout reported: {}", settings.timeout_message);
                self.ctx.timeout_message_sent = true;
            }
            Err(e) => warn!("Timeout report failed, retrying next tick ({})", e),
        }
    }

    fn report_countdown(&mut self) {
        if self.fsm.current_state() != StateId::Running
            || !self.store.settings().debug
            || !self.store.is_valid()
            || self.ctx.elapsed_ms < self.next_countdown_ms
        {
            return;
        }
        debug!("{} ms remaining", self.ctx.remaining_ms());
        self.next_countdown_ms = self.ctx.elapsed_ms + COUNTDOWN_REPORT_INTERVAL_MS;
    }

    /// Translate FSM output commands into port calls.  A failed write is
    /// repeated on the next tick.
    fn apply_outputs(&mut self, hw: &mut impl Platform) {
        let cmds = self.ctx.commands;

        if self.applied_relay != Some(cmds.relay_energized) {
            if hw.set_relay(cmds.relay_energized) {
                self.applied_relay = Some(cmds.relay_energized);
            } else {
                error!("Outputs: relay not driven to {}", cmds.relay_energized);
            }
        }
        if self.applied_warning_led != Some(cmds.warning_led)
            && hw.set_warning_led(cmds.warning_led)
        {
            self.applied_warning_led = Some(cmds.warning_led);
        }
    }
}
