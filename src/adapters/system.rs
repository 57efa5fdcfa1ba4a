//! System adapter: device restart and firmware image validation.
//!
//! Implements [`RestartPort`] and [`FirmwareUpdatePort`].  `begin` runs
//! once the link is up at boot and marks the running image valid, which
//! cancels the bootloader's pending rollback after an update.  No update
//! transport is wired in, so `poll` has nothing to service.

use log::info;

use crate::app::ports::{FirmwareUpdatePort, RestartPort};

#[cfg(target_os = "espidf")]
use log::warn;

pub struct SystemAdapter {
    image_validated: bool,
    #[cfg(not(target_os = "espidf"))]
    restarts: u32,
}

impl Default for SystemAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemAdapter {
    pub fn new() -> Self {
        Self {
            image_validated: false,
            #[cfg(not(target_os = "espidf"))]
            restarts: 0,
        }
    }

    pub fn image_validated(&self) -> bool {
        self.image_validated
    }

    /// Simulation only: restarts requested so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn restarts(&self) -> u32 {
        self.restarts
    }
}

/// Mark the running firmware valid.
///
/// Without this, the bootloader reverts to the previous image after a
/// freshly flashed one fails to confirm itself.
#[cfg(target_os = "espidf")]
fn check_rollback() -> bool {
    match esp_ota::mark_app_valid() {
        Ok(()) => {
            info!("OTA: firmware marked valid (rollback cancelled)");
            true
        }
        Err(e) => {
            warn!("OTA: mark_app_valid failed: {:?}", e);
            false
        }
    }
}

#[cfg(not(target_os = "espidf"))]
fn check_rollback() -> bool {
    info!("OTA rollback check (simulation): skipped");
    true
}

impl FirmwareUpdatePort for SystemAdapter {
    fn begin(&mut self) {
        if !self.image_validated {
            self.image_validated = check_rollback();
        }
    }

    fn poll(&mut self) {}
}

impl RestartPort for SystemAdapter {
    #[cfg(target_os = "espidf")]
    fn restart(&mut self) {
        info!("System: restarting");
        esp_ota::restart();
    }

    #[cfg(not(target_os = "espidf"))]
    fn restart(&mut self) {
        info!("System(sim): restart requested");
        self.restarts += 1;
    }
}
