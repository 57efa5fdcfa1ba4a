//! Connectivity recovery: WiFi association and the MQTT broker session.
//!
//! ```text
//!  ensure_connected
//!     │ settings invalid ─────────────────────────────▶ false
//!     │ link up + session up ─────────────────────────▶ true
//!     ▼
//!  link down? ──▶ associate, poll ×15 @500 ms (console + watchdog between)
//!     │
//!  link up?  ──▶ connect(client id, creds, will=status/lwt retained)
//!     │              ok   ──▶ subscribe <root>command
//!     │              fail ──▶ log rc, console once, wait 1 s
//!     ▼
//!  link outcome
//! ```

use log::{debug, info, warn};

use crate::config::{
    BROKER_RETRY_DELAY_MS, TOPIC_COMMAND, TOPIC_STATUS, WIFI_ATTEMPT_DELAY_MS,
    WIFI_CONNECTION_ATTEMPTS,
};
use crate::error::{CommsError, Error, Result};

use super::console::SerialConsole;
use super::ports::{Platform, SessionOptions, StoragePort};
use super::store::ConfigStore;

pub struct ConnectivityManager {
    /// Outcome of the last association attempt, reported by
    /// `ensure_connected`.  A link found already up counts as success.
    /// Nothing else branches on it; it is kept for diagnostics.
    last_link_ok: bool,
}

impl Default for ConnectivityManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityManager {
    pub fn new() -> Self {
        Self { last_link_ok: true }
    }

    /// Outcome of the most recent association attempt.
    pub fn last_link_ok(&self) -> bool {
        self.last_link_ok
    }

    /// Bring the link and broker session up if they are not.  Returns the
    /// link outcome; a failed broker handshake is logged only.
    pub fn ensure_connected<S: StoragePort>(
        &mut self,
        hw: &mut impl Platform,
        store: &mut ConfigStore<S>,
        console: &mut SerialConsole,
    ) -> bool {
        if let Err(e) = require_configured(store) {
            debug!("Connectivity: {}, not connecting", e);
            return false;
        }
        if hw.is_link_up() && hw.is_connected() {
            return true;
        }

        if hw.is_link_up() {
            self.last_link_ok = true;
        } else {
            match associate(hw, store, console) {
                Ok(()) => self.last_link_ok = true,
                Err(e) => {
                    warn!("Connectivity: {}", e);
                    self.last_link_ok = false;
                }
            }
        }

        if hw.is_link_up() && !hw.is_connected() {
            if let Err(e) = open_session(hw, store, console) {
                warn!("Connectivity: {}", e);
            }
        }
        self.last_link_ok
    }
}

fn require_configured<S: StoragePort>(store: &ConfigStore<S>) -> Result<()> {
    if store.is_valid() {
        Ok(())
    } else {
        Err(CommsError::NotConfigured.into())
    }
}

fn associate<S: StoragePort>(
    hw: &mut impl Platform,
    store: &mut ConfigStore<S>,
    console: &mut SerialConsole,
) -> Result<()> {
    {
        let s = store.settings();
        debug!("WiFi: attempting to connect to SSID \"{}\"", s.ssid);
        hw.associate(&s.ssid, &s.wifi_password);
    }

    for attempt in 0..WIFI_CONNECTION_ATTEMPTS {
        if hw.is_link_up() {
            break;
        }
        debug!("WiFi: waiting for link ({}/{})", attempt + 1, WIFI_CONNECTION_ATTEMPTS);
        console.service(hw, store);
        hw.feed();
        hw.delay_ms(WIFI_ATTEMPT_DELAY_MS);
    }

    if hw.is_link_up() {
        hw.set_link_led(true);
        match hw.local_ip() {
            Some(ip) => info!("WiFi: connected, IP {}", ip),
            None => info!("WiFi: connected"),
        }
        Ok(())
    } else {
        hw.set_link_led(false);
        let status = hw.link_status();
        warn!("WiFi: connection unsuccessful, status {}", status);
        Err(CommsError::LinkFailed(status).into())
    }
}

fn open_session<S: StoragePort>(
    hw: &mut impl Platform,
    store: &mut ConfigStore<S>,
    console: &mut SerialConsole,
) -> Result<()> {
    let s = store.settings();
    let port = u16::try_from(s.broker_port).map_err(|_| Error::ConfigInvalid("brokerPort"))?;
    let will_topic = s.topic(TOPIC_STATUS);
    let options = SessionOptions {
        host: &s.broker_address,
        port,
        client_id: &s.client_id,
        username: Some(s.broker_username.as_str()).filter(|u| !u.is_empty()),
        password: Some(s.broker_password.as_str()).filter(|p| !p.is_empty()),
        will_topic: &will_topic,
        will_payload: &s.lwt_message,
        will_retain: true,
    };

    info!("MQTT: attempting connection to {}:{}", options.host, options.port);
    if hw.connect(&options) {
        info!("MQTT: connected to broker");
        let topic = s.topic(TOPIC_COMMAND);
        let subscribed = hw.subscribe(&topic);
        debug!("MQTT: subscribing to {}: {}", topic, subscribed);
        return Ok(());
    }

    let rc = hw.state_code();
    warn!("MQTT: connect failed, rc={}, will try again in a second", rc);
    console.service(hw, store);
    hw.delay_ms(BROKER_RETRY_DELAY_MS);
    Err(CommsError::SessionFailed(rc).into())
}
