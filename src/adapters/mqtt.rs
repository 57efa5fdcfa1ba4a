//! MQTT client adapter.
//!
//! Implements [`MessagingPort`].  Status codes follow the convention the
//! rest of the firmware logs: `0` connected, negative for transport
//! problems, positive for a broker refusal.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp-idf-svc`'s `EspMqttClient`.  Its event
//!   callback runs on the client task, so it only touches atomics and the
//!   inbound queue; the control loop drains the queue via
//!   [`poll_inbound`](MessagingPort::poll_inbound).
//! - **all other targets**: an in-memory broker that records sessions and
//!   publishes for host-side tests.

use std::collections::VecDeque;

use log::{info, warn};

use crate::app::ports::{InboundMessage, MessagingPort, SessionOptions};
use crate::config::SERIAL_LINE_CAPACITY;

#[cfg(target_os = "espidf")]
use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicI32, Ordering},
};

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{
    Details, EspMqttClient, EventPayload, LwtConfiguration, MqttClientConfiguration, QoS,
};

// ───────────────────────────────────────────────────────────────
// Client state codes
// ───────────────────────────────────────────────────────────────

pub const STATE_CONNECTION_TIMEOUT: i32 = -4;
pub const STATE_CONNECTION_LOST: i32 = -3;
pub const STATE_CONNECT_FAILED: i32 = -2;
pub const STATE_DISCONNECTED: i32 = -1;
pub const STATE_CONNECTED: i32 = 0;
pub const STATE_BAD_CREDENTIALS: i32 = 4;

/// Inbound commands longer than a console line are dropped.
const MAX_INBOUND_PAYLOAD: usize = SERIAL_LINE_CAPACITY;

#[cfg(target_os = "espidf")]
const CONNECT_TIMEOUT_MS: u32 = 5_000;
#[cfg(target_os = "espidf")]
const CONNECT_POLL_MS: u32 = 50;

fn accept_inbound(topic: &str, data: &[u8]) -> Option<InboundMessage> {
    if data.len() > MAX_INBOUND_PAYLOAD {
        warn!(
            "MQTT: dropping oversized payload on {} ({} bytes)",
            topic,
            data.len()
        );
        return None;
    }
    match core::str::from_utf8(data) {
        Ok(payload) => Some(InboundMessage {
            topic: topic.into(),
            payload: payload.into(),
        }),
        Err(_) => {
            warn!("MQTT: dropping non-UTF-8 payload on {}", topic);
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  ESP-IDF backend
// ═══════════════════════════════════════════════════════════════

#[cfg(target_os = "espidf")]
#[derive(Default)]
struct Shared {
    state: AtomicI32,
    inbox: Mutex<VecDeque<InboundMessage>>,
}

#[cfg(target_os = "espidf")]
pub struct MqttAdapter {
    client: Option<EspMqttClient<'static>>,
    shared: Arc<Shared>,
    was_connected: bool,
}

#[cfg(target_os = "espidf")]
impl MqttAdapter {
    pub fn new() -> Self {
        let shared = Arc::new(Shared::default());
        shared.state.store(STATE_DISCONNECTED, Ordering::Relaxed);
        Self {
            client: None,
            shared,
            was_connected: false,
        }
    }

    fn on_event(shared: &Shared, payload: EventPayload<'_, esp_idf_svc::sys::EspError>) {
        match payload {
            EventPayload::Connected(_) => {
                shared.state.store(STATE_CONNECTED, Ordering::Relaxed);
            }
            EventPayload::Disconnected => {
                let next = if shared.state.load(Ordering::Relaxed) == STATE_CONNECTED {
                    STATE_CONNECTION_LOST
                } else {
                    STATE_CONNECT_FAILED
                };
                shared.state.store(next, Ordering::Relaxed);
            }
            EventPayload::Error(e) => {
                warn!("MQTT: client error {:?}", e);
                if shared.state.load(Ordering::Relaxed) != STATE_CONNECTED {
                    shared.state.store(STATE_CONNECT_FAILED, Ordering::Relaxed);
                }
            }
            EventPayload::Received {
                topic: Some(topic),
                data,
                details: Details::Complete,
                ..
            } => {
                if let Some(message) = accept_inbound(topic, data) {
                    shared
                        .inbox
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push_back(message);
                }
            }
            _ => {}
        }
    }
}

#[cfg(target_os = "espidf")]
impl Default for MqttAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "espidf")]
impl MessagingPort for MqttAdapter {
    fn connect(&mut self, options: &SessionOptions<'_>) -> bool {
        // A fresh client per session; dropping the old one stops its task.
        self.client = None;
        self.was_connected = false;
        self.shared.state.store(STATE_DISCONNECTED, Ordering::Relaxed);

        let url = format!("mqtt://{}:{}", options.host, options.port);
        let conf = MqttClientConfiguration {
            client_id: Some(options.client_id),
            username: options.username,
            password: options.password,
            lwt: Some(LwtConfiguration {
                topic: options.will_topic,
                payload: options.will_payload.as_bytes(),
                qos: QoS::AtMostOnce,
                retain: options.will_retain,
            }),
            ..Default::default()
        };

        let shared = Arc::clone(&self.shared);
        let client = match EspMqttClient::new_cb(&url, &conf, move |event| {
            Self::on_event(&shared, event.payload());
        }) {
            Ok(client) => client,
            Err(e) => {
                warn!("MQTT: client creation failed ({})", e);
                self.shared.state.store(STATE_CONNECT_FAILED, Ordering::Relaxed);
                return false;
            }
        };

        let mut waited = 0;
        while self.shared.state.load(Ordering::Relaxed) == STATE_DISCONNECTED {
            if waited >= CONNECT_TIMEOUT_MS {
                self.shared
                    .state
                    .store(STATE_CONNECTION_TIMEOUT, Ordering::Relaxed);
                break;
            }
            esp_idf_hal::delay::FreeRtos::delay_ms(CONNECT_POLL_MS);
            waited += CONNECT_POLL_MS;
        }

        if self.is_connected() {
            info!("MQTT: session open with {} as {}", url, options.client_id);
            self.client = Some(client);
            self.was_connected = true;
            true
        } else {
            false
        }
    }

    fn is_connected(&self) -> bool {
        self.shared.state.load(Ordering::Relaxed) == STATE_CONNECTED
    }

    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> bool {
        if !self.is_connected() {
            return false;
        }
        let Some(client) = self.client.as_mut() else {
            return false;
        };
        match client.publish(topic, QoS::AtMostOnce, retain, payload.as_bytes()) {
            Ok(_) => true,
            Err(e) => {
                warn!("MQTT: publish to {} failed ({})", topic, e);
                false
            }
        }
    }

    fn subscribe(&mut self, topic: &str) -> bool {
        let Some(client) = self.client.as_mut() else {
            return false;
        };
        match client.subscribe(topic, QoS::AtMostOnce) {
            Ok(_) => true,
            Err(e) => {
                warn!("MQTT: subscribe to {} failed ({})", topic, e);
                false
            }
        }
    }

    fn service(&mut self) {
        // The client task handles keep-alive; only note a dropped session.
        if self.was_connected && !self.is_connected() {
            warn!("MQTT: session lost (rc={})", self.state_code());
            self.was_connected = false;
            self.client = None;
        }
    }

    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        self.shared
            .inbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    fn state_code(&self) -> i32 {
        self.shared.state.load(Ordering::Relaxed)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Simulation backend
// ═══════════════════════════════════════════════════════════════

/// A message the simulated broker accepted.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

#[cfg(not(target_os = "espidf"))]
pub struct MqttAdapter {
    reachable: bool,
    /// Required `(username, password)`, `None` for an open broker.
    credentials: Option<(String, String)>,
    connected: bool,
    state: i32,
    client_id: String,
    last_will: Option<PublishedMessage>,
    subscriptions: Vec<String>,
    published: Vec<PublishedMessage>,
    inbox: VecDeque<InboundMessage>,
    sessions: u32,
}

#[cfg(not(target_os = "espidf"))]
impl MqttAdapter {
    /// A reachable broker that accepts anonymous clients.
    pub fn new() -> Self {
        Self {
            reachable: true,
            credentials: None,
            connected: false,
            state: STATE_DISCONNECTED,
            client_id: String::new(),
            last_will: None,
            subscriptions: Vec::new(),
            published: Vec::new(),
            inbox: VecDeque::new(),
            sessions: 0,
        }
    }

    pub fn set_reachable(&mut self, reachable: bool) {
        self.reachable = reachable;
    }

    pub fn require_credentials(&mut self, username: &str, password: &str) {
        self.credentials = Some((username.into(), password.into()));
    }

    /// Simulate the broker closing the session.  The last will is published.
    pub fn drop_session(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;
        self.state = STATE_CONNECTION_LOST;
        if let Some(will) = self.last_will.take() {
            self.published.push(will);
        }
    }

    /// Deliver a message from another client.  Dropped unless the topic
    /// is subscribed.
    pub fn inject_inbound(&mut self, topic: &str, payload: &str) {
        if !self.connected || !self.subscriptions.iter().any(|t| t == topic) {
            return;
        }
        if let Some(message) = accept_inbound(topic, payload.as_bytes()) {
            self.inbox.push_back(message);
        }
    }

    pub fn published(&self) -> &[PublishedMessage] {
        &self.published
    }

    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn sessions(&self) -> u32 {
        self.sessions
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for MqttAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl MessagingPort for MqttAdapter {
    fn connect(&mut self, options: &SessionOptions<'_>) -> bool {
        self.connected = false;
        self.subscriptions.clear();

        if !self.reachable {
            self.state = STATE_CONNECT_FAILED;
            return false;
        }
        if let Some((user, pass)) = &self.credentials {
            if options.username != Some(user.as_str()) || options.password != Some(pass.as_str())
            {
                self.state = STATE_BAD_CREDENTIALS;
                return false;
            }
        }

        self.connected = true;
        self.state = STATE_CONNECTED;
        self.sessions += 1;
        self.client_id = options.client_id.into();
        self.last_will = Some(PublishedMessage {
            topic: options.will_topic.into(),
            payload: options.will_payload.into(),
            retain: options.will_retain,
        });
        info!(
            "MQTT(sim): session {} open for {}",
            self.sessions, options.client_id
        );
        true
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> bool {
        if !self.connected {
            return false;
        }
        self.published.push(PublishedMessage {
            topic: topic.into(),
            payload: payload.into(),
            retain,
        });
        true
    }

    fn subscribe(&mut self, topic: &str) -> bool {
        if !self.connected {
            return false;
        }
        if !self.subscriptions.iter().any(|t| t == topic) {
            self.subscriptions.push(topic.into());
        }
        true
    }

    fn service(&mut self) {}

    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        self.inbox.pop_front()
    }

    fn state_code(&self) -> i32 {
        self.state
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
