//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (outputs, link, broker client, storage, serial) implement
//! these traits.  [`AppService`](super::service::AppService) consumes them via
//! generics, so the domain core never touches hardware directly.
//!
//! Storage is the odd one out: the [`ConfigStore`](super::store::ConfigStore)
//! owns its [`StoragePort`], everything else is bundled into [`Platform`]
//! and passed to each call.

use core::fmt;
use core::net::Ipv4Addr;

// ───────────────────────────────────────────────────────────────
// Output port (domain → GPIO)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the three digital outputs.
pub trait OutputPort {
    /// `true` energises the relay (load powered).  Returns `false` when
    /// the pin could not be driven.
    fn set_relay(&mut self, energized: bool) -> bool;

    /// Timeout warning indicator.  Returns `false` on a failed write.
    fn set_warning_led(&mut self, on: bool) -> bool;

    /// Link-up indicator.
    fn set_link_led(&mut self, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Clock / watchdog
// ───────────────────────────────────────────────────────────────

pub trait ClockPort {
    /// Milliseconds since boot.  Wraps at `u32::MAX` (~49.7 days).
    fn now_ms(&self) -> u32;

    /// Blocking delay.
    fn delay_ms(&mut self, ms: u32);
}

pub trait WatchdogPort {
    fn feed(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Serial console
// ───────────────────────────────────────────────────────────────

/// Byte-oriented serial channel.  Reads never block.
pub trait SerialPort {
    /// Next received byte, or `None` when the receive buffer is empty.
    fn read_byte(&mut self) -> Option<u8>;

    /// Raw bytes, passed through unchanged.
    fn write_bytes(&mut self, data: &[u8]);

    fn write_str(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }

    fn write_line(&mut self, s: &str) {
        self.write_str(s);
        self.write_str("\r\n");
    }
}

// ───────────────────────────────────────────────────────────────
// Network link (WiFi station)
// ───────────────────────────────────────────────────────────────

/// Station link state as reported by the radio driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Idle,
    NoSsidAvailable,
    Connected,
    ConnectFailed,
    ConnectionLost,
    Disconnected,
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::NoSsidAvailable => write!(f, "SSID not found"),
            Self::Connected => write!(f, "connected"),
            Self::ConnectFailed => write!(f, "connect failed"),
            Self::ConnectionLost => write!(f, "connection lost"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

pub trait LinkPort {
    /// Start associating with the given network.  Returns immediately;
    /// progress is observed through [`link_status`](Self::link_status).
    fn associate(&mut self, ssid: &str, password: &str);

    fn link_status(&self) -> LinkStatus;

    fn is_link_up(&self) -> bool {
        self.link_status() == LinkStatus::Connected
    }

    /// Received signal strength in dBm.
    fn rssi(&self) -> i32;

    /// Station address, `None` until DHCP completes.
    fn local_ip(&self) -> Option<Ipv4Addr>;
}

// ───────────────────────────────────────────────────────────────
// Messaging (MQTT client)
// ───────────────────────────────────────────────────────────────

/// Parameters for one broker session handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions<'a> {
    pub host: &'a str,
    pub port: u16,
    pub client_id: &'a str,
    /// `None` when no user name is configured.
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    pub will_topic: &'a str,
    pub will_payload: &'a str,
    pub will_retain: bool,
}

/// A message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: String,
}

pub trait MessagingPort {
    /// Open a broker session.  On failure [`state_code`](Self::state_code)
    /// explains why.
    fn connect(&mut self, options: &SessionOptions<'_>) -> bool;

    fn is_connected(&self) -> bool;

    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> bool;

    fn subscribe(&mut self, topic: &str) -> bool;

    /// Keep-alive and socket housekeeping.  Called once per tick.
    fn service(&mut self);

    /// Pop the oldest queued inbound message.
    fn poll_inbound(&mut self) -> Option<InboundMessage>;

    /// Client state code for diagnostics (0 = connected, negative = transport
    /// problem, positive = broker refused).
    fn state_code(&self) -> i32;
}

// ───────────────────────────────────────────────────────────────
// Storage port (domain ↔ flash)
// ───────────────────────────────────────────────────────────────

/// Byte-addressed persistent storage with explicit commit, EEPROM style.
///
/// Writes land in a working copy and become durable on [`commit`](Self::commit).
pub trait StoragePort {
    fn read_block(&self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError>;

    fn write_block(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError>;

    fn commit(&mut self) -> Result<(), StorageError>;
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Offset plus length runs past the storage region.
    OutOfRange,
    /// The record did not fit the block when encoded.
    Encode,
    /// Backend read/write/commit failure.
    IoError,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange => write!(f, "access out of range"),
            Self::Encode => write!(f, "record encoding failed"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Firmware update / restart
// ───────────────────────────────────────────────────────────────

/// Over-the-air update listener.
pub trait FirmwareUpdatePort {
    /// Start listening.  Called once the link is up at boot.
    fn begin(&mut self);

    /// Service a pending update, if any.  Called once per tick.
    fn poll(&mut self);
}

pub trait RestartPort {
    /// Reboot the device.  Does not return on hardware.
    fn restart(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Platform bundle
// ───────────────────────────────────────────────────────────────

/// Everything the control loop drives except storage.
pub trait Platform:
    OutputPort
    + ClockPort
    + WatchdogPort
    + SerialPort
    + LinkPort
    + MessagingPort
    + FirmwareUpdatePort
    + RestartPort
{
}

impl<T> Platform for T where
    T: OutputPort
        + ClockPort
        + WatchdogPort
        + SerialPort
        + LinkPort
        + MessagingPort
        + FirmwareUpdatePort
        + RestartPort
{
}
