//! Persisted settings record and compiled-in defaults.
//!
//! [`Settings`] is the only persisted state.  It is stored as one
//! fixed-size block: a little-endian `u32` validity marker followed by the
//! postcard-encoded record body, zero padded to [`SETTINGS_BLOCK_SIZE`].
//! Text fields are `heapless::String`s sized by the capacity constants
//! below, so an oversized value is rejected when it is set instead of being
//! truncated later.

use core::fmt::Write as _;

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::error::{CommandError, Error};

// ---------------------------------------------------------------------------
// Record layout
// ---------------------------------------------------------------------------

/// Marker value meaning "saved and passed validation".
pub const VALID_SETTINGS_FLAG: u32 = 0xDAB0;

/// Size of the persisted block, header included.
pub const SETTINGS_BLOCK_SIZE: usize = 512;
/// Storage offset of the block.
pub const SETTINGS_OFFSET: usize = 0;
/// Bytes occupied by the validity marker at the start of the block.
pub const MARKER_LEN: usize = 4;

// --- Field capacities (bytes) ---
pub const SSID_CAPACITY: usize = 99;
pub const PASSWORD_CAPACITY: usize = 49;
pub const ADDRESS_CAPACITY: usize = 29;
pub const USERNAME_CAPACITY: usize = 49;
pub const TOPIC_ROOT_CAPACITY: usize = 49;
pub const MESSAGE_CAPACITY: usize = 14;
pub const CLIENT_ID_CAPACITY: usize = 24;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_MAX_RUNTIME_SECS: u32 = 5 * 60;
pub const DEFAULT_BROKER_PORT: u32 = 1883;
pub const DEFAULT_TOPIC_ROOT: &str = "esp8266/runlimiter/";
pub const DEFAULT_RUN_MESSAGE: &str = "started";
pub const DEFAULT_TIMEOUT_MESSAGE: &str = "timeout";
pub const DEFAULT_LWT_MESSAGE: &str = "stopped";
pub const CLIENT_ID_PREFIX: &str = "RunTimeLimiter";

// --- Topic suffixes ---
pub const TOPIC_STATUS: &str = "status";
pub const TOPIC_RSSI: &str = "rssi";
pub const TOPIC_COMMAND: &str = "command";

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Link status polls before association is declared failed.
pub const WIFI_CONNECTION_ATTEMPTS: u32 = 15;
/// Delay between link status polls.
pub const WIFI_ATTEMPT_DELAY_MS: u32 = 500;
/// Pause after a rejected broker handshake.
pub const BROKER_RETRY_DELAY_MS: u32 = 1000;
/// Delay before restarting after `factorydefaults=yes`.
pub const FACTORY_RESET_DELAY_MS: u32 = 2000;
/// Delay before restarting after `reset=yes`.
pub const RESET_DELAY_MS: u32 = 1000;
/// Half-period of the warning indicator flash.
pub const WARNING_FLASH_PERIOD_MS: u64 = 250;
/// Interval of the debug countdown log line.
pub const COUNTDOWN_REPORT_INTERVAL_MS: u64 = 5000;
/// Longest serial command line accepted.
pub const SERIAL_LINE_CAPACITY: usize = 200;
/// Pause between control loop ticks.
pub const LOOP_PERIOD_MS: u32 = 10;

// ---------------------------------------------------------------------------
// Settings record
// ---------------------------------------------------------------------------

/// All user-settable parameters, persisted as one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Stored in the block header, not in the postcard body.
    #[serde(skip)]
    pub validity_marker: u32,

    // --- WiFi ---
    pub ssid: String<SSID_CAPACITY>,
    pub wifi_password: String<PASSWORD_CAPACITY>,

    // --- Broker ---
    pub broker_address: String<ADDRESS_CAPACITY>,
    /// Kept wider than `u16` so an out-of-range value can be stored and
    /// then rejected by validation.
    pub broker_port: u32,
    pub broker_username: String<USERNAME_CAPACITY>,
    pub broker_password: String<PASSWORD_CAPACITY>,
    pub topic_root: String<TOPIC_ROOT_CAPACITY>,

    // --- Status payloads ---
    pub run_message: String<MESSAGE_CAPACITY>,
    pub timeout_message: String<MESSAGE_CAPACITY>,
    pub lwt_message: String<MESSAGE_CAPACITY>,

    // --- Behaviour ---
    pub max_runtime_secs: u32,
    pub debug: bool,

    /// Generated once and reused across reboots.
    pub client_id: String<CLIENT_ID_CAPACITY>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            validity_marker: 0,
            ssid: String::new(),
            wifi_password: String::new(),
            broker_address: String::new(),
            broker_port: DEFAULT_BROKER_PORT,
            broker_username: String::new(),
            broker_password: String::new(),
            topic_root: bounded(DEFAULT_TOPIC_ROOT),
            run_message: bounded(DEFAULT_RUN_MESSAGE),
            timeout_message: bounded(DEFAULT_TIMEOUT_MESSAGE),
            lwt_message: bounded(DEFAULT_LWT_MESSAGE),
            max_runtime_secs: DEFAULT_MAX_RUNTIME_SECS,
            debug: false,
            client_id: String::new(),
        }
    }
}

/// Copy a compile-time default into a bounded string.
fn bounded<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    // Defaults are shorter than every capacity; checked by tests.
    let _ = out.push_str(s);
    out
}

/// Replace `dst` with `value`, refusing values over capacity.
fn assign<const N: usize>(dst: &mut String<N>, value: &str) -> Result<(), CommandError> {
    if value.len() > N {
        return Err(CommandError::ValueTooLong { capacity: N });
    }
    dst.clear();
    dst.push_str(value)
        .map_err(|()| CommandError::ValueTooLong { capacity: N })
}

/// C `atoi`: optional whitespace and sign, then leading digits; 0 if none.
/// Negative results clamp to 0 since both numeric fields are unsigned.
pub fn parse_leading_u32(value: &str) -> u32 {
    let s = value.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let mut n: u64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        n = (n * 10 + u64::from(b - b'0')).min(u64::from(u32::MAX));
    }
    if negative { 0 } else { n as u32 }
}

/// Identifies one user-settable field of [`Settings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Ssid,
    WifiPassword,
    BrokerAddress,
    BrokerPort,
    BrokerUsername,
    BrokerPassword,
    TopicRoot,
    RunMessage,
    TimeoutMessage,
    LwtMessage,
    MaxRuntime,
    Debug,
}

impl Field {
    pub const ALL: [Field; 12] = [
        Field::Ssid,
        Field::WifiPassword,
        Field::BrokerAddress,
        Field::BrokerPort,
        Field::BrokerUsername,
        Field::BrokerPassword,
        Field::TopicRoot,
        Field::RunMessage,
        Field::TimeoutMessage,
        Field::LwtMessage,
        Field::MaxRuntime,
        Field::Debug,
    ];

    /// Command name for this field (case-sensitive).
    pub fn command_name(self) -> &'static str {
        match self {
            Self::Ssid => "ssid",
            Self::WifiPassword => "wifipass",
            Self::BrokerAddress => "broker",
            Self::BrokerPort => "brokerPort",
            Self::BrokerUsername => "userName",
            Self::BrokerPassword => "userPass",
            Self::TopicRoot => "topicRoot",
            Self::RunMessage => "runMessage",
            Self::TimeoutMessage => "timeoutMessage",
            Self::LwtMessage => "lwtMessage",
            Self::MaxRuntime => "maxRuntime",
            Self::Debug => "debug",
        }
    }

    pub fn from_command_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.command_name() == name)
    }
}

impl Settings {
    /// True when the marker says the record was saved complete.
    pub fn has_valid_marker(&self) -> bool {
        self.validity_marker == VALID_SETTINGS_FLAG
    }

    /// The completeness predicate.  Broker credentials and the client id
    /// are optional and not checked.
    pub fn validate(&self) -> Result<(), Error> {
        fn required(len: usize, capacity: usize, field: &'static str) -> Result<(), Error> {
            if len == 0 || len > capacity {
                return Err(Error::ConfigInvalid(field));
            }
            Ok(())
        }

        required(self.ssid.len(), SSID_CAPACITY, "ssid")?;
        required(self.wifi_password.len(), PASSWORD_CAPACITY, "wifipass")?;
        required(self.broker_address.len(), ADDRESS_CAPACITY, "broker")?;
        required(self.lwt_message.len(), MESSAGE_CAPACITY, "lwtMessage")?;
        required(self.run_message.len(), MESSAGE_CAPACITY, "runMessage")?;
        required(self.timeout_message.len(), MESSAGE_CAPACITY, "timeoutMessage")?;
        required(self.topic_root.len(), TOPIC_ROOT_CAPACITY, "topicRoot")?;
        if self.broker_port == 0 || self.broker_port >= 65535 {
            return Err(Error::ConfigInvalid("brokerPort must be 1-65534"));
        }
        if self.max_runtime_secs == 0 {
            return Err(Error::ConfigInvalid("maxRuntime must be > 0"));
        }
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.validate().is_ok()
    }

    /// Assign a field from its command-line text form.
    pub fn set(&mut self, field: Field, value: &str) -> Result<(), CommandError> {
        match field {
            Field::Ssid => assign(&mut self.ssid, value),
            Field::WifiPassword => assign(&mut self.wifi_password, value),
            Field::BrokerAddress => assign(&mut self.broker_address, value),
            Field::BrokerPort => {
                self.broker_port = parse_leading_u32(value);
                Ok(())
            }
            Field::BrokerUsername => assign(&mut self.broker_username, value),
            Field::BrokerPassword => assign(&mut self.broker_password, value),
            Field::TopicRoot => assign(&mut self.topic_root, value),
            Field::RunMessage => assign(&mut self.run_message, value),
            Field::TimeoutMessage => assign(&mut self.timeout_message, value),
            Field::LwtMessage => assign(&mut self.lwt_message, value),
            Field::MaxRuntime => {
                self.max_runtime_secs = parse_leading_u32(value);
                Ok(())
            }
            Field::Debug => {
                self.debug = value != "false";
                Ok(())
            }
        }
    }

    /// Text form of a field, as shown in settings listings.
    pub fn display_value(&self, field: Field) -> std::string::String {
        match field {
            Field::Ssid => self.ssid.as_str().into(),
            Field::WifiPassword => self.wifi_password.as_str().into(),
            Field::BrokerAddress => self.broker_address.as_str().into(),
            Field::BrokerPort => self.broker_port.to_string(),
            Field::BrokerUsername => self.broker_username.as_str().into(),
            Field::BrokerPassword => self.broker_password.as_str().into(),
            Field::TopicRoot => self.topic_root.as_str().into(),
            Field::RunMessage => self.run_message.as_str().into(),
            Field::TimeoutMessage => self.timeout_message.as_str().into(),
            Field::LwtMessage => self.lwt_message.as_str().into(),
            Field::MaxRuntime => self.max_runtime_secs.to_string(),
            Field::Debug => if self.debug { "true" } else { "false" }.into(),
        }
    }

    /// Full topic name under the configured root.
    pub fn topic(&self, suffix: &str) -> std::string::String {
        format!("{}{}", self.topic_root, suffix)
    }

    /// Run-time threshold in milliseconds.
    pub fn deadline_ms(&self) -> u64 {
        u64::from(self.max_runtime_secs) * 1000
    }

    // ── Block encoding ────────────────────────────────────────

    /// Serialise into a full block: marker header, postcard body, zero padding.
    pub fn encode(&self) -> Result<[u8; SETTINGS_BLOCK_SIZE], postcard::Error> {
        let mut block = [0u8; SETTINGS_BLOCK_SIZE];
        block[..MARKER_LEN].copy_from_slice(&self.validity_marker.to_le_bytes());
        postcard::to_slice(self, &mut block[MARKER_LEN..])?;
        Ok(block)
    }

    /// Parse a block.  Returns `None` when the marker is neither
    /// [`VALID_SETTINGS_FLAG`] nor `0` (erased flash, garbage) or the body
    /// does not decode.
    pub fn decode(block: &[u8]) -> Option<Self> {
        let header: [u8; MARKER_LEN] = block.get(..MARKER_LEN)?.try_into().ok()?;
        let marker = u32::from_le_bytes(header);
        if marker != 0 && marker != VALID_SETTINGS_FLAG {
            return None;
        }
        let mut settings: Settings = postcard::from_bytes(&block[MARKER_LEN..]).ok()?;
        settings.validity_marker = marker;
        Some(settings)
    }
}

/// Build a client id from a random 16-bit value, e.g. `RunTimeLimiter3fa2`.
pub fn client_id_from(random: u16) -> String<CLIENT_ID_CAPACITY> {
    let mut id = String::new();
    let _ = write!(id, "{CLIENT_ID_PREFIX}{random:x}");
    id
}
