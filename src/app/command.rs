//! Line-oriented `name=value` command processor.
//!
//! The same vocabulary arrives over the serial console and the MQTT
//! command topic.  [`parse`] is pure; [`execute`] applies a line to the
//! [`ConfigStore`] and reports a [`Response`] that the caller delivers on
//! whichever channel the line came from.
//!
//! ```text
//!  "ssid=HomeNet\r\n" ──▶ parse ──▶ Command::Set(Ssid, "HomeNet")
//!                                        │
//!                                        ▼
//!                          ConfigStore::update ──▶ Response::Ok
//! ```

use core::fmt::Write as _;
use core::net::Ipv4Addr;

use log::{debug, error, warn};

use crate::config::{FACTORY_RESET_DELAY_MS, Field, RESET_DELAY_MS, Settings};
use crate::error::{CommandError, Error, Result};

use super::ports::{Platform, StoragePort};
use super::store::ConfigStore;

/// Bare query that returns the settings dump.
pub const SETTINGS_QUERY: &str = "settings";

/// Reply published for a command that failed.
pub const FAILURE_REPLY: &str = "(empty)";
pub const SUCCESS_REPLY: &str = "OK";

// ───────────────────────────────────────────────────────────────
// Parsing
// ───────────────────────────────────────────────────────────────

/// A parsed command line.  Borrows the value from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Set(Field, &'a str),
    RegenerateClientId,
    FactoryDefaults,
    Reset,
    ShowSettings,
}

fn strip_line_end(s: &str) -> &str {
    s.trim_end_matches(['\r', '\n'])
}

/// Parse one line.  The name is everything before the first `=`; the
/// value is the rest.  Trailing CR/LF is stripped from both.
pub fn parse(line: &str) -> core::result::Result<Command<'_>, CommandError> {
    let line = strip_line_end(line);
    if line == SETTINGS_QUERY {
        return Ok(Command::ShowSettings);
    }

    let (name, value) = line
        .split_once('=')
        .ok_or(CommandError::MissingSeparator)?;
    let name = strip_line_end(name);
    let value = strip_line_end(value);
    if name.is_empty() {
        return Err(CommandError::EmptyName);
    }

    if let Some(field) = Field::from_command_name(name) {
        return Ok(Command::Set(field, value));
    }
    match (name, value) {
        ("resetmqttid", "yes") => Ok(Command::RegenerateClientId),
        ("factorydefaults", "yes") => Ok(Command::FactoryDefaults),
        ("reset", "yes") => Ok(Command::Reset),
        _ => Err(CommandError::UnknownCommand),
    }
}

// ───────────────────────────────────────────────────────────────
// Execution
// ───────────────────────────────────────────────────────────────

/// Outcome of one command, independent of the channel it arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok,
    Failed,
    Settings(String),
}

impl Response {
    /// Text published back on the MQTT reply topic.
    pub fn reply_text(&self) -> &str {
        match self {
            Self::Ok => SUCCESS_REPLY,
            Self::Failed => FAILURE_REPLY,
            Self::Settings(dump) => dump.as_str(),
        }
    }

    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Failed)
    }
}

/// Parse and apply one line.
///
/// Malformed or unknown lines write the settings listing to serial and
/// change nothing.  `factorydefaults=yes` and `reset=yes` end with a delay
/// and [`RestartPort::restart`](super::ports::RestartPort::restart).
pub fn execute<S: StoragePort>(
    line: &str,
    store: &mut ConfigStore<S>,
    hw: &mut impl Platform,
) -> Response {
    debug!("Command: processing {:?}", strip_line_end(line));

    let command = match parse(line) {
        Ok(c) => c,
        Err(e) => return reject(e, store.settings(), hw),
    };

    if command == Command::ShowSettings {
        return Response::Settings(settings_dump(store.settings(), hw.local_ip()));
    }

    match apply(command, store, hw) {
        Ok(()) => Response::Ok,
        Err(Error::RestartRequested { delay_ms }) => {
            hw.delay_ms(delay_ms);
            hw.restart();
            Response::Ok
        }
        Err(Error::Command(e)) => reject(e, store.settings(), hw),
        Err(e) => {
            error!("Command: {}", e);
            Response::Failed
        }
    }
}

/// Refuse a line: log why, show the listing on serial, report failure.
pub fn reject(error: CommandError, settings: &Settings, hw: &mut impl Platform) -> Response {
    warn!("Command: rejected ({})", error);
    write_listing(hw, settings);
    Response::Failed
}

fn apply<S: StoragePort>(
    command: Command<'_>,
    store: &mut ConfigStore<S>,
    hw: &mut impl Platform,
) -> Result<()> {
    match command {
        Command::Set(field, value) => store.update(field, value),
        Command::RegenerateClientId => store.regenerate_client_id(),
        Command::FactoryDefaults => {
            hw.write_line("");
            hw.write_line("*********************** Resetting EEPROM Values ************************");
            store.reset_to_defaults()?;
            Err(Error::RestartRequested {
                delay_ms: FACTORY_RESET_DELAY_MS,
            })
        }
        Command::Reset => {
            hw.write_line("");
            hw.write_line("*********************** Resetting Device ************************");
            Err(Error::RestartRequested {
                delay_ms: RESET_DELAY_MS,
            })
        }
        Command::ShowSettings => Ok(()),
    }
}

// ───────────────────────────────────────────────────────────────
// Output formatting
// ───────────────────────────────────────────────────────────────

fn help_text(field: Field) -> &'static str {
    match field {
        Field::Ssid => "wifi ssid",
        Field::WifiPassword => "wifi password",
        Field::BrokerAddress => "address of MQTT broker",
        Field::BrokerPort => "port number MQTT broker",
        Field::BrokerUsername => "user ID for MQTT broker",
        Field::BrokerPassword => "user password for MQTT broker",
        Field::TopicRoot => "MQTT topic base to which status or other topics will be added",
        Field::RunMessage => "status message to send when power is applied",
        Field::LwtMessage => "status message to send when power is removed",
        Field::TimeoutMessage => "status message to send when runtime is exceeded",
        Field::MaxRuntime => "maximum allowable seconds to run",
        Field::Debug => "print debug messages to serial port",
    }
}

/// Order fields appear in the listing and the dump.
const LISTING_ORDER: [Field; 12] = [
    Field::Ssid,
    Field::WifiPassword,
    Field::BrokerAddress,
    Field::BrokerPort,
    Field::BrokerUsername,
    Field::BrokerPassword,
    Field::TopicRoot,
    Field::RunMessage,
    Field::LwtMessage,
    Field::TimeoutMessage,
    Field::MaxRuntime,
    Field::Debug,
];

fn ip_text(ip: Option<Ipv4Addr>) -> Ipv4Addr {
    ip.unwrap_or(Ipv4Addr::UNSPECIFIED)
}

/// Help listing with current values, one entry per line.
pub fn settings_listing(settings: &Settings, ip: Option<Ipv4Addr>) -> String {
    let mut out = String::new();
    for field in LISTING_ORDER {
        let _ = writeln!(
            out,
            "{}=<{}> ({})",
            field.command_name(),
            help_text(field),
            settings.display_value(field)
        );
    }
    let _ = writeln!(
        out,
        "MQTT client ID=<automatically generated client ID> ({}) **Use \"resetmqttid=yes\" to regenerate",
        settings.client_id
    );
    let _ = writeln!(out, "\n*** Use \"factorydefaults=yes\" to reset all settings ***");
    let _ = write!(out, "\nIP Address={}", ip_text(ip));
    out
}

/// `name=value` dump answered to the `settings` query.
pub fn settings_dump(settings: &Settings, ip: Option<Ipv4Addr>) -> String {
    let mut out = String::from("\n");
    for field in LISTING_ORDER {
        let _ = writeln!(out, "{}={}", field.command_name(), settings.display_value(field));
    }
    let _ = writeln!(out, "MQTT client ID={}", settings.client_id);
    let _ = write!(out, "IP Address={}", ip_text(ip));
    out
}

fn write_listing(hw: &mut impl Platform, settings: &Settings) {
    let listing = settings_listing(settings, hw.local_ip());
    for line in listing.lines() {
        hw.write_line(line);
    }
}
