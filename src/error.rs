//! Unified error types for the RunLimiter firmware.
//!
//! Every fallible path funnels into [`Error`].  None of the variants is
//! fatal to the control loop: the loop logs, leaves state unchanged and
//! retries on a later tick.  The one deliberate exception is
//! [`Error::RestartRequested`], which ends the current session on purpose.
//! All variants are `Copy` so they can be passed around without allocation.

use core::fmt;

use crate::app::ports::{LinkStatus, StorageError};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The settings record failed the validity predicate.
    /// The `&'static str` names the offending field.
    ConfigInvalid(&'static str),
    /// Network link or broker session problem.
    Comms(CommsError),
    /// A command line was malformed or unknown.
    Command(CommandError),
    /// The persistent block could not be read or written.
    Storage(StorageError),
    /// The user asked for a restart; the device reboots after `delay_ms`.
    RestartRequested { delay_ms: u32 },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigInvalid(field) => write!(f, "config invalid: {field}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::RestartRequested { delay_ms } => {
                write!(f, "restart requested in {delay_ms} ms")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

/// Which publish went wrong, for log lines and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    Status,
    Rssi,
    Reply,
}

impl fmt::Display for TopicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status => write!(f, "status"),
            Self::Rssi => write!(f, "rssi"),
            Self::Reply => write!(f, "reply"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    /// Settings are incomplete, so no connection is attempted.
    NotConfigured,
    /// Link association exhausted its attempts.
    LinkFailed(LinkStatus),
    /// Broker handshake rejected; carries the client state code.
    SessionFailed(i32),
    /// Publish attempted without an active broker session.
    NotConnected,
    /// The broker client refused the publish.
    PublishFailed(TopicKind),
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "settings incomplete"),
            Self::LinkFailed(status) => write!(f, "WiFi association failed ({status})"),
            Self::SessionFailed(rc) => write!(f, "MQTT connect failed, rc={rc}"),
            Self::NotConnected => write!(f, "not connected to MQTT broker"),
            Self::PublishFailed(topic) => write!(f, "failed publishing {topic}"),
        }
    }
}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// No `=` between name and value.
    MissingSeparator,
    /// Nothing before the `=`.
    EmptyName,
    /// Name not in the vocabulary, or an action without `yes`.
    UnknownCommand,
    /// Value does not fit the field's capacity.
    ValueTooLong { capacity: usize },
    /// Console line ran past the line buffer before its newline.
    LineTooLong { capacity: usize },
    /// Console line is not valid UTF-8.
    InvalidEncoding,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSeparator => write!(f, "missing '=' separator"),
            Self::EmptyName => write!(f, "empty command name"),
            Self::UnknownCommand => write!(f, "unknown command"),
            Self::ValueTooLong { capacity } => {
                write!(f, "value longer than {capacity} bytes")
            }
            Self::LineTooLong { capacity } => {
                write!(f, "line longer than {capacity} bytes")
            }
            Self::InvalidEncoding => write!(f, "line is not valid UTF-8"),
        }
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
