// Copyright (C) 2025 Paul Hampson
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License version 3 as  published by the
// Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <https://www.gnu.org/licenses/>.

//! The line based ASCII protocol spoken over the serial link.
//!
//! Host to device: one command per line, `\n` terminated (a preceding `\r` is ignored).
//! Device to host: exactly one `OK ...` or `ERR <code> <message>` line per dispatched command,
//! always `\r\n` terminated. Blank lines get no answer.

mod command;
mod line;
mod response;

pub use command::{Arguments, COMMAND_TABLE, Command, CommandSpec};
pub use line::{FrameEvent, LINE_CAPACITY, LineFramer};
pub use response::{RESPONSE_CAPACITY, Reply, Response, ResponseLine, render};

use core::fmt;

/// Identification reported by `INFO` and the connection banner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceInfo {
    pub vendor: &'static str,
    pub device: &'static str,
    pub firmware: &'static str,
}

/// Failures reported to the host as `ERR <code> <message>`. Codes and messages are part of the
/// wire protocol and must not change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    UnknownCommand,
    LineTooLong,
    /// The load cell did not produce a sample. Also used for driver faults.
    SensorTimeout,
    MissingUnixMs,
    MissingCalArgs,
    MissingPpr,
    InvalidPpr,
}

impl ProtocolError {
    pub fn code(&self) -> u8 {
        match self {
            ProtocolError::UnknownCommand => 10,
            ProtocolError::LineTooLong => 11,
            ProtocolError::SensorTimeout => 20,
            ProtocolError::MissingUnixMs => 30,
            ProtocolError::MissingCalArgs => 31,
            ProtocolError::MissingPpr => 32,
            ProtocolError::InvalidPpr => 33,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ProtocolError::UnknownCommand => "unknown_command",
            ProtocolError::LineTooLong => "line_too_long",
            ProtocolError::SensorTimeout => "HX711_timeout",
            ProtocolError::MissingUnixMs => "missing_unix_ms",
            ProtocolError::MissingCalArgs => "missing_args",
            ProtocolError::MissingPpr => "missing_ppr",
            ProtocolError::InvalidPpr => "invalid_ppr",
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.message())
    }
}
