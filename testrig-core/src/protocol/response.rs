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

use super::{DeviceInfo, ProtocolError};
use core::fmt::{self, Write};
use heapless::String;

/// Room for the longest response line, including the CRLF.
pub const RESPONSE_CAPACITY: usize = 160;

/// Payload of a successful command.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reply {
    Pong,
    Info(DeviceInfo),
    /// Unsolicited, sent once when a host connects.
    Ready(DeviceInfo),
    Load { mass_g: f32, raw: i64, ts: u64 },
    Tare,
    Speed {
        rpm: f32,
        period_ms: f32,
        pulses: u32,
        ts: u64,
    },
    SetTime,
    SetCal,
    Cal { slope: f32, tare: i32 },
    ResetCal,
    SetPpr,
    Ppr { ppr: u32 },
}

pub type Response = Result<Reply, ProtocolError>;

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Pong => f.write_str("PONG"),
            Reply::Info(info) => write!(
                f,
                "INFO vendor={} device={} fw={}",
                info.vendor, info.device, info.firmware
            ),
            Reply::Ready(info) => write!(
                f,
                "READY vendor={} device={} fw={}",
                info.vendor, info.device, info.firmware
            ),
            Reply::Load { mass_g, raw, ts } => {
                write!(f, "LOAD mass_g={:.3} raw={} ts={}", mass_g, raw, ts)
            }
            Reply::Tare => f.write_str("TARE"),
            Reply::Speed {
                rpm,
                period_ms,
                pulses,
                ts,
            } => write!(
                f,
                "SPEED rpm={:.2} period_ms={:.3} pulses={} ts={}",
                rpm, period_ms, pulses, ts
            ),
            Reply::SetTime => f.write_str("SETTIME"),
            Reply::SetCal => f.write_str("SETCAL"),
            Reply::Cal { slope, tare } => write!(f, "CAL slope={:.9} tare={}", slope, tare),
            Reply::ResetCal => f.write_str("RESETCAL"),
            Reply::SetPpr => f.write_str("SETPPR"),
            Reply::Ppr { ppr } => write!(f, "PPR ppr={}", ppr),
        }
    }
}

/// A [`Response`] as it goes on the wire, terminator included.
pub struct ResponseLine<'a>(pub &'a Response);

impl fmt::Display for ResponseLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Ok(reply) => write!(f, "OK {}\r\n", reply),
            Err(error) => write!(f, "ERR {}\r\n", error),
        }
    }
}

/// Formats a response into a fixed buffer ready for the serial link.
pub fn render(response: &Response) -> Result<String<RESPONSE_CAPACITY>, fmt::Error> {
    let mut line = String::new();
    write!(line, "{}", ResponseLine(response))?;
    Ok(line)
}
