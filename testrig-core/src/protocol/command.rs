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

use super::ProtocolError;
use crate::pulse::PulsesPerRevolution;

/// A parsed request with its arguments already validated.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    Ping,
    Info,
    Load,
    Tare,
    Speed,
    SetTime { unix_ms: u64 },
    SetCal { slope: f32, tare: i32 },
    Cal,
    ResetCal,
    SetPpr(PulsesPerRevolution),
    Ppr,
}

/// One row of the dispatch table: the command word and the parser for its arguments.
pub struct CommandSpec {
    pub name: &'static str,
    pub parse: fn(&mut Arguments<'_>) -> Result<Command, ProtocolError>,
}

pub const COMMAND_TABLE: [CommandSpec; 11] = [
    CommandSpec {
        name: "PING",
        parse: |_| Ok(Command::Ping),
    },
    CommandSpec {
        name: "INFO",
        parse: |_| Ok(Command::Info),
    },
    CommandSpec {
        name: "LOAD?",
        parse: |_| Ok(Command::Load),
    },
    CommandSpec {
        name: "TARE",
        parse: |_| Ok(Command::Tare),
    },
    CommandSpec {
        name: "SPEED?",
        parse: |_| Ok(Command::Speed),
    },
    CommandSpec {
        name: "SETTIME",
        parse: parse_set_time,
    },
    CommandSpec {
        name: "SETCAL",
        parse: parse_set_cal,
    },
    CommandSpec {
        name: "CAL?",
        parse: |_| Ok(Command::Cal),
    },
    CommandSpec {
        name: "RESETCAL",
        parse: |_| Ok(Command::ResetCal),
    },
    CommandSpec {
        name: "SETPPR",
        parse: parse_set_ppr,
    },
    CommandSpec {
        name: "PPR?",
        parse: |_| Ok(Command::Ppr),
    },
];

fn parse_set_time(args: &mut Arguments<'_>) -> Result<Command, ProtocolError> {
    let unix_ms = args
        .next()
        .and_then(|arg| arg.parse().ok())
        .ok_or(ProtocolError::MissingUnixMs)?;
    Ok(Command::SetTime { unix_ms })
}

fn parse_set_cal(args: &mut Arguments<'_>) -> Result<Command, ProtocolError> {
    let slope = args
        .next()
        .and_then(|arg| arg.parse::<f32>().ok())
        .filter(|slope| slope.is_finite())
        .ok_or(ProtocolError::MissingCalArgs)?;
    let tare = args
        .next()
        .and_then(|arg| arg.parse().ok())
        .ok_or(ProtocolError::MissingCalArgs)?;
    Ok(Command::SetCal { slope, tare })
}

fn parse_set_ppr(args: &mut Arguments<'_>) -> Result<Command, ProtocolError> {
    let arg = args.next().ok_or(ProtocolError::MissingPpr)?;
    arg.parse()
        .ok()
        .and_then(PulsesPerRevolution::new)
        .map(Command::SetPpr)
        .ok_or(ProtocolError::InvalidPpr)
}

impl Command {
    /// Parses one framed line. Blank lines yield `Ok(None)` and must not be answered.
    pub fn parse(line: &[u8]) -> Result<Option<Command>, ProtocolError> {
        let line = core::str::from_utf8(line).map_err(|_| ProtocolError::UnknownCommand)?;
        let mut args = Arguments::new(line);
        let Some(word) = args.next() else {
            return Ok(None);
        };

        let spec = COMMAND_TABLE
            .iter()
            .find(|spec| spec.name.eq_ignore_ascii_case(word))
            .ok_or(ProtocolError::UnknownCommand)?;
        (spec.parse)(&mut args).map(Some)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping => "PING",
            Command::Info => "INFO",
            Command::Load => "LOAD?",
            Command::Tare => "TARE",
            Command::Speed => "SPEED?",
            Command::SetTime { .. } => "SETTIME",
            Command::SetCal { .. } => "SETCAL",
            Command::Cal => "CAL?",
            Command::ResetCal => "RESETCAL",
            Command::SetPpr(_) => "SETPPR",
            Command::Ppr => "PPR?",
        }
    }
}

/// Space or tab separated words of a command line. Runs of separators count as one.
pub struct Arguments<'a> {
    rest: &'a str,
}

impl<'a> Arguments<'a> {
    fn new(line: &'a str) -> Self {
        Self { rest: line }
    }
}

fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

impl<'a> Iterator for Arguments<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let trimmed = self.rest.trim_start_matches(is_separator);
        if trimmed.is_empty() {
            self.rest = trimmed;
            return None;
        }
        let end = trimmed.find(is_separator).unwrap_or(trimmed.len());
        let (word, rest) = trimmed.split_at(end);
        self.rest = rest;
        Some(word)
    }
}
