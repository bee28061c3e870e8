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

//! Measurement and protocol logic for the test rig telemetry firmware, kept free of any
//! hardware dependency so it can be exercised on the host.

#![cfg_attr(not(test), no_std)]

pub(crate) mod fmt;

pub mod calibration;
pub mod clock;
pub mod interpreter;
pub mod load_cell;
pub mod protocol;
pub mod pulse;

pub use calibration::{Calibration, CalibrationRecord, CalibrationStore, StoreError};
pub use clock::{ClockSync, Monotonic};
pub use interpreter::{Interpreter, InterpreterConfig};
pub use load_cell::{LoadCellReader, LoadCellSensor, ReadError};
pub use protocol::{DeviceInfo, FrameEvent, LineFramer, ProtocolError, Reply, Response};
pub use pulse::{PulseSnapshot, PulseTimer, PulsesPerRevolution};

#[cfg(test)]
pub(crate) mod test_support;
