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

//! Test doubles for the hardware seams.

use crate::clock::Monotonic;
use crate::load_cell::LoadCellSensor;
use core::cell::Cell;
use embedded_hal_async::delay::DelayNs;
use embedded_storage::{ReadStorage, Storage};
use std::collections::VecDeque;
use std::vec::Vec;

#[derive(Default)]
pub struct ManualClock {
    now_us: Cell<u64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_micros(&self, us: u64) {
        self.now_us.set(self.now_us.get() + us);
    }

    pub fn advance_millis(&self, ms: u64) {
        self.advance_micros(ms * 1_000);
    }
}

impl Monotonic for ManualClock {
    fn now_micros(&self) -> u64 {
        self.now_us.get()
    }
}

/// Delay that completes immediately and moves the shared clock forward instead.
pub struct ManualDelay<'a> {
    clock: &'a ManualClock,
}

impl<'a> ManualDelay<'a> {
    pub fn new(clock: &'a ManualClock) -> Self {
        Self { clock }
    }
}

impl DelayNs for ManualDelay<'_> {
    async fn delay_ns(&mut self, ns: u32) {
        self.clock.advance_micros(u64::from(ns.div_ceil(1_000)));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorFault;

/// Sensor that becomes ready after a fixed number of polls and then yields queued readings.
pub struct ScriptedSensor {
    readings: VecDeque<i32>,
    polls_until_ready: u32,
    polls: u32,
    pub fail_ready_check: bool,
}

impl ScriptedSensor {
    pub fn new(readings: &[i32]) -> Self {
        Self {
            readings: readings.iter().copied().collect(),
            polls_until_ready: 0,
            polls: 0,
            fail_ready_check: false,
        }
    }

    pub fn ready_after(mut self, polls: u32) -> Self {
        self.polls_until_ready = polls;
        self
    }

    /// Sensor whose data line never signals a finished conversion.
    pub fn stalled() -> Self {
        Self::new(&[]).ready_after(u32::MAX)
    }

    pub fn poll_count(&self) -> u32 {
        self.polls
    }
}

impl LoadCellSensor for ScriptedSensor {
    type Error = SensorFault;

    fn is_ready(&mut self) -> Result<bool, Self::Error> {
        if self.fail_ready_check {
            return Err(SensorFault);
        }
        self.polls = self.polls.saturating_add(1);
        Ok(self.polls > self.polls_until_ready && !self.readings.is_empty())
    }

    async fn read_raw(&mut self) -> Result<i32, Self::Error> {
        self.polls = 0;
        self.readings.pop_front().ok_or(SensorFault)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemStorageError {
    OutOfBounds,
    WriteRejected,
}

/// Byte addressable store backed by RAM, erased to 0xFF like flash.
pub struct MemStorage {
    pub bytes: Vec<u8>,
    pub reject_writes: bool,
    pub write_count: usize,
}

impl MemStorage {
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0xFF; capacity],
            reject_writes: false,
            write_count: 0,
        }
    }

    pub fn flip_bit(&mut self, bit: usize) {
        self.bytes[bit / 8] ^= 1 << (bit % 8);
    }
}

impl ReadStorage for MemStorage {
    type Error = MemStorageError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let end = start + bytes.len();
        let source = self
            .bytes
            .get(start..end)
            .ok_or(MemStorageError::OutOfBounds)?;
        bytes.copy_from_slice(source);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.bytes.len()
    }
}

impl Storage for MemStorage {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.reject_writes {
            return Err(MemStorageError::WriteRejected);
        }
        let start = offset as usize;
        let end = start + bytes.len();
        let target = self
            .bytes
            .get_mut(start..end)
            .ok_or(MemStorageError::OutOfBounds)?;
        target.copy_from_slice(bytes);
        self.write_count += 1;
        Ok(())
    }
}
