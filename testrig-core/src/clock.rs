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

use core::cell::Cell;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

/// Free running time source. Implementations must never go backwards between calls.
pub trait Monotonic {
    /// Microseconds since boot.
    fn now_micros(&self) -> u64;

    /// Milliseconds since boot.
    fn now_millis(&self) -> u64 {
        self.now_micros() / 1_000
    }
}

impl<T: Monotonic + ?Sized> Monotonic for &T {
    fn now_micros(&self) -> u64 {
        (**self).now_micros()
    }
}

/// Maps device uptime onto the host's unix epoch.
///
/// The host anchors the device once per session with [`ClockSync::set`]. Until then
/// [`ClockSync::now`] reports plain uptime in milliseconds, which the host must not mistake for
/// wall clock time.
pub struct ClockSync<C> {
    clock: C,
    epoch_base_ms: Mutex<CriticalSectionRawMutex, Cell<Option<i64>>>,
}

impl<C> ClockSync<C>
where
    C: Monotonic,
{
    pub const fn new(clock: C) -> Self {
        Self {
            clock,
            epoch_base_ms: Mutex::new(Cell::new(None)),
        }
    }

    pub fn set(&self, unix_ms: u64) {
        let uptime_ms = uptime_as_i64(self.clock.now_millis());
        let unix_ms = i64::try_from(unix_ms).unwrap_or(i64::MAX);
        let epoch_base = unix_ms.saturating_sub(uptime_ms);
        self.epoch_base_ms.lock(|base| base.set(Some(epoch_base)));
        debug!("Epoch base set to {} ms", epoch_base);
    }

    pub fn now(&self) -> u64 {
        let epoch_base = self.epoch_base().unwrap_or(0);
        let uptime_ms = uptime_as_i64(self.clock.now_millis());
        u64::try_from(epoch_base.saturating_add(uptime_ms)).unwrap_or(0)
    }

    /// Offset last supplied by the host, `None` while the device is still on uptime.
    pub fn epoch_base(&self) -> Option<i64> {
        self.epoch_base_ms.lock(|base| base.get())
    }
}

fn uptime_as_i64(uptime_ms: u64) -> i64 {
    i64::try_from(uptime_ms).unwrap_or(i64::MAX)
}
