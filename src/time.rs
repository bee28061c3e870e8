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

use embassy_time::Instant;
use testrig_core::Monotonic;

/// The embassy time driver (1 MHz on the RP2040) as the rig's uptime source.
#[derive(Clone, Copy, Default)]
pub struct EmbassyClock;

impl Monotonic for EmbassyClock {
    fn now_micros(&self) -> u64 {
        Instant::now().as_micros()
    }

    fn now_millis(&self) -> u64 {
        Instant::now().as_millis()
    }
}
