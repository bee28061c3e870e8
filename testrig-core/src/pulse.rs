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
use core::num::NonZeroU32;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

/// Edges closer together than this are counted but never used as a period (contact bounce,
/// electrical noise on the tach line).
pub const GLITCH_REJECT_US: u32 = 100;

#[derive(Clone, Copy)]
struct EdgeState {
    last_edge_us: Option<u32>,
    total_pulses: u32,
    last_period_us: u32,
}

/// Shaft edge capture shared between the edge handler and the command loop.
///
/// The edge handler is the only writer. Both fields are updated and read together inside a
/// critical section so the command loop can never observe a count from one edge paired with the
/// period from another.
pub struct PulseTimer {
    state: Mutex<CriticalSectionRawMutex, Cell<EdgeState>>,
}

impl PulseTimer {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(EdgeState {
                last_edge_us: None,
                total_pulses: 0,
                last_period_us: 0,
            })),
        }
    }

    /// Records one qualifying edge. `now_us` is the free running microsecond counter at the
    /// moment the edge was seen; it may wrap.
    pub fn on_edge(&self, now_us: u32) {
        self.state.lock(|cell| {
            let mut state = cell.get();
            if let Some(previous_us) = state.last_edge_us {
                let elapsed_us = now_us.wrapping_sub(previous_us);
                if elapsed_us > GLITCH_REJECT_US {
                    state.last_period_us = elapsed_us;
                }
            }
            state.last_edge_us = Some(now_us);
            state.total_pulses = state.total_pulses.wrapping_add(1);
            cell.set(state);
        });
    }

    pub fn snapshot(&self) -> PulseSnapshot {
        self.state.lock(|cell| {
            let state = cell.get();
            PulseSnapshot {
                total_pulses: state.total_pulses,
                last_period_us: state.last_period_us,
            }
        })
    }
}

impl Default for PulseTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Consistent view of the pulse counters. Only [`PulseTimer::snapshot`] can build one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PulseSnapshot {
    total_pulses: u32,
    last_period_us: u32,
}

impl PulseSnapshot {
    pub fn total_pulses(&self) -> u32 {
        self.total_pulses
    }

    /// Time between the two most recent accepted edges. Zero means no signal yet.
    pub fn last_period_us(&self) -> u32 {
        self.last_period_us
    }

    pub fn last_period_ms(&self) -> f32 {
        self.last_period_us as f32 / 1_000.0
    }

    pub fn has_signal(&self) -> bool {
        self.last_period_us != 0
    }

    pub fn rpm(&self, ppr: PulsesPerRevolution) -> f32 {
        if !self.has_signal() {
            return 0.0;
        }
        let period_s = self.last_period_us as f32 / 1_000_000.0;
        60.0 / (period_s * ppr.get() as f32)
    }
}

/// Tach edges per shaft revolution. Zero is unrepresentable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PulsesPerRevolution(NonZeroU32);

impl PulsesPerRevolution {
    pub const DEFAULT: Self = Self(NonZeroU32::MIN);

    pub fn new(ppr: u32) -> Option<Self> {
        NonZeroU32::new(ppr).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl Default for PulsesPerRevolution {
    fn default() -> Self {
        Self::DEFAULT
    }
}
