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

//! Shaft speed capture on the tachometer input.

use embassy_rp::gpio::Input;
use embassy_time::Instant;
use testrig_core::PulseTimer;

pub static PULSE_TIMER: PulseTimer = PulseTimer::new();

/// Timestamps every rising edge on the tach input. Spawned on the high priority interrupt
/// executor; the timestamp is the poll time after the edge wakes the task.
#[embassy_executor::task]
pub async fn tach_task(mut tach_pin: Input<'static>) {
    loop {
        tach_pin.wait_for_rising_edge().await;
        // Truncation to u32 is expected; the pulse timer works on wrapping differences.
        PULSE_TIMER.on_edge(Instant::now().as_micros() as u32);
    }
}
