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

//! Board wiring and fixed operating parameters.

use core::time::Duration;
use testrig_core::DeviceInfo;

pub const DEVICE_INFO: DeviceInfo = DeviceInfo {
    vendor: "ForeverBearing",
    device: "RP2040",
    firmware: env!("CARGO_PKG_VERSION"),
};

/// Longest wait for the HX711 to finish a conversion. At 10 samples/s a conversion takes
/// about 100 ms.
pub const LOAD_CELL_READ_TIMEOUT: Duration = Duration::from_millis(200);

pub const FLASH_SIZE: usize = 2 * 1024 * 1024;
pub const FLASH_SECTOR_SIZE: usize = 4096;
/// Calibration partition: the final sector of flash, excluded from `FLASH` in memory.x.
pub const CALIBRATION_PARTITION_OFFSET: u32 = (FLASH_SIZE - FLASH_SECTOR_SIZE) as u32;
pub const CALIBRATION_PARTITION_SIZE: u32 = FLASH_SECTOR_SIZE as u32;
/// Position of the record inside the partition.
pub const CALIBRATION_RECORD_OFFSET: u32 = 0;

/// Raspberry Pi vendor ID with the Pico CDC product ID the host tooling looks for.
pub const USB_VID: u16 = 0x2E8A;
pub const USB_PID: u16 = 0x0005;
pub const USB_MAX_PACKET_SIZE: u8 = 64;

#[cfg(feature = "tach-pullup")]
pub const TACH_PULL: embassy_rp::gpio::Pull = embassy_rp::gpio::Pull::Up;
#[cfg(not(feature = "tach-pullup"))]
pub const TACH_PULL: embassy_rp::gpio::Pull = embassy_rp::gpio::Pull::None;
