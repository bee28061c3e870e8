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

use crate::config::{
    CALIBRATION_PARTITION_OFFSET, CALIBRATION_PARTITION_SIZE, CALIBRATION_RECORD_OFFSET,
    FLASH_SECTOR_SIZE, FLASH_SIZE,
};
use core::cell::RefCell;
use defmt::{error, info};
use embassy_embedded_hal::flash::partition::BlockingPartition;
use embassy_rp::Peri;
use embassy_rp::flash::{self, Flash};
use embassy_rp::peripherals::FLASH;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embedded_storage::nor_flash::RmwNorFlashStorage;
use static_cell::StaticCell;
use testrig_core::{CalibrationStore, StoreError};

pub type BlockingFlash = Flash<'static, FLASH, flash::Blocking, FLASH_SIZE>;

pub type CalibrationPartition =
    BlockingPartition<'static, CriticalSectionRawMutex, BlockingFlash>;

/// Byte addressable view of the partition. Writes read, erase and reprogram the whole sector.
pub type CalibrationStorage = RmwNorFlashStorage<'static, CalibrationPartition>;

pub type CalibrationStoreError = StoreError<embassy_embedded_hal::flash::partition::Error<flash::Error>>;

static FLASH_MUTEX: StaticCell<Mutex<CriticalSectionRawMutex, RefCell<BlockingFlash>>> =
    StaticCell::new();
static MERGE_BUFFER: StaticCell<[u8; FLASH_SECTOR_SIZE]> = StaticCell::new();

/// Takes the flash peripheral and opens the calibration record in its partition, restoring
/// defaults if the record is missing or corrupt.
pub fn open_calibration_store(
    flash: Peri<'static, FLASH>,
) -> CalibrationStore<CalibrationStorage> {
    let flash = Flash::<_, _, FLASH_SIZE>::new_blocking(flash);
    let flash_mutex = FLASH_MUTEX.init(Mutex::new(RefCell::new(flash)));

    let partition = BlockingPartition::new(
        flash_mutex,
        CALIBRATION_PARTITION_OFFSET,
        CALIBRATION_PARTITION_SIZE,
    );
    let storage = RmwNorFlashStorage::new(partition, MERGE_BUFFER.init([0u8; FLASH_SECTOR_SIZE]));

    info!(
        "Calibration partition at 0x{:x}, {} bytes",
        CALIBRATION_PARTITION_OFFSET, CALIBRATION_PARTITION_SIZE
    );

    match CalibrationStore::open(storage, CALIBRATION_RECORD_OFFSET) {
        Ok(store) => store,
        Err(e) => fatal_storage_error(e),
    }
}

/// A calibration write failure is not retried. The rig halts here.
pub fn fatal_storage_error(e: CalibrationStoreError) -> ! {
    error!("Calibration storage failed: {}", defmt::Debug2Format(&e));
    panic!("calibration storage failure");
}
