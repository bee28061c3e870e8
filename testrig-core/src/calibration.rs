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
use core::fmt;
use crc::{CRC_32_ISO_HDLC, Crc};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embedded_storage::Storage;

/// 'CAL1'
pub const CAL_MAGIC: u32 = 0x4341_4C31;
/// Layout version 1.0
pub const CAL_VERSION: u32 = 0x0001_0000;

pub const DEFAULT_SLOPE: f32 = 0.0020;
pub const DEFAULT_TARE: i32 = 0;

/// Serialized size of a [`CalibrationRecord`]: magic, version, slope, tare, crc.
pub const RECORD_LEN: usize = 20;
const CHECKED_LEN: usize = RECORD_LEN - 4;

// Reflected 0xEDB88320, init and final xor 0xFFFFFFFF. Records already on devices depend on this.
const CALIBRATION_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Linear conversion from raw load cell counts to grams.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    /// Grams per raw count.
    pub slope: f32,
    /// Raw count at zero load.
    pub tare: i32,
}

impl Calibration {
    pub const DEFAULT: Self = Self {
        slope: DEFAULT_SLOPE,
        tare: DEFAULT_TARE,
    };

    pub fn mass_grams(&self, raw: i64) -> f32 {
        (raw - i64::from(self.tare)) as f32 * self.slope
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// The persisted form of a [`Calibration`], laid out little endian.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationRecord {
    pub magic: u32,
    pub version: u32,
    pub slope: f32,
    pub tare: i32,
    pub checksum: u32,
}

impl CalibrationRecord {
    pub fn new(calibration: Calibration) -> Self {
        let mut record = Self {
            magic: CAL_MAGIC,
            version: CAL_VERSION,
            slope: calibration.slope,
            tare: calibration.tare,
            checksum: 0,
        };
        record.checksum = record.compute_checksum();
        record
    }

    pub fn from_bytes(bytes: &[u8; RECORD_LEN]) -> Self {
        let word = |index: usize| {
            let mut le = [0u8; 4];
            le.copy_from_slice(&bytes[index * 4..index * 4 + 4]);
            le
        };
        Self {
            magic: u32::from_le_bytes(word(0)),
            version: u32::from_le_bytes(word(1)),
            slope: f32::from_le_bytes(word(2)),
            tare: i32::from_le_bytes(word(3)),
            checksum: u32::from_le_bytes(word(4)),
        }
    }

    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut bytes = [0u8; RECORD_LEN];
        bytes[..CHECKED_LEN].copy_from_slice(&self.checked_bytes());
        bytes[CHECKED_LEN..].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    fn checked_bytes(&self) -> [u8; CHECKED_LEN] {
        let mut bytes = [0u8; CHECKED_LEN];
        bytes[0..4].copy_from_slice(&self.magic.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.slope.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.tare.to_le_bytes());
        bytes
    }

    pub fn compute_checksum(&self) -> u32 {
        CALIBRATION_CRC.checksum(&self.checked_bytes())
    }

    pub fn is_valid(&self) -> bool {
        self.magic == CAL_MAGIC
            && self.version == CAL_VERSION
            && self.checksum == self.compute_checksum()
    }

    pub fn calibration(&self) -> Calibration {
        Calibration {
            slope: self.slope,
            tare: self.tare,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError<E> {
    Read(E),
    Write(E),
}

impl<E> fmt::Display for StoreError<E>
where
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Read(e) => write!(f, "calibration read failed: {:?}", e),
            StoreError::Write(e) => write!(f, "calibration write failed: {:?}", e),
        }
    }
}

/// Calibration kept in RAM and mirrored to a single record in non-volatile storage.
///
/// The RAM copy only changes after the matching record has been written, so the two never
/// disagree.
pub struct CalibrationStore<F> {
    storage: F,
    offset: u32,
    current: Mutex<CriticalSectionRawMutex, Cell<Calibration>>,
}

impl<F> CalibrationStore<F>
where
    F: Storage,
{
    pub fn new(storage: F, offset: u32) -> Self {
        Self {
            storage,
            offset,
            current: Mutex::new(Cell::new(Calibration::DEFAULT)),
        }
    }

    /// Loads the persisted calibration, replacing a missing or corrupt record with the defaults.
    /// Only a failure to write those defaults is reported.
    pub fn open(storage: F, offset: u32) -> Result<Self, StoreError<F::Error>> {
        let mut store = Self::new(storage, offset);
        match store.load() {
            Ok(Some(calibration)) => {
                debug!(
                    "Loaded calibration: slope = {}, tare = {}",
                    calibration.slope, calibration.tare
                );
                store.set_current(calibration);
            }
            Ok(None) => {
                warn!("No valid calibration record, restoring defaults");
                store.reset_to_defaults()?;
            }
            Err(_) => {
                warn!("Unable to read calibration record, restoring defaults");
                store.reset_to_defaults()?;
            }
        }
        Ok(store)
    }

    /// Reads the stored record. `Ok(None)` means the record is absent or failed validation and
    /// must not be used.
    pub fn load(&mut self) -> Result<Option<Calibration>, StoreError<F::Error>> {
        let mut bytes = [0u8; RECORD_LEN];
        self.storage
            .read(self.offset, &mut bytes)
            .map_err(StoreError::Read)?;

        let record = CalibrationRecord::from_bytes(&bytes);
        if record.is_valid() {
            Ok(Some(record.calibration()))
        } else {
            trace!(
                "Rejected calibration record: magic = {}, version = {}, crc = {}",
                record.magic, record.version, record.checksum
            );
            Ok(None)
        }
    }

    /// Writes slope and tare as one record, then makes them the live calibration.
    pub fn save(&mut self, slope: f32, tare: i32) -> Result<(), StoreError<F::Error>> {
        let calibration = Calibration { slope, tare };
        let record = CalibrationRecord::new(calibration);
        self.storage
            .write(self.offset, &record.to_bytes())
            .map_err(|e| {
                error!("Unable to save calibration record");
                StoreError::Write(e)
            })?;
        self.set_current(calibration);
        debug!("Calibration saved: slope = {}, tare = {}", slope, tare);
        Ok(())
    }

    pub fn reset_to_defaults(&mut self) -> Result<(), StoreError<F::Error>> {
        self.save(DEFAULT_SLOPE, DEFAULT_TARE)
    }

    pub fn current(&self) -> Calibration {
        self.current.lock(|current| current.get())
    }

    fn set_current(&self, calibration: Calibration) {
        self.current.lock(|current| current.set(calibration));
    }

    pub fn storage(&self) -> &F {
        &self.storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemStorage, MemStorageError};

    const OFFSET: u32 = 0;

    #[test]
    fn crc_matches_reference_check_value() {
        assert_eq!(CALIBRATION_CRC.checksum(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn record_layout_is_little_endian() {
        let record = CalibrationRecord::new(Calibration {
            slope: 1.0,
            tare: -2,
        });
        let bytes = record.to_bytes();

        assert_eq!(&bytes[0..4], &[0x31, 0x4C, 0x41, 0x43]);
        assert_eq!(&bytes[4..8], &[0x00, 0x00, 0x01, 0x00]);
        assert_eq!(&bytes[8..12], &[0x00, 0x00, 0x80, 0x3F]);
        assert_eq!(&bytes[12..16], &[0xFE, 0xFF, 0xFF, 0xFF]);
        assert_eq!(
            u32::from_le_bytes(bytes[16..20].try_into().unwrap()),
            CALIBRATION_CRC.checksum(&bytes[..16])
        );
        assert_eq!(CalibrationRecord::from_bytes(&bytes), record);
    }

    #[test]
    fn save_then_load_returns_same_pair() {
        let cases = [
            (DEFAULT_SLOPE, DEFAULT_TARE),
            (0.000_123_456_7, 8_388_607),
            (-3.5, -8_388_608),
            (f32::MIN_POSITIVE, i32::MAX),
            (1.0e9, i32::MIN),
        ];
        for (slope, tare) in cases {
            let mut store = CalibrationStore::new(MemStorage::new(64), OFFSET);
            store.save(slope, tare).unwrap();
            let loaded = store.load().unwrap().unwrap();
            assert_eq!(loaded.slope.to_bits(), slope.to_bits());
            assert_eq!(loaded.tare, tare);
        }
    }

    #[test]
    fn every_single_bit_flip_is_rejected() {
        let mut pristine = CalibrationStore::new(MemStorage::new(RECORD_LEN), OFFSET);
        pristine.save(0.0153, 41_200).unwrap();
        let image = pristine.storage().bytes.clone();

        for bit in 0..RECORD_LEN * 8 {
            let mut storage = MemStorage::new(RECORD_LEN);
            storage.bytes.copy_from_slice(&image);
            storage.flip_bit(bit);

            let mut store = CalibrationStore::new(storage, OFFSET);
            assert_eq!(store.load().unwrap(), None, "bit {bit} accepted");
        }
    }

    #[test]
    fn corrupt_record_falls_back_to_defaults_and_repairs() {
        let mut storage = MemStorage::new(64);
        {
            let mut store = CalibrationStore::new(MemStorage::new(64), OFFSET);
            store.save(0.5, 77).unwrap();
            storage.bytes.copy_from_slice(&store.storage().bytes);
        }
        storage.flip_bit(70);

        let mut store = CalibrationStore::open(storage, OFFSET).unwrap();
        assert_eq!(store.current(), Calibration::DEFAULT);
        assert_eq!(store.load().unwrap(), Some(Calibration::DEFAULT));
    }

    #[test]
    fn blank_storage_is_initialised_with_defaults() {
        let mut store = CalibrationStore::open(MemStorage::new(64), OFFSET).unwrap();
        assert_eq!(store.current(), Calibration::DEFAULT);
        assert_eq!(store.storage().write_count, 1);
        assert_eq!(store.load().unwrap(), Some(Calibration::DEFAULT));
    }

    #[test]
    fn valid_record_is_used_without_rewriting() {
        let mut seeded = CalibrationStore::new(MemStorage::new(64), 16);
        seeded.save(0.25, -900).unwrap();
        let mut storage = MemStorage::new(64);
        storage.bytes.copy_from_slice(&seeded.storage().bytes);

        let store = CalibrationStore::open(storage, 16).unwrap();
        assert_eq!(
            store.current(),
            Calibration {
                slope: 0.25,
                tare: -900
            }
        );
        assert_eq!(store.storage().write_count, 0);
    }

    #[test]
    fn record_with_other_version_is_rejected() {
        let mut record = CalibrationRecord::new(Calibration::DEFAULT);
        record.version = 0x0002_0000;
        record.checksum = record.compute_checksum();
        let mut storage = MemStorage::new(64);
        storage.bytes[..RECORD_LEN].copy_from_slice(&record.to_bytes());

        let mut store = CalibrationStore::new(storage, OFFSET);
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn failed_write_leaves_live_calibration_untouched() {
        let mut store = CalibrationStore::open(MemStorage::new(64), OFFSET).unwrap();
        store.storage.reject_writes = true;

        assert_eq!(
            store.save(9.0, 9),
            Err(StoreError::Write(MemStorageError::WriteRejected))
        );
        assert_eq!(store.current(), Calibration::DEFAULT);
    }

    #[test]
    fn failed_default_write_at_boot_is_reported() {
        let mut storage = MemStorage::new(64);
        storage.reject_writes = true;
        assert!(matches!(
            CalibrationStore::open(storage, OFFSET),
            Err(StoreError::Write(MemStorageError::WriteRejected))
        ));
    }

    #[test]
    fn unreadable_storage_reports_failed_repair() {
        let store = CalibrationStore::open(MemStorage::new(8), 0);
        assert!(matches!(
            store,
            Err(StoreError::Write(MemStorageError::OutOfBounds))
        ));
    }

    #[test]
    fn mass_is_tare_corrected_and_scaled() {
        let calibration = Calibration {
            slope: 0.5,
            tare: 1_000,
        };
        assert_eq!(calibration.mass_grams(1_000), 0.0);
        assert_eq!(calibration.mass_grams(3_000), 1_000.0);
        assert_eq!(calibration.mass_grams(-1_000), -1_000.0);
    }
}
