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

use crate::clock::Monotonic;
use core::fmt;
use core::time::Duration;
use embedded_hal_async::delay::DelayNs;

/// Gap between checks of the sensor's ready signal while waiting for a conversion.
pub const READY_POLL_INTERVAL_MS: u32 = 1;

/// A weight sensor that signals when a conversion is available and can then be clocked out.
#[allow(async_fn_in_trait)]
pub trait LoadCellSensor {
    type Error;

    /// Returns true when a fresh conversion is waiting to be read.
    fn is_ready(&mut self) -> Result<bool, Self::Error>;

    /// Clocks out the waiting conversion as a sign extended raw count. Only called after
    /// [`LoadCellSensor::is_ready`] has returned true.
    async fn read_raw(&mut self) -> Result<i32, Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadError<E> {
    /// The sensor did not become ready within the allowed time.
    Timeout,
    Sensor(E),
}

impl<E> fmt::Display for ReadError<E>
where
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::Timeout => write!(f, "load cell not ready before timeout"),
            ReadError::Sensor(e) => write!(f, "load cell sensor error: {:?}", e),
        }
    }
}

/// Takes single raw samples from a [`LoadCellSensor`], giving up once a deadline passes.
///
/// The sensor may legitimately stall (disconnected cable, powered down amplifier), so a read
/// never waits longer than the timeout it is given.
pub struct LoadCellReader<S, D, C> {
    sensor: S,
    delay: D,
    clock: C,
}

impl<S, D, C> LoadCellReader<S, D, C>
where
    S: LoadCellSensor,
    D: DelayNs,
    C: Monotonic,
{
    pub fn new(sensor: S, delay: D, clock: C) -> Self {
        Self {
            sensor,
            delay,
            clock,
        }
    }

    pub async fn read(&mut self, timeout: Duration) -> Result<i64, ReadError<S::Error>> {
        let timeout_us = u64::try_from(timeout.as_micros()).unwrap_or(u64::MAX);
        let started_us = self.clock.now_micros();

        while !self.sensor.is_ready().map_err(ReadError::Sensor)? {
            let waited_us = self.clock.now_micros().saturating_sub(started_us);
            if waited_us > timeout_us {
                warn!("Load cell not ready after {} us", waited_us);
                return Err(ReadError::Timeout);
            }
            self.delay.delay_ms(READY_POLL_INTERVAL_MS).await;
        }

        let raw = self.sensor.read_raw().await.map_err(ReadError::Sensor)?;
        trace!("Load cell raw = {}", raw);
        Ok(i64::from(raw))
    }

    #[cfg(test)]
    fn sensor(&self) -> &S {
        &self.sensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ManualClock, ManualDelay, ScriptedSensor, SensorFault};
    use embassy_futures::block_on;

    const TIMEOUT: Duration = Duration::from_millis(200);

    #[test]
    fn returns_reading_when_ready() {
        let clock = ManualClock::new();
        let mut reader = LoadCellReader::new(
            ScriptedSensor::new(&[-1234]),
            ManualDelay::new(&clock),
            &clock,
        );

        assert_eq!(block_on(reader.read(TIMEOUT)), Ok(-1234));
        assert_eq!(clock.now_millis(), 0);
    }

    #[test]
    fn waits_for_slow_conversion() {
        let clock = ManualClock::new();
        let mut reader = LoadCellReader::new(
            ScriptedSensor::new(&[8_388_607]).ready_after(80),
            ManualDelay::new(&clock),
            &clock,
        );

        assert_eq!(block_on(reader.read(TIMEOUT)), Ok(8_388_607));
        assert_eq!(clock.now_millis(), 80);
    }

    #[test]
    fn stalled_sensor_times_out() {
        let clock = ManualClock::new();
        let mut reader =
            LoadCellReader::new(ScriptedSensor::stalled(), ManualDelay::new(&clock), &clock);

        assert_eq!(block_on(reader.read(TIMEOUT)), Err(ReadError::Timeout));
        let waited = clock.now_millis();
        assert!(waited > 200 && waited <= 202, "waited {waited} ms");
    }

    #[test]
    fn sensor_fault_is_reported() {
        let clock = ManualClock::new();
        let mut sensor = ScriptedSensor::new(&[1]);
        sensor.fail_ready_check = true;
        let mut reader = LoadCellReader::new(sensor, ManualDelay::new(&clock), &clock);

        assert_eq!(
            block_on(reader.read(TIMEOUT)),
            Err(ReadError::Sensor(SensorFault))
        );
    }

    #[test]
    fn consecutive_reads_take_successive_samples() {
        let clock = ManualClock::new();
        let mut reader = LoadCellReader::new(
            ScriptedSensor::new(&[10, 20]).ready_after(3),
            ManualDelay::new(&clock),
            &clock,
        );

        assert_eq!(block_on(reader.read(TIMEOUT)), Ok(10));
        assert_eq!(block_on(reader.read(TIMEOUT)), Ok(20));
        assert_eq!(reader.sensor().poll_count(), 0);
    }
}
