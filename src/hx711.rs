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

//! Bit-banged driver for the HX711 24-bit load cell ADC.

use embassy_time::{Duration, Ticker, Timer};
use testrig_core::LoadCellSensor;

/// Clock pulses per conversion at channel A gain 128: 24 data bits plus one pulse that keeps
/// the same gain for the next conversion.
const GAIN_128_CLOCKS: usize = 25;

const POWER_MODE_CHANGE_DELAY: Duration = Duration::from_micros(60);
const CLK_HALF_PERIOD: Duration = Duration::from_micros(1);
const VALID_DATA_BITS: usize = 24;

#[derive(Debug)]
pub enum Error<OutPinE, InPinE> {
    OutPin(OutPinE),
    InPin(InPinE),
}

pub struct Hx711<CLK, DATA> {
    clock_pin: CLK,
    data_pin: DATA,
}

impl<CLK, DATA, ClkE, DataE> Hx711<CLK, DATA>
where
    CLK: embedded_hal::digital::OutputPin<Error = ClkE>,
    DATA: embedded_hal::digital::InputPin<Error = DataE>,
{
    pub fn new(clock_pin: CLK, data_pin: DATA) -> Self {
        Self {
            clock_pin,
            data_pin,
        }
    }

    /// Holding SCK low wakes the chip; the first conversion follows about 400 ms later.
    pub async fn power_up(&mut self) -> Result<(), Error<ClkE, DataE>> {
        self.clock_pin.set_low().map_err(Error::OutPin)?;
        Timer::after(POWER_MODE_CHANGE_DELAY).await;
        Ok(())
    }
}

impl<CLK, DATA, ClkE, DataE> LoadCellSensor for Hx711<CLK, DATA>
where
    CLK: embedded_hal::digital::OutputPin<Error = ClkE>,
    DATA: embedded_hal::digital::InputPin<Error = DataE>,
{
    type Error = Error<ClkE, DataE>;

    fn is_ready(&mut self) -> Result<bool, Self::Error> {
        // DOUT goes low when a conversion is ready
        self.data_pin.is_low().map_err(Error::InPin)
    }

    async fn read_raw(&mut self) -> Result<i32, Self::Error> {
        let mut clock_ticker = Ticker::every(CLK_HALF_PERIOD);
        let mut data: i32 = 0;

        clock_ticker.next().await;
        for _ in 0..GAIN_128_CLOCKS {
            data <<= 1;
            self.clock_pin.set_high().map_err(Error::OutPin)?;
            clock_ticker.next().await;
            self.clock_pin.set_low().map_err(Error::OutPin)?;
            if self.data_pin.is_high().map_err(Error::InPin)? {
                data |= 0x1;
            }
            clock_ticker.next().await;
        }

        data >>= GAIN_128_CLOCKS - VALID_DATA_BITS;
        data &= (1 << VALID_DATA_BITS) - 1;
        // extend sign if bit 24 is 1
        if (data >> 23) & 0x1 == 0x1 {
            data |= 0xFF000000u32 as i32;
        }
        Ok(data)
    }
}
