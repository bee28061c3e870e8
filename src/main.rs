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

#![no_std]
#![no_main]

mod config;
mod hx711;
mod serial;
mod storage;
mod tach;
mod time;

use crate::hx711::Hx711;
use crate::tach::{PULSE_TIMER, tach_task};
use crate::time::EmbassyClock;
use assign_resources::assign_resources;
use defmt::{info, warn};
use embassy_executor::{Executor, InterruptExecutor, Spawner};
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use embassy_rp::{Peri, peripherals};
use embassy_time::Delay;
use static_cell::StaticCell;
use testrig_core::{ClockSync, Interpreter, InterpreterConfig, LoadCellReader};
use {defmt_rtt as _, panic_probe as _};

assign_resources! {
    load_cell: LoadCellResources {
        clk_pin: PIN_2,
        data_pin: PIN_4,
    }
    tach: TachResources {
        pulse_pin: PIN_0,
    }
    serial: SerialResources {
        usb: USB,
    }
    storage: StorageResources {
        flash: FLASH,
    }
}

static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();
static EXECUTOR_LOW: StaticCell<Executor> = StaticCell::new();

#[interrupt]
unsafe fn SWI_IRQ_1() {
    unsafe { EXECUTOR_HIGH.on_interrupt() }
}

#[cortex_m_rt::entry]
fn main() -> ! {
    let p = embassy_rp::init(Default::default());
    let resources = split_resources!(p);

    info!(
        "{} {} firmware {} starting",
        config::DEVICE_INFO.vendor,
        config::DEVICE_INFO.device,
        config::DEVICE_INFO.firmware
    );

    // Tach edges preempt everything else running on the thread executor
    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let high_spawner = EXECUTOR_HIGH.start(interrupt::SWI_IRQ_1);
    let tach_pin = Input::new(resources.tach.pulse_pin, config::TACH_PULL);
    high_spawner.spawn(tach_task(tach_pin)).unwrap();

    let executor = EXECUTOR_LOW.init(Executor::new());
    executor.run(|spawner| {
        spawner
            .spawn(telemetry_task(
                spawner,
                resources.load_cell,
                resources.serial,
                resources.storage,
            ))
            .unwrap();
    });
}

#[embassy_executor::task]
async fn telemetry_task(
    spawner: Spawner,
    load_cell: LoadCellResources,
    serial: SerialResources,
    storage: StorageResources,
) {
    let calibration = storage::open_calibration_store(storage.flash);

    let clk_pin = Output::new(load_cell.clk_pin, Level::Low);
    let data_pin = Input::new(load_cell.data_pin, Pull::Up);
    let mut hx711 = Hx711::new(clk_pin, data_pin);
    if hx711.power_up().await.is_err() {
        warn!("Unable to power up the HX711");
    }
    let reader = LoadCellReader::new(hx711, Delay, EmbassyClock);

    let interpreter = Interpreter::new(
        reader,
        calibration,
        &PULSE_TIMER,
        ClockSync::new(EmbassyClock),
        InterpreterConfig {
            info: config::DEVICE_INFO,
            read_timeout: config::LOAD_CELL_READ_TIMEOUT,
        },
    );

    serial::serve(serial.usb, spawner, interpreter).await
}
